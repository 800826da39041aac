//! GenBank flat file record parser
//!
//! Only the sections the loader uses are read: LOCUS, DEFINITION,
//! ACCESSION, VERSION, SOURCE/ORGANISM, the PUBMED and MEDLINE lines of
//! REFERENCE blocks and the qualifiers of the first `source` feature.
//! Everything else, including the ORIGIN sequence data, is skipped.

use chrono::NaiveDate;
use tracing::trace;

use super::RecordParser;
use crate::errors::RecordFormatError;
use crate::models::{
    AccessionAttributes, MolecularSourceAttributes, ReferenceAssociation, SequenceAttributes,
    SequenceInput,
};

/// Width of the keyword column of a GenBank line
const KEYWORD_WIDTH: usize = 12;
/// Feature keys occupy columns 6-21, qualifiers start at column 22
const FEATURE_KEY_START: usize = 5;
const QUALIFIER_COLUMN: usize = 21;

const LOCUS_DATE_FORMAT: &str = "%d-%b-%Y";

pub const PUBMED_NAMESPACE: &str = "PubMed";
pub const MEDLINE_NAMESPACE: &str = "MEDLINE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Definition,
    Accession,
    Source,
    Reference,
    Features,
    Origin,
    Other,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenBankParser;

impl GenBankParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for GenBankParser {
    fn parse(&self, record: &str) -> Result<SequenceInput, RecordFormatError> {
        let mut builder = RecordBuilder::default();
        let mut section = Section::Preamble;

        for line in record.lines() {
            if line.starts_with("//") {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            if !line.starts_with(' ') {
                builder.finish_qualifier();
                let (keyword, value) = split_keyword(line);
                section = builder.start_section(keyword, value);
                continue;
            }

            match section {
                Section::Definition => {
                    let (_, value) = split_keyword(line);
                    builder.definition.push(value.to_string());
                }
                Section::Accession => {
                    let (_, value) = split_keyword(line);
                    builder
                        .accessions
                        .extend(value.split_whitespace().map(str::to_string));
                }
                Section::Source => {
                    let (keyword, value) = split_keyword(line);
                    if keyword == "ORGANISM" && builder.organism.is_none() {
                        builder.organism = Some(value.to_string());
                    }
                }
                Section::Reference => {
                    let (keyword, value) = split_keyword(line);
                    let namespace = match keyword {
                        "PUBMED" => Some(PUBMED_NAMESPACE),
                        "MEDLINE" => Some(MEDLINE_NAMESPACE),
                        _ => None,
                    };
                    if let (Some(namespace), Some(id)) = (namespace, value.split_whitespace().next())
                    {
                        builder.references.push(ReferenceAssociation {
                            namespace: namespace.to_string(),
                            id: id.to_string(),
                        });
                    }
                }
                Section::Features => builder.feature_line(line),
                Section::Preamble | Section::Origin | Section::Other => {}
            }
        }
        builder.finish_qualifier();

        builder.build()
    }
}

fn split_keyword(line: &str) -> (&str, &str) {
    match (line.get(..KEYWORD_WIDTH), line.get(KEYWORD_WIDTH..)) {
        (Some(keyword), Some(value)) => (keyword.trim(), value.trim()),
        _ => {
            let trimmed = line.trim();
            match trimmed.split_once(char::is_whitespace) {
                Some((keyword, value)) => (keyword, value.trim()),
                None => (trimmed, ""),
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecordBuilder {
    locus: Option<String>,
    definition: Vec<String>,
    accessions: Vec<String>,
    version: Option<String>,
    organism: Option<String>,
    references: Vec<ReferenceAssociation>,
    source: MolecularSourceAttributes,
    in_source_feature: bool,
    source_feature_seen: bool,
    pending_qualifier: Option<(String, String)>,
}

impl RecordBuilder {
    fn start_section(&mut self, keyword: &str, value: &str) -> Section {
        match keyword {
            "LOCUS" => {
                self.locus = Some(value.to_string());
                Section::Other
            }
            "DEFINITION" => {
                self.definition.push(value.to_string());
                Section::Definition
            }
            "ACCESSION" => {
                self.accessions
                    .extend(value.split_whitespace().map(str::to_string));
                Section::Accession
            }
            "VERSION" => {
                self.version = Some(value.to_string());
                Section::Other
            }
            "SOURCE" => Section::Source,
            "REFERENCE" => Section::Reference,
            "FEATURES" => Section::Features,
            "ORIGIN" => Section::Origin,
            _ => Section::Other,
        }
    }

    fn feature_line(&mut self, line: &str) {
        let key = line
            .get(FEATURE_KEY_START..QUALIFIER_COLUMN)
            .map(str::trim)
            .unwrap_or("");

        if !key.is_empty() {
            self.finish_qualifier();
            if self.in_source_feature {
                self.source_feature_seen = true;
            }
            self.in_source_feature = key == "source" && !self.source_feature_seen;
            return;
        }
        if !self.in_source_feature {
            return;
        }

        let text = line.trim();
        if let Some(qualifier) = text.strip_prefix('/') {
            self.finish_qualifier();
            let (name, value) = qualifier.split_once('=').unwrap_or((qualifier, ""));
            self.pending_qualifier = Some((name.to_string(), value.to_string()));
        } else if let Some((_, value)) = self.pending_qualifier.as_mut() {
            value.push(' ');
            value.push_str(text);
        }
    }

    fn finish_qualifier(&mut self) {
        let Some((name, value)) = self.pending_qualifier.take() else {
            return;
        };
        let value = value.trim().trim_matches('"').to_string();
        let slot = match name.as_str() {
            "organism" => &mut self.source.organism,
            "strain" => &mut self.source.strain,
            "tissue_type" => &mut self.source.tissue,
            "cell_line" => &mut self.source.cell_line,
            "clone_lib" => &mut self.source.clone_library,
            "sex" => &mut self.source.sex,
            "dev_stage" => &mut self.source.dev_stage,
            _ => return,
        };
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value);
        }
    }

    fn build(self) -> Result<SequenceInput, RecordFormatError> {
        let locus = self.locus.ok_or(RecordFormatError::missing("LOCUS"))?;
        let locus = parse_locus(&locus)?;

        if self.accessions.is_empty() {
            return Err(RecordFormatError::missing("ACCESSION"));
        }
        let mut accessions = self.accessions.into_iter();
        let primary = accessions
            .next()
            .map(AccessionAttributes::primary)
            .ok_or(RecordFormatError::missing("ACCESSION"))?;
        let secondary: Vec<AccessionAttributes> =
            accessions.map(AccessionAttributes::secondary).collect();

        let version_line = self.version.ok_or(RecordFormatError::missing("VERSION"))?;
        let version = parse_version(&version_line)?;

        let organism = self
            .organism
            .or_else(|| self.source.organism.clone())
            .unwrap_or_default();

        trace!(
            "Parsed GenBank record {} (version {}, {} secondary accessions)",
            primary.acc_id,
            version,
            secondary.len()
        );

        Ok(SequenceInput {
            primary_acc: primary,
            secondary_accs: secondary,
            sequence: SequenceAttributes {
                version,
                length: locus.length,
                raw_molecule_type: locus.molecule_type,
                topology: locus.topology,
                division: locus.division,
                description: self.definition.join(" "),
                sequence_date: locus.date,
                organism,
                quality: None,
            },
            source: self.source,
            references: self.references,
        })
    }
}

#[derive(Debug)]
struct LocusLine {
    length: u32,
    molecule_type: String,
    topology: Option<String>,
    division: Option<String>,
    date: NaiveDate,
}

/// `NM_000014   4610 bp    mRNA    linear   PRI 15-APR-2004`
fn parse_locus(value: &str) -> Result<LocusLine, RecordFormatError> {
    let tokens: Vec<&str> = value.split_whitespace().collect();

    let unit = tokens
        .iter()
        .position(|t| *t == "bp" || *t == "aa")
        .filter(|i| *i > 0)
        .ok_or_else(|| RecordFormatError::malformed("LOCUS", "missing sequence length"))?;

    let length = tokens[unit - 1].parse::<u32>().map_err(|_| {
        RecordFormatError::malformed(
            "LOCUS",
            format!("non-numeric sequence length '{}'", tokens[unit - 1]),
        )
    })?;

    let molecule_type = tokens
        .get(unit + 1)
        .ok_or_else(|| RecordFormatError::malformed("LOCUS", "missing molecule type"))?
        .to_string();

    let rest = tokens.get(unit + 2..).unwrap_or(&[]);
    let (date_token, middle) = rest
        .split_last()
        .ok_or_else(|| RecordFormatError::malformed("LOCUS", "missing sequence date"))?;

    let date = NaiveDate::parse_from_str(date_token, LOCUS_DATE_FORMAT).map_err(|_| {
        RecordFormatError::malformed("LOCUS", format!("unparseable date '{}'", date_token))
    })?;

    let mut topology = None;
    let mut division = None;
    for token in middle {
        match *token {
            "linear" | "circular" => topology = Some(token.to_string()),
            other => division = Some(other.to_string()),
        }
    }

    Ok(LocusLine {
        length,
        molecule_type,
        topology,
        division,
        date,
    })
}

/// `NM_000014.4  GI:66932946` yields `4`
fn parse_version(value: &str) -> Result<String, RecordFormatError> {
    let token = value
        .split_whitespace()
        .next()
        .ok_or_else(|| RecordFormatError::malformed("VERSION", "empty version line"))?;

    match token.rsplit_once('.') {
        Some((_, version)) if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) => {
            Ok(version.to_string())
        }
        _ => Err(RecordFormatError::malformed(
            "VERSION",
            format!("'{}' is not of the form ACCESSION.N", token),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"LOCUS       NM_008084               1278 bp    mRNA    linear   ROD 12-MAY-2004
DEFINITION  Mus musculus glyceraldehyde-3-phosphate dehydrogenase (Gapdh),
            mRNA.
ACCESSION   NM_008084 XM_001476707
            XM_001476708
VERSION     NM_008084.2  GI:6679936
KEYWORDS    .
SOURCE      Mus musculus (house mouse)
  ORGANISM  Mus musculus
            Eukaryota; Metazoa; Chordata; Craniata; Vertebrata; Euteleostomi;
            Mammalia; Eutheria; Euarchontoglires; Glires; Rodentia.
REFERENCE   1  (bases 1 to 1278)
  AUTHORS   Sabath,D.E., Broome,H.E. and Prystowsky,M.B.
  TITLE     Glyceraldehyde-3-phosphate dehydrogenase mRNA is a major
            interleukin 2-induced transcript in a cloned T-helper lymphocyte
  JOURNAL   Gene 91 (2), 185-191 (1990)
  MEDLINE   90392870
   PUBMED   2210380
FEATURES             Location/Qualifiers
     source          1..1278
                     /organism="Mus musculus"
                     /mol_type="mRNA"
                     /strain="C57BL/6"
                     /db_xref="taxon:10090"
                     /tissue_type="mammary gland,
                     lactating"
                     /clone_lib="RIKEN full-length enriched library"
     gene            1..1278
                     /organism="Not the source"
ORIGIN
        1 gctcgcggcc ccgcgcgcgc gcgcgctccc
//
"#;

    #[test]
    fn test_parse_full_record() {
        let input = GenBankParser::new().parse(RECORD).unwrap();

        assert_eq!(input.acc_id(), "NM_008084");
        assert!(input.primary_acc.is_primary);
        let secondary: Vec<&str> = input
            .secondary_accs
            .iter()
            .map(|a| a.acc_id.as_str())
            .collect();
        assert_eq!(secondary, vec!["XM_001476707", "XM_001476708"]);

        let seq = &input.sequence;
        assert_eq!(seq.version, "2");
        assert_eq!(seq.length, 1278);
        assert_eq!(seq.raw_molecule_type, "mRNA");
        assert_eq!(seq.topology.as_deref(), Some("linear"));
        assert_eq!(seq.division.as_deref(), Some("ROD"));
        assert_eq!(seq.sequence_date, NaiveDate::from_ymd_opt(2004, 5, 12).unwrap());
        assert_eq!(
            seq.description,
            "Mus musculus glyceraldehyde-3-phosphate dehydrogenase (Gapdh), mRNA."
        );
        assert_eq!(seq.organism, "Mus musculus");
        assert_eq!(seq.quality, None);

        assert_eq!(input.source.organism.as_deref(), Some("Mus musculus"));
        assert_eq!(input.source.strain.as_deref(), Some("C57BL/6"));
        assert_eq!(
            input.source.tissue.as_deref(),
            Some("mammary gland, lactating")
        );
        assert_eq!(
            input.source.clone_library.as_deref(),
            Some("RIKEN full-length enriched library")
        );
        assert_eq!(input.source.sex, None);

        assert_eq!(
            input.references,
            vec![
                ReferenceAssociation {
                    namespace: MEDLINE_NAMESPACE.to_string(),
                    id: "90392870".to_string(),
                },
                ReferenceAssociation {
                    namespace: PUBMED_NAMESPACE.to_string(),
                    id: "2210380".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_locus() {
        let record = RECORD.replacen("LOCUS ", "XLOCUS", 1);
        let err = GenBankParser::new().parse(&record).unwrap_err();
        assert_eq!(err, RecordFormatError::missing("LOCUS"));
    }

    #[test]
    fn test_missing_accession() {
        let record: String = RECORD
            .lines()
            .filter(|l| !l.starts_with("ACCESSION") && !l.starts_with("            XM_"))
            .map(|l| format!("{}\n", l))
            .collect();
        let err = GenBankParser::new().parse(&record).unwrap_err();
        assert_eq!(err, RecordFormatError::missing("ACCESSION"));
    }

    #[test]
    fn test_unparseable_date() {
        let record = RECORD.replace("12-MAY-2004", "2004-05-12");
        let err = GenBankParser::new().parse(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordFormatError::Malformed { section: "LOCUS", .. }
        ));
    }

    #[test]
    fn test_non_numeric_length() {
        let record = RECORD.replace("1278 bp", "12x8 bp");
        assert!(GenBankParser::new().parse(&record).is_err());
    }

    #[test]
    fn test_version_without_number() {
        let record = RECORD.replace("NM_008084.2  GI", "NM_008084  GI");
        let err = GenBankParser::new().parse(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordFormatError::Malformed { section: "VERSION", .. }
        ));
    }

    #[test]
    fn test_locus_without_topology() {
        let locus = parse_locus("AB000001   850 bp    DNA     PLN 03-FEB-1999").unwrap();
        assert_eq!(locus.topology, None);
        assert_eq!(locus.division.as_deref(), Some("PLN"));
        assert_eq!(locus.length, 850);
    }
}
