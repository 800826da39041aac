use tracing::trace;

use super::RecordParser;
use crate::deciders::{DeciderReport, OrganismChecker, PrefixDeciderEngine, PrefixFamily};
use crate::errors::RecordFormatError;
use crate::models::{SequenceInput, SequenceQuality};

/// Curated RefSeq records
const HIGH_QUALITY_FAMILIES: [PrefixFamily; 3] =
    [PrefixFamily::NM, PrefixFamily::NR, PrefixFamily::NP];
/// Predicted, low-confidence records
const LOW_QUALITY_FAMILIES: [PrefixFamily; 2] = [PrefixFamily::NZ, PrefixFamily::ZP];

/// Gates raw RefSeq records and interprets the accepted ones.
///
/// A record is valid when its organism is in scope and its accession falls
/// in an enabled prefix family. Parsing is delegated to the wrapped
/// [`RecordParser`]; the interpreter only adds the quality tier.
pub struct RefSeqInterpreter {
    organism_checker: Box<dyn OrganismChecker>,
    prefix_engine: PrefixDeciderEngine,
    parser: Box<dyn RecordParser>,
}

impl RefSeqInterpreter {
    pub fn new(
        organism_checker: Box<dyn OrganismChecker>,
        prefix_engine: PrefixDeciderEngine,
        parser: Box<dyn RecordParser>,
    ) -> Self {
        Self {
            organism_checker,
            prefix_engine,
            parser,
        }
    }

    /// The prefix engine is only consulted for in-scope organisms
    pub fn is_valid(&mut self, record: &str) -> bool {
        if !self.organism_checker.is_in_scope(record) {
            return false;
        }
        self.prefix_engine.evaluate(record)
    }

    /// Parse a record that passed [`is_valid`](Self::is_valid) and tag it
    /// with its quality tier
    pub fn interpret(&self, record: &str) -> Result<SequenceInput, RecordFormatError> {
        let mut input = self.parser.parse(record)?;
        let quality = self.classify(input.acc_id());
        trace!("Classified {} as {} quality", input.acc_id(), quality);
        input.set_quality(quality);
        Ok(input)
    }

    pub fn classify(&self, seqid: &str) -> SequenceQuality {
        let in_any = |families: &[PrefixFamily]| {
            families
                .iter()
                .any(|family| self.prefix_engine.matches_family(seqid, family.code()))
        };

        if in_any(&HIGH_QUALITY_FAMILIES) {
            SequenceQuality::High
        } else if in_any(&LOW_QUALITY_FAMILIES) {
            SequenceQuality::Low
        } else {
            SequenceQuality::Medium
        }
    }

    pub fn prefix_engine(&self) -> &PrefixDeciderEngine {
        &self.prefix_engine
    }

    pub fn decider_report(&self) -> DeciderReport {
        DeciderReport {
            organism: self.organism_checker.summary(),
            prefix: self.prefix_engine.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deciders::DeciderCount;
    use crate::ingestor::GenBankParser;
    use rstest::rstest;

    /// Accepts or rejects every record and counts how often it was asked
    struct FixedOrganismChecker {
        in_scope: bool,
        asked: u64,
    }

    impl OrganismChecker for FixedOrganismChecker {
        fn is_in_scope(&mut self, _record: &str) -> bool {
            self.asked += 1;
            self.in_scope
        }

        fn summary(&self) -> Vec<DeciderCount> {
            vec![DeciderCount::new("Total records looked at", self.asked)]
        }
    }

    fn interpreter(in_scope: bool) -> RefSeqInterpreter {
        RefSeqInterpreter::new(
            Box::new(FixedOrganismChecker { in_scope, asked: 0 }),
            PrefixDeciderEngine::with_families(PrefixFamily::ALL).unwrap(),
            Box::new(GenBankParser::new()),
        )
    }

    fn record(acc: &str) -> String {
        format!(
            "LOCUS       {acc}   1200 bp    mRNA    linear   ROD 01-JAN-2004\n\
             DEFINITION  Test record.\n\
             ACCESSION   {acc}\n\
             VERSION     {acc}.1\n\
             SOURCE      Mus musculus\n  ORGANISM  Mus musculus\n\
             //\n"
        )
    }

    #[rstest]
    #[case("NM_000001", SequenceQuality::High)]
    #[case("NR_000002", SequenceQuality::High)]
    #[case("NP_000003", SequenceQuality::High)]
    #[case("NC_000004", SequenceQuality::Medium)]
    #[case("NG_000005", SequenceQuality::Medium)]
    #[case("NT_000006", SequenceQuality::Medium)]
    #[case("NW_000007", SequenceQuality::Medium)]
    #[case("NZ_AAAA01000008", SequenceQuality::Low)]
    #[case("ZP_000009", SequenceQuality::Low)]
    #[case("XM_000010", SequenceQuality::Medium)]
    #[case("XR_000011", SequenceQuality::Medium)]
    #[case("XP_000012", SequenceQuality::Medium)]
    fn test_quality_classification(#[case] acc: &str, #[case] expected: SequenceQuality) {
        let mut interpreter = interpreter(true);
        let text = record(acc);

        assert!(interpreter.is_valid(&text));
        let input = interpreter.interpret(&text).unwrap();
        assert_eq!(input.acc_id(), acc);
        assert_eq!(input.quality(), Some(expected));
    }

    #[test]
    fn test_out_of_scope_organism_skips_prefix_engine() {
        let mut interpreter = interpreter(false);
        let looked_at = interpreter.prefix_engine().looked_at();
        let processed = interpreter.prefix_engine().processed();

        assert!(!interpreter.is_valid(&record("NM_000001")));

        assert_eq!(interpreter.prefix_engine().looked_at(), looked_at);
        assert_eq!(interpreter.prefix_engine().processed(), processed);
        assert_eq!(interpreter.prefix_engine().true_count("NM"), Some(0));
    }

    #[test]
    fn test_parser_error_propagates() {
        let interpreter = interpreter(true);
        let err = interpreter
            .interpret("DEFINITION  no locus here.\n//\n")
            .unwrap_err();
        assert_eq!(err, RecordFormatError::missing("LOCUS"));
    }

    #[test]
    fn test_decider_report_includes_both_summaries() {
        let mut interpreter = interpreter(true);
        interpreter.is_valid(&record("XM_000001"));

        let report = interpreter.decider_report();
        assert_eq!(report.organism[0].count, 1);
        assert_eq!(report.prefix[1], DeciderCount::new("Total records processed", 1));
    }
}
