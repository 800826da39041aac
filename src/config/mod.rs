use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub mod defaults;

use crate::deciders::{Organism, PrefixFamily};
use crate::errors::{LoadError, LoadResult};
use crate::models::LoadMode;
use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub prefixes: PrefixFamiliesConfig,
    #[serde(default)]
    pub organisms: OrganismsConfig,
    pub database: DatabaseConfig,
    pub qc_database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    /// Log a progress line every N records
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub mode: LoadMode,
    /// Accession namespace the sequences are loaded into
    #[serde(default = "default_logical_db")]
    pub logical_db: String,
    /// Side file listing repeated input sequences (incremental mode only)
    #[serde(default = "default_repeat_file")]
    pub repeat_file: PathBuf,
}

/// One switch per RefSeq prefix family. Unknown family keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixFamiliesConfig {
    #[serde(rename = "NM", default)]
    pub nm: bool,
    #[serde(rename = "NR", default)]
    pub nr: bool,
    #[serde(rename = "NP", default)]
    pub np: bool,
    #[serde(rename = "NC", default)]
    pub nc: bool,
    #[serde(rename = "NG", default)]
    pub ng: bool,
    #[serde(rename = "NT", default)]
    pub nt: bool,
    #[serde(rename = "NW", default)]
    pub nw: bool,
    #[serde(rename = "NZ", default)]
    pub nz: bool,
    #[serde(rename = "ZP", default)]
    pub zp: bool,
    #[serde(rename = "XM", default)]
    pub xm: bool,
    #[serde(rename = "XR", default)]
    pub xr: bool,
    #[serde(rename = "XP", default)]
    pub xp: bool,
}

impl PrefixFamiliesConfig {
    pub fn flag(&self, family: PrefixFamily) -> bool {
        match family {
            PrefixFamily::NM => self.nm,
            PrefixFamily::NR => self.nr,
            PrefixFamily::NP => self.np,
            PrefixFamily::NC => self.nc,
            PrefixFamily::NG => self.ng,
            PrefixFamily::NT => self.nt,
            PrefixFamily::NW => self.nw,
            PrefixFamily::NZ => self.nz,
            PrefixFamily::ZP => self.zp,
            PrefixFamily::XM => self.xm,
            PrefixFamily::XR => self.xr,
            PrefixFamily::XP => self.xp,
        }
    }

    pub fn enabled_families(&self) -> Vec<PrefixFamily> {
        PrefixFamily::ALL
            .iter()
            .copied()
            .filter(|family| self.flag(*family))
            .collect()
    }

    /// Curated and model transcript/protein families of a typical RefSeq load
    pub fn transcripts() -> Self {
        Self {
            nm: true,
            nr: true,
            np: true,
            xm: true,
            xr: true,
            xp: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganismsConfig {
    #[serde(default)]
    pub mouse: bool,
    #[serde(default)]
    pub rat: bool,
    #[serde(default)]
    pub human: bool,
}

impl OrganismsConfig {
    pub fn enabled_organisms(&self) -> Vec<Organism> {
        Organism::ALL
            .iter()
            .copied()
            .filter(|organism| match organism {
                Organism::Mouse => self.mouse,
                Organism::Rat => self.rat,
                Organism::Human => self.human,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig {
                path: PathBuf::from(DEFAULT_INPUT_PATH),
                progress_interval: DEFAULT_PROGRESS_INTERVAL,
            },
            load: LoadConfig {
                mode: LoadMode::Incremental,
                logical_db: DEFAULT_LOGICAL_DB.to_string(),
                repeat_file: PathBuf::from(DEFAULT_REPEAT_FILE),
            },
            prefixes: PrefixFamiliesConfig::transcripts(),
            organisms: OrganismsConfig {
                mouse: true,
                rat: false,
                human: false,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            qc_database: DatabaseConfig {
                url: DEFAULT_QC_DATABASE_URL.to_string(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> LoadResult<()> {
        if self.input.progress_interval == 0 {
            return Err(LoadError::configuration(
                "input.progress_interval must be greater than zero",
            ));
        }
        if self.load.logical_db.trim().is_empty() {
            return Err(LoadError::configuration("load.logical_db must not be empty"));
        }
        if self.prefixes.enabled_families().is_empty() {
            return Err(LoadError::configuration(
                "at least one prefix family must be enabled",
            ));
        }
        if self.organisms.enabled_organisms().is_empty() {
            return Err(LoadError::configuration(
                "at least one organism must be enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[input]
path = "./data/input/rat.gbff"

[load]
mode = "delete_reload"
logical_db = "RefSeq"

[prefixes]
NM = true
XR = true

[organisms]
rat = true

[database]
url = "sqlite::memory:"

[qc_database]
url = "sqlite::memory:"
max_connections = 1
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(CONFIG).unwrap();

        assert_eq!(config.load.mode, LoadMode::DeleteReload);
        assert_eq!(config.input.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.load.repeat_file, PathBuf::from(DEFAULT_REPEAT_FILE));
        assert_eq!(
            config.prefixes.enabled_families(),
            vec![PrefixFamily::NM, PrefixFamily::XR]
        );
        assert_eq!(config.organisms.enabled_organisms(), vec![Organism::Rat]);
        assert_eq!(config.qc_database.max_connections, Some(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_prefix_family_rejected() {
        let text = CONFIG.replace("XR = true", "QQ = true");
        assert!(toml::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_prefix_set() {
        let mut config = Config::default();
        config.prefixes = PrefixFamiliesConfig::default();
        assert!(matches!(
            config.validate(),
            Err(LoadError::Configuration { .. })
        ));
    }

    #[test]
    fn test_load_from_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let config = Config::load_from_file(path).unwrap();
        assert!(std::path::Path::new(path).exists());
        assert_eq!(config.load.mode, LoadMode::Incremental);

        let reloaded = Config::load_from_file(path).unwrap();
        assert_eq!(reloaded.prefixes, config.prefixes);
        assert_eq!(reloaded.organisms, config.organisms);
    }
}
