//! Project configuration, read from `specforge.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{amend::ConflictPolicy, openapi::Format, validate::ValidationConfig};

/// The default configuration file name.
pub const FILE_NAME: &str = "specforge.toml";

/// Configuration for conversion, amendment and validation.
///
/// Command line flags take precedence over these settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The format documents are written in.
    pub output_format: Format,

    /// How amendments resolve conflicts.
    pub conflict_policy: ConflictPolicy,

    /// What the validator checks.
    pub validation: ValidationConfig,
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads the configuration at `path`, or the defaults if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

/// The serialized versions of the configuration.
///
/// New versions are added as variants so that old files keep loading.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        output_format: Format,

        #[serde(default)]
        conflict_policy: ConflictPolicy,

        #[serde(default)]
        validation: ValidationConfig,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                output_format,
                conflict_policy,
                validation,
            } => Self {
                output_format,
                conflict_policy,
                validation,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            output_format: config.output_format,
            conflict_policy: config.conflict_policy,
            validation: config.validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\noutput_format = \"json\"\nconflict_policy = \"auto\"\n\n[validation]\nstrict = true\nallow_extensions = true\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.output_format, Format::Json);
        assert_eq!(config.conflict_policy, ConflictPolicy::AllowBreakingChanges);
        assert!(config.validation.strict);
        assert!(config.validation.allow_extensions);
        assert!(!config.validation.check_best_practices);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nconflict_policy = \"merge\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(FILE_NAME);
        let config = Config {
            output_format: Format::Json,
            conflict_policy: ConflictPolicy::AllowBreakingChanges,
            validation: ValidationConfig {
                check_best_practices: true,
                ..ValidationConfig::default()
            },
        };

        config.save(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("conflict_policy = \"auto\""));
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
