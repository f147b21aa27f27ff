//! Layered configuration for the `midisheet` binary.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/midisheet/config.toml` (system)
//! 2. `~/.config/midisheet/config.toml` (user)
//! 3. `./midisheet.toml`, or the `--config` path when given
//! 4. Environment variables (`MIDISHEET_*`, `RUST_LOG`)
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [defaults]
//! combine_interval = 40
//! transpose = 0
//! use_default_instruments = true
//! two_staffs = false
//! ```

use std::env;
use std::path::{Path, PathBuf};

use midisheet::MidiOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive string.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Overrides applied on top of the per-file option defaults. Unset values
/// leave the file's own defaults alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultsConfig {
    pub combine_interval: Option<u32>,
    pub transpose: Option<i32>,
    pub use_default_instruments: Option<bool>,
    pub two_staffs: Option<bool>,
}

impl DefaultsConfig {
    pub fn apply(&self, options: &mut MidiOptions) {
        if let Some(v) = self.combine_interval {
            options.combine_interval = v;
        }
        if let Some(v) = self.transpose {
            options.transpose = v;
        }
        if let Some(v) = self.use_default_instruments {
            options.use_default_instruments = v;
        }
        if let Some(v) = self.two_staffs {
            options.two_staffs = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub defaults: DefaultsConfig,
}

/// Where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

impl Config {
    pub fn load_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut config = Config::default();
        let mut sources = ConfigSources::default();

        for path in discover_config_files(config_path) {
            let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
                path: path.clone(),
                source: e,
            })?;
            apply_toml(&mut config, &contents, &path)?;
            sources.files.push(path);
        }

        apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }
}

/// Existing config files in load order. An explicit path replaces the
/// local `./midisheet.toml`, and is returned even when missing so the read
/// error reaches the user.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/midisheet/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midisheet/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("midisheet.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Overlay the values present in a TOML document onto `config`.
fn apply_toml(config: &mut Config, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(e.to_string()))?;

    if let Some(logging) = table.get("logging").and_then(|v| v.as_table()) {
        if let Some(v) = logging.get("level").and_then(|v| v.as_str()) {
            config.logging.level = v.to_string();
        }
    }

    if let Some(defaults) = table.get("defaults").and_then(|v| v.as_table()) {
        if let Some(v) = defaults.get("combine_interval").and_then(|v| v.as_integer()) {
            let v = u32::try_from(v)
                .map_err(|_| parse_error(format!("combine_interval out of range: {v}")))?;
            config.defaults.combine_interval = Some(v);
        }
        if let Some(v) = defaults.get("transpose").and_then(|v| v.as_integer()) {
            let v = i32::try_from(v)
                .map_err(|_| parse_error(format!("transpose out of range: {v}")))?;
            config.defaults.transpose = Some(v);
        }
        if let Some(v) = defaults.get("use_default_instruments").and_then(|v| v.as_bool()) {
            config.defaults.use_default_instruments = Some(v);
        }
        if let Some(v) = defaults.get("two_staffs").and_then(|v| v.as_bool()) {
            config.defaults.two_staffs = Some(v);
        }
    }

    Ok(())
}

fn apply_env_overrides(config: &mut Config, sources: &mut ConfigSources) {
    apply_env(config, sources, |key| env::var(key).ok());
}

fn apply_env(
    config: &mut Config,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("MIDISHEET_LOG_LEVEL") {
        config.logging.level = v;
        sources.env_overrides.push("MIDISHEET_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything else
    if let Some(v) = lookup("RUST_LOG") {
        config.logging.level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
    if let Some(v) = lookup("MIDISHEET_COMBINE_INTERVAL") {
        if let Ok(ms) = v.trim().parse() {
            config.defaults.combine_interval = Some(ms);
            sources.env_overrides.push("MIDISHEET_COMBINE_INTERVAL".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_toml() {
        let mut config = Config::default();
        apply_toml(&mut config, "[logging]\nlevel = \"debug\"\n", Path::new("test.toml")).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.defaults, DefaultsConfig::default());
    }

    #[test]
    fn test_later_files_win() {
        let mut config = Config::default();
        apply_toml(
            &mut config,
            "[defaults]\ncombine_interval = 60\ntranspose = 2\n",
            Path::new("system.toml"),
        )
        .unwrap();
        apply_toml(
            &mut config,
            "[defaults]\ntranspose = -3\ntwo_staffs = true\n",
            Path::new("local.toml"),
        )
        .unwrap();
        assert_eq!(
            config.defaults,
            DefaultsConfig {
                combine_interval: Some(60),
                transpose: Some(-3),
                use_default_instruments: None,
                two_staffs: Some(true),
            }
        );
    }

    #[test]
    fn test_bad_toml_names_file() {
        let mut config = Config::default();
        let err = apply_toml(&mut config, "[defaults\n", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let mut config = Config::default();
        let err = apply_toml(
            &mut config,
            "[defaults]\ncombine_interval = -1\n",
            Path::new("test.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MIDISHEET_LOG_LEVEL", "warn"),
            ("RUST_LOG", "midisheet=trace"),
            ("MIDISHEET_COMBINE_INTERVAL", "25"),
        ]);
        let mut config = Config::default();
        let mut sources = ConfigSources::default();
        apply_env(&mut config, &mut sources, |key| {
            vars.get(key).map(|v| v.to_string())
        });
        assert_eq!(config.logging.level, "midisheet=trace");
        assert_eq!(config.defaults.combine_interval, Some(25));
        assert_eq!(sources.env_overrides.len(), 3);
    }

    #[test]
    fn test_defaults_apply_to_options() {
        let defaults = DefaultsConfig {
            combine_interval: Some(10),
            transpose: None,
            use_default_instruments: Some(false),
            two_staffs: None,
        };
        let mut options = MidiOptions::default();
        defaults.apply(&mut options);
        assert_eq!(options.combine_interval, 10);
        assert_eq!(options.transpose, 0);
        assert!(!options.use_default_instruments);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load_from(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
