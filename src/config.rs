//! Application configuration
//!
//! Layered with the `config` crate, lowest priority first:
//!
//! 1. built-in defaults
//! 2. YAML file: `--config <path>`, else `~/.config/driver-organizer/config.yaml`
//!    and `./config.yaml` when present
//! 3. `DORGANIZER_*` environment variables
//! 4. command-line flags

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classifier::gemini::GeminiConfig;
use crate::drive::folder::path_segments;
use crate::organizer::OrganizeOptions;

/// Directory name under the platform config dir
pub const APP_DIR: &str = "driver-organizer";

pub const ENV_PREFIX: &str = "DORGANIZER";

/// `~/.config/driver-organizer` (or the platform equivalent)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub backup_folder: String,
    pub batch_size: usize,
    /// AI requests per second
    pub rate_limit: u32,
    /// USD ceiling for AI spend
    pub max_cost: f64,
    pub log_level: String,
    pub dry_run: bool,
    /// Language folder names are suggested in
    pub language: String,
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub backup_folder: Option<String>,
    pub batch_size: Option<usize>,
    pub max_cost: Option<f64>,
    pub log_level: Option<String>,
    pub dry_run: bool,
}

impl AppConfig {
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::load_with_env(config_file, overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(
        config_file: Option<&Path>,
        overrides: &Overrides,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let dir = config_dir();
        let mut builder = Config::builder()
            .set_default("credentials_path", path_value(&dir.join("credentials.json")))?
            .set_default("token_path", path_value(&dir.join("token.json")))?
            .set_default("gemini_api_key", "")?
            .set_default("gemini_model", "gemini-2.0-flash")?
            .set_default("backup_folder", "backup")?
            .set_default("batch_size", 20_i64)?
            .set_default("rate_limit", 10_i64)?
            .set_default("max_cost", 5.0)?
            .set_default("log_level", "info")?
            .set_default("dry_run", false)?
            .set_default("language", "Portuguese")?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Yaml).required(true)),
            None => builder
                .add_source(File::from(dir.join("config.yaml")).format(FileFormat::Yaml).required(false))
                .add_source(File::with_name("config").format(FileFormat::Yaml).required(false)),
        };

        builder = builder.add_source(env.try_parsing(true));

        if let Some(key) = &overrides.gemini_api_key {
            builder = builder.set_override("gemini_api_key", key.as_str())?;
        }
        if let Some(model) = &overrides.gemini_model {
            builder = builder.set_override("gemini_model", model.as_str())?;
        }
        if let Some(folder) = &overrides.backup_folder {
            builder = builder.set_override("backup_folder", folder.as_str())?;
        }
        if let Some(size) = overrides.batch_size {
            builder = builder.set_override("batch_size", size as i64)?;
        }
        if let Some(cost) = overrides.max_cost {
            builder = builder.set_override("max_cost", cost)?;
        }
        if let Some(level) = &overrides.log_level {
            builder = builder.set_override("log_level", level.as_str())?;
        }
        if overrides.dry_run {
            builder = builder.set_override("dry_run", true)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        // An empty path resolves to the root, which would stage the root into itself
        if path_segments(&config.backup_folder).is_empty() {
            return Err(ConfigError::Message(format!(
                "backup_folder must name a folder, got '{}'",
                config.backup_folder
            )));
        }
        tracing::debug!(
            backup_folder = %config.backup_folder,
            model = %config.gemini_model,
            batch_size = config.batch_size,
            dry_run = config.dry_run,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn organize_options(&self, resume: bool) -> OrganizeOptions {
        OrganizeOptions {
            backup_path: self.backup_folder.clone(),
            resume,
            dry_run: self.dry_run,
            batch_size: self.batch_size.max(1),
        }
    }

    /// Gemini settings using `api_key`, which may come from outside the config
    pub fn gemini_config(&self, api_key: String) -> GeminiConfig {
        GeminiConfig {
            api_key,
            model: self.gemini_model.clone(),
            language: self.language.clone(),
            requests_per_second: self.rate_limit,
            max_cost: self.max_cost,
            ..GeminiConfig::default()
        }
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let file = yaml("{}\n");
        let config = AppConfig::load_with_env(Some(file.path()), &Overrides::default(), env(&[])).unwrap();

        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.backup_folder, "backup");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.max_cost, 5.0);
        assert_eq!(config.log_level, "info");
        assert!(!config.dry_run);
        assert!(config.gemini_api_key.is_empty());
        assert!(config.token_path.ends_with("driver-organizer/token.json"));
    }

    #[test]
    fn test_layers_file_then_env_then_flags() {
        let file = yaml("backup_folder: Arquivo/2024\nbatch_size: 5\ngemini_model: gemini-1.5-pro\nmax_cost: 1.5\n");
        let overrides = Overrides {
            gemini_model: Some("gemini-2.5-flash".to_string()),
            dry_run: true,
            ..Overrides::default()
        };

        let config = AppConfig::load_with_env(
            Some(file.path()),
            &overrides,
            env(&[("DORGANIZER_BATCH_SIZE", "8"), ("DORGANIZER_GEMINI_MODEL", "from-env")]),
        )
        .unwrap();

        assert_eq!(config.backup_folder, "Arquivo/2024");
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.max_cost, 1.5);
        assert!(config.dry_run);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(AppConfig::load_with_env(Some(&missing), &Overrides::default(), env(&[])).is_err());
    }

    #[test]
    fn test_blank_backup_folder_is_rejected() {
        for value in ["''", "'   '", "' / '"] {
            let file = yaml(&format!("backup_folder: {}\n", value));
            let err = AppConfig::load_with_env(Some(file.path()), &Overrides::default(), env(&[])).unwrap_err();
            assert!(err.to_string().contains("backup_folder"), "{}", err);
        }

        let overrides = Overrides {
            backup_folder: Some(" ".to_string()),
            ..Overrides::default()
        };
        let file = yaml("{}\n");
        assert!(AppConfig::load_with_env(Some(file.path()), &overrides, env(&[])).is_err());
    }

    #[test]
    fn test_organize_options_and_gemini_config() {
        let file = yaml("backup_folder: old\nbatch_size: 0\nlanguage: English\n");
        let config = AppConfig::load_with_env(Some(file.path()), &Overrides::default(), env(&[])).unwrap();

        let options = config.organize_options(true);
        assert_eq!(options.backup_path, "old");
        assert!(options.resume);
        assert_eq!(options.batch_size, 1);

        let gemini = config.gemini_config("key".to_string());
        assert_eq!(gemini.api_key, "key");
        assert_eq!(gemini.language, "English");
        assert_eq!(gemini.requests_per_second, 10);
    }
}
