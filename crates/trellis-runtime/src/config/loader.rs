//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`trellis.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`trellis.yaml`, `trellis.yml`, etc.)
//!
//! Both features can be enabled simultaneously; if so, both file formats are searched and loaded.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`trellis.{profile}.toml` / `trellis.{profile}.yaml`)
//! 3. Main config file (`trellis.toml` / `trellis.yaml`)
//! 4. Environment variables (`TRELLIS_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `TRELLIS_` prefix with `__` as separator:
//!
//! - `TRELLIS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `TRELLIS_DEFINITIONS__ERROR_HANDLER=report` → `definitions.error_handler = "report"`
//! - `TRELLIS_DEFINITIONS__MIDDLEWARES=[auth,audit]` → `definitions.middlewares = ["auth", "audit"]`
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TrellisConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "TRELLIS_";
const PROFILE_VAR: &str = "TRELLIS_PROFILE";
const FILE_STEMS: &[&str] = &["trellis", "config"];

// =============================================================================
// Profile
// =============================================================================

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Any other profile name, lowercased.
    Custom(String),
}

impl Profile {
    /// Returns the profile name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` / `prod` abbreviations.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" | "" => Self::Development,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Reads `TRELLIS_PROFILE`, defaulting to [`Profile::Development`].
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// FileFormat
// =============================================================================

/// A configuration file format compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    /// Enabled formats, in search order.
    const ENABLED: &'static [Self] = &[
        #[cfg(feature = "toml-config")]
        Self::Toml,
        #[cfg(feature = "yaml-config")]
        Self::Yaml,
    ];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Layered configuration loader.
///
/// Sources, later ones winning: built-in defaults, the discovered (or
/// explicit) configuration files, `TRELLIS_*` environment variables, and
/// values passed to [`ConfigLoader::merge`].
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    read_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader using the profile named by `TRELLIS_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            explicit_file: None,
            read_env: true,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Searches the current directory.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Searches `<user config dir>/trellis`.
    pub fn with_user_config_dir(self) -> Self {
        match user_config_dir() {
            Some(dir) => self.search_path(dir),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Reads `TRELLIS_*` environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.read_env = true;
        self
    }

    /// Ignores the environment.
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Merges `config` above every other source.
    pub fn merge(mut self, config: TrellisConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration. Validation is left to the caller.
    pub fn load(self) -> ConfigResult<TrellisConfig> {
        let profile = self.profile.clone();
        let config: TrellisConfig = self
            .into_figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            middlewares = config.definitions.middlewares.len(),
            error_handler = config.definitions.error_handler.as_deref(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TrellisConfig::default()));

        for (format, path) in self.config_files()? {
            info!(path = %path.display(), "Loading configuration file");
            figment = format.merge(figment, &path);
        }

        if self.read_env {
            trace!(prefix = ENV_PREFIX, "Reading environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    /// Files to merge, lowest priority first.
    fn config_files(&self) -> ConfigResult<Vec<(FileFormat, PathBuf)>> {
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            let format = FileFormat::from_path(path)
                .ok_or_else(|| ConfigError::UnsupportedFormat(path.clone()))?;
            return Ok(vec![(format, path.clone())]);
        }

        let dirs = self.effective_search_paths();
        let files: Vec<_> = FileFormat::ENABLED
            .iter()
            .flat_map(|&format| {
                self.discover(format, &dirs)
                    .into_iter()
                    .map(move |path| (format, path))
            })
            .collect();

        if files.is_empty() {
            warn!("No configuration file found, using defaults");
        }
        Ok(files)
    }

    /// Finds the first `{stem}.{ext}` of `format` across `dirs`, preceded by
    /// its `{stem}.{profile}.{ext}` sibling when that exists.
    fn discover(&self, format: FileFormat, dirs: &[PathBuf]) -> Vec<PathBuf> {
        for dir in dirs {
            for stem in FILE_STEMS {
                for ext in format.extensions() {
                    let base = dir.join(format!("{stem}.{ext}"));
                    if !base.exists() {
                        continue;
                    }
                    let profiled = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if profiled.exists() {
                        debug!(path = %profiled.display(), "Found profile configuration");
                        return vec![profiled, base];
                    }
                    return vec![base];
                }
            }
        }
        Vec::new()
    }

    fn effective_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(user_config_dir())
            .collect()
    }
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trellis"))
}

/// Loads configuration from the default locations and validates it.
pub fn load_config() -> ConfigResult<TrellisConfig> {
    let config = ConfigLoader::new().load()?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads configuration from `path` (plus environment overrides) and validates it.
pub fn load_config_from_file(path: impl Into<PathBuf>) -> ConfigResult<TrellisConfig> {
    let config = ConfigLoader::new().file(path).load()?;
    validate_config(&config)?;
    Ok(config)
}

// =============================================================================
// Tests
// =============================================================================
