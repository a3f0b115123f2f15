//! Configuration layering, fallback logic, and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use depclose_core::error::DepcloseError;
use depclose_core::UnsatisfiedPolicy;

use crate::toml::{load_layer, validate_config, DepcloseConfig};
use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE: &str = "depclose.toml";

/// Prefix of environment variables read as overrides
pub const ENV_PREFIX: &str = "DEPCLOSE_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Global config file, `~/.depclose/config.toml` unless overridden
    global_path: Option<Utf8PathBuf>,
}

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Built-in defaults
    Defaults,
    /// Global config file
    Global(Utf8PathBuf),
    /// Project depclose.toml file
    Project(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Defaults => f.write_str("built-in defaults"),
            ConfigSource::Global(path) => write!(f, "global config {}", path),
            ConfigSource::Project(path) => write!(f, "project config {}", path),
            ConfigSource::Environment(var) => write!(f, "environment variable {}", var),
            ConfigSource::CommandLine => f.write_str("command line"),
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self {
            cwd,
            global_path: Self::default_global_path(),
        }
    }

    /// `~/.depclose/config.toml`, when the home directory is known
    pub fn default_global_path() -> Option<Utf8PathBuf> {
        let home = dirs::home_dir()?;
        let home = Utf8PathBuf::try_from(home).ok()?;
        Some(home.join(".depclose").join("config.toml"))
    }

    /// Use a different global config file, or none at all
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Find a file in the working directory or its ancestors
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }

    /// Load every layer below the command line
    ///
    /// An explicit path must exist; otherwise the project file is looked up
    /// from the working directory and may be absent.
    pub async fn load(
        &self,
        explicit: Option<&Utf8Path>,
        env_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(DepcloseConfig, Vec<ConfigSource>)> {
        let mut sources = vec![ConfigSource::Defaults];

        let global = match &self.global_path {
            Some(path) if path.is_file() => {
                debug!("Loading global config from {}", path);
                sources.push(ConfigSource::Global(path.clone()));
                Some(load_layer(path).await?)
            }
            _ => None,
        };

        let project_path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(DepcloseError::config(
                        "config",
                        format!("configuration file {} does not exist", path),
                    ));
                }
                Some(path.to_path_buf())
            }
            None => self.resolve_config_path(CONFIG_FILE),
        };
        let project = match project_path {
            Some(path) => {
                debug!("Loading project config from {}", path);
                let layer = load_layer(&path).await?;
                sources.push(ConfigSource::Project(path));
                Some(layer)
            }
            None => None,
        };

        let mut env_keys: Vec<_> = env_overrides
            .keys()
            .filter(|key| ConfigLayering::is_known_env(key))
            .cloned()
            .collect();
        env_keys.sort();
        sources.extend(env_keys.into_iter().map(ConfigSource::Environment));

        let config = ConfigLayering::merge_configs(global, project, env_overrides, &HashMap::new())?;
        Ok((config, sources))
    }
}

/// Configuration layering and merging
pub struct ConfigLayering;

impl ConfigLayering {
    /// Merge the configuration layers, later layers winning
    ///
    /// File layers are merged key by key before deserializing, so a project
    /// file setting one key keeps the rest of the global file.
    pub fn merge_configs(
        global: Option<toml::Table>,
        project: Option<toml::Table>,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<DepcloseConfig> {
        let mut merged = toml::Table::new();
        for layer in [global, project].into_iter().flatten() {
            Self::merge_tables(&mut merged, layer);
        }

        let mut config: DepcloseConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| DepcloseError::config("config", e.message()))?;

        Self::apply_env_overrides(&mut config, env_overrides)?;
        Self::apply_cli_overrides(&mut config, cli_overrides)?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Recursively merge `overlay` into `base`
    pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
        for (key, value) in overlay {
            if let toml::Value::Table(incoming) = value {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    Self::merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            } else {
                base.insert(key, value);
            }
        }
    }

    fn is_known_env(key: &str) -> bool {
        matches!(
            key,
            "DEPCLOSE_RELEASE"
                | "DEPCLOSE_PRIMARY_URL"
                | "DEPCLOSE_SEEDS"
                | "DEPCLOSE_RUNTIME"
                | "DEPCLOSE_BUILDREQ"
                | "DEPCLOSE_PARALLEL"
                | "DEPCLOSE_UNSATISFIED"
                | "DEPCLOSE_TOKEN"
                | "DEPCLOSE_USERNAME"
                | "DEPCLOSE_PASSWORD"
        )
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(
        config: &mut DepcloseConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "DEPCLOSE_RELEASE" => config.release = value.clone(),
                "DEPCLOSE_PRIMARY_URL" => config.repositories.primary = value.clone(),
                "DEPCLOSE_SEEDS" => {
                    config.seeds.packages = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                "DEPCLOSE_RUNTIME" => config.resolution.runtime = parse_flag(key, value)?,
                "DEPCLOSE_BUILDREQ" => config.resolution.buildreq = parse_flag(key, value)?,
                "DEPCLOSE_PARALLEL" => config.resolution.parallel = parse_flag(key, value)?,
                "DEPCLOSE_UNSATISFIED" => {
                    config.resolution.unsatisfied = parse_policy(key, value)?;
                }
                "DEPCLOSE_TOKEN" => config.repositories.token = Some(value.clone()),
                "DEPCLOSE_USERNAME" => config.repositories.username = Some(value.clone()),
                "DEPCLOSE_PASSWORD" => config.repositories.password = Some(value.clone()),
                _ => {
                    // Unknown environment variable, ignore
                }
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    pub fn apply_cli_overrides(
        config: &mut DepcloseConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "release" => config.release = value.clone(),
                "runtime" => config.resolution.runtime = parse_flag(key, value)?,
                "buildreq" => config.resolution.buildreq = parse_flag(key, value)?,
                "parallel" => config.resolution.parallel = parse_flag(key, value)?,
                "unsatisfied" => config.resolution.unsatisfied = parse_policy(key, value)?,
                _ => {
                    // Unknown CLI override, ignore
                }
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

fn parse_flag(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DepcloseError::config(
            field,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

fn parse_policy(field: &str, value: &str) -> ConfigResult<UnsatisfiedPolicy> {
    value
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|reason: String| DepcloseError::config(field, reason))
}
