//! depclose.toml configuration parsing and serialization

use std::collections::HashSet;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use depclose_core::error::DepcloseError;
use depclose_core::UnsatisfiedPolicy;
use depclose_metadata::{AuthConfig, RepositoryLayout};

use crate::ConfigResult;

/// Placeholder expanded to the configured release in repository locations
pub const RELEASE_PLACEHOLDER: &str = "{release}";

/// Infrastructure packages always pulled in, whatever the primary repository builds
pub const DEFAULT_SEEDS: &[&str] = &[
    "memcached",
    "corosync",
    "pcs",
    "resource-agents",
    "pacemaker",
    "mariadb",
    "galera",
    "redis",
    "rabbitmq-server",
    "puppet",
    "crudini",
    "openvswitch",
    "openvswitch-ovn-central",
    "openvswitch-ovn-common",
    "openvswitch-ovn-host",
    "openvswitch-ovn-vtep",
    "openstack-utils",
];

const TRUNK: &str = "https://trunk.rdoproject.org/centos7-{release}";

/// Complete depclose.toml configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepcloseConfig {
    /// Release substituted into repository locations
    #[serde(default = "default_release")]
    pub release: String,

    /// Repository locations
    #[serde(default)]
    pub repositories: RepositoriesSection,

    /// Capabilities always included in the closure
    #[serde(default)]
    pub seeds: SeedsSection,

    /// Mode selection and resolver tuning
    #[serde(default)]
    pub resolution: ResolutionSection,
}

/// Repository locations, each may contain `{release}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesSection {
    /// Repository whose packages seed the closure
    pub primary: String,
    /// Runtime dependency repositories
    pub deps: Vec<String>,
    /// Build dependency repositories
    pub build_deps: Vec<String>,
    /// Source repositories of `deps`
    pub deps_srpm: Vec<String>,
    /// Source repositories of `build_deps`
    pub build_deps_srpm: Vec<String>,
    /// Bearer token sent to HTTP repositories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Basic auth user, used when no token is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedsSection {
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSection {
    /// Compute the runtime closure
    pub runtime: bool,
    /// Compute the build-requirement closure
    pub buildreq: bool,
    /// Resolve the providers of a pass on the thread pool
    pub parallel: bool,
    pub unsatisfied: UnsatisfiedPolicy,
    /// Abort when the closure has not converged after this many passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,
}

fn default_release() -> String {
    "master".to_string()
}

impl Default for DepcloseConfig {
    fn default() -> Self {
        Self {
            release: default_release(),
            repositories: RepositoriesSection::default(),
            seeds: SeedsSection::default(),
            resolution: ResolutionSection::default(),
        }
    }
}

impl Default for RepositoriesSection {
    fn default() -> Self {
        Self {
            primary: format!("{}/current", TRUNK),
            deps: vec![format!("{}/deps/latest", TRUNK)],
            build_deps: vec![format!("{}/build-deps/latest", TRUNK)],
            deps_srpm: vec![format!("{}/deps/latest/SRPMS", TRUNK)],
            build_deps_srpm: vec![format!("{}/build-deps/latest/SRPMS", TRUNK)],
            token: None,
            username: None,
            password: None,
        }
    }
}

impl Default for SeedsSection {
    fn default() -> Self {
        Self {
            packages: DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ResolutionSection {
    fn default() -> Self {
        Self {
            runtime: true,
            buildreq: true,
            parallel: true,
            unsatisfied: UnsatisfiedPolicy::default(),
            max_passes: None,
        }
    }
}

impl DepcloseConfig {
    /// Repository locations with the release expanded
    pub fn layout(&self) -> RepositoryLayout {
        let expand = |location: &String| location.replace(RELEASE_PLACEHOLDER, &self.release);
        let repos = &self.repositories;

        RepositoryLayout {
            primary: expand(&repos.primary),
            dependency_binaries: repos.deps.iter().chain(&repos.build_deps).map(expand).collect(),
            dependency_sources: repos
                .deps_srpm
                .iter()
                .chain(&repos.build_deps_srpm)
                .map(expand)
                .collect(),
        }
    }

    /// Repository credentials, if any are configured
    pub fn auth(&self) -> Option<AuthConfig> {
        let repos = &self.repositories;
        if repos.token.is_none() && repos.username.is_none() {
            return None;
        }
        Some(AuthConfig {
            token: repos.token.clone(),
            username: repos.username.clone(),
            password: repos.password.clone(),
        })
    }
}

/// Parse TOML string to a validated configuration
pub fn parse_config(content: &str) -> ConfigResult<DepcloseConfig> {
    let config: DepcloseConfig = toml::from_str(content).map_err(|e| toml_error(content, &e))?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse one configuration layer, keeping only the keys it sets
///
/// The layer is type-checked against the full schema so mistakes are
/// reported with their location in the file that made them.
pub fn parse_layer(content: &str) -> ConfigResult<toml::Table> {
    toml::from_str::<DepcloseConfig>(content).map_err(|e| toml_error(content, &e))?;
    toml::from_str(content).map_err(|e| toml_error(content, &e))
}

/// Serialize configuration to a TOML string
pub fn serialize_config(config: &DepcloseConfig) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| DepcloseError::Serialization {
        what: "configuration".to_string(),
        message: e.to_string(),
    })
}

/// Validate configuration completeness
pub fn validate_config(config: &DepcloseConfig) -> ConfigResult<()> {
    if config.release.trim().is_empty() {
        return Err(DepcloseError::config("release", "must not be empty"));
    }

    let repos = &config.repositories;
    if repos.primary.trim().is_empty() {
        return Err(DepcloseError::config(
            "repositories.primary",
            "a primary repository location is required",
        ));
    }
    if repos.deps.is_empty() && repos.build_deps.is_empty() {
        return Err(DepcloseError::config(
            "repositories.deps",
            "at least one dependency repository is required",
        ));
    }
    for (field, locations) in [
        ("repositories.deps", &repos.deps),
        ("repositories.build_deps", &repos.build_deps),
        ("repositories.deps_srpm", &repos.deps_srpm),
        ("repositories.build_deps_srpm", &repos.build_deps_srpm),
    ] {
        if locations.iter().any(|l| l.trim().is_empty()) {
            return Err(DepcloseError::config(field, "locations must not be empty"));
        }
    }

    if repos.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(DepcloseError::config("repositories.token", "must not be empty"));
    }
    match (&repos.username, &repos.password) {
        (Some(_), None) => {
            return Err(DepcloseError::config(
                "repositories.password",
                "required when a username is set",
            ))
        }
        (None, Some(_)) => {
            return Err(DepcloseError::config(
                "repositories.username",
                "required when a password is set",
            ))
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for seed in &config.seeds.packages {
        if seed.trim().is_empty() {
            return Err(DepcloseError::config("seeds.packages", "seed names must not be empty"));
        }
        if !seen.insert(seed.as_str()) {
            return Err(DepcloseError::config(
                "seeds.packages",
                format!("'{}' is listed more than once", seed),
            ));
        }
    }

    if config.resolution.max_passes == Some(0) {
        return Err(DepcloseError::config(
            "resolution.max_passes",
            "must be greater than zero",
        ));
    }

    Ok(())
}

/// Load one layer from file path
pub async fn load_layer(path: &Utf8Path) -> ConfigResult<toml::Table> {
    let content = read_file(path).await?;
    parse_layer(&content).map_err(|e| in_file(path, e))
}

async fn read_file(path: &Utf8Path) -> ConfigResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DepcloseError::io(format!("Failed to read {}", path), e))
}

fn in_file(path: &Utf8Path, err: DepcloseError) -> DepcloseError {
    match err {
        DepcloseError::TomlParse {
            message,
            line,
            column,
        } => DepcloseError::TomlParse {
            message: format!("{} (in {})", message, path),
            line,
            column,
        },
        other => other,
    }
}

fn toml_error(content: &str, err: &toml::de::Error) -> DepcloseError {
    let (line, column) = err
        .span()
        .map(|span| line_column(content, span.start))
        .unwrap_or((0, 0));
    DepcloseError::TomlParse {
        message: err.message().to_string(),
        line,
        column,
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
