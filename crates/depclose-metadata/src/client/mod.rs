//! Package index loading with connection pooling and retry logic

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use depclose_core::error::DepcloseError;
use depclose_core::PackageRecord;

use crate::api::{PackageIndex, INDEX_FILE};
use crate::pool::RepositoryPools;
use crate::MetadataResult;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Authentication configuration for repository access
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for authentication
    pub token: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
}

/// Repository locations backing each logical pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryLayout {
    /// Repository whose packages seed the closure
    pub primary: String,
    /// Runtime and build dependency repositories
    pub dependency_binaries: Vec<String>,
    /// SRPM repositories matching `dependency_binaries`
    pub dependency_sources: Vec<String>,
}

/// Where a repository location points to
#[derive(Debug, Clone, PartialEq, Eq)]
enum IndexLocation {
    Remote(Url),
    Local(PathBuf),
}

/// Client loading package indexes from repository locations
#[derive(Debug, Clone)]
pub struct MetadataClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Retry configuration
    retry_config: RetryConfig,
}

impl MetadataClient {
    /// Create new metadata client with connection pooling
    pub fn new() -> MetadataResult<Self> {
        Self::with_config(None, RetryConfig::default())
    }

    /// Create metadata client with authentication
    pub fn with_auth(auth: AuthConfig) -> MetadataResult<Self> {
        Self::with_config(Some(auth), RetryConfig::default())
    }

    /// Create metadata client with custom configuration
    pub fn with_config(auth: Option<AuthConfig>, retry_config: RetryConfig) -> MetadataResult<Self> {
        let mut builder = ClientBuilder::new()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            // Package indexes of large repositories take a while
            .timeout(Duration::from_secs(120))
            .gzip(true)
            .user_agent(concat!("depclose/", env!("CARGO_PKG_VERSION")));

        if let Some(auth_config) = auth {
            let header_value = if let Some(token) = auth_config.token {
                Some(format!("Bearer {}", token))
            } else if let (Some(username), Some(password)) =
                (auth_config.username, auth_config.password)
            {
                use base64::{engine::general_purpose, Engine as _};
                Some(format!(
                    "Basic {}",
                    general_purpose::STANDARD.encode(format!("{}:{}", username, password))
                ))
            } else {
                None
            };

            if let Some(value) = header_value {
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    value.parse().map_err(|e| {
                        DepcloseError::network("Invalid authorization header".to_string(), e)
                    })?,
                );
                builder = builder.default_headers(headers);
            }
        }

        let client = builder.build().map_err(|e| {
            DepcloseError::network(format!("Failed to create HTTP client: {}", e), e)
        })?;

        Ok(Self {
            client,
            retry_config,
        })
    }

    /// Execute an operation with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MetadataResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MetadataResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut last_error = None;

        for attempt in 0..=self.retry_config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let retryable = error.is_recoverable();
                    last_error = Some(error);

                    if !retryable || attempt == self.retry_config.max_retries {
                        break;
                    }

                    warn!("Metadata request failed (attempt {}), retrying in {:?}", attempt + 1, delay);
                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DepcloseError::Network {
            message: "Retry operation failed without error".to_string(),
            source: None,
        }))
    }

    /// Fetch the package index of one repository location
    pub async fn fetch_index(&self, location: &str) -> MetadataResult<PackageIndex> {
        match Self::index_location(location)? {
            IndexLocation::Remote(url) => self.fetch_remote(location, url).await,
            IndexLocation::Local(path) => Self::read_local(location, path).await,
        }
    }

    async fn fetch_remote(&self, location: &str, url: Url) -> MetadataResult<PackageIndex> {
        debug!("Fetching package index {}", url);

        self.with_retry(|| async {
            let response = self
                .client
                .get(url.clone())
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| DepcloseError::network(format!("Failed to fetch {}: {}", url, e), e))?;

            match response.status() {
                reqwest::StatusCode::OK => {
                    let body = response.bytes().await.map_err(|e| {
                        DepcloseError::network(format!("Failed to read {}: {}", url, e), e)
                    })?;
                    Self::decode_index(location, &body)
                }
                reqwest::StatusCode::NOT_FOUND => Err(DepcloseError::RepositoryNotFound {
                    location: location.to_string(),
                }),
                status if status.is_server_error() => Err(DepcloseError::Network {
                    message: format!("Repository returned status {}: {}", status, url),
                    source: None,
                }),
                status => Err(DepcloseError::MalformedMetadata {
                    location: location.to_string(),
                    message: format!("unexpected status {}", status),
                }),
            }
        })
        .await
    }

    async fn read_local(location: &str, path: PathBuf) -> MetadataResult<PackageIndex> {
        let path = if tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            path.join(INDEX_FILE)
        } else {
            path
        };

        debug!("Reading package index {}", path.display());
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DepcloseError::RepositoryNotFound {
                    location: location.to_string(),
                })
            }
            Err(e) => {
                return Err(DepcloseError::io(
                    format!("Failed to read {}", path.display()),
                    e,
                ))
            }
        };

        Self::decode_index(location, &body)
    }

    fn decode_index(location: &str, body: &[u8]) -> MetadataResult<PackageIndex> {
        serde_json::from_slice(body).map_err(|e| DepcloseError::MalformedMetadata {
            location: location.to_string(),
            message: e.to_string(),
        })
    }

    /// Map a repository location to the index it publishes
    fn index_location(location: &str) -> MetadataResult<IndexLocation> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if url.path().ends_with(".json") {
                    return Ok(IndexLocation::Remote(url));
                }
                let base = format!("{}/", location.trim_end_matches('/'));
                let index = Url::parse(&base)
                    .and_then(|base| base.join(INDEX_FILE))
                    .map_err(|e| DepcloseError::config("repository", format!("'{}': {}", location, e)))?;
                Ok(IndexLocation::Remote(index))
            }
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(IndexLocation::Local)
                .map_err(|_| DepcloseError::config("repository", format!("'{}' is not a valid file URL", location))),
            Ok(url) => Err(DepcloseError::config(
                "repository",
                format!("unsupported scheme '{}' in '{}'", url.scheme(), location),
            )),
            // Anything that does not parse as a URL is a filesystem path
            Err(_) => Ok(IndexLocation::Local(PathBuf::from(location))),
        }
    }

    /// Load and concatenate the indexes of several locations, in order
    pub async fn load_records(&self, locations: &[String]) -> MetadataResult<Vec<PackageRecord>> {
        let mut tasks = JoinSet::new();
        for (idx, location) in locations.iter().enumerate() {
            let client = self.clone();
            let location = location.clone();
            tasks.spawn(async move { (idx, client.fetch_index(&location).await) });
        }

        let mut indexes: Vec<Option<PackageIndex>> = vec![None; locations.len()];
        while let Some(joined) = tasks.join_next().await {
            let (idx, index) = joined.map_err(|e| DepcloseError::Network {
                message: format!("Metadata task failed: {}", e),
                source: Some(Box::new(e)),
            })?;
            indexes[idx] = Some(index?);
        }

        Ok(indexes
            .into_iter()
            .flatten()
            .flat_map(|index| index.packages)
            .collect())
    }

    /// Load all pools of a repository layout
    pub async fn load_pools(&self, layout: &RepositoryLayout) -> MetadataResult<RepositoryPools> {
        let primary = std::slice::from_ref(&layout.primary);
        let (primary, binaries, sources) = tokio::try_join!(
            self.load_records(primary),
            self.load_records(&layout.dependency_binaries),
            self.load_records(&layout.dependency_sources),
        )?;

        let pools = RepositoryPools::new(primary, binaries, sources);
        info!(
            "Loaded metadata: {} primary, {} dependency, {} dependency source packages",
            pools.primary.len(),
            pools.binaries.len(),
            pools.sources.len()
        );
        Ok(pools)
    }
}
