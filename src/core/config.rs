// Connection configuration: coordinator endpoints, client port, timeouts.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::{ApiResult, Error, ErrorKind};

pub const DEFAULT_CLIENT_PORT: u16 = 2181;
pub const DEFAULT_SCANNER_BATCH: usize = 100;

pub const ENV_QUORUM: &str = "WIDECOLUMN_QUORUM";
pub const ENV_CLIENT_PORT: &str = "WIDECOLUMN_CLIENT_PORT";
pub const ENV_TIMEOUT_MS: &str = "WIDECOLUMN_TIMEOUT_MS";

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct StoreConfig {
    /// Accepts `["h1", "h2"]` or `"h1,h2"` when deserialized.
    #[serde(deserialize_with = "deserialize_quorum")]
    pub quorum: Vec<String>,
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_scanner_batch")]
    pub scanner_batch: usize,
}

fn default_client_port() -> u16 {
    DEFAULT_CLIENT_PORT
}

fn default_scanner_batch() -> usize {
    DEFAULT_SCANNER_BATCH
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuorumRepr {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_quorum<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match QuorumRepr::deserialize(deserializer)? {
        QuorumRepr::List(hosts) => hosts
            .iter()
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty())
            .collect(),
        QuorumRepr::Joined(joined) => split_quorum(&joined),
    })
}

pub fn split_quorum(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

impl StoreConfig {
    pub fn new<I, S>(quorum: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            quorum: quorum.into_iter().map(Into::into).collect(),
            client_port: DEFAULT_CLIENT_PORT,
            timeout_ms: None,
            scanner_batch: DEFAULT_SCANNER_BATCH,
        }
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_scanner_batch(mut self, batch: usize) -> Self {
        self.scanner_batch = batch;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.quorum.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("quorum must name at least one host"));
        }
        if self.quorum.iter().any(|host| host.trim().is_empty()) {
            return Err(Error::new(ErrorKind::Usage).with_message("quorum hosts must not be blank"));
        }
        if self.client_port == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("client_port must be non-zero"));
        }
        if self.scanner_batch == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("scanner_batch must be non-zero"));
        }
        Ok(())
    }

    pub fn from_json_str(text: &str) -> ApiResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid store config json")
                .with_source(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("failed to read store config {}", path.display()))
                .with_source(err)
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same rules as `from_env`, reading variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let quorum = lookup(ENV_QUORUM).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("{ENV_QUORUM} is not set"))
        })?;
        let mut config = Self::new(split_quorum(&quorum));
        if let Some(port) = lookup(ENV_CLIENT_PORT) {
            config.client_port = port.trim().parse().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("{ENV_CLIENT_PORT} must be a port number"))
                    .with_source(err)
            })?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = timeout.trim().parse().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("{ENV_TIMEOUT_MS} must be milliseconds"))
                    .with_source(err)
            })?;
            config.timeout_ms = Some(millis);
        }
        config.validate()?;
        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(["localhost"])
    }
}
