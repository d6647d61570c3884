use figment::{Figment, providers::{Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub access_log: AccessLogConfig,
}

/// Listener settings for the HTTP host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Number of worker threads. 0 = number of CPU cores.
    #[serde(default)]
    pub workers: usize,
}

/// Access recorder settings.
///
/// `format` is the only knob: a template over `RemoteAddr`, `HTTPMethod`,
/// `URLPath`, `TimeSpend`, `WriteSize` and `Status`. `None` selects the
/// built-in space-separated format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessLogConfig {
    #[serde(default)]
    pub format: Option<String>,
}

fn default_http_addr() -> String { "0.0.0.0:9080".into() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            workers: 0,
        }
    }
}

impl TallyConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: TallyConfig = Figment::new().merge(Yaml::file(path)).extract()?;
        Ok(config)
    }

    /// Effective worker count (0 → available CPUs).
    pub fn effective_workers(&self) -> usize {
        if self.server.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.server.workers
        }
    }
}
