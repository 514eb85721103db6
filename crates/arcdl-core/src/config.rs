use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_METADATA_BASE_URL: &str = "https://archive.org/metadata/";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://archive.org/download/";
pub const DEFAULT_REFERER: &str = "https://archive.org/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Transport tuning (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    pub max_redirects: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_redirects: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/arcdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcdlConfig {
    /// Base URL of the metadata API; the item identifier is appended.
    pub metadata_base_url: String,
    /// Base URL files are downloaded from (`<base>/<item>/<escaped name>`).
    pub download_base_url: String,
    /// Referer sent with every request; the service rejects requests without one.
    pub referer: String,
    /// Browser-like User-Agent sent with every request.
    pub user_agent: String,
    /// Destination directory when none is given on the command line.
    pub default_destination: PathBuf,
    /// Verify digests of existing and freshly downloaded files.
    pub verify_checksums: bool,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for ArcdlConfig {
    fn default() -> Self {
        Self {
            metadata_base_url: DEFAULT_METADATA_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_destination: PathBuf::from("downloads"),
            verify_checksums: true,
            http: None,
        }
    }
}

impl ArcdlConfig {
    /// Endpoint and header set used by the metadata client and the file source.
    pub fn endpoints(&self) -> ArchiveEndpoints {
        let http = self.http.clone().unwrap_or_default();
        ArchiveEndpoints {
            metadata_base_url: self.metadata_base_url.clone(),
            download_base_url: self.download_base_url.clone(),
            referer: self.referer.clone(),
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(http.connect_timeout_secs),
            low_speed_limit: http.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(http.low_speed_time_secs),
            max_redirects: http.max_redirects,
        }
    }
}

/// Resolved request settings for talking to the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEndpoints {
    pub metadata_base_url: String,
    pub download_base_url: String,
    pub referer: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirects: u32,
}

impl Default for ArchiveEndpoints {
    fn default() -> Self {
        ArcdlConfig::default().endpoints()
    }
}

impl ArchiveEndpoints {
    /// Endpoints rooted at `base` (e.g. a local test server): `<base>metadata/`
    /// and `<base>download/`, everything else default.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            metadata_base_url: format!("{}/metadata/", base),
            download_base_url: format!("{}/download/", base),
            referer: format!("{}/", base),
            ..Self::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("arcdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ArcdlConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<ArcdlConfig> {
    if !path.exists() {
        let default_cfg = ArcdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: ArcdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
