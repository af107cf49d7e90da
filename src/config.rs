//! Configuration management for the CAR upload server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default upload bound: 4 GiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ipfs: IpfsConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Storage node endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct IpfsConfig {
    /// Base URL of the Kubo HTTP RPC API (without `/api/v0`)
    pub api_url: String,
    /// Base URL prepended to content hashes to build gateway links
    pub gateway_url: String,
    /// Request timeout in seconds; 0 disables it
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory holding per-request scratch files
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            ipfs: IpfsConfig::default(),
            upload: UploadConfig {
                scratch_dir: env::temp_dir(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
        }
    }
}

impl Default for IpfsConfig {
    fn default() -> Self {
        IpfsConfig {
            api_url: "http://127.0.0.1:5001".to_string(),
            gateway_url: "http://127.0.0.1:8080/ipfs".to_string(),
            timeout_secs: 0,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
            },
            ipfs: IpfsConfig {
                api_url: env::var("IPFS_API_URL")
                    .map(|url| trim_url(&url))
                    .unwrap_or(defaults.ipfs.api_url),
                gateway_url: env::var("IPFS_GATEWAY_URL")
                    .map(|url| trim_url(&url))
                    .unwrap_or(defaults.ipfs.gateway_url),
                timeout_secs: parse_var("IPFS_TIMEOUT_SECS", defaults.ipfs.timeout_secs),
            },
            upload: UploadConfig {
                scratch_dir: env::var("UPLOAD_SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.upload.scratch_dir),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.upload.max_upload_bytes),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
            default
        }),
        Err(_) => default,
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_local_kubo() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ipfs.api_url, "http://127.0.0.1:5001");
        assert_eq!(config.ipfs.gateway_url, "http://127.0.0.1:8080/ipfs");
        assert_eq!(config.ipfs.timeout_secs, 0);
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url(" http://node:5001/ "), "http://node:5001");
        assert_eq!(trim_url("http://gw/ipfs//"), "http://gw/ipfs");
    }
}
