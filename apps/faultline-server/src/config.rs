//! Server configuration from `FAULTLINE_*` environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub data_dir: PathBuf,
    /// Public base URL used to render DSNs.
    pub public_base_url: String,
    /// Open shard handles kept in the pool before eviction.
    pub shard_pool_size: u64,
    /// Ingest bodies over this size are rejected with 413.
    pub max_body_bytes: usize,
    /// `token:user_id` pairs standing in for the external identity service.
    pub api_tokens: HashMap<String, String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let listen_addr =
            get("FAULTLINE_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8030".to_string());
        let data_dir = get("FAULTLINE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let public_base_url = get("FAULTLINE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{listen_addr}"));

        let shard_pool_size = get("FAULTLINE_SHARD_POOL_SIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(64);
        let max_body_bytes = get("FAULTLINE_MAX_EVENT_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(4 * 1024 * 1024);

        let api_tokens = get("FAULTLINE_API_TOKENS")
            .map(|raw| parse_api_tokens(&raw))
            .unwrap_or_default();

        Self {
            listen_addr,
            data_dir,
            public_base_url,
            shard_pool_size,
            max_body_bytes,
            api_tokens,
        }
    }
}

/// `token:user,token2:user2` → token → user map.
fn parse_api_tokens(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, user) = pair.trim().split_once(':')?;
            if token.is_empty() || user.is_empty() {
                return None;
            }
            Some((token.to_string(), user.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.listen_addr, "0.0.0.0:8030");
        assert_eq!(config.shard_pool_size, 64);
        assert_eq!(config.max_body_bytes, 4 * 1024 * 1024);
        assert!(config.api_tokens.is_empty());
    }

    #[test]
    fn api_tokens_parse_pairs_and_skip_garbage() {
        let tokens = parse_api_tokens("abc:alice, def:bob,broken,:x,y:");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["abc"], "alice");
        assert_eq!(tokens["def"], "bob");
    }

    #[test]
    fn public_url_falls_back_to_listen_addr() {
        let config = ServerConfig::from_lookup(|key| {
            (key == "FAULTLINE_LISTEN_ADDR").then(|| "127.0.0.1:9000".to_string())
        });
        assert_eq!(config.public_base_url, "http://127.0.0.1:9000");
    }
}
