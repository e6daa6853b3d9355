/// Configuration management
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://n8n.srv974225.hstgr.cloud";
const DEFAULT_ROUTE_ID: &str = "98b211e8-1325-4867-a937-9bdaa0f140d2";
const DEFAULT_USER_ID: &str = "anonymous";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL (no trailing slash)
    pub base_url: String,

    /// Route id segment used by the per-conversation webhook endpoints
    /// (get-conversation / rename-conversation / delete-conversation)
    pub route_id: String,

    /// User id attached to outbound turns alongside a session id
    pub user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            route_id: DEFAULT_ROUTE_ID.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--base-url" => {
                    let url = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--base-url requires a URL argument".to_string())
                    })?;
                    config.base_url = url.trim_end_matches('/').to_string();
                    i += 2;
                }
                "--route-id" => {
                    let id = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--route-id requires an id argument".to_string())
                    })?;
                    config.route_id = id.clone();
                    i += 2;
                }
                "--user-id" => {
                    let id = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--user-id requires an id argument".to_string())
                    })?;
                    config.user_id = id.clone();
                    i += 2;
                }
                other => {
                    return Err(ChatError::Config(format!(
                        "Unknown argument: {}\nUsage: {} [--base-url <url>] [--route-id <id>] [--user-id <id>]",
                        other,
                        args.first().map(|s| s.as_str()).unwrap_or("filewise")
                    )));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(url) = std::env::var("FILEWISE_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(id) = std::env::var("FILEWISE_ROUTE_ID") {
            config.route_id = id;
        }
        if let Ok(id) = std::env::var("FILEWISE_USER_ID") {
            config.user_id = id;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user_id, "anonymous");
        assert!(config.base_url.starts_with("https://"));
    }

    #[test]
    fn test_from_args_overrides() {
        let args: Vec<String> = [
            "filewise",
            "--base-url",
            "http://localhost:5678/",
            "--user-id",
            "tester",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.base_url, "http://localhost:5678");
        assert_eq!(config.user_id, "tester");
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let args: Vec<String> = ["filewise", "--bogus"].iter().map(|s| s.to_string()).collect();
        assert!(Config::from_args(&args).is_err());
    }
}
