//! Startup configuration loaded from config.json.
//! The document is read once in `main`, deserialized into `AppConfig`, and is
//! immutable for the process lifetime. A missing document is fatal at startup;
//! a reload requires a restart.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Optional prefix rewrite applied to every inbound path before normalization,
/// e.g. a Windows drive letter mapped onto a mount point. The prefix match is
/// case-insensitive; the replacement is spliced in verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathConversion {
    pub from: String,
    pub to: String,
}

/// Feature switches. `file_operations` gates every mutating endpoint;
/// `path_conversion` holds the single active rewrite rule, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Features {
    #[serde(default)]
    pub file_operations: bool,
    #[serde(default)]
    pub path_conversion: Option<PathConversion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_directory")]
    pub default_directory: String,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub favorite_paths: Vec<String>,
    #[serde(default)]
    pub features: Features,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_title() -> String {
    "FileView".to_string()
}

fn default_directory() -> String {
    "/".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Load the configuration document. Absence or malformed JSON is an error the
/// caller treats as fatal.
pub fn load(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| {
        format!(
            "{} not found. Copy config.example.json to config.json and edit it.",
            path.display()
        )
    })?;
    let cfg: AppConfig =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_document() {
        let raw = r#"{
            "title": "Docs",
            "default_directory": "/srv/docs",
            "allowed_paths": ["/srv/docs", "/srv/notes"],
            "favorite_paths": ["/srv/docs/readme.md"],
            "features": {
                "file_operations": true,
                "path_conversion": {"from": "C:\\", "to": "/mnt/c/"}
            },
            "host": "127.0.0.1",
            "port": 9000
        }"#;
        let cfg: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.title, "Docs");
        assert_eq!(cfg.allowed_paths.len(), 2);
        assert!(cfg.features.file_operations);
        assert_eq!(cfg.features.path_conversion.as_ref().unwrap().to, "/mnt/c/");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn defaults_apply_to_sparse_document() {
        let cfg: AppConfig = serde_json::from_str(r#"{"allowed_paths": ["/data"]}"#).unwrap();
        assert_eq!(cfg.title, "FileView");
        assert_eq!(cfg.default_directory, "/");
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.features.file_operations);
        assert!(cfg.features.path_conversion.is_none());
        assert!(cfg.favorite_paths.is_empty());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("config.example.json"));
    }
}
