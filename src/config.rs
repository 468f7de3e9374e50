use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::styles::{StyleCatalog, StyleCategory, DEFAULT_STYLE};

pub const ENV_U_COOKIE: &str = "BING_IMG_U";
pub const ENV_SRCHHPGUSR: &str = "BING_IMG_SRCHHPGUSR";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_OUT_DIR: &str = "BINGEN_OUT_DIR";
pub const ENV_PROVIDER: &str = "BINGEN_PROVIDER";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Bing,
    Mock,
}

impl ProviderKind {
    pub fn requires_credentials(self) -> bool {
        matches!(self, ProviderKind::Bing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaCfg {
    pub host: String,
    pub list_timeout_secs: u64,
    pub generate_timeout_secs: u64,
}

impl Default for OllamaCfg {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            list_timeout_secs: 2,
            generate_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BingCfg {
    pub base_url: String,
    pub poll_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for BingCfg {
    fn default() -> Self {
        Self {
            base_url: "https://www.bing.com".into(),
            poll_timeout_secs: 200,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub log_file: String,
    pub provider: ProviderKind,
    pub default_style: String,
    pub fetch_timeout_secs: u64,
    pub ollama: OllamaCfg,
    pub bing: BingCfg,
    /// Replaces the built-in style catalog when present.
    pub styles: Option<Vec<StyleCategory>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Output"),
            log_file: "generation_log.json".into(),
            provider: ProviderKind::Bing,
            default_style: DEFAULT_STYLE.into(),
            fetch_timeout_secs: 10,
            ollama: OllamaCfg::default(),
            bing: BingCfg::default(),
            styles: None,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by the YAML file (if any), then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let txt = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                serde_yaml::from_str::<AppConfig>(&txt).context("Failed to parse config YAML")?
            }
            None => AppConfig::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var(ENV_OLLAMA_HOST) {
            if !host.trim().is_empty() {
                self.ollama.host = host;
            }
        }
        if let Ok(dir) = std::env::var(ENV_OUT_DIR) {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(kind) = std::env::var(ENV_PROVIDER) {
            match kind.to_ascii_lowercase().as_str() {
                "bing" => self.provider = ProviderKind::Bing,
                "mock" => self.provider = ProviderKind::Mock,
                other => tracing::warn!("ignoring unknown {ENV_PROVIDER}={other}"),
            }
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }

    pub fn catalog(&self) -> StyleCatalog {
        match &self.styles {
            Some(categories) => StyleCatalog::new(categories.clone()),
            None => StyleCatalog::builtin(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// The two Bing cookies. Never written to disk.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub u_cookie: String,
    pub srchhpgusr: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("u_cookie", &redact(&self.u_cookie))
            .field("srchhpgusr", &redact(&self.srchhpgusr))
            .finish()
    }
}

fn redact(v: &str) -> &'static str {
    if v.is_empty() { "<empty>" } else { "<redacted>" }
}

impl Credentials {
    pub fn new(u_cookie: impl Into<String>, srchhpgusr: impl Into<String>) -> Self {
        Self {
            u_cookie: u_cookie.into().trim().to_string(),
            srchhpgusr: srchhpgusr.into().trim().to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var(ENV_U_COOKIE).unwrap_or_default(),
            std::env::var(ENV_SRCHHPGUSR).unwrap_or_default(),
        )
    }

    pub fn is_complete(&self) -> bool {
        !self.u_cookie.is_empty() && !self.srchhpgusr.is_empty()
    }

    /// Process environment only; lasts for this session.
    pub fn apply_to_env(&self) {
        std::env::set_var(ENV_U_COOKIE, &self.u_cookie);
        std::env::set_var(ENV_SRCHHPGUSR, &self.srchhpgusr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_sections_default_when_missing() {
        let cfg: AppConfig = serde_yaml::from_str(
            "output_dir: renders\nprovider: mock\nollama:\n  host: http://gpu-box:11434\n",
        )
        .unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("renders"));
        assert_eq!(cfg.provider, ProviderKind::Mock);
        assert_eq!(cfg.ollama.host, "http://gpu-box:11434");
        assert_eq!(cfg.ollama.generate_timeout_secs, 30);
        assert_eq!(cfg.log_file, "generation_log.json");
        assert_eq!(cfg.catalog(), StyleCatalog::builtin());
    }

    #[test]
    fn example_config_parses() {
        let cfg: AppConfig =
            serde_yaml::from_str(include_str!("../config/bingen.example.yaml")).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("Output"));
        assert_eq!(cfg.bing.poll_interval_ms, 1000);
        assert!(cfg.styles.is_none());
    }

    #[test]
    fn yaml_can_replace_catalog() {
        let cfg: AppConfig = serde_yaml::from_str(
            "styles:\n  - name: Mine\n    styles: [Ukiyo-e, Claymation]\n",
        )
        .unwrap();
        let cat = cfg.catalog();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.find("claymation"), Some("Claymation"));
    }

    #[test]
    fn credentials_trim_and_redact() {
        let creds = Credentials::new("  abc ", "def\n");
        assert_eq!(creds.u_cookie, "abc");
        assert!(creds.is_complete());
        assert!(!format!("{creds:?}").contains("abc"));
        assert!(!Credentials::new("abc", " ").is_complete());
    }
}
