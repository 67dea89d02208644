//! Configuration Module
//!
//! Server settings come from environment variables; pipelines, mounts and
//! content come from a TOML site file.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::Stage;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of pages the page cache can hold
    pub max_entries: usize,
    /// TTL in seconds for pages without a usable `Expires` header
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Whether the page caching valve caches at all
    pub page_cache_enabled: bool,
    /// Path of the TOML site file
    pub site_config: String,
    /// Prefix stripped from every request path before mount resolution
    pub context_path: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cached pages (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `PAGE_CACHE_ENABLED` - `false` disables page caching (default: true)
    /// - `SITE_CONFIG` - Site file path (default: site.toml)
    /// - `CONTEXT_PATH` - Application context path (default: empty)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            page_cache_enabled: parse_var("PAGE_CACHE_ENABLED")
                .unwrap_or(defaults.page_cache_enabled),
            site_config: env::var("SITE_CONFIG").unwrap_or(defaults.site_config),
            context_path: env::var("CONTEXT_PATH")
                .map(|path| normalize_context_path(&path))
                .unwrap_or(defaults.context_path),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 1,
            page_cache_enabled: true,
            site_config: "site.toml".to_string(),
            context_path: String::new(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// `"/app/"` and `"app"` both become `"/app"`; `"/"` becomes empty.
fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

// == Site Configuration ==
/// Pipelines, mounts and content of the served sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_pipeline_name")]
    pub default_pipeline: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    #[serde(default)]
    pub content: Vec<ContentConfig>,
    #[serde(default)]
    pub cache_variants: CacheVariantConfig,
}

/// One pipeline: base valve names per stage plus constrained extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub initialization: Vec<String>,
    #[serde(default)]
    pub processing: Vec<String>,
    #[serde(default)]
    pub cleanup: Vec<String>,
    #[serde(default)]
    pub extra: Vec<ExtraValveConfig>,
}

impl PipelineConfig {
    /// Base valve names of `stage`.
    pub fn stage(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::Initialization => &self.initialization,
            Stage::Processing => &self.processing,
            Stage::Cleanup => &self.cleanup,
        }
    }
}

/// A valve placed by ordering constraints instead of position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraValveConfig {
    pub stage: Stage,
    pub valve: String,
    /// Comma-separated names this valve runs after
    #[serde(default)]
    pub after_valves: String,
    /// Comma-separated names this valve runs before
    #[serde(default)]
    pub before_valves: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    #[serde(default)]
    pub host: Option<String>,
    pub path: String,
    pub site: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    pub site: String,
    pub path: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub body: String,
    #[serde(default)]
    pub expires_secs: Option<u64>,
    #[serde(default = "default_cacheable")]
    pub cacheable: bool,
}

/// Request values the `cache-variant` valve adds to the page cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheVariantConfig {
    /// Query parameter names
    #[serde(default)]
    pub query: Vec<String>,
    /// Cookie names
    #[serde(default)]
    pub cookies: Vec<String>,
}

fn default_pipeline_name() -> String {
    "default".to_string()
}

fn default_content_type() -> String {
    "text/html; charset=utf-8".to_string()
}

fn default_cacheable() -> bool {
    true
}

impl SiteConfig {
    /// Reads and parses the site file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| {
            PipelineError::InvalidConfig(format!("cannot read {}: {error}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|error| PipelineError::InvalidConfig(error.to_string()))
    }
}

impl Default for SiteConfig {
    /// One default pipeline with the built-in valves, serving everything
    /// from the `main` site.
    fn default() -> Self {
        Self {
            default_pipeline: default_pipeline_name(),
            pipelines: vec![PipelineConfig {
                name: default_pipeline_name(),
                initialization: vec!["initialization".to_string()],
                processing: vec![
                    "context-resolving".to_string(),
                    "page-caching".to_string(),
                    "content-rendering".to_string(),
                ],
                cleanup: vec!["cleanup".to_string()],
                extra: Vec::new(),
            }],
            mounts: vec![MountConfig {
                host: None,
                path: "/".to_string(),
                site: "main".to_string(),
            }],
            content: Vec::new(),
            cache_variants: CacheVariantConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 1);
        assert!(config.page_cache_enabled);
        assert_eq!(config.site_config, "site.toml");
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_ENTRIES");
        env::remove_var("DEFAULT_TTL");
        env::remove_var("SERVER_PORT");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("PAGE_CACHE_ENABLED");
        env::remove_var("CONTEXT_PATH");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 1);
        assert!(config.page_cache_enabled);
        assert_eq!(config.context_path, "");
    }

    #[test]
    fn test_normalize_context_path() {
        assert_eq!(normalize_context_path("/app/"), "/app");
        assert_eq!(normalize_context_path("app"), "/app");
        assert_eq!(normalize_context_path("/"), "");
    }

    #[test]
    fn test_site_config_from_toml() {
        let site = SiteConfig::from_toml_str(
            r#"
            [[pipelines]]
            name = "default"
            initialization = ["initialization"]
            processing = ["context-resolving", "page-caching", "content-rendering"]
            cleanup = ["cleanup"]

            [[pipelines.extra]]
            stage = "processing"
            valve = "audit"
            after_valves = "context-resolving"
            before_valves = "page-caching"

            [[mounts]]
            host = "localhost"
            path = "/"
            site = "main"

            [[content]]
            site = "main"
            path = "/about"
            body = "<h1>About</h1>"
            expires_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(site.default_pipeline, "default");
        let pipeline = &site.pipelines[0];
        assert_eq!(pipeline.stage(Stage::Processing).len(), 3);
        assert_eq!(pipeline.extra[0].stage, Stage::Processing);
        assert_eq!(pipeline.extra[0].before_valves, "page-caching");
        assert_eq!(site.mounts[0].host.as_deref(), Some("localhost"));
        assert_eq!(site.content[0].content_type, "text/html; charset=utf-8");
        assert_eq!(site.content[0].expires_secs, Some(60));
        assert!(site.content[0].cacheable);
        assert_eq!(site.cache_variants, CacheVariantConfig::default());
    }

    #[test]
    fn test_site_config_cache_variants() {
        let site = SiteConfig::from_toml_str(
            r#"
            [cache_variants]
            query = ["lang"]
            cookies = ["theme"]
            "#,
        )
        .unwrap();

        assert_eq!(site.cache_variants.query, ["lang"]);
        assert_eq!(site.cache_variants.cookies, ["theme"]);
        assert!(site.pipelines.is_empty());
    }

    #[test]
    fn test_site_config_rejects_bad_stage() {
        let err = SiteConfig::from_toml_str(
            r#"
            [[pipelines]]
            name = "default"
            [[pipelines.extra]]
            stage = "rendering"
            valve = "x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_site_config_load_missing_file() {
        let err = SiteConfig::load("/nonexistent/site.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_site_config_default_pipeline() {
        let site = SiteConfig::default();
        assert_eq!(site.pipelines.len(), 1);
        assert_eq!(site.pipelines[0].processing[1], "page-caching");
        assert_eq!(site.mounts[0].path, "/");
    }
}
