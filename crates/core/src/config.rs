use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variables consulted for the public site URL, highest priority first.
pub const SITE_URL_VARS: &[&str] = &["SITE_URL", "DOCS_BASE_URL"];

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub site: SiteConfig,
    pub docs: DocsConfig,
    pub font: FontConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { port: 3000 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Brand label shown next to the logo.
    pub name: String,
    /// Public base URL. Overridden by `SITE_URL` / `DOCS_BASE_URL`.
    pub url: Option<String>,
    /// Directory served under `/`, expected to contain `assets/logo.png`.
    pub public_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { name: "Voux".to_string(), url: None, public_dir: PathBuf::from("public") }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocsConfig {
    pub content_dir: PathBuf,
    pub default_locale: String,
    /// Additional locales recognized in `name.<locale>.md` file names.
    pub locales: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content/docs"),
            default_locale: "en".to_string(),
            locales: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum FontConfig {
    /// Read from disk on every request, falling back to no custom font.
    Local {
        #[serde(default = "default_font_path")]
        path: PathBuf,
        #[serde(default = "default_font_name")]
        name: String,
    },
    /// Fetched once at startup. A failed fetch fails every request.
    Remote {
        url: Url,
        #[serde(default = "default_font_name")]
        name: String,
    },
    None,
}

impl Default for FontConfig {
    fn default() -> Self { Self::Local { path: default_font_path(), name: default_font_name() } }
}

fn default_font_path() -> PathBuf { PathBuf::from("assets/fonts/Geist-Bold.ttf") }

fn default_font_name() -> String { "Geist".to_string() }

impl Config {
    /// Load the config file, or the defaults if it doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        serde_yaml::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Resolve the public site URL from the process environment and this config.
    pub fn site_url(&self) -> Result<Url> {
        resolve_site_url(|key| std::env::var(key).ok(), self.site.url.as_deref())
    }
}

/// Pick the first non-empty candidate out of the environment variables in
/// [`SITE_URL_VARS`], then `configured`, then [`DEFAULT_SITE_URL`].
pub fn resolve_site_url<F>(env: F, configured: Option<&str>) -> Result<Url>
where F: Fn(&str) -> Option<String> {
    let value = SITE_URL_VARS
        .iter()
        .filter_map(|key| env(*key))
        .chain(configured.map(str::to_string))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    Url::parse(value.trim()).with_context(|| format!("Invalid site URL '{}'", value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_resolve_site_url_priority() {
        let url = resolve_site_url(
            env(&[("SITE_URL", "https://a.example"), ("DOCS_BASE_URL", "https://b.example")]),
            Some("https://c.example"),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://a.example/");

        let env_b = env(&[("DOCS_BASE_URL", "https://b.example")]);
        let url = resolve_site_url(env_b, Some("https://c.example")).unwrap();
        assert_eq!(url.as_str(), "https://b.example/");

        let url = resolve_site_url(env(&[]), Some("https://c.example")).unwrap();
        assert_eq!(url.as_str(), "https://c.example/");

        let url = resolve_site_url(env(&[]), None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_resolve_site_url_skips_empty() {
        let url = resolve_site_url(
            env(&[("SITE_URL", ""), ("DOCS_BASE_URL", "https://docs.example")]),
            None,
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://docs.example/");
    }

    #[test]
    fn test_resolve_site_url_invalid() {
        assert!(resolve_site_url(env(&[("SITE_URL", "not a url")]), None).is_err());
    }

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(
            "site:\n  name: Acme\nfont:\n  source: remote\n  url: https://fonts.example/a.ttf\n",
        )
        .unwrap();
        assert_eq!(config.site.name, "Acme");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.docs.default_locale, "en");
        match config.font {
            FontConfig::Remote { url, name } => {
                assert_eq!(url.as_str(), "https://fonts.example/a.ttf");
                assert_eq!(name, "Geist");
            }
            other => panic!("unexpected font config {:?}", other),
        }

        let config: Config = serde_yaml::from_str("font:\n  source: none\n").unwrap();
        assert!(matches!(config.font, FontConfig::None));

        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(matches!(config.font, FontConfig::Local { .. }));
    }
}
