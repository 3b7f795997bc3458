use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use docs_og_core::config::FontConfig;
use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use resvg::usvg::fontdb;
use url::Url;

/// Weight of the bundled heading font.
pub const BOLD: u16 = 700;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum FontStyle {
    #[default]
    Normal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    pub data: Bytes,
    pub weight: u16,
    pub style: FontStyle,
}

/// Outcome of a best-effort font load.
#[derive(Debug)]
pub enum FontLoad {
    Loaded(Font),
    /// The font couldn't be loaded; rendering continues with default fonts.
    Unavailable(anyhow::Error),
}

impl FontLoad {
    pub fn into_fonts(self) -> Vec<Font> {
        match self {
            FontLoad::Loaded(font) => vec![font],
            FontLoad::Unavailable(_) => vec![],
        }
    }
}

/// Read a bold font from disk. Never fails; see [`FontLoad`].
pub async fn load_local_font(path: &Path, name: &str) -> FontLoad {
    match read_font(path).await {
        Ok(data) => FontLoad::Loaded(Font {
            name: name.to_string(),
            data,
            weight: BOLD,
            style: FontStyle::Normal,
        }),
        Err(e) => FontLoad::Unavailable(e),
    }
}

async fn read_font(path: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read font {}", path.display()))?;
    let data = Bytes::from(data);
    check_font_data(&data).with_context(|| format!("Invalid font {}", path.display()))?;
    Ok(data)
}

/// Parse the font and require at least one usable TrueType or OpenType face.
pub fn check_font_data(data: &Bytes) -> Result<()> {
    if let Some(b"wOFF" | b"wOF2") = data.get(0..4) {
        return Err(anyhow!("WOFF fonts are not supported, use TTF or OTF"));
    }
    let mut db = fontdb::Database::new();
    let faces = db.load_font_source(fontdb::Source::Binary(Arc::new(data.clone())));
    if faces.is_empty() {
        return Err(anyhow!("No usable font faces in {} bytes", data.len()));
    }
    Ok(())
}

type SharedFont = Shared<BoxFuture<'static, Result<Font, Arc<anyhow::Error>>>>;

/// A font fetched once per process. Every caller awaits the same request,
/// and a failure is returned to every caller without retrying.
#[derive(Clone)]
pub struct RemoteFont {
    url: Url,
    future: SharedFont,
}

impl RemoteFont {
    pub fn new(client: reqwest::Client, url: Url, name: String) -> Self {
        let future = fetch_font(client, url.clone(), name).map(|r| r.map_err(Arc::new)).boxed();
        Self { url, future: future.shared() }
    }

    /// Start the request in the background without waiting on it.
    pub fn prefetch(&self) {
        let future = self.future.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(font) => tracing::info!("Fetched font {} ({} bytes)", url, font.data.len()),
                Err(e) => tracing::error!("Failed to fetch font {}: {:#}", url, e),
            }
        });
    }

    pub async fn get(&self) -> Result<Font> {
        self.future.clone().await.map_err(|e| anyhow!("Font {} unavailable: {:#}", self.url, e))
    }
}

async fn fetch_font(client: reqwest::Client, url: Url, name: String) -> Result<Font> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    let data = response.bytes().await?;
    check_font_data(&data)?;
    Ok(Font { name, data, weight: BOLD, style: FontStyle::Normal })
}

/// Source of the fonts passed to the renderer for each image.
#[derive(Clone)]
pub enum FontProvider {
    Local { path: PathBuf, name: String },
    Remote(RemoteFont),
    None,
}

impl FontProvider {
    pub fn new(config: &FontConfig, client: &reqwest::Client) -> Self {
        match config {
            FontConfig::Local { path, name } => {
                Self::Local { path: path.clone(), name: name.clone() }
            }
            FontConfig::Remote { url, name } => {
                Self::Remote(RemoteFont::new(client.clone(), url.clone(), name.clone()))
            }
            FontConfig::None => Self::None,
        }
    }

    pub fn prefetch(&self) {
        if let Self::Remote(font) = self {
            font.prefetch();
        }
    }

    pub async fn fonts(&self) -> Result<Vec<Font>> {
        match self {
            Self::Local { path, name } => {
                let load = load_local_font(path, name).await;
                if let FontLoad::Unavailable(e) = &load {
                    tracing::debug!("Using default fonts: {:#}", e);
                }
                Ok(load.into_fonts())
            }
            Self::Remote(font) => Ok(vec![font.get().await?]),
            Self::None => Ok(vec![]),
        }
    }
}
