use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::{Engine, prelude::BASE64_STANDARD};
use bytes::Bytes;
use docs_og_core::util::join_normalized;
use futures_util::{FutureExt, future::BoxFuture};
use image::ImageFormat;
use mime::Mime;
use url::Url;

use crate::{font::Font, layout::Node, svg};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub fonts: Vec<Font>,
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub data: Bytes,
    pub content_type: Mime,
    pub width: u32,
    pub height: u32,
}

/// Turns a layout tree into encoded image bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, layout: Node, options: ImageOptions) -> BoxFuture<'_, Result<RenderedImage>>;
}

/// Renders PNGs with resvg, inlining remote images first.
#[derive(Clone)]
pub struct SvgRenderer {
    client: reqwest::Client,
    system_fonts: bool,
    public_dir: Option<(Url, PathBuf)>,
}

impl SvgRenderer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, system_fonts: true, public_dir: None }
    }

    /// Whether installed fonts are available as fallbacks.
    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    /// Read images under `site_url` from `dir` instead of requesting them.
    pub fn with_public_dir(mut self, site_url: Url, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = Some((site_url, dir.into()));
        self
    }

    /// The file backing `src`, when it has the site's origin.
    fn local_path(&self, src: &str) -> Option<PathBuf> {
        let (site_url, dir) = self.public_dir.as_ref()?;
        let url = Url::parse(src).ok()?;
        (url.origin() == site_url.origin()).then(|| join_normalized(dir, url.path()))
    }

    /// Replace `http(s)` image sources with `data:` URIs. Images that can't be
    /// loaded are dropped from the output.
    async fn inline_images(&self, layout: &mut Node) {
        for image in layout.images_mut() {
            if !(image.src.starts_with("http://") || image.src.starts_with("https://")) {
                continue;
            }
            let result = match self.local_path(&image.src) {
                Some(path) => read_data_uri(&path).await,
                None => self.fetch_data_uri(&image.src).await,
            };
            match result {
                Ok(uri) => image.src = uri,
                Err(e) => {
                    tracing::warn!("Failed to load image {}: {:#}", image.src, e);
                    image.src.clear();
                }
            }
        }
    }

    async fn fetch_data_uri(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?;
        data_uri(&data, header_type.as_deref().is_some_and(|t| t.starts_with("image/svg+xml")))
    }
}

async fn read_data_uri(path: &Path) -> Result<String> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    data_uri(&data, path.extension().is_some_and(|ext| ext == "svg"))
}

fn data_uri(data: &[u8], is_svg: bool) -> Result<String> {
    let content_type = match image::guess_format(data) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) if is_svg => mime::IMAGE_SVG.to_string(),
        Err(_) => return Err(anyhow!("Unrecognized image data ({} bytes)", data.len())),
    };
    Ok(format!("data:{};base64,{}", content_type, BASE64_STANDARD.encode(data)))
}

impl Renderer for SvgRenderer {
    fn render(
        &self,
        mut layout: Node,
        options: ImageOptions,
    ) -> BoxFuture<'_, Result<RenderedImage>> {
        async move {
            self.inline_images(&mut layout).await;
            let system_fonts = self.system_fonts;
            let ImageOptions { width, height, fonts } = options;
            let start = std::time::Instant::now();
            let data = tokio::task::spawn_blocking(move || {
                svg::render_layout(&layout, width, height, &fonts, system_fonts, ImageFormat::Png)
            })
            .await
            .context("Render task failed")??;
            tracing::debug!("Rendered {}x{} image in {:?}", width, height, start.elapsed());
            Ok(RenderedImage { data: data.into(), content_type: mime::IMAGE_PNG, width, height })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use url::Url;

    use super::*;
    use crate::{
        encode_image,
        font::load_local_font,
        layout::{Block, Image},
        og::{self, OG_HEIGHT, OG_WIDTH, OgOptions},
    };

    fn client() -> reqwest::Client { reqwest::Client::builder().no_proxy().build().unwrap() }

    fn tiny_png() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([0xff, 0, 0, 0xff]));
        encode_image(&image::DynamicImage::ImageRgba8(image), ImageFormat::Png).unwrap()
    }

    /// Serve `body` to a single request and return its URL.
    async fn serve_once(body: Vec<u8>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await.unwrap();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{}/assets/logo.png", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_inline_images() {
        let png = tiny_png();
        let served = serve_once(png.clone()).await;
        let mut layout: Node = Block::row()
            .child(Image::new(served.to_string(), 48.0, 48.0))
            // Nothing listens on port 9 locally.
            .child(Image::new("http://127.0.0.1:9/assets/logo.png", 48.0, 48.0))
            .child(Image::new("data:image/png;base64,AAAA", 48.0, 48.0))
            .into();
        SvgRenderer::new(client()).inline_images(&mut layout).await;

        let images = layout.images();
        let encoded = images[0].src.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(BASE64_STANDARD.decode(encoded).unwrap(), png);
        assert_eq!(images[1].src, "");
        assert_eq!(images[2].src, "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_inline_images_from_public_dir() {
        let public_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../public");
        let logo = std::fs::read(public_dir.join("assets/logo.png")).unwrap();
        let site_url = Url::parse("https://docs.example.com/").unwrap();
        let renderer = SvgRenderer::new(client()).with_public_dir(site_url, &public_dir);
        let mut layout: Node = Block::row()
            .child(Image::new("https://docs.example.com/assets/logo.png", 48.0, 48.0))
            .child(Image::new("https://docs.example.com/assets/missing.png", 48.0, 48.0))
            .into();
        renderer.inline_images(&mut layout).await;

        let images = layout.images();
        let encoded = images[0].src.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(BASE64_STANDARD.decode(encoded).unwrap(), logo);
        assert_eq!(images[1].src, "");
        assert!(renderer.local_path("http://127.0.0.1:9/assets/logo.png").is_none());
    }

    #[tokio::test]
    async fn test_render_without_logo() {
        let site_url = Url::parse("http://127.0.0.1:9").unwrap();
        let layout = og::generate(&OgOptions {
            title: "Getting Started",
            description: Some("Install and configure the toolkit."),
            site_url: &site_url,
            brand: "Voux",
        })
        .unwrap();
        let font_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tuffy.ttf");
        let fonts = load_local_font(&font_path, "Tuffy").await.into_fonts();
        assert_eq!(fonts.len(), 1);

        let renderer = SvgRenderer::new(client()).with_system_fonts(false);
        let options = ImageOptions { width: OG_WIDTH, height: OG_HEIGHT, fonts };
        let image = renderer.render(layout, options).await.unwrap();
        assert_eq!(image.content_type, mime::IMAGE_PNG);
        assert_eq!((image.width, image.height), (OG_WIDTH, OG_HEIGHT));

        let decoded = image::load_from_memory_with_format(&image.data, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (OG_WIDTH, OG_HEIGHT));
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0, [0x0f, 0x11, 0x15, 0xff]);
    }
}
