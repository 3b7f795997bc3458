//! Open Graph preview images for documentation pages.

use anyhow::{Context, Result};
use docs_og_core::models::PageMetadata;
use url::Url;

use crate::{
    font::FontProvider,
    layout::{Align, Block, Color, Image, Justify, Node, Text},
    render::{ImageOptions, RenderedImage, Renderer},
};

pub const OG_WIDTH: u32 = 1200;
pub const OG_HEIGHT: u32 = 630;

/// Logo location, relative to the site root.
pub const LOGO_PATH: &str = "/assets/logo.png";

pub const FOREGROUND: Color = Color::new(0xff, 0xff, 0xff);
pub const MUTED_FOREGROUND: Color = Color::new(0xa1, 0xa1, 0xa1);
pub const BACKGROUND: Color = Color::new(0x0f, 0x11, 0x15);

pub struct OgOptions<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub site_url: &'a Url,
    /// Label next to the logo.
    pub brand: &'a str,
}

pub fn logo_url(site_url: &Url) -> Result<Url> {
    site_url.join(LOGO_PATH).with_context(|| format!("Failed to resolve logo URL for {}", site_url))
}

pub fn generate(options: &OgOptions) -> Result<Node> {
    let logo = logo_url(options.site_url)?;
    let description = options
        .description
        .filter(|d| !d.trim().is_empty())
        .map(|d| Text::new(d, 36.0).id("description").color(MUTED_FOREGROUND));
    let content = Block::column()
        .id("content")
        .padding(32.0)
        .gap(24.0)
        .child(Text::new(options.title, 72.0).id("title").weight(700))
        .child_opt(description);
    let footer = Block::row()
        .id("footer")
        .push_end()
        .justify(Justify::SpaceBetween)
        .align(Align::Center)
        .padding(32.0)
        .child(
            Block::row()
                .id("brand")
                .align(Align::Center)
                .gap(16.0)
                .child(Image::new(logo.to_string(), 48.0, 48.0).id("logo").alt(options.brand))
                .child(Text::new(options.brand, 36.0).weight(500)),
        )
        .child(Text::new("Documentation", 36.0).id("section").weight(500).color(MUTED_FOREGROUND));
    Ok(Block::column()
        .id("root")
        .padding(48.0)
        .background(BACKGROUND)
        .color(FOREGROUND)
        .child(content)
        .child(footer)
        .into())
}

/// Acquire fonts, compose and render the preview image for one page.
pub async fn render_page(
    renderer: &dyn Renderer,
    fonts: &FontProvider,
    page: &PageMetadata,
    site_url: &Url,
    brand: &str,
) -> Result<RenderedImage> {
    let fonts = fonts.fonts().await?;
    let layout = generate(&OgOptions {
        title: &page.title,
        description: page.description.as_deref(),
        site_url,
        brand,
    })?;
    renderer.render(layout, ImageOptions { width: OG_WIDTH, height: OG_HEIGHT, fonts }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options<'a>(site_url: &'a Url, description: Option<&'a str>) -> OgOptions<'a> {
        OgOptions { title: "Getting Started", description, site_url, brand: "Voux" }
    }

    #[test]
    fn test_generate() {
        let site_url = Url::parse("https://docs.example.com").unwrap();
        let node = generate(&options(&site_url, Some("Install the toolkit"))).unwrap();
        let texts = node.texts().into_iter().map(|t| t.content.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Getting Started", "Install the toolkit", "Voux", "Documentation"]);
        let Some(Node::Text(title)) = node.find("title") else { panic!("missing title") };
        assert_eq!(title.weight, 700);
        let Some(Node::Block(footer)) = node.find("footer") else { panic!("missing footer") };
        assert!(footer.push_end);
        let Some(Node::Image(logo)) = node.find("logo") else { panic!("missing logo") };
        assert_eq!(logo.src, "https://docs.example.com/assets/logo.png");
        assert_eq!((logo.width, logo.height), (48.0, 48.0));
        assert_eq!(logo.alt, "Voux");
    }

    #[test]
    fn test_generate_without_description() {
        let site_url = Url::parse("https://docs.example.com").unwrap();
        for description in [None, Some(""), Some("  ")] {
            let node = generate(&options(&site_url, description)).unwrap();
            assert!(node.find("description").is_none());
            let Some(content) = node.find("content") else { panic!("missing content") };
            assert_eq!(content.children().len(), 1);
        }
    }

    #[test]
    fn test_logo_url() {
        let cases = [
            ("http://localhost:3000", "http://localhost:3000/assets/logo.png"),
            ("https://docs.example.com/", "https://docs.example.com/assets/logo.png"),
            // The logo path is absolute, so it replaces any base path.
            ("https://example.com/docs/", "https://example.com/assets/logo.png"),
        ];
        for (base, expected) in cases {
            let base = Url::parse(base).unwrap();
            assert_eq!(logo_url(&base).unwrap().as_str(), expected);
        }
    }
}
