use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat, RgbaImage};
use maud::{PreEscaped, html};
use resvg::{
    tiny_skia::{Pixmap, Transform},
    usvg::{self, fontdb},
};

use crate::{
    encode_image,
    font::Font,
    layout::{Align, Block, Color, Direction, Justify, Node, Text, html_color},
};

const LINE_HEIGHT: f32 = 1.2;
/// Baseline offset from the top of a line box, as a fraction of the font size.
const ASCENT: f32 = 0.92;
/// Preferred fallbacks for the generic `sans-serif` family, in order.
const SANS_SERIF_FAMILIES: &[&str] =
    &["Inter", "Geist", "DejaVu Sans", "Liberation Sans", "Noto Sans", "Arial", "Helvetica"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Frame {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Frame {
    fn inset(self, by: f32) -> Frame {
        Frame {
            x: self.x + by,
            y: self.y + by,
            w: (self.w - by * 2.0).max(0.0),
            h: (self.h - by * 2.0).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Rect { frame: Frame, fill: Color },
    Line { x: f32, baseline: f32, size: f32, weight: u16, fill: Color, content: String },
    Image { frame: Frame, href: String },
}

/// Estimated advance of a glyph. Without shaping, this only has to be
/// close enough to decide where lines wrap.
fn advance(c: char, size: f32, weight: u16) -> f32 {
    let em = match c {
        ' ' => 0.28,
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 0.28,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '-' => 0.38,
        'm' | 'w' | 'M' | 'W' => 0.85,
        c if c.is_ascii_uppercase() || c.is_ascii_digit() => 0.66,
        c if c.is_ascii() => 0.55,
        // CJK and other wide scripts
        c if c as u32 >= 0x2E80 => 1.0,
        _ => 0.6,
    };
    let bold = if weight >= 600 { 1.06 } else { 1.0 };
    em * size * bold
}

fn text_width(text: &str, size: f32, weight: u16) -> f32 {
    text.chars().map(|c| advance(c, size, weight)).sum()
}

/// Greedy word wrap. Words wider than `max_width` are broken by character.
fn wrap(text: &str, size: f32, weight: u16, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate =
            if line.is_empty() { word.to_string() } else { format!("{} {}", line, word) };
        if text_width(&candidate, size, weight) <= max_width {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        for c in word.chars() {
            let width = text_width(&line, size, weight) + advance(c, size, weight);
            if !line.is_empty() && width > max_width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(c);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn measure_text(text: &Text, max_width: f32) -> (f32, f32) {
    let lines = wrap(&text.content, text.size, text.weight, max_width);
    let w = lines.iter().map(|l| text_width(l, text.size, text.weight)).fold(0.0, f32::max);
    (w.min(max_width), lines.len() as f32 * text.size * LINE_HEIGHT)
}

fn measure(node: &Node, max_width: f32) -> (f32, f32) {
    match node {
        Node::Text(text) => measure_text(text, max_width),
        Node::Image(image) => (image.width, image.height),
        Node::Block(block) => {
            let inner = (max_width - block.padding * 2.0).max(0.0);
            let sizes = block.children.iter().map(|c| measure(c, inner)).collect::<Vec<_>>();
            let gaps = block.gap * sizes.len().saturating_sub(1) as f32;
            let (w, h) = match block.direction {
                Direction::Column => (
                    sizes.iter().map(|s| s.0).fold(0.0, f32::max),
                    sizes.iter().map(|s| s.1).sum::<f32>() + gaps,
                ),
                Direction::Row => (
                    sizes.iter().map(|s| s.0).sum::<f32>() + gaps,
                    sizes.iter().map(|s| s.1).fold(0.0, f32::max),
                ),
            };
            (w + block.padding * 2.0, h + block.padding * 2.0)
        }
    }
}

fn cross_offset(align: Align, available: f32, size: f32) -> f32 {
    match align {
        Align::Center => ((available - size) / 2.0).max(0.0),
        Align::Stretch | Align::Start => 0.0,
    }
}

fn place(node: &Node, frame: Frame, color: Color, out: &mut Vec<Shape>) {
    match node {
        Node::Text(text) => {
            let fill = text.color.unwrap_or(color);
            let lines = wrap(&text.content, text.size, text.weight, frame.w);
            let line_height = text.size * LINE_HEIGHT;
            let leading = (line_height - text.size) / 2.0;
            for (i, content) in lines.into_iter().enumerate() {
                out.push(Shape::Line {
                    x: frame.x,
                    baseline: frame.y + line_height * i as f32 + leading + text.size * ASCENT,
                    size: text.size,
                    weight: text.weight,
                    fill,
                    content,
                });
            }
        }
        Node::Image(image) => {
            if !image.src.is_empty() {
                out.push(Shape::Image {
                    frame: Frame { x: frame.x, y: frame.y, w: image.width, h: image.height },
                    href: image.src.clone(),
                });
            }
        }
        Node::Block(block) => place_block(block, frame, color, out),
    }
}

fn place_block(block: &Block, frame: Frame, color: Color, out: &mut Vec<Shape>) {
    if let Some(fill) = block.background {
        out.push(Shape::Rect { frame, fill });
    }
    let color = block.color.unwrap_or(color);
    let inner = frame.inset(block.padding);
    let sizes = block.children.iter().map(|c| measure(c, inner.w)).collect::<Vec<_>>();
    match block.direction {
        Direction::Column => {
            // Children from the first pushed one onward stack against the bottom edge.
            let split = block
                .children
                .iter()
                .position(|c| matches!(c, Node::Block(b) if b.push_end))
                .unwrap_or(block.children.len());
            let stack_height = |range: &[(f32, f32)]| {
                range.iter().map(|s| s.1).sum::<f32>()
                    + block.gap * range.len().saturating_sub(1) as f32
            };
            let head = stack_height(&sizes[..split]);
            let tail = stack_height(&sizes[split..]);
            let mut y = match block.justify {
                Justify::Center if split == sizes.len() => {
                    inner.y + ((inner.h - head) / 2.0).max(0.0)
                }
                _ => inner.y,
            };
            for (i, (child, &(w, h))) in block.children.iter().zip(&sizes).enumerate() {
                if i == split {
                    y = (inner.y + inner.h - tail).max(y);
                }
                let w = if block.align == Align::Stretch { inner.w } else { w.min(inner.w) };
                let x = inner.x + cross_offset(block.align, inner.w, w);
                place(child, Frame { x, y, w, h }, color, out);
                y += h + block.gap;
            }
        }
        Direction::Row => {
            let total = sizes.iter().map(|s| s.0).sum::<f32>();
            let gaps = block.gap * sizes.len().saturating_sub(1) as f32;
            let free = (inner.w - total - gaps).max(0.0);
            let (mut x, spacing) = match block.justify {
                Justify::Start => (inner.x, block.gap),
                Justify::Center => (inner.x + free / 2.0, block.gap),
                Justify::SpaceBetween if sizes.len() > 1 => {
                    (inner.x, block.gap + free / (sizes.len() - 1) as f32)
                }
                Justify::SpaceBetween => (inner.x, block.gap),
            };
            for (child, &(w, h)) in block.children.iter().zip(&sizes) {
                let h = if block.align == Align::Stretch { inner.h } else { h };
                let y = inner.y + cross_offset(block.align, inner.h, h);
                place(child, Frame { x, y, w, h }, color, out);
                x += w + spacing;
            }
        }
    }
}

fn layout(node: &Node, width: u32, height: u32) -> Vec<Shape> {
    let mut out = Vec::new();
    let frame = Frame { x: 0.0, y: 0.0, w: width as f32, h: height as f32 };
    place(node, frame, Color::new(0, 0, 0), &mut out);
    out
}

fn font_family_attr(families: &[String]) -> String {
    families
        .iter()
        .map(|f| format!("'{}'", f.replace('\'', "")))
        .chain(std::iter::once("sans-serif".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compose the layout into a standalone SVG document.
pub fn render_svg(node: &Node, width: u32, height: u32, families: &[String]) -> String {
    let shapes = layout(node, width, height);
    let font_family = font_family_attr(families);
    html! {
        (PreEscaped("<?xml version=\"1.0\" encoding=\"utf-8\"?>"))
        svg xmlns="http://www.w3.org/2000/svg" version="1.1" viewBox=(format!("0 0 {width} {height}")) width=(width) height=(height) {
            @for shape in &shapes {
                @match shape {
                    Shape::Rect { frame, fill } => {
                        rect x=(frame.x) y=(frame.y) width=(frame.w) height=(frame.h) fill=(html_color(*fill)) {}
                    }
                    Shape::Line { x, baseline, size, weight, fill, content } => {
                        text x=(x) y=(baseline) font-family=(font_family) font-size=(size) font-weight=(weight) fill=(html_color(*fill)) { (content) }
                    }
                    Shape::Image { frame, href } => {
                        image x=(frame.x) y=(frame.y) width=(frame.w) height=(frame.h) preserveAspectRatio="xMidYMid meet" href=(href) {}
                    }
                }
            }
        }
    }
    .into_string()
}

fn init_system_fonts() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!("Loaded {} system font faces", db.len());
    db
}

fn system_fonts() -> &'static fontdb::Database {
    static SYSTEM_FONTS: OnceLock<fontdb::Database> = OnceLock::new();
    SYSTEM_FONTS.get_or_init(init_system_fonts)
}

/// Build the font database for one render, returning it along with the
/// family names of `fonts` in the order they were given.
fn font_database(fonts: &[Font], system: bool) -> (fontdb::Database, Vec<String>) {
    let mut db = if system { system_fonts().clone() } else { fontdb::Database::new() };
    let mut families = Vec::new();
    for font in fonts {
        let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(font.data.clone())));
        if ids.is_empty() {
            tracing::warn!("Font {} contains no usable faces", font.name);
            continue;
        }
        for id in ids {
            let Some(face) = db.face(id) else { continue };
            for (family, _) in &face.families {
                if !families.contains(family) {
                    families.push(family.clone());
                }
            }
        }
        if !families.contains(&font.name) {
            families.push(font.name.clone());
        }
    }
    let available = |name: &str| db.faces().any(|f| f.families.iter().any(|(n, _)| n == name));
    let fallback = families
        .iter()
        .map(String::as_str)
        .chain(SANS_SERIF_FAMILIES.iter().copied())
        .find(|&name| available(name))
        .map(str::to_string)
        .or_else(|| db.faces().next().and_then(|f| f.families.first()).map(|(n, _)| n.clone()));
    if let Some(fallback) = fallback {
        db.set_sans_serif_family(fallback);
    }
    (db, families)
}

/// Rasterize an SVG document and encode it.
pub fn render_image(svg: &str, db: fontdb::Database, format: ImageFormat) -> Result<Vec<u8>> {
    let opts = usvg::Options { fontdb: Arc::new(db), ..Default::default() };
    let tree = usvg::Tree::from_str(svg, &opts).context("Failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("Failed to create {}x{} pixmap", size.width(), size.height()))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect::<Vec<u8>>();
    let image = RgbaImage::from_raw(size.width(), size.height(), data)
        .ok_or_else(|| anyhow!("Pixmap size mismatch"))?;
    encode_image(&DynamicImage::ImageRgba8(image), format)
}

/// Lay out, compose and rasterize a tree with the given fonts.
pub fn render_layout(
    node: &Node,
    width: u32,
    height: u32,
    fonts: &[Font],
    system_fonts: bool,
    format: ImageFormat,
) -> Result<Vec<u8>> {
    let (db, families) = font_database(fonts, system_fonts);
    let svg = render_svg(node, width, height, &families);
    render_image(&svg, db, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Image;

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("Hello world", 10.0, 400, 1000.0), vec!["Hello world"]);
        let lines = wrap("Hello world", 10.0, 400, 40.0);
        assert_eq!(lines, vec!["Hello", "world"]);
        let lines = wrap("abcdefghijkl", 10.0, 400, 30.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "abcdefghijkl");
        assert!(wrap("   ", 10.0, 400, 100.0).is_empty());
    }

    #[test]
    fn test_layout_pushes_footer_down() {
        let node: Node = Block::column()
            .padding(10.0)
            .child(Text::new("Top", 20.0).id("top"))
            .child(Block::row().push_end().child(Text::new("Bottom", 20.0)))
            .into();
        let shapes = layout(&node, 200, 100);
        let baselines = shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Line { baseline, content, .. } => Some((content.as_str(), *baseline)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(baselines.len(), 2);
        assert_eq!(baselines[0].0, "Top");
        // Top line sits at the top padding, bottom line at the bottom padding.
        assert!(baselines[0].1 < 40.0);
        assert!(baselines[1].1 > 70.0);
        assert!(baselines[1].1 <= 90.0);
    }

    #[test]
    fn test_layout_space_between() {
        let node: Node = Block::row()
            .justify(Justify::SpaceBetween)
            .child(Image::new("data:image/png;base64,", 10.0, 10.0))
            .child(Image::new("data:image/png;base64,", 10.0, 10.0))
            .into();
        let frames = layout(&node, 100, 10)
            .into_iter()
            .filter_map(|s| match s {
                Shape::Image { frame, .. } => Some(frame),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].x, 0.0);
        assert_eq!(frames[1].x, 90.0);
    }

    #[test]
    fn test_render_svg_escapes_text() {
        let node: Node = Block::column()
            .background(Color::new(0x0f, 0x11, 0x15))
            .child(Text::new("<Tom & Jerry>", 20.0))
            .child(Image::new("", 10.0, 10.0))
            .into();
        let svg = render_svg(&node, 300, 100, &["Geist".to_string()]);
        assert!(svg.contains("&lt;Tom &amp; Jerry&gt;"));
        assert!(svg.contains("fill=\"#0f1115\""));
        assert!(svg.contains("'Geist', sans-serif"));
        assert!(!svg.contains("<image"));
    }

    #[test]
    fn test_render_image_size() {
        let node: Node = Block::column()
            .background(Color::new(0x0f, 0x11, 0x15))
            .padding(48.0)
            .child(Text::new("Title", 72.0).weight(700))
            .into();
        let data = render_layout(&node, 1200, 630, &[], false, ImageFormat::Png).unwrap();
        let image = image::load_from_memory_with_format(&data, ImageFormat::Png).unwrap();
        assert_eq!((image.width(), image.height()), (1200, 630));
        let pixel = image.to_rgba8().get_pixel(0, 0).0;
        assert_eq!(pixel, [0x0f, 0x11, 0x15, 0xff]);
    }
}
