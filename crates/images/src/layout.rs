//! Declarative layout tree handed to a [`Renderer`](crate::render::Renderer).

use palette::Srgb;

pub type Color = Srgb<u8>;

pub fn html_color(c: Color) -> String {
    let (r, g, b) = c.into_components();
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Text(Text),
    Image(Image),
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Column,
    Row,
}

/// Distribution of children along the main axis.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Justify {
    #[default]
    Start,
    Center,
    SpaceBetween,
}

/// Placement of children on the cross axis.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Align {
    #[default]
    Stretch,
    Start,
    Center,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub id: Option<String>,
    pub direction: Direction,
    pub justify: Justify,
    pub align: Align,
    pub padding: f32,
    pub gap: f32,
    /// Sink this block, and every sibling after it, to the end of a column.
    pub push_end: bool,
    pub background: Option<Color>,
    /// Text color inherited by descendants.
    pub color: Option<Color>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub id: Option<String>,
    pub content: String,
    pub size: f32,
    pub weight: u16,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: Option<String>,
    /// Absolute URL or `data:` URI. Empty sources are skipped when drawing.
    pub src: String,
    pub width: f32,
    pub height: f32,
    pub alt: String,
}

impl Block {
    pub fn column() -> Self { Self::default() }

    pub fn row() -> Self { Self { direction: Direction::Row, ..Self::default() } }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn justify(mut self, justify: Justify) -> Self {
        self.justify = justify;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn gap(mut self, gap: f32) -> Self {
        self.gap = gap;
        self
    }

    pub fn push_end(mut self) -> Self {
        self.push_end = true;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn child_opt(self, child: Option<impl Into<Node>>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }
}

impl Text {
    pub fn new(content: impl Into<String>, size: f32) -> Self {
        Self { id: None, content: content.into(), size, weight: 400, color: None }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

impl Image {
    pub fn new(src: impl Into<String>, width: f32, height: f32) -> Self {
        Self { id: None, src: src.into(), width, height, alt: String::new() }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }
}

impl From<Block> for Node {
    fn from(value: Block) -> Self { Node::Block(value) }
}

impl From<Text> for Node {
    fn from(value: Text) -> Self { Node::Text(value) }
}

impl From<Image> for Node {
    fn from(value: Image) -> Self { Node::Image(value) }
}

impl Node {
    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Block(b) => b.id.as_deref(),
            Node::Text(t) => t.id.as_deref(),
            Node::Image(i) => i.id.as_deref(),
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Block(b) => &b.children,
            _ => &[],
        }
    }

    /// Depth-first search for the node with the given id.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn texts(&self) -> Vec<&Text> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Node::Text(text) = node {
                out.push(text);
            }
        });
        out
    }

    pub fn images(&self) -> Vec<&Image> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Node::Image(image) = node {
                out.push(image);
            }
        });
        out
    }

    pub fn images_mut(&mut self) -> Vec<&mut Image> {
        match self {
            Node::Image(image) => vec![image],
            Node::Block(block) => block.children.iter_mut().flat_map(Node::images_mut).collect(),
            Node::Text(_) => vec![],
        }
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}
