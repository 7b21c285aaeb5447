//! Minimal HTML query layer used by the normalizers.
//!
//! Everything that inspects portal markup goes through [`Document`] and
//! [`Node`], so the parsing library stays an implementation detail.

use html_scraper::{ElementRef, Html, Selector};
use tracing::debug;

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(err) => {
            debug!(css, error = %err, "invalid selector");
            None
        }
    }
}

/// Collapse runs of whitespace and trim.
fn squash(text: impl Iterator<Item = impl AsRef<str>>) -> String {
    let joined: String = text.map(|t| t.as_ref().to_owned()).collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    pub fn select(&self, css: &str) -> Vec<Node<'_>> {
        match selector(css) {
            Some(sel) => self.html.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn first(&self, css: &str) -> Option<Node<'_>> {
        let sel = selector(css)?;
        self.html.select(&sel).next().map(Node)
    }

    pub fn exists(&self, css: &str) -> bool {
        self.first(css).is_some()
    }

    /// Element with the given `id`, matched literally.
    pub fn by_id(&self, id: &str) -> Option<Node<'_>> {
        self.first(&format!("[id=\"{id}\"]"))
    }

    pub fn by_class(&self, class: &str) -> Vec<Node<'_>> {
        self.select(&format!(".{class}"))
    }

    /// Trimmed text of the first match.
    pub fn text_of(&self, css: &str) -> Option<String> {
        self.first(css).map(|n| n.text())
    }

    /// Text of every match joined with a space, like a jQuery `.text()` on a set.
    pub fn joined_text(&self, css: &str) -> String {
        self.select(css)
            .iter()
            .map(Node::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attr_of(&self, css: &str, name: &str) -> Option<String> {
        self.first(css)
            .and_then(|n| n.attr(name))
            .map(str::to_owned)
    }

    /// The portal answers with its login page when the session is gone.
    pub fn is_login_page(&self) -> bool {
        self.joined_text("h5") == "用户登录"
    }

    /// All visible text of the document, whitespace-collapsed.
    pub fn text(&self) -> String {
        squash(self.html.root_element().text())
    }
}

#[derive(Clone, Copy)]
pub struct Node<'a>(ElementRef<'a>);

impl<'a> Node<'a> {
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0.value().attr(name)
    }

    pub fn text(&self) -> String {
        squash(self.0.text())
    }

    pub fn tag(&self) -> &'a str {
        self.0.value().name()
    }

    pub fn id(&self) -> Option<&'a str> {
        self.0.value().id()
    }

    pub fn select(&self, css: &str) -> Vec<Node<'a>> {
        match selector(css) {
            Some(sel) => self.0.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn first(&self, css: &str) -> Option<Node<'a>> {
        let sel = selector(css)?;
        self.0.select(&sel).next().map(Node)
    }

    /// Direct element children.
    pub fn children(&self) -> Vec<Node<'a>> {
        self.0.children().filter_map(ElementRef::wrap).map(Node).collect()
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.tag())
            .field("id", &self.id())
            .finish()
    }
}
