use std::collections::HashMap;

/// In-memory representation of an opened EPUB, holding exactly what the
/// conversion pipeline consumes: metadata, the reading order, the table
/// of contents, and the raw content documents.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
    pub resources: HashMap<String, Resource>,
}

/// Book metadata. Defaults are applied when the package omits a field.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub title: String,
    pub author: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: "Untitled Book".to_string(),
            author: "Unknown Author".to_string(),
        }
    }
}

/// An item in the reading order (spine). Order is significant.
#[derive(Debug, Clone)]
pub struct SpineItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

/// A table of contents entry (hierarchical).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

/// A stored content document.
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Vec<u8>,
    pub media_type: String,
}

/// Media types treated as content documents.
fn is_document(media_type: &str) -> bool {
    matches!(media_type, "application/xhtml+xml" | "text/html")
}

/// Strip a `#fragment` suffix from an href.
pub fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a content document under its href.
    pub fn add_resource(
        &mut self,
        href: impl Into<String>,
        data: Vec<u8>,
        media_type: impl Into<String>,
    ) {
        self.resources.insert(
            href.into(),
            Resource {
                data,
                media_type: media_type.into(),
            },
        );
    }

    /// Append an item to the reading order.
    pub fn add_spine_item(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) {
        self.spine.push(SpineItem {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
        });
    }

    /// Iterate the spine's content documents in reading order, yielding
    /// `(href, raw bytes)`. Non-document items and items whose payload
    /// was never loaded are skipped.
    pub fn spine_documents(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.spine.iter().filter_map(|item| {
            if !is_document(&item.media_type) {
                return None;
            }
            self.resources
                .get(&item.href)
                .map(|res| (item.href.as_str(), res.data.as_slice()))
        })
    }

    /// Flatten the table of contents into an href → title map.
    ///
    /// Traversal is depth-first in document order; URL fragments are
    /// stripped so entries match spine hrefs; the first title seen for
    /// an href wins.
    pub fn toc_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        flatten_toc(&self.toc, &mut map);
        map
    }
}

fn flatten_toc(entries: &[TocEntry], map: &mut HashMap<String, String>) {
    for entry in entries {
        let href = strip_fragment(&entry.href);
        if !href.is_empty() && !map.contains_key(href) {
            map.insert(href.to_string(), entry.title.clone());
        }
        flatten_toc(&entry.children, map);
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }
}
