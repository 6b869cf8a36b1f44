//! HTML parsing into a mutable arena DOM.

pub mod arena;
mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use arena::{ArenaDom, Attribute, NodeData, NodeId};
pub use tree_sink::ArenaSink;

/// Parse an HTML/XHTML fragment into an [`ArenaDom`].
///
/// html5ever is lenient: malformed input produces a best-effort (possibly
/// empty) tree rather than an error.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}
