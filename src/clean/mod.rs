//! Markup cleaning: raw content bytes → cleaned DOM tree.
//!
//! Each spine document passes through here before Markdown emission.
//! Cleaning never fails: decoding always has a fallback and html5ever
//! recovers from malformed input, so the worst case is an empty tree
//! that the assembler later drops.

use crate::dom::{self, ArenaDom};
use crate::util::{decode_text, extract_xml_encoding};

/// Tag kinds removed as whole subtrees: technical noise.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "iframe", "svg",
];

/// Tag kinds removed as whole subtrees: navigation chrome.
const STRUCTURAL_TAGS: &[&str] = &["nav", "footer", "header", "aside"];

/// ARIA roles whose carriers are removed as whole subtrees.
const NOISE_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];

/// Attributes dropped from every element.
const STRIP_ATTRS: &[&str] = &[
    "style",
    "width",
    "height",
    "cellspacing",
    "cellpadding",
    "border",
    "id",
];

/// Decode, parse, and clean one content document.
pub fn clean_fragment(raw: &[u8]) -> ArenaDom {
    let hint = extract_xml_encoding(raw);
    let text = decode_text(raw, hint);
    let text = strip_xml_prolog(&text);
    let mut dom = dom::parse_html(text);
    clean_tree(&mut dom);
    dom
}

/// Run the cleaning passes over an already-parsed tree.
pub fn clean_tree(dom: &mut ArenaDom) {
    remove_noise_tags(dom);
    remove_structural_noise(dom);
    rewrite_images(dom);
    scrub_attributes(dom);
}

/// Strip a leading `<?xml ...?>` declaration, case-insensitive.
///
/// Declarations confuse the HTML tree builder and carry no semantic value.
fn strip_xml_prolog(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.len() >= 5
        && trimmed.as_bytes()[..5].eq_ignore_ascii_case(b"<?xml")
        && let Some(end) = trimmed.find("?>")
    {
        return &trimmed[end + 2..];
    }
    text
}

fn remove_noise_tags(dom: &mut ArenaDom) {
    let doomed = dom.collect_elements(|tag, _| NOISE_TAGS.contains(&tag.as_ref()));
    for id in doomed {
        dom.detach(id);
    }
}

fn remove_structural_noise(dom: &mut ArenaDom) {
    let doomed = dom.collect_elements(|tag, _| STRUCTURAL_TAGS.contains(&tag.as_ref()));
    for id in doomed {
        dom.detach(id);
    }

    let doomed = dom.collect_elements(|_, attrs| {
        attrs.iter().any(|a| {
            a.name.local.as_ref() == "role" && NOISE_ROLES.contains(&a.value.as_str())
        })
    });
    for id in doomed {
        dom.detach(id);
    }
}

/// Replace every `img` with a text placeholder, in tree order.
///
/// The surrounding spaces keep the placeholder from fusing with adjacent
/// words once the tree is flattened to text.
fn rewrite_images(dom: &mut ArenaDom) {
    let images = dom.collect_elements(|tag, _| tag.as_ref() == "img");
    for id in images {
        let alt = dom
            .get_attr(id, "alt")
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(str::to_string);
        let placeholder = match alt {
            Some(alt) => format!(" [圖片說明: {}] ", alt),
            None => " [圖片] ".to_string(),
        };
        dom.replace_with_text(id, placeholder);
    }
}

/// Drop non-semantic attributes from every remaining element.
///
/// `class` survives only on `code`/`pre`, where it carries language hints.
fn scrub_attributes(dom: &mut ArenaDom) {
    let elements = dom.collect_elements(|_, _| true);
    for id in elements {
        let is_code = dom
            .element_name(id)
            .is_some_and(|tag| matches!(tag.as_ref(), "code" | "pre"));
        dom.retain_attrs(id, |attr| {
            let name = attr.name.local.as_ref();
            if STRIP_ATTRS.contains(&name) || name.starts_with("on") {
                return false;
            }
            if name == "class" && !is_code {
                return false;
            }
            true
        });
    }
}

/// True when a tree still contains an element with the given tag.
#[cfg(test)]
fn has_tag(dom: &ArenaDom, tag: &str) -> bool {
    dom.find_by_tag(tag).is_some()
}
