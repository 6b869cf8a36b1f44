//! Cleaned tree → Markdown rendering.
//!
//! Pure rendering logic: walks the cleaned DOM and accumulates Markdown
//! text, dispatching on element tag names. No I/O is performed here -
//! the pipeline layer handles assembly and writing.

use crate::dom::{ArenaDom, NodeData, NodeId};

use super::escape::{collapse_blank_lines, escape_markdown, fence_length, inline_code_ticks};

/// Hyperlink targets that survive flattening to a standalone document.
///
/// Relative paths and same-document fragments point into the original
/// container and are meaningless in the output, so only these schemes
/// produce a link construct.
fn is_external_href(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://") || href.starts_with("mailto:")
}

/// Render a cleaned tree to Markdown text.
///
/// The walk starts at `<body>` when one exists (html5ever always builds
/// one for a document) so head-only text such as `<title>` never leaks
/// into the output. Never fails; an empty tree yields an empty string.
pub fn render_markdown(dom: &ArenaDom) -> String {
    let root = dom.find_by_tag("body").unwrap_or_else(|| dom.document());

    let mut ctx = RenderContext::new(dom);
    ctx.walk_children(root);

    collapse_blank_lines(&ctx.output)
}

/// Tracks list context for numbering.
struct ListContext {
    is_ordered: bool,
    counter: usize,
}

/// Accumulates Markdown output during the tree walk.
struct RenderContext<'a> {
    dom: &'a ArenaDom,
    output: String,
    /// Prefix written at the start of each new line (blockquote markers,
    /// list continuation indent).
    line_prefix: String,
    list_stack: Vec<ListContext>,
    at_line_start: bool,
    /// True if a blank line is owed before the next block.
    pending_blank: bool,
}

impl<'a> RenderContext<'a> {
    fn new(dom: &'a ArenaDom) -> Self {
        Self {
            dom,
            output: String::new(),
            line_prefix: String::new(),
            list_stack: Vec::new(),
            at_line_start: true,
            pending_blank: false,
        }
    }

    fn ensure_line_started(&mut self) {
        if self.at_line_start {
            self.output.push_str(&self.line_prefix);
            self.at_line_start = false;
        }
    }

    fn write_newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
    }

    fn start_block(&mut self) {
        if self.pending_blank {
            if !self.at_line_start {
                self.write_newline();
            }
            self.write_newline();
            self.pending_blank = false;
        }
        self.ensure_line_started();
    }

    fn end_block(&mut self) {
        self.pending_blank = true;
    }

    fn walk_children(&mut self, id: NodeId) {
        for child in self.dom.children(id) {
            self.walk_node(child);
        }
    }

    fn walk_node(&mut self, id: NodeId) {
        let dom = self.dom;
        let Some(node) = dom.get(id) else {
            return;
        };

        let (tag, _attrs) = match &node.data {
            NodeData::Text(text) => {
                self.write_text(text);
                return;
            }
            NodeData::Comment(_) => return,
            NodeData::Document => {
                self.walk_children(id);
                return;
            }
            NodeData::Element { name, attrs } => (name.local.as_ref(), attrs),
        };

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = (tag.as_bytes()[1] - b'0') as usize;
                self.start_block();
                for _ in 0..level {
                    self.output.push('#');
                }
                self.output.push(' ');
                self.walk_children(id);
                self.end_block();
            }

            "p" => {
                self.start_block();
                self.walk_children(id);
                self.end_block();
            }

            "em" | "i" => {
                self.ensure_line_started();
                self.output.push('*');
                self.walk_children(id);
                self.output.push('*');
            }

            "strong" | "b" => {
                self.ensure_line_started();
                self.output.push_str("**");
                self.walk_children(id);
                self.output.push_str("**");
            }

            "a" => {
                self.ensure_line_started();
                let href = dom.get_attr(id, "href").unwrap_or("");
                if is_external_href(href) {
                    self.output.push('[');
                    self.walk_children(id);
                    self.output.push_str("](");
                    self.output.push_str(href);
                    self.output.push(')');
                } else {
                    // Internal/in-book target: keep the text, drop the link.
                    self.walk_children(id);
                }
            }

            "ul" | "ol" => {
                self.start_block();
                self.list_stack.push(ListContext {
                    is_ordered: tag == "ol",
                    counter: 0,
                });
                self.walk_children(id);
                self.list_stack.pop();
                self.end_block();
            }

            "li" => {
                if !self.at_line_start {
                    self.write_newline();
                }
                self.ensure_line_started();

                let bullet = match self.list_stack.last_mut() {
                    Some(list) => {
                        list.counter += 1;
                        if list.is_ordered {
                            format!("{}. ", list.counter)
                        } else {
                            "- ".to_string()
                        }
                    }
                    None => "- ".to_string(),
                };
                self.output.push_str(&bullet);

                // Continuation lines (and nested lists) indent past the bullet.
                let old_prefix = self.line_prefix.clone();
                self.line_prefix.push_str(&" ".repeat(bullet.len()));

                self.walk_children(id);

                self.line_prefix = old_prefix;
                self.pending_blank = false;
            }

            "blockquote" => {
                self.start_block();
                let old_prefix = self.line_prefix.clone();
                if !self.at_line_start {
                    self.output.push_str("> ");
                }
                self.line_prefix.push_str("> ");

                self.walk_children(id);

                self.line_prefix = old_prefix;
                self.end_block();
            }

            "br" => {
                self.output.push('\\');
                self.write_newline();
            }

            "hr" => {
                self.start_block();
                self.output.push_str("---");
                self.end_block();
            }

            "table" => self.render_table(id),

            "pre" => self.render_code_block(id),

            "code" => self.render_inline_code(id),

            // Cleaned trees never reach here with these, but be safe.
            "head" | "title" => {}

            // Containers and unknown elements contribute only their children.
            _ => self.walk_children(id),
        }
    }

    fn render_code_block(&mut self, id: NodeId) {
        self.start_block();

        // Verbatim content, never escaped.
        let text = self.dom.flatten_text(id);
        let lang = self.language_hint(id).unwrap_or_default();
        let fence = "`".repeat(fence_length(&text));

        self.ensure_line_started();
        self.output.push_str(&fence);
        self.output.push_str(&lang);
        self.write_newline();

        for line in text.lines() {
            self.ensure_line_started();
            self.output.push_str(line);
            self.write_newline();
        }

        self.ensure_line_started();
        self.output.push_str(&fence);
        self.end_block();
    }

    fn render_inline_code(&mut self, id: NodeId) {
        self.ensure_line_started();
        let content = self.dom.flatten_text(id);
        let ticks = "`".repeat(inline_code_ticks(&content));
        let spacer = if content.starts_with('`') || content.ends_with('`') {
            " "
        } else {
            ""
        };
        self.output.push_str(&ticks);
        self.output.push_str(spacer);
        self.output.push_str(&content);
        self.output.push_str(spacer);
        self.output.push_str(&ticks);
    }

    /// Language hint from the `class` attribute of a `pre` or its inner
    /// `code` element: `language-rust`/`lang-rust`/`rust` all yield `rust`.
    fn language_hint(&self, id: NodeId) -> Option<String> {
        let class = self.dom.get_attr(id, "class").or_else(|| {
            self.dom
                .children(id)
                .find(|&child| {
                    self.dom
                        .element_name(child)
                        .is_some_and(|n| n.as_ref() == "code")
                })
                .and_then(|code| self.dom.get_attr(code, "class"))
        })?;

        let token = class.split_ascii_whitespace().next()?;
        let lang = token
            .strip_prefix("language-")
            .or_else(|| token.strip_prefix("lang-"))
            .unwrap_or(token);
        (!lang.is_empty()).then(|| lang.to_string())
    }

    fn render_table(&mut self, id: NodeId) {
        let mut rows: Vec<Vec<String>> = Vec::new();
        self.collect_rows(id, &mut rows);
        if rows.is_empty() {
            return;
        }

        self.start_block();
        for (index, row) in rows.iter().enumerate() {
            self.ensure_line_started();
            self.output.push('|');
            for cell in row {
                self.output.push(' ');
                self.output.push_str(cell);
                self.output.push_str(" |");
            }
            self.write_newline();

            // Header separator sized to the first row's column count.
            if index == 0 {
                self.ensure_line_started();
                self.output.push('|');
                for _ in 0..row.len() {
                    self.output.push_str(" --- |");
                }
                self.write_newline();
            }
        }
        self.end_block();
    }

    fn collect_rows(&self, id: NodeId, rows: &mut Vec<Vec<String>>) {
        for child in self.dom.children(id) {
            let Some(tag) = self.dom.element_name(child) else {
                continue;
            };
            match tag.as_ref() {
                "tr" => {
                    let cells: Vec<String> = self
                        .dom
                        .children(child)
                        .filter(|&cell| {
                            self.dom
                                .element_name(cell)
                                .is_some_and(|n| matches!(n.as_ref(), "td" | "th"))
                        })
                        .map(|cell| {
                            let text = self.dom.flatten_text(cell);
                            // Unescaped pipes would split the cell.
                            escape_markdown(&normalize_ws(&text)).replace('|', "\\|")
                        })
                        .collect();
                    if !cells.is_empty() {
                        rows.push(cells);
                    }
                }
                "thead" | "tbody" | "tfoot" => self.collect_rows(child, rows),
                _ => {}
            }
        }
    }

    fn write_text(&mut self, text: &str) {
        self.ensure_line_started();

        let has_leading = text.starts_with(char::is_whitespace);
        let has_trailing = text.ends_with(char::is_whitespace);

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            if !text.is_empty() {
                self.output.push(' ');
            }
            return;
        }

        if has_leading {
            self.output.push(' ');
        }
        self.output.push_str(&escape_markdown(&words.join(" ")));
        if has_trailing {
            self.output.push(' ');
        }
    }
}

/// Collapse internal whitespace runs to single spaces.
fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::clean_fragment;

    fn render(html: &str) -> String {
        render_markdown(&clean_fragment(html.as_bytes()))
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(render("<h1>One</h1>"), "# One");
        assert_eq!(render("<h3>Three</h3>"), "### Three");
        assert_eq!(render("<h6>Six</h6>"), "###### Six");
    }

    #[test]
    fn test_paragraphs_blank_line_separated() {
        assert_eq!(render("<p>First.</p><p>Second.</p>"), "First.\n\nSecond.");
    }

    #[test]
    fn test_emphasis_and_strong() {
        assert_eq!(render("<p><em>soft</em> and <strong>loud</strong></p>"), "*soft* and **loud**");
    }

    #[test]
    fn test_external_link() {
        assert_eq!(render(r#"<a href="http://x.com">X</a>"#), "[X](http://x.com)");
        assert_eq!(
            render(r#"<a href="mailto:a@b.c">mail</a>"#),
            "[mail](mailto:a@b.c)"
        );
    }

    #[test]
    fn test_internal_link_drops_target() {
        assert_eq!(render(r##"<a href="#chapter1">Chapter 1</a>"##), "Chapter 1");
        assert_eq!(render(r#"<a href="ch02.xhtml">next</a>"#), "next");
        assert_eq!(render("<a>bare</a>"), "bare");
    }

    #[test]
    fn test_unordered_list() {
        let md = render("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(md, "- one\n- two");
    }

    #[test]
    fn test_ordered_list_numbering() {
        let md = render("<ol><li>alpha</li><li>beta</li><li>gamma</li></ol>");
        assert_eq!(md, "1. alpha\n2. beta\n3. gamma");
    }

    #[test]
    fn test_nested_list_indented() {
        let md = render("<ul><li>outer<ul><li>inner</li></ul></li></ul>");
        assert!(md.contains("- outer"), "{md:?}");
        assert!(md.contains("\n  - inner"), "{md:?}");
    }

    #[test]
    fn test_table_with_separator_row() {
        let md = render("<table><tr><td>A</td><td>B</td></tr></table>");
        assert_eq!(md, "| A | B |\n| --- | --- |");
    }

    #[test]
    fn test_table_multiple_rows() {
        let md = render(
            "<table><thead><tr><th>H1</th><th>H2</th></tr></thead>\
             <tbody><tr><td>a</td><td>b</td></tr></tbody></table>",
        );
        assert_eq!(md, "| H1 | H2 |\n| --- | --- |\n| a | b |");
    }

    #[test]
    fn test_code_block_verbatim() {
        let md = render("<pre><code>print(\"Hello World\")</code></pre>");
        assert!(md.contains("```"), "{md:?}");
        assert!(md.contains("print(\"Hello World\")"), "{md:?}");
    }

    #[test]
    fn test_code_block_language_hint() {
        let md = render(r#"<pre><code class="language-rust">let x = 1;</code></pre>"#);
        assert!(md.starts_with("```rust\n"), "{md:?}");
    }

    #[test]
    fn test_code_block_markdown_chars_not_escaped() {
        let md = render("<pre><code>*not emphasis* [not link]</code></pre>");
        assert!(md.contains("*not emphasis* [not link]"), "{md:?}");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(render("<p>use <code>cargo</code> here</p>"), "use `cargo` here");
    }

    #[test]
    fn test_blockquote_prefixes_lines() {
        let md = render("<blockquote><p>first</p><p>second</p></blockquote>");
        for line in md.lines().filter(|l| !l.trim().is_empty()) {
            assert!(line.starts_with('>'), "{md:?}");
        }
    }

    #[test]
    fn test_prose_emphasis_markers_escaped() {
        let md = render("<p>*stars* and [brackets]</p>");
        assert_eq!(md, "\\*stars\\* and [brackets]");
    }

    #[test]
    fn test_empty_input_yields_empty_string() {
        assert_eq!(render(""), "");
        assert_eq!(render("<div>   </div>"), "");
    }

    #[test]
    fn test_no_triple_newlines_in_output() {
        let md = render(
            "<div><p>a</p></div><div></div><div><p>b</p></div><hr><p>c</p>",
        );
        assert!(!md.contains("\n\n\n"), "{md:?}");
    }

    #[test]
    fn test_image_placeholder_flows_through() {
        let md = render(r#"<p>Look: <img src="s.jpg" alt="A nice sunset">!</p>"#);
        assert!(md.contains("[圖片說明: A nice sunset]"), "{md:?}");
    }

    #[test]
    fn test_title_text_does_not_leak() {
        let md = render("<html><head><title>Secret</title></head><body><p>Visible</p></body></html>");
        assert_eq!(md, "Visible");
    }
}
