//! Pure string utilities for Markdown escaping and whitespace normalization.

/// Escape emphasis markers in prose text.
///
/// Only `*` and `_` are escaped: they are the characters that routinely
/// corrupt formatting mid-word, and a heavier escape set would litter the
/// output with backslashes (the image placeholders, for one, must stay
/// readable as `[圖片]`). Table cells additionally escape `|` at the call
/// site; code content never passes through here.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Length of the longest run of `ch` in `content`.
fn longest_run(content: &str, ch: char) -> usize {
    let mut max_run = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == ch {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 0;
        }
    }
    max_run
}

/// Minimum fence length (at least 3 backticks) that cannot collide with
/// a backtick run inside the code content.
pub fn fence_length(content: &str) -> usize {
    longest_run(content, '`').max(2) + 1
}

/// Minimum backtick count (at least 1) for an inline code span.
pub fn inline_code_ticks(content: &str) -> usize {
    longest_run(content, '`') + 1
}

/// Collapse runs of three or more newlines down to exactly two, then trim
/// surrounding whitespace. Idempotent.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push(c);
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}
