//! Markdown rendering and title extraction for generated posts.
//!
//! Uses pulldown-cmark for CommonMark parsing. Fenced code is part of
//! CommonMark; tables and strikethrough are enabled as extensions.

use pulldown_cmark::{Options, Parser, html};

/// Title used when a post has no top-level heading.
pub const UNTITLED: &str = "Untitled";

/// Render Markdown to HTML.
#[tracing::instrument(skip_all, fields(input_len = markdown.len()))]
pub fn render_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// The text of the first `# ` heading line, or [`UNTITLED`].
///
/// Lines are scanned in order and trimmed before matching, so an indented
/// `# Title` still counts. `## Sub` does not.
pub fn extract_title(markdown: &str) -> String {
    markdown
        .lines()
        .find_map(|line| line.trim().strip_prefix("# "))
        .map_or_else(|| UNTITLED.to_string(), |title| title.trim().to_string())
}
