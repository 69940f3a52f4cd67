//! Markdown engine backed by pulldown-cmark.

use super::context::Context;
use super::engine::{RenderError, Renderer, SourceDescriptor};
use pulldown_cmark::{Options, Parser, html as md_html};

/// Renders Markdown to HTML. The context is not consulted; chain a template
/// extension after it (`page.html.tpl.md`) to interpolate values.
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
    }
}

impl Renderer for MarkdownRenderer {
    fn extensions(&self) -> &[&'static str] {
        &["md", "markdown"]
    }

    fn render(
        &self,
        _source: &SourceDescriptor<'_>,
        template: &str,
        _context: &Context<'_>,
    ) -> Result<Option<String>, RenderError> {
        let parser = Parser::new_ext(template, Self::options());
        let mut html = String::new();
        md_html::push_html(&mut html, parser);
        Ok(Some(html))
    }
}
