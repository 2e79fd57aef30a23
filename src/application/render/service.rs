use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    parse_document,
};

use super::{
    RenderError, RenderService,
    config::{build_post_sanitizer, default_options},
    highlight::HighlighterRegistry,
};

/// Markdown to sanitized HTML, with highlighted fenced code blocks.
///
/// Rendering is pure: the same input always yields byte-identical output.
pub struct MarkdownRenderer {
    options: comrak::Options<'static>,
    registry: HighlighterRegistry,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownRenderer {
    pub fn new(registry: HighlighterRegistry) -> Self {
        Self {
            options: default_options(),
            registry,
            sanitizer: build_post_sanitizer(),
        }
    }

    fn render_unsanitized(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        self.highlight_code_blocks(root)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;
        Ok(html)
    }

    fn highlight_code_blocks<'a>(&self, node: &'a AstNode<'a>) -> Result<(), RenderError> {
        if let Some((info, literal)) = extract_code_block(node) {
            let language = info.split_whitespace().next();
            let html = self.registry.highlight(language, &literal)?;
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.highlight_code_blocks(next)?;
            child = next.next_sibling();
        }

        Ok(())
    }
}

impl RenderService for MarkdownRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let html = self.render_unsanitized(markdown)?;
        Ok(self.sanitizer.clean(&html).to_string())
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}
