use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use syntect::{
    dumps::from_uncompressed_data,
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use super::RenderError;

const PLAIN_TEXT_TAG: &str = "text";

static SYNTAX_PACK: OnceCell<Arc<SyntaxSet>> = OnceCell::new();

/// Immutable mapping from fence language tags to syntax definitions.
///
/// Built once from the bundled syntax pack and shared by every render.
/// Tags are matched case-insensitively; unmapped tags render as plain text.
#[derive(Clone)]
pub struct HighlighterRegistry {
    syntax_set: Arc<SyntaxSet>,
    by_tag: BTreeMap<String, String>,
    class_style: ClassStyle,
}

impl std::fmt::Debug for HighlighterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlighterRegistry")
            .field("languages", &self.by_tag.len())
            .finish()
    }
}

impl HighlighterRegistry {
    /// Registry over every syntax in the bundled pack.
    pub fn bundled() -> Result<Self, RenderError> {
        Self::from_syntax_set(load_syntax_pack()?, None)
    }

    /// Registry restricted to `languages`. Tags the pack does not know are
    /// ignored.
    pub fn bundled_with<S: AsRef<str>>(languages: &[S]) -> Result<Self, RenderError> {
        let allow: Vec<String> = languages
            .iter()
            .map(|tag| tag.as_ref().trim().to_ascii_lowercase())
            .collect();
        Self::from_syntax_set(load_syntax_pack()?, Some(&allow))
    }

    fn from_syntax_set(
        syntax_set: Arc<SyntaxSet>,
        allow: Option<&[String]>,
    ) -> Result<Self, RenderError> {
        let mut by_tag = BTreeMap::new();
        for syntax in syntax_set.syntaxes() {
            let tags = std::iter::once(syntax.name.to_ascii_lowercase()).chain(
                syntax
                    .file_extensions
                    .iter()
                    .map(|ext| ext.to_ascii_lowercase()),
            );
            for tag in tags {
                if allow.is_some_and(|allow| !allow.contains(&tag)) {
                    continue;
                }
                by_tag.entry(tag).or_insert_with(|| syntax.name.clone());
            }
        }

        Ok(Self {
            syntax_set,
            by_tag,
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        })
    }

    pub fn knows(&self, tag: &str) -> bool {
        self.by_tag.contains_key(&tag.to_ascii_lowercase())
    }

    fn syntax_for(&self, tag: Option<&str>) -> (&SyntaxReference, String) {
        let resolved = tag.map(str::to_ascii_lowercase).and_then(|tag| {
            let name = self.by_tag.get(&tag)?;
            let syntax = self.syntax_set.find_syntax_by_name(name)?;
            Some((syntax, tag))
        });
        resolved.unwrap_or_else(|| {
            (
                self.syntax_set.find_syntax_plain_text(),
                PLAIN_TEXT_TAG.to_string(),
            )
        })
    }

    /// Render a fenced code block as classed HTML.
    pub(crate) fn highlight(&self, language: Option<&str>, code: &str) -> Result<String, RenderError> {
        let (syntax, lang_token) = self.syntax_for(language);

        let mut code_with_newline = code.to_string();
        if !code_with_newline.ends_with('\n') {
            code_with_newline.push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, self.class_style);

        for line in LinesWithEndings::from(code_with_newline.as_str()) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| RenderError::Highlighting {
                    language: lang_token.clone(),
                    message: err.to_string(),
                })?;
        }

        let highlighted = generator.finalize();
        Ok(format!(
            "<pre class=\"syntax-highlight syntax-lang-{lang_token}\"><code class=\"language-{lang_token} syntax-code\">{highlighted}</code></pre>"
        ))
    }
}

fn load_syntax_pack() -> Result<Arc<SyntaxSet>, RenderError> {
    SYNTAX_PACK
        .get_or_try_init(|| {
            let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
            from_uncompressed_data(syntax_bytes)
                .map(Arc::new)
                .map_err(|err| RenderError::SyntaxPack {
                    message: err.to_string(),
                })
        })
        .cloned()
}
