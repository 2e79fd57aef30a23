use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::{ListStyleType, Options};

pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

/// Allow-list sanitizer applied to every rendered post body.
///
/// Anything not listed is dropped, which removes `<script>`, `<iframe>`,
/// `<style>`, `on*` handler attributes and non-http(s) link schemes.
pub(crate) fn build_post_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "ins",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
        "del",
        "mark",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("img", &["title", "width", "height", "alt", "loading"]);
    builder.add_tag_attributes("code", &["class"]);
    builder.add_tag_attributes("pre", &["class"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);

    builder.url_schemes(HashSet::from(["http", "https", "mailto"]));

    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.tasklist_classes = true;
    render.list_style = ListStyleType::Dash;
    // Raw HTML is passed through and removed by the sanitizer afterwards.
    render.r#unsafe = true;
    render.sourcepos = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_strips_script_capable_constructs() {
        let sanitizer = build_post_sanitizer();
        let dirty = concat!(
            "<p onclick=\"steal()\">hi</p>",
            "<script>alert(1)</script>",
            "<iframe src=\"https://evil.example\"></iframe>",
            "<style>body { display: none }</style>",
            "<a href=\"javascript:alert(1)\">x</a>",
        );
        let clean = sanitizer.clean(dirty).to_string();

        assert!(!clean.contains("<script"));
        assert!(!clean.contains("alert(1)"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("<iframe"));
        assert!(!clean.contains("<style"));
        assert!(!clean.contains("javascript:"));
        assert!(clean.contains("<p>hi</p>"));
    }

    #[test]
    fn sanitizer_keeps_highlighting_classes() {
        let sanitizer = build_post_sanitizer();
        let html = "<pre class=\"syntax-highlight\"><code class=\"language-rust\"><span class=\"syntax-keyword\">fn</span></code></pre>";
        assert_eq!(sanitizer.clean(html).to_string(), html);
    }

    #[test]
    fn sanitizer_preserves_strikethrough() {
        let sanitizer = build_post_sanitizer();
        assert_eq!(sanitizer.clean("<del>old</del>").to_string(), "<del>old</del>");
    }
}
