//! Markup → Markdown normalizer.
//!
//! `normalize` parses the fragment into a DOM, drops non-content subtrees and
//! walks what is left (see `render`). Input without any HTML tag is taken as
//! already-normalized text and only gets the final cleanup.
//!
//! Output never contains a sequence that would read as a tag or as one of the
//! decoded entities: those are written back as `&lt;` / `&amp;`. Feeding the
//! result through `normalize` again is therefore a no-op.

mod render;

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Start of an HTML tag, comment or CDATA section. `Vec<T>` or `a < b` don't match.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(?:/?(?:a|abbr|address|article|aside|b|blockquote|body|br|button|caption|center|code|col|dd|del|details|div|dl|dt|em|embed|figcaption|figure|font|footer|form|h[1-6]|head|header|hr|html|i|iframe|img|input|ins|kbd|label|li|main|mark|nav|noscript|object|ol|option|p|pre|q|s|samp|script|section|select|small|span|strike|strong|style|sub|summary|sup|svg|table|tbody|td|template|textarea|tfoot|th|thead|time|title|tr|u|ul|var)(?:[\s/>]|$)|!--|!\[CDATA\[)",
    )
    .unwrap()
});
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(amp|lt|gt|quot|#39|nbsp);").unwrap());

/// Convert a fragment of markup to Markdown. Never fails; malformed input
/// degrades to whatever text can be recovered.
pub fn normalize(markup: &str) -> String {
    if !TAG_RE.is_match(markup) {
        return finish(&escape(&decode_entities(markup)));
    }

    let markup = COMMENT_RE.replace_all(markup, "");
    let markup = CDATA_RE.replace_all(&markup, "");

    let fragment = Html::parse_fragment(&markup);
    let mut renderer = render::Renderer::new();
    renderer.children(fragment.root_element(), 0);
    finish(&escape(&renderer.finish()))
}

/// Final cleanup: trailing whitespace per line, at most one blank line in a
/// row, no leading/trailing whitespace.
fn finish(text: &str) -> String {
    let text = text
        .replace('\u{a0}', " ")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANKS_RE.replace_all(&text, "\n\n").trim().to_string()
}

/// Inverse of `decode_entities` for the sequences it would otherwise change,
/// plus anything that would re-parse as a tag.
fn escape(text: &str) -> String {
    let text = ENTITY_RE.replace_all(text, "&amp;$1;");
    TAG_RE
        .replace_all(&text, |caps: &regex::Captures| format!("&lt;{}", &caps[0][1..]))
        .into_owned()
}

/// Decode the handful of entities that show up in scraped plain text.
/// `&amp;` goes last so `&amp;lt;` decodes once, to `&lt;`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
