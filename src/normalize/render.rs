use scraper::node::{Element, Node};
use scraper::ElementRef;

/// Elements dropped together with everything inside them.
const REMOVED_TAGS: &[&str] = &[
    "button", "input", "form", "select", "textarea", "script", "style", "noscript", "template",
    "svg", "iframe", "object", "embed", "nav",
];

/// Class-name fragments that mark decorative containers.
const REMOVED_CLASS_PARTS: &[&str] = &["button", "social", "share"];

/// Elements that start their own line(s) when they appear inside a container.
const STRUCTURAL_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "div", "section", "article", "main", "header",
    "footer", "aside", "ul", "ol", "li", "pre", "blockquote", "hr", "table", "tr", "dl", "figure",
];

/// Text-level elements rendered inside a line.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "br", "cite", "code", "del", "em", "font", "i", "img", "ins", "label",
    "mark", "q", "s", "small", "span", "strong", "sub", "sup", "time", "u",
];

pub(super) fn is_removed(el: &Element) -> bool {
    let name = el.name();
    if REMOVED_TAGS.contains(&name) {
        return true;
    }
    if el
        .attr("role")
        .is_some_and(|role| role.eq_ignore_ascii_case("button"))
    {
        return true;
    }
    el.classes().any(|class| {
        let class = class.to_ascii_lowercase();
        REMOVED_CLASS_PARTS.iter().any(|part| class.contains(part))
    })
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Any kept descendant that needs its own line?
fn has_structure(el: ElementRef) -> bool {
    el.children().filter_map(ElementRef::wrap).any(|child| {
        if is_removed(child.value()) {
            return false;
        }
        STRUCTURAL_TAGS.contains(&child.value().name()) || has_structure(child)
    })
}

fn is_inline(el: ElementRef) -> bool {
    INLINE_TAGS.contains(&el.value().name()) && !has_structure(el)
}

/// Whitespace runs collapse to one space, as a browser would lay them out.
fn collapse_ws(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

/// Trim every line of an inline run, dropping the outer blank ones.
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Wrap `inner` in `marker`, keeping the whitespace that surrounded it outside.
fn wrap(marker: &str, inner: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return if inner.is_empty() { String::new() } else { " ".into() };
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

/// Render the text-level content of `el`'s children.
fn inline_children(el: ElementRef) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&collapse_ws(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    out.push_str(&inline_element(child));
                }
            }
            _ => {}
        }
    }
    out
}

fn inline_element(el: ElementRef) -> String {
    let value = el.value();
    if is_removed(value) {
        return String::new();
    }
    match value.name() {
        "strong" | "b" => wrap("**", &inline_children(el)),
        "em" | "i" => wrap("*", &inline_children(el)),
        "code" => wrap("`", &inline_children(el)),
        "a" => {
            let text = inline_children(el);
            let label = text.trim();
            let href = value.attr("href").map(str::trim).unwrap_or("");
            if !label.is_empty() && !href.is_empty() {
                format!("[{}]({})", label, href)
            } else {
                text
            }
        }
        "img" => match value.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
            Some(src) => {
                let alt = value
                    .attr("alt")
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or("Image");
                format!("![{}]({})", alt, src)
            }
            None => String::new(),
        },
        "br" => "\n".to_string(),
        _ => inline_children(el),
    }
}

/// Accumulates Markdown lines while walking block structure.
pub(super) struct Renderer {
    lines: Vec<String>,
}

impl Renderer {
    pub(super) fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines joined with newlines; blank-line cleanup happens afterwards.
    pub(super) fn finish(self) -> String {
        self.lines.join("\n")
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn flush(&mut self, run: &mut String) {
        let text = tidy_lines(run);
        if !text.is_empty() {
            self.push(text);
        }
        run.clear();
    }

    /// Walk the children of a container, grouping text-level runs into lines.
    pub(super) fn children(&mut self, el: ElementRef, depth: usize) {
        let mut run = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => run.push_str(&collapse_ws(text)),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_inline(child) {
                        run.push_str(&inline_element(child));
                    } else {
                        self.flush(&mut run);
                        self.block(child, depth);
                    }
                }
                _ => {}
            }
        }
        self.flush(&mut run);
    }

    fn block(&mut self, el: ElementRef, depth: usize) {
        let value = el.value();
        if is_removed(value) {
            return;
        }
        let name = value.name();

        if let Some(level) = heading_level(name) {
            let text = tidy_lines(&inline_children(el)).replace('\n', " ");
            if !text.is_empty() {
                self.push(format!("\n{} {}\n", "#".repeat(level), text));
            }
            return;
        }

        match name {
            "ul" | "ol" => self.list(el, depth),
            "pre" => {
                let text: String = el.text().collect();
                let text = text.trim_matches('\n');
                if !text.trim().is_empty() {
                    self.push(format!("\n```\n{}\n```\n", text));
                }
            }
            "blockquote" => {
                let mut inner = Renderer::new();
                inner.children(el, depth);
                let quoted = super::finish(&inner.finish());
                if !quoted.is_empty() {
                    let lines: Vec<String> = quoted
                        .lines()
                        .map(|l| if l.is_empty() { ">".into() } else { format!("> {}", l) })
                        .collect();
                    self.push(format!("\n{}\n", lines.join("\n")));
                }
            }
            "hr" => self.push("\n---\n".into()),
            "br" => self.push("\n".into()),
            _ if has_structure(el) => self.children(el, depth),
            _ => {
                let text = tidy_lines(&inline_children(el));
                if !text.is_empty() {
                    self.push(format!("\n{}\n", text));
                }
            }
        }
    }

    fn list(&mut self, el: ElementRef, depth: usize) {
        let ordered = el.value().name() == "ol";
        let indent = "  ".repeat(depth);
        if depth == 0 {
            self.push("\n".into());
        }

        let mut n = 0;
        for child in el.children().filter_map(ElementRef::wrap) {
            let value = child.value();
            if is_removed(value) {
                continue;
            }
            match value.name() {
                "li" => {
                    n += 1;
                    let marker = if ordered { format!("{}. ", n) } else { "- ".to_string() };
                    let text = item_text(child);
                    self.push(format!("{}{}{}", indent, marker, text));
                    for nested in child.children().filter_map(ElementRef::wrap) {
                        if matches!(nested.value().name(), "ul" | "ol") {
                            self.list(nested, depth + 1);
                        }
                    }
                }
                // Lists nested directly in lists show up in scraped markup.
                "ul" | "ol" => self.list(child, depth + 1),
                _ => {}
            }
        }

        if depth == 0 {
            self.push("\n".into());
        }
    }
}

/// One list item's text without its nested lists, on a single line.
fn item_text(li: ElementRef) -> String {
    let mut out = String::new();
    for child in li.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&collapse_ws(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if matches!(child.value().name(), "ul" | "ol") {
                        continue;
                    }
                    if is_inline(child) {
                        out.push_str(&inline_element(child));
                    } else {
                        out.push(' ');
                        out.push_str(&inline_element(child));
                        out.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
    collapse_ws(out.trim())
}
