//! Tokenizer for the HTML fragments the widget API returns and for host
//! pages loaded from disk.
//!
//! Not an HTML5 parser. Unknown constructs degrade to text and unmatched
//! close tags are dropped by the tree builder. `<script>` and `<style>`
//! bodies are kept verbatim.

use std::sync::LazyLock;

use regex::Regex;

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^<([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("valid regex")
});
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});
static CLOSE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</([A-Za-z][A-Za-z0-9-]*)\s*>").expect("valid regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<!--(.*?)-->").expect("valid regex"));
static DECLARATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<[!?][^>]*>").expect("valid regex"));

pub(crate) const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is not markup.
pub(crate) const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Open {
        tag: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
    Comment(String),
}

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub(crate) fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            push_text(&mut tokens, &decode_entities(&rest[..end]));
            rest = &rest[end..];
            continue;
        }

        if let Some(cap) = COMMENT_RE.captures(rest) {
            tokens.push(Token::Comment(cap[1].to_owned()));
            rest = &rest[cap[0].len()..];
            continue;
        }

        if let Some(cap) = CLOSE_TAG_RE.captures(rest) {
            tokens.push(Token::Close(cap[1].to_ascii_lowercase()));
            rest = &rest[cap[0].len()..];
            continue;
        }

        if let Some(cap) = OPEN_TAG_RE.captures(rest) {
            let tag = cap[1].to_ascii_lowercase();
            let attrs = parse_attrs(cap.get(2).map_or("", |m| m.as_str()));
            let self_closing = !cap[3].is_empty();
            rest = &rest[cap[0].len()..];

            if is_raw_text(&tag) && !self_closing {
                let (body, after) = split_raw_text(rest, &tag);
                tokens.push(Token::Open {
                    tag: tag.clone(),
                    attrs,
                    self_closing: false,
                });
                if !body.is_empty() {
                    tokens.push(Token::Text(body.to_owned()));
                }
                tokens.push(Token::Close(tag));
                rest = after;
            } else {
                tokens.push(Token::Open {
                    tag,
                    attrs,
                    self_closing,
                });
            }
            continue;
        }

        if let Some(m) = DECLARATION_RE.find(rest) {
            rest = &rest[m.end()..];
            continue;
        }

        // A '<' that starts nothing recognisable is literal text.
        push_text(&mut tokens, "<");
        rest = &rest[1..];
    }

    tokens
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(Token::Text(text.to_owned()));
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for cap in ATTR_RE.captures_iter(raw) {
        let name = cap[1].to_ascii_lowercase();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map_or(String::new(), |m| decode_entities(m.as_str()));
        // First occurrence wins, as in browsers.
        if !attrs.iter().any(|(existing, _)| *existing == name) {
            attrs.push((name, value));
        }
    }
    attrs
}

/// Splits raw element content at its closing tag. Returns the body and the
/// input following the closing tag.
fn split_raw_text<'a>(rest: &'a str, tag: &str) -> (&'a str, &'a str) {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{tag}");
    let Some(start) = lower.find(&needle) else {
        return (rest, "");
    };
    let end = lower[start..].find('>').map_or(rest.len(), |p| start + p + 1);
    (&rest[..start], &rest[end..])
}

pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
