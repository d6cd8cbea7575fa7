//! Compound CSS selectors: `tag`, `.class`, `#id`, `[attr]`, `[attr="v"]`,
//! combined without whitespace, and comma-separated lists of those.
//! Combinators are not supported; the marker contract never needs them.

use std::str::FromStr;

use thiserror::Error;

use super::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unsupported selector syntax at '{0}'")]
    Unsupported(String),

    #[error("unterminated attribute selector in '{0}'")]
    UnterminatedAttribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    value: Option<String>,
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alternatives = s
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }
}

impl Selector {
    /// Whether `node` is an element matching any alternative.
    #[must_use]
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((tag, attrs)) = doc.element(node) else {
            return false;
        };
        self.alternatives
            .iter()
            .any(|compound| compound.matches(tag, attrs))
    }
}

impl Compound {
    fn matches(&self, tag: &str, attrs: &[(String, String)]) -> bool {
        let attr = |name: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_list = attr("class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|c| class_list.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attrs.iter().all(|cond| match (&cond.value, attr(&cond.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(want), Some(have)) => want == have,
        })
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !is_ident(c)).unwrap_or(s.len())
}

fn parse_compound(src: &str) -> Result<Compound, SelectorError> {
    if src.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut compound = Compound::default();
    let mut rest = src;

    let tag_len = ident_len(rest);
    if tag_len > 0 {
        compound.tag = Some(rest[..tag_len].to_ascii_lowercase());
        rest = &rest[tag_len..];
    } else if let Some(stripped) = rest.strip_prefix('*') {
        rest = stripped;
    }

    while let Some(first) = rest.chars().next() {
        match first {
            '.' | '#' => {
                let body = &rest[1..];
                let len = ident_len(body);
                if len == 0 {
                    return Err(SelectorError::Unsupported(rest.to_owned()));
                }
                let ident = body[..len].to_owned();
                if first == '.' {
                    compound.classes.push(ident);
                } else {
                    compound.id = Some(ident);
                }
                rest = &body[len..];
            }
            '[' => {
                let end = rest
                    .find(']')
                    .ok_or_else(|| SelectorError::UnterminatedAttribute(src.to_owned()))?;
                let inner = &rest[1..end];
                let condition = match inner.split_once('=') {
                    Some((name, value)) => AttrCondition {
                        name: name.trim().to_ascii_lowercase(),
                        value: Some(unquote(value.trim()).to_owned()),
                    },
                    None => AttrCondition {
                        name: inner.trim().to_ascii_lowercase(),
                        value: None,
                    },
                };
                if condition.name.is_empty() {
                    return Err(SelectorError::Unsupported(rest.to_owned()));
                }
                compound.attrs.push(condition);
                rest = &rest[end + 1..];
            }
            _ => return Err(SelectorError::Unsupported(rest.to_owned())),
        }
    }

    Ok(compound)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
