use crate::template::{self, Variables};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("completion is empty")]
    Empty,
    #[error("template line has no assignment: {0}")]
    MissingTemplateAssignment(String),
    #[error("variable line has no assignment: {0}")]
    MissingAssignment(String),
    #[error("not a string literal: {0}")]
    InvalidLiteral(String),
    #[error("placeholder {{{0}}} has no assigned value")]
    UnboundPlaceholder(String),
    #[error("template is empty: {0}")]
    EmptyTemplate(String),
}

/// Right-hand side of a `name = value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Quoted(String),
    Bare(String),
}

impl Literal {
    pub fn into_string(self) -> String {
        match self {
            Literal::Quoted(s) | Literal::Bare(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub template: String,
    pub variables: Variables,
}

impl Decoded {
    pub fn positional(&self) -> String {
        template::to_positional(&self.template)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }
}

/// Decodes a reply of the shape
///
/// ```text
/// user = 'root'
/// template = f'Failed password for {user}'
/// ```
///
/// Values are read as string literals only; nothing in the reply is evaluated.
pub fn decode(reply: &str) -> Result<Decoded, DecodeError> {
    let lines = reply_lines(reply);
    let (template_line, variable_lines) = lines.split_last().ok_or(DecodeError::Empty)?;

    let mut variables = Variables::new();
    for line in variable_lines {
        let (name, raw) = line
            .split_once('=')
            .ok_or_else(|| DecodeError::MissingAssignment(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DecodeError::MissingAssignment(line.to_string()));
        }
        let value = parse_literal(raw)
            .ok_or_else(|| DecodeError::InvalidLiteral(line.to_string()))?
            .into_string();
        variables.insert(name.to_string(), value);
    }

    let (_, rhs) = template_line
        .split_once('=')
        .ok_or_else(|| DecodeError::MissingTemplateAssignment(template_line.to_string()))?;

    let template = template_text(rhs);
    if template.trim().is_empty() {
        // an empty pattern would claim every remaining line
        return Err(DecodeError::EmptyTemplate(template_line.to_string()));
    }
    Ok(Decoded { template, variables })
}

/// Like [`decode`], but every placeholder in the template must have a value.
pub fn decode_strict(reply: &str) -> Result<Decoded, DecodeError> {
    let decoded = decode(reply)?;
    if let Some(name) = template::placeholder_names(&decoded.template)
        .into_iter()
        .find(|name| !decoded.variables.contains_key(*name))
    {
        return Err(DecodeError::UnboundPlaceholder(name.to_string()));
    }
    Ok(decoded)
}

fn reply_lines(reply: &str) -> Vec<&str> {
    let reply = reply.trim();
    let reply = reply.strip_prefix("ASSISTANT:").unwrap_or(reply);
    reply
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with("```"))
        .collect()
}

/// Reads a literal as a quoted string or a bare word. `None` when the text
/// opens a quote it never closes, or is empty.
pub fn parse_literal(raw: &str) -> Option<Literal> {
    let raw = raw.trim();
    let first = raw.chars().next()?;
    if first == '\'' || first == '"' {
        if raw.len() < 2 || !raw.ends_with(first) {
            return None;
        }
        let inner = &raw[1..raw.len() - 1];
        return Some(Literal::Quoted(unescape(inner)));
    }
    Some(Literal::Bare(raw.to_string()))
}

fn template_text(rhs: &str) -> String {
    let mut text = rhs.trim();
    let mut fstring = false;
    if let Some(rest) = text.strip_prefix(['f', 'F']) {
        if rest.starts_with(['\'', '"']) {
            text = rest;
            fstring = true;
        }
    }
    let text = match text.chars().next() {
        Some(q @ ('\'' | '"')) if text.len() >= 2 && text.ends_with(q) => {
            &text[1..text.len() - 1]
        }
        // unbalanced quoting: drop whatever quotes are there
        _ => text.trim_matches(['\'', '"']),
    };
    let text = text.replace("\\'", "'").replace("\\\"", "\"");
    if fstring {
        undouble_braces(&text)
    } else {
        text
    }
}

/// f-string literal braces: `{{` -> `{` and `}}` -> `}` outside of fields.
fn undouble_braces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_field = false;
    while let Some(c) = chars.next() {
        match c {
            '{' if !in_field && chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                in_field = true;
                out.push('{');
            }
            '}' if in_field => {
                in_field = false;
                out.push('}');
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(e @ ('\\' | '\'' | '"')) => out.push(e),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
