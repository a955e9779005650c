use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};
use thiserror::Error;

/// Anonymous placeholder used by positional templates.
pub const MARKER: &str = "<*>";

// Escaped form of MARKER as produced by regex::escape
const ESCAPED_MARKER: &str = r"<\*>";

// Wildcard substituted for every escaped marker
const WILDCARD: &str = "(.+)";

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    // {name} where name is any run of non-brace characters
    Regex::new(r"\{([^{}]+)\}").unwrap()
});

/// Variable name -> value, in the order the model assigned them.
pub type Variables = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template has {markers} placeholders but {names} variable names were supplied")]
pub struct ArityError {
    pub markers: usize,
    pub names: usize,
}

/// Erases placeholder names: `Failed password for {user}` -> `Failed password for <*>`.
pub fn to_positional(semantic: &str) -> String {
    RE_PLACEHOLDER.replace_all(semantic, NoExpand(MARKER)).into_owned()
}

/// Builds the regex source for a positional template.
///
/// Literal text is escaped first, then each escaped marker becomes a capturing
/// wildcard. Substituting before escaping would turn the wildcards into literals.
pub fn to_pattern(positional: &str) -> String {
    regex::escape(positional).replace(ESCAPED_MARKER, WILDCARD)
}

/// Names placeholders left to right. Fails when the marker count differs from
/// the number of names.
pub fn to_semantic<S: AsRef<str>>(positional: &str, names: &[S]) -> Result<String, ArityError> {
    let markers = marker_count(positional);
    if markers != names.len() {
        return Err(ArityError { markers, names: names.len() });
    }
    let mut out = String::with_capacity(positional.len());
    let mut parts = positional.split(MARKER);
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for (part, name) in parts.zip(names) {
        out.push('{');
        out.push_str(name.as_ref());
        out.push('}');
        out.push_str(part);
    }
    Ok(out)
}

/// Substitutes each `{name}` with its value. Unknown names are left untouched.
pub fn render(semantic: &str, variables: &Variables) -> String {
    RE_PLACEHOLDER
        .replace_all(semantic, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub fn is_reversible(semantic: &str, variables: &Variables, line: &str) -> bool {
    render(semantic, variables) == line
}

pub fn marker_count(positional: &str) -> usize {
    positional.matches(MARKER).count()
}

/// Placeholder names in order of appearance, repeats included.
pub fn placeholder_names(semantic: &str) -> Vec<&str> {
    RE_PLACEHOLDER
        .captures_iter(semantic)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}
