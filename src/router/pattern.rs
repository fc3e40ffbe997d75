//! Path pattern compilation.
//!
//! A route URL is a slash-delimited list of segments. Each segment is one of:
//!
//! - `{{name}}` - optional dynamic segment, matches zero or one segment
//! - `{name}` - required dynamic segment, matches exactly one segment
//! - anything else - literal segment
//!
//! URLs with at least one dynamic segment compile to an anchored regular
//! expression; purely literal URLs are not patterns and are routed through the
//! exact-match table instead.

use std::collections::HashMap;

use regex::Regex;

/// Characters allowed inside a dynamic segment: Unicode letters, numbers,
/// marks, and `.`, `@`, `_`, `-`.
const SEGMENT_CLASS: &str = r"[\p{L}\p{N}\p{M}.@_-]";

/// A compiled dynamic URL.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// The anchored expression, evaluated against normalized paths.
    pub regex: Regex,
    /// Parameter name to its 1-based position in `path.split('/')`.
    pub params: HashMap<String, usize>,
}

impl CompiledPattern {
    /// The expression source. Two routes with equal sources are the same route.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// One classified URL segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Required(&'a str),
    Optional(&'a str),
}

impl<'a> Segment<'a> {
    /// Classify a single segment by its brace markers.
    pub fn parse(segment: &'a str) -> Self {
        if let Some(name) = segment
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
        {
            return Segment::Optional(strip_braces(name));
        }
        if let Some(name) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            return Segment::Required(strip_braces(name));
        }
        Segment::Literal(segment)
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Segment::Literal(_))
    }
}

fn strip_braces(name: &str) -> &str {
    name.trim_matches(|c| c == '{' || c == '}')
}

/// Non-empty segments of a URL, in order. Whitespace-only segments count as empty.
pub fn segments(url: &str) -> impl Iterator<Item = &str> {
    url.split('/').filter(|s| !s.trim().is_empty())
}

/// Normalize a URL to a single leading and trailing `/` with no empty segments.
///
/// ```
/// use microroute::router::normalize;
///
/// assert_eq!(normalize("users//42"), "/users/42/");
/// assert_eq!(normalize(""), "/");
/// ```
pub fn normalize(url: &str) -> String {
    let mut normalized = String::with_capacity(url.len() + 2);
    normalized.push('/');
    for segment in segments(url) {
        normalized.push_str(segment);
        normalized.push('/');
    }
    normalized
}

/// Compile a URL into a pattern.
///
/// Returns `None` when the URL has no dynamic segment. Compilation otherwise
/// always succeeds: literal text is escaped, and the dynamic fragments are
/// fixed expressions.
///
/// ```
/// use microroute::router::compile;
///
/// let pattern = compile("/users/{id}/").unwrap();
/// assert!(pattern.is_match("/users/42/"));
/// assert_eq!(pattern.params["id"], 2);
///
/// assert!(compile("/users/").is_none());
/// ```
pub fn compile(url: &str) -> Option<CompiledPattern> {
    let parsed: Vec<Segment<'_>> = segments(url).map(Segment::parse).collect();
    if !parsed.iter().any(Segment::is_dynamic) {
        return None;
    }

    let mut source = String::from("^/");
    let mut params = HashMap::new();

    for (index, segment) in parsed.iter().enumerate() {
        // Position 0 is the empty string before the leading slash.
        let position = index + 1;
        match segment {
            Segment::Optional(name) => {
                source.push_str("?(");
                source.push_str(SEGMENT_CLASS);
                source.push_str("*/)?");
                params.insert((*name).to_string(), position);
            }
            Segment::Required(name) => {
                source.push_str(SEGMENT_CLASS);
                source.push_str("+/");
                params.insert((*name).to_string(), position);
            }
            Segment::Literal(text) => {
                source.push_str(&regex::escape(text));
                source.push('/');
            }
        }
    }

    source.push('$');

    // The fragments above are fixed and literal text is escaped, so the
    // expression is always valid; a failure here would be a bug in this module.
    let regex = Regex::new(&source).ok()?;

    Some(CompiledPattern { regex, params })
}

/// Pull parameter values out of a normalized path by segment position.
///
/// Positions past the end of the path, and positions that land on an empty
/// segment (an absent optional segment), are skipped.
pub fn extract_params(path: &str, positions: &HashMap<String, usize>) -> HashMap<String, String> {
    if positions.is_empty() {
        return HashMap::new();
    }

    let parts: Vec<&str> = path.split('/').collect();
    positions
        .iter()
        .filter_map(|(name, &position)| {
            let value = parts.get(position)?;
            if value.is_empty() {
                None
            } else {
                Some((name.clone(), (*value).to_string()))
            }
        })
        .collect()
}
