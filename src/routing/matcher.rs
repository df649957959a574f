//! Path pattern matching module
//!
//! Ant-style templates: `{name}` captures one path segment, `*` matches
//! within a segment, `?` matches one character, and `**` spans any number of
//! segments. Templates are compiled once when the routing table is built.

use regex::Regex;
use std::collections::HashMap;

use crate::error::RegistryError;

const SEPARATOR: char = '/';

/// Variables extracted from a matched path
pub type PathVariables = HashMap<String, String>;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    /// Wildcards and/or variables within one segment
    Pattern { regex: Regex, variables: Vec<String> },
    /// `**`
    AnyPath,
}

/// A compiled path template
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
    absolute: bool,
    trailing_separator: bool,
}

impl PathPattern {
    pub fn parse(template: &str) -> Result<Self, RegistryError> {
        let segments = tokenize(template)
            .map(|token| compile_segment(template, token))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            template: template.to_string(),
            segments,
            absolute: template.starts_with(SEPARATOR),
            trailing_separator: template.ends_with(SEPARATOR),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn matches(&self, path: &str) -> bool {
        self.extract(path).is_some()
    }

    /// Match `path` and return the template variables it binds
    pub fn extract(&self, path: &str) -> Option<PathVariables> {
        if path.starts_with(SEPARATOR) != self.absolute {
            return None;
        }

        let parts: Vec<&str> = tokenize(path).collect();
        let mut bound = Vec::new();
        if !match_segments(&self.segments, &parts, &mut bound) {
            return None;
        }

        let ends_with_any = matches!(self.segments.last(), Some(Segment::AnyPath));
        if !ends_with_any && path.ends_with(SEPARATOR) != self.trailing_separator {
            return None;
        }

        Some(bound.into_iter().collect())
    }
}

fn tokenize(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

fn match_segments(
    segments: &[Segment],
    parts: &[&str],
    bound: &mut Vec<(String, String)>,
) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return parts.is_empty();
    };

    match segment {
        Segment::AnyPath => {
            for skip in 0..=parts.len() {
                let mark = bound.len();
                if match_segments(rest, &parts[skip..], bound) {
                    return true;
                }
                bound.truncate(mark);
            }
            false
        }
        Segment::Literal(literal) => match parts.split_first() {
            Some((part, remaining)) if part == literal => match_segments(rest, remaining, bound),
            _ => false,
        },
        Segment::Pattern { regex, variables } => {
            let Some((part, remaining)) = parts.split_first() else {
                return false;
            };
            let Some(captures) = regex.captures(part) else {
                return false;
            };

            let mark = bound.len();
            for (name, capture) in variables.iter().zip(captures.iter().skip(1)) {
                let value = capture.map_or("", |m| m.as_str());
                bound.push((name.clone(), value.to_string()));
            }
            if match_segments(rest, remaining, bound) {
                return true;
            }
            bound.truncate(mark);
            false
        }
    }
}

fn compile_segment(template: &str, token: &str) -> Result<Segment, RegistryError> {
    if token == "**" {
        return Ok(Segment::AnyPath);
    }
    if !token.contains(['*', '?', '{']) {
        return Ok(Segment::Literal(token.to_string()));
    }

    let invalid = |reason: &str| RegistryError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from("^");
    let mut variables = Vec::new();
    let mut literal = String::new();
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' | '?' | '{' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
            }
            _ => {
                literal.push(c);
                continue;
            }
        }

        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => {
                let body = read_variable(&mut chars).ok_or_else(|| invalid("unclosed '{'"))?;
                let (name, custom) = match body.split_once(':') {
                    Some((name, custom)) => (name, Some(custom)),
                    None => (body.as_str(), None),
                };
                if name.is_empty() {
                    return Err(invalid("empty variable name"));
                }
                pattern.push('(');
                pattern.push_str(custom.unwrap_or(".*"));
                pattern.push(')');
                variables.push(name.to_string());
            }
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
    if regex.captures_len() != variables.len() + 1 {
        return Err(invalid("capturing groups are not allowed in variable patterns"));
    }
    Ok(Segment::Pattern { regex, variables })
}

/// Read up to the matching '}' (nested braces belong to a custom pattern)
fn read_variable(chars: &mut std::str::Chars<'_>) -> Option<String> {
    let mut depth = 1;
    let mut body = String::new();
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body);
                }
            }
            _ => {}
        }
        body.push(c);
    }
    None
}
