//! Expression syntax
//!
//! ```text
//! expr := term (',' term)*
//! term := name ('/' pattern ('+' pattern)*)?
//! ```
//!
//! `guidelines,policies` is a union, `docs/api*+guide*` overrides the
//! patterns of `docs` with two globs, and `guidelines/security` narrows to a
//! subdirectory when one exists.

use crate::error::{GuideError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub name: String,
    /// Patterns after the `/`, if any
    pub patterns: Option<Vec<String>>,
    /// Byte offset of the term in the original input
    pub position: usize,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(invalid(input, 0, "expression is empty"));
        }

        let mut terms = Vec::new();
        let mut offset = 0;
        for raw in input.split(',') {
            terms.push(Term::parse_at(raw, offset)?);
            offset += raw.len() + 1;
        }
        Ok(Self { terms })
    }
}

impl Term {
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_at(input, 0)
    }

    fn parse_at(raw: &str, offset: usize) -> Result<Self> {
        let leading = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        let position = offset + leading;

        if text.is_empty() {
            return Err(invalid(raw, offset, "empty term"));
        }

        let (name, rest) = match text.split_once('/') {
            Some((name, rest)) => (name, Some(rest)),
            None => (text, None),
        };

        if name.is_empty() {
            return Err(invalid(text, position, "missing name before '/'"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid(name, position, "name must not contain whitespace"));
        }
        if let Some(at) = name.find('+') {
            return Err(invalid(name, position + at, "'+' outside a pattern list"));
        }

        let patterns = match rest {
            Some(rest) => Some(parse_patterns_at(rest, position + name.len() + 1)?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            patterns,
            position,
        })
    }
}

/// Parse a `+`-joined pattern list such as a call-site override.
///
/// Blank input means "no override".
pub fn parse_pattern_override(input: &str) -> Result<Option<Vec<String>>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_patterns_at(input, 0).map(Some)
}

fn parse_patterns_at(input: &str, offset: usize) -> Result<Vec<String>> {
    if input.trim().is_empty() {
        return Err(invalid(input, offset, "empty pattern after '/'"));
    }

    let mut patterns = Vec::new();
    let mut position = offset;
    for part in input.split('+') {
        let pattern = part.trim();
        if pattern.is_empty() {
            return Err(invalid(input, position, "empty pattern between '+'"));
        }
        patterns.push(pattern.to_string());
        position += part.len() + 1;
    }
    Ok(patterns)
}

fn invalid(segment: &str, position: usize, reason: &str) -> GuideError {
    GuideError::InvalidExpression {
        segment: segment.to_string(),
        position,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(expr: &Expression) -> Vec<&str> {
        expr.terms.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_bare_name() {
        let expr = Expression::parse("guidelines").unwrap();
        assert_eq!(names(&expr), vec!["guidelines"]);
        assert!(expr.terms[0].patterns.is_none());
    }

    #[test]
    fn test_union_with_whitespace() {
        let expr = Expression::parse("guidelines, policies").unwrap();
        assert_eq!(names(&expr), vec!["guidelines", "policies"]);
        assert_eq!(expr.terms[1].position, 12);
    }

    #[test]
    fn test_pattern_override() {
        let expr = Expression::parse("docs/api*+guide*").unwrap();
        assert_eq!(
            expr.terms[0].patterns,
            Some(vec!["api*".to_string(), "guide*".to_string()])
        );
    }

    #[test]
    fn test_pattern_may_contain_slashes() {
        let term = Term::parse("docs/security/*.md").unwrap();
        assert_eq!(term.name, "docs");
        assert_eq!(term.patterns, Some(vec!["security/*.md".to_string()]));
    }

    #[test]
    fn test_invalid_expressions() {
        let inputs = [
            "", "   ", "a,,b", "a,", "/pattern", "docs/", "docs/a++b", "docs/a+", "two words",
            "docs+guides",
        ];
        for input in inputs {
            let err = Expression::parse(input).unwrap_err();
            assert!(
                matches!(err, GuideError::InvalidExpression { .. }),
                "expected invalid expression for {:?}, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_error_points_at_offending_segment() {
        match Expression::parse("guidelines,,policies").unwrap_err() {
            GuideError::InvalidExpression { position, .. } => assert_eq!(position, 11),
            other => panic!("unexpected error: {:?}", other),
        }
        match Expression::parse("docs/a++b").unwrap_err() {
            GuideError::InvalidExpression { position, .. } => assert_eq!(position, 7),
            other => panic!("unexpected error: {:?}", other),
        }
        match Expression::parse("guidelines, docs+guides").unwrap_err() {
            GuideError::InvalidExpression { segment, position, .. } => {
                assert_eq!(segment, "docs+guides");
                assert_eq!(position, 16);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_pattern_override() {
        assert_eq!(parse_pattern_override("").unwrap(), None);
        assert_eq!(
            parse_pattern_override("*.md+*.txt").unwrap(),
            Some(vec!["*.md".to_string(), "*.txt".to_string()])
        );
        assert!(parse_pattern_override("*.md+").is_err());
    }
}
