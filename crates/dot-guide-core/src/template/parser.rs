//! Mustache-style template parser.
//!
//! Supported tags: `{{name}}`, `{{{name}}}`, `{{&name}}`, `{{#name}}`,
//! `{{^name}}`, `{{/name}}`, `{{>partial}}` and `{{! comment }}`.
//! Section, inverted, closing, comment and partial tags that sit alone on a
//! line take the whole line with them.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Variable {
        name: String,
    },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
        /// Unparsed text between the opening and closing tags
        raw: String,
    },
    Partial {
        name: String,
        /// Leading whitespace of a standalone partial tag
        indent: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Variable,
    Section,
    Inverted,
    Close,
    Partial,
    Comment,
}

impl TagKind {
    fn can_stand_alone(self) -> bool {
        !matches!(self, TagKind::Variable)
    }
}

#[derive(Debug)]
struct Tag {
    kind: TagKind,
    name: String,
    /// Byte range the tag consumes (widened for standalone tags)
    start: usize,
    end: usize,
    /// Position of the `{{` for error reporting
    open: usize,
    indent: String,
}

pub fn parse(source: &str) -> Result<Template, ParseError> {
    let mut tags = lex(source)?;
    mark_standalone(source, &mut tags);
    build(source, tags)
}

fn lex(source: &str) -> Result<Vec<Tag>, ParseError> {
    let mut tags = Vec::new();
    let mut cursor = 0;

    while let Some(found) = source[cursor..].find("{{") {
        let open = cursor + found;
        let after_open = open + 2;

        let (inner, end) = if source[after_open..].starts_with('{') {
            let close = source[after_open + 1..]
                .find("}}}")
                .ok_or_else(|| error_at(source, open, "unclosed '{{{' tag"))?;
            let inner_start = after_open + 1;
            let inner_end = inner_start + close;
            (format!("&{}", &source[inner_start..inner_end]), inner_end + 3)
        } else {
            let close = source[after_open..]
                .find("}}")
                .ok_or_else(|| error_at(source, open, "unclosed '{{' tag"))?;
            let inner_end = after_open + close;
            (source[after_open..inner_end].to_string(), inner_end + 2)
        };

        let inner = inner.trim();
        let (kind, name) = match inner.chars().next() {
            Some('#') => (TagKind::Section, &inner[1..]),
            Some('^') => (TagKind::Inverted, &inner[1..]),
            Some('/') => (TagKind::Close, &inner[1..]),
            Some('>') => (TagKind::Partial, &inner[1..]),
            Some('!') => (TagKind::Comment, &inner[1..]),
            Some('&') => (TagKind::Variable, &inner[1..]),
            Some('=') => {
                return Err(error_at(source, open, "set-delimiter tags are not supported"));
            }
            _ => (TagKind::Variable, inner),
        };
        let name = name.trim();

        if kind != TagKind::Comment {
            if name.is_empty() {
                return Err(error_at(source, open, "empty tag"));
            }
            if name.chars().any(char::is_whitespace) {
                return Err(error_at(
                    source,
                    open,
                    &format!("tag name '{}' must not contain whitespace", name),
                ));
            }
        }

        tags.push(Tag {
            kind,
            name: name.to_string(),
            start: open,
            end,
            open,
            indent: String::new(),
        });
        cursor = end;
    }

    Ok(tags)
}

/// Widen standalone tags so they swallow their line.
fn mark_standalone(source: &str, tags: &mut [Tag]) {
    let original: Vec<(usize, usize)> = tags.iter().map(|t| (t.start, t.end)).collect();

    for i in 0..tags.len() {
        if !tags[i].kind.can_stand_alone() {
            continue;
        }
        let (start, end) = original[i];

        let line_start = source[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let line_end = source[end..].find('\n').map(|p| end + p).unwrap_or(source.len());

        let prev_end = if i > 0 { original[i - 1].1 } else { 0 };
        let next_start = original.get(i + 1).map(|t| t.0).unwrap_or(source.len());
        if prev_end > line_start || next_start < line_end {
            continue;
        }

        let before = &source[line_start..start];
        let after = &source[end..line_end];
        if !is_blank(before) || !is_blank(after) {
            continue;
        }

        tags[i].indent = before.to_string();
        tags[i].start = line_start;
        tags[i].end = if line_end < source.len() {
            line_end + 1
        } else {
            line_end
        };
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

struct OpenSection {
    name: String,
    inverted: bool,
    children: Vec<Node>,
    raw_start: usize,
    open: usize,
}

fn build(source: &str, tags: Vec<Tag>) -> Result<Template, ParseError> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenSection> = Vec::new();
    let mut cursor = 0;

    for tag in tags {
        let nodes = match stack.last_mut() {
            Some(section) => &mut section.children,
            None => &mut root,
        };
        if tag.start > cursor {
            nodes.push(Node::Text(source[cursor..tag.start].to_string()));
        }
        cursor = tag.end;

        match tag.kind {
            TagKind::Variable => nodes.push(Node::Variable { name: tag.name }),
            TagKind::Partial => nodes.push(Node::Partial {
                name: tag.name,
                indent: tag.indent,
            }),
            TagKind::Comment => {}
            TagKind::Section | TagKind::Inverted => stack.push(OpenSection {
                name: tag.name,
                inverted: tag.kind == TagKind::Inverted,
                children: Vec::new(),
                raw_start: tag.end,
                open: tag.open,
            }),
            TagKind::Close => {
                let section = stack.pop().ok_or_else(|| {
                    error_at(
                        source,
                        tag.open,
                        &format!("closing tag '{}' has no open section", tag.name),
                    )
                })?;
                if section.name != tag.name {
                    return Err(error_at(
                        source,
                        tag.open,
                        &format!(
                            "closing tag '{}' does not match open section '{}'",
                            tag.name, section.name
                        ),
                    ));
                }
                let node = Node::Section {
                    raw: source[section.raw_start..tag.start].to_string(),
                    name: section.name,
                    inverted: section.inverted,
                    children: section.children,
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root.push(node),
                }
            }
        }
    }

    if let Some(section) = stack.pop() {
        return Err(error_at(
            source,
            section.open,
            &format!("section '{}' is never closed", section.name),
        ));
    }

    if cursor < source.len() {
        root.push(Node::Text(source[cursor..].to_string()));
    }

    Ok(Template { nodes: root })
}

fn error_at(source: &str, offset: usize, message: &str) -> ParseError {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|p| before[p + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    ParseError {
        message: message.to_string(),
        line,
        column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn var(s: &str) -> Node {
        Node::Variable {
            name: s.to_string(),
        }
    }

    #[test]
    fn test_literal_text() {
        let tpl = parse("just text { } }}").unwrap();
        assert_eq!(tpl.nodes, vec![text("just text { } }}")]);
    }

    #[test]
    fn test_variables() {
        let tpl = parse("Hi {{ name }}, {{{raw}}} {{&amp}}").unwrap();
        assert_eq!(
            tpl.nodes,
            vec![
                text("Hi "),
                var("name"),
                text(", "),
                var("raw"),
                text(" "),
                var("amp"),
            ]
        );
    }

    #[test]
    fn test_section_keeps_raw_text() {
        let tpl = parse("{{#up}}a {{x}} b{{/up}}").unwrap();
        match &tpl.nodes[0] {
            Node::Section {
                name,
                inverted,
                children,
                raw,
            } => {
                assert_eq!(name, "up");
                assert!(!inverted);
                assert_eq!(raw, "a {{x}} b");
                assert_eq!(children, &vec![text("a "), var("x"), text(" b")]);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_standalone_lines_are_removed() {
        let tpl = parse("begin\n  {{#flag}}\nshown\n  {{/flag}}\nend\n").unwrap();
        assert_eq!(tpl.nodes[0], text("begin\n"));
        match &tpl.nodes[1] {
            Node::Section { children, .. } => assert_eq!(children, &vec![text("shown\n")]),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(tpl.nodes[2], text("end\n"));
    }

    #[test]
    fn test_inline_section_is_not_standalone() {
        let tpl = parse("a {{#x}}b{{/x}} c\n").unwrap();
        assert_eq!(tpl.nodes[0], text("a "));
        assert_eq!(tpl.nodes[2], text(" c\n"));
    }

    #[test]
    fn test_standalone_comment_and_partial() {
        let tpl = parse("{{! note }}\n  {{>footer}}\ntail").unwrap();
        assert_eq!(
            tpl.nodes,
            vec![
                Node::Partial {
                    name: "footer".to_string(),
                    indent: "  ".to_string(),
                },
                text("tail"),
            ]
        );
    }

    #[test]
    fn test_unclosed_tag() {
        let err = parse("line one\nsee {{name").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_unbalanced_sections() {
        let err = parse("{{#a}}x").unwrap_err();
        assert!(err.message.contains("never closed"));

        let err = parse("x{{/a}}").unwrap_err();
        assert!(err.message.contains("no open section"));

        let err = parse("{{#a}}{{/b}}").unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_rejects_empty_and_delimiter_tags() {
        assert!(parse("{{}}").is_err());
        assert!(parse("{{#}}{{/}}").is_err());
        assert!(parse("{{=<% %>=}}").is_err());
    }
}
