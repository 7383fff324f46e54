//! ERB handler
//!
//! Translates ERB markup into unit code text:
//!
//! - `<%= expr %>` prints `expr` HTML-escaped, `<%== expr %>` prints it raw
//! - `<%= render "posts/comment" %>` renders a partial, `render template: "..."` a template
//! - `<% stmt %>` runs a statement: `items.each do |item|`, `if`, `unless`, `else`, `end`
//!   or any statement of the unit code language
//! - `<%# ... %>` is a comment, `<%%` a literal `<%`, and `-%>` swallows the next newline
//!
//! Every instruction is preceded by the template line it came from, so runtime
//! failures point back into the template.

use super::{GeneratedCode, Handler};
use crate::error::WrongEncodingError;
use crate::template::{Format, Template};
use crate::view::View;
use anyhow::{anyhow, Context};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErbHandler {
    escape_output: bool,
}

impl ErbHandler {
    /// `<%= %>` prints unescaped, like `<%== %>`
    pub fn unescaped() -> Self {
        Self {
            escape_output: false,
        }
    }
}

impl Default for ErbHandler {
    fn default() -> Self {
        Self {
            escape_output: true,
        }
    }
}

impl Handler for ErbHandler {
    fn call(&self, template: &Template, _view: Option<&dyn View>) -> anyhow::Result<GeneratedCode> {
        let source = template
            .source()
            .ok_or_else(|| anyhow!("source of '{}' is not available", template.identifier()))?;
        // Undeclared sources arrive in their external encoding
        let text = source.decode().ok_or_else(|| {
            let encoding = source.encoding().unwrap_or_else(crate::encoding::canonical);
            WrongEncodingError::new(source.bytes(), encoding.name())
        })?;
        let code = translate(&text, self.escape_output)
            .with_context(|| format!("failed to translate '{}'", template.identifier()))?;
        Ok(GeneratedCode::new(code))
    }

    fn handles_encoding(&self) -> bool {
        true
    }

    fn default_format(&self) -> Option<Format> {
        Some(Format::new("html"))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "erb"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Text,
    Output { raw: bool },
    Code,
    Comment,
}

/// A piece of ERB source
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment<'a> {
    kind: SegmentKind,
    content: &'a str,
    /// Line the segment starts on
    line: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unclosed ERB tag opened at line {line}")]
struct UnclosedTag {
    line: usize,
}

/// Forward-only scanner splitting ERB source into segments
struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
        }
    }

    /// Move past `len` bytes, tracking newlines
    fn advance(&mut self, len: usize) {
        let consumed = &self.source[self.pos..self.pos + len];
        self.line += consumed.bytes().filter(|&b| b == b'\n').count();
        self.pos += len;
    }

    fn text(&mut self, len: usize) -> Segment<'a> {
        let segment = Segment {
            kind: SegmentKind::Text,
            content: &self.source[self.pos..self.pos + len],
            line: self.line,
        };
        self.advance(len);
        segment
    }

    /// Scan the tag starting at the current position (`<%`)
    fn tag(&mut self) -> Result<Segment<'a>, UnclosedTag> {
        let rest = &self.source[self.pos..];
        let line = self.line;

        if rest.starts_with("<%%") {
            let segment = Segment {
                kind: SegmentKind::Text,
                content: "<%",
                line,
            };
            self.advance(3);
            return Ok(segment);
        }

        let (kind, open_len) = if rest.starts_with("<%==") {
            (SegmentKind::Output { raw: true }, 4)
        } else if rest.starts_with("<%=") {
            (SegmentKind::Output { raw: false }, 3)
        } else if rest.starts_with("<%#") {
            (SegmentKind::Comment, 3)
        } else {
            (SegmentKind::Code, 2)
        };

        let close = rest[open_len..]
            .find("%>")
            .ok_or(UnclosedTag { line })?;
        let inner = &rest[open_len..open_len + close];
        let (content, trim_newline) = match inner.strip_suffix('-') {
            Some(content) => (content, true),
            None => (inner, false),
        };

        self.advance(open_len + close + 2);
        if trim_newline {
            let after = &self.source[self.pos..];
            if after.starts_with("\r\n") {
                self.advance(2);
            } else if after.starts_with('\n') {
                self.advance(1);
            }
        }

        Ok(Segment {
            kind,
            content,
            line,
        })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Segment<'a>, UnclosedTag>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.source.len() {
            return None;
        }
        let rest = &self.source[self.pos..];
        match rest.find("<%") {
            Some(0) => Some(self.tag()),
            Some(len) => Some(Ok(self.text(len))),
            None => Some(Ok(self.text(rest.len()))),
        }
    }
}

/// Rewrite Ruby-flavoured statements into unit code statements
fn translate_statement(statement: &str) -> String {
    if let Some(head) = statement.strip_suffix('|') {
        // `items.each do |item|`
        if let Some((target, binding)) = head.rsplit_once('|') {
            let target = target.trim_end();
            let target = target.strip_suffix(" do").unwrap_or(target).trim_end();
            if let Some(collection) = target.strip_suffix(".each") {
                return format!("each {} as {}", collection.trim(), binding.trim());
            }
        }
    }
    statement.to_string()
}

/// Rewrite the contents of `<%= render ... %>`
fn translate_render(args: &str) -> String {
    match args.trim().strip_prefix("template:") {
        Some(path) => format!("render {}", path.trim()),
        None => format!("render {} partial", args.trim()),
    }
}

/// Translate ERB source into unit code text
pub(crate) fn translate(source: &str, escape_output: bool) -> anyhow::Result<String> {
    let mut code = String::new();
    let mut current_line = 0;

    for segment in Scanner::new(source) {
        let segment = segment?;
        let content = segment.content.trim();

        let line = segment.line;
        let mut instructions = Vec::new();
        match segment.kind {
            SegmentKind::Comment => continue,
            SegmentKind::Text => {
                if segment.content.is_empty() {
                    continue;
                }
                instructions.push((line, format!("emit {}", serde_json::to_string(segment.content)?)));
            }
            SegmentKind::Output { raw } => {
                if let Some(args) = content.strip_prefix("render ") {
                    instructions.push((line, translate_render(args)));
                } else if raw || !escape_output {
                    instructions.push((line, format!("print_raw {}", content)));
                } else {
                    instructions.push((line, format!("print {}", content)));
                }
            }
            SegmentKind::Code => {
                // Each statement keeps the line it sits on inside the tag
                instructions.extend(
                    segment
                        .content
                        .lines()
                        .enumerate()
                        .map(|(offset, statement)| (line + offset, statement.trim()))
                        .filter(|(_, statement)| !statement.is_empty())
                        .map(|(line, statement)| (line, translate_statement(statement))),
                );
            }
        }

        for (line, instruction) in instructions {
            if line != current_line {
                writeln!(code, "@line {}", line)?;
                current_line = line;
            }
            writeln!(code, "{}", instruction)?;
        }
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(source: &str) -> Vec<Segment<'_>> {
        Scanner::new(source).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn test_scanner_splits_text_and_tags() {
        let found = segments("Hello <%= name %>!");
        assert_eq!(
            found,
            vec![
                Segment {
                    kind: SegmentKind::Text,
                    content: "Hello ",
                    line: 1
                },
                Segment {
                    kind: SegmentKind::Output { raw: false },
                    content: " name ",
                    line: 1
                },
                Segment {
                    kind: SegmentKind::Text,
                    content: "!",
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn test_scanner_tracks_lines() {
        let found = segments("a\nb\n<% if x %>\n<%# note\nspanning %>\n<%== y %>");
        let lines: Vec<(SegmentKind, usize)> = found.iter().map(|s| (s.kind, s.line)).collect();
        assert_eq!(
            lines,
            vec![
                (SegmentKind::Text, 1),
                (SegmentKind::Code, 3),
                (SegmentKind::Text, 3),
                (SegmentKind::Comment, 4),
                (SegmentKind::Text, 5),
                (SegmentKind::Output { raw: true }, 6),
            ]
        );
    }

    #[test]
    fn test_literal_open_tag() {
        let found = segments("<%% not code %>");
        assert_eq!(found[0].content, "<%");
        assert_eq!(found[1].content, " not code %>");
    }

    #[test]
    fn test_dash_close_trims_newline() {
        let found = segments("<% if x -%>\nyes");
        assert_eq!(found[0].content, " if x ");
        assert_eq!(found[1].content, "yes");
        assert_eq!(found[1].line, 2);
    }

    #[test]
    fn test_unclosed_tag() {
        let result: Result<Vec<_>, _> = Scanner::new("ok\n<%= name").collect();
        assert_eq!(result.unwrap_err(), UnclosedTag { line: 2 });
    }

    #[test]
    fn test_translate_output() {
        let code = translate("Hello <%= name %>", true).unwrap();
        assert_eq!(code, "@line 1\nemit \"Hello \"\nprint name\n");
    }

    #[test]
    fn test_translate_unescaped_handler() {
        let code = translate("<%= name %>", false).unwrap();
        assert_eq!(code, "@line 1\nprint_raw name\n");
    }

    #[test]
    fn test_translate_each_do_block() {
        let code = translate(
            "<% posts.each do |post| %>\n<%= post.title %>\n<% end %>",
            true,
        )
        .unwrap();
        assert_eq!(
            code,
            "@line 1\neach posts as post\nemit \"\\n\"\n@line 2\nprint post.title\nemit \"\\n\"\n@line 3\nend\n"
        );
    }

    #[test]
    fn test_translate_multiline_code_tag_lines() {
        let code = translate("<% if flag\n  items.each do |item| %>x<% end\n\n end %>", true).unwrap();
        assert_eq!(
            code,
            "@line 1\nif flag\n@line 2\neach items as item\nemit \"x\"\nend\n@line 4\nend\n"
        );
    }

    #[test]
    fn test_translate_render() {
        assert_eq!(
            translate("<%= render \"posts/comment\" %>", true).unwrap(),
            "@line 1\nrender \"posts/comment\" partial\n"
        );
        assert_eq!(
            translate("<%= render template: \"posts/show\" %>", true).unwrap(),
            "@line 1\nrender \"posts/show\"\n"
        );
    }

    #[test]
    fn test_translate_drops_comments() {
        let code = translate("<%# hidden %>shown", true).unwrap();
        assert_eq!(code, "@line 1\nemit \"shown\"\n");
    }

    #[test]
    fn test_translate_statement_forms() {
        assert_eq!(translate_statement("items.each do |item|"), "each items as item");
        assert_eq!(translate_statement("@posts.each do | p |"), "each @posts as p");
        assert_eq!(translate_statement("if user.admin"), "if user.admin");
        assert_eq!(translate_statement("end"), "end");
    }
}
