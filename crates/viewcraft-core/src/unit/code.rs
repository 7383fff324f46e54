//! Unit code language
//!
//! Handlers emit line-oriented code text; this module parses it once into an
//! intermediate representation that [`super::compile`] turns into closures.
//!
//! ```text
//! @line 3                  template line of the following instructions
//! emit "<p>"               literal text (a JSON string)
//! print post.title         HTML-escaped value
//! print_raw @banner        unescaped value
//! each posts as post       loop, closed by `end`
//! if user.admin            conditional (`unless` negates), optional `else`, `end`
//! render "posts/comment" partial
//! # comment
//! ```
//!
//! Expressions are paths rooted at a local (`post.title`) or an assign
//! (`@user.name`), or string, integer, `true`/`false` and `nil` literals.

use crate::error::CompileFailure;
use std::fmt;

/// Where a path starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Root {
    Local(String),
    Assign(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Path { root: Root, keys: Vec<String> },
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Path { root, keys } => {
                match root {
                    Root::Local(name) => f.write_str(name)?,
                    Root::Assign(name) => write!(f, "@{}", name)?,
                }
                for key in keys {
                    write!(f, ".{}", key)?;
                }
                Ok(())
            }
            Expr::Str(text) => write!(f, "{:?}", text),
            Expr::Int(value) => write!(f, "{}", value),
            Expr::Bool(value) => write!(f, "{}", value),
            Expr::Nil => f.write_str("nil"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Emit(String),
    Print {
        expr: Expr,
        escape: bool,
    },
    Each {
        expr: Expr,
        binding: String,
        body: Vec<Node>,
    },
    If {
        cond: Expr,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Render {
        path: String,
        partial: bool,
    },
}

/// A statement and the template line it came from
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub stmt: Stmt,
    pub line: usize,
}

/// Parsed code text
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Program {
    pub nodes: Vec<Node>,
}

/// A block under construction
enum Block {
    Each {
        expr: Expr,
        binding: String,
    },
    If {
        cond: Expr,
        negate: bool,
        then: Option<Vec<Node>>,
    },
}

struct OpenBlock {
    block: Block,
    /// Template line of the opening statement
    line: usize,
    /// Code line of the opening statement, for error messages
    code_line: usize,
    nodes: Vec<Node>,
}

impl OpenBlock {
    fn keyword(&self) -> &'static str {
        match self.block {
            Block::Each { .. } => "each",
            Block::If { negate: false, .. } => "if",
            Block::If { negate: true, .. } => "unless",
        }
    }

    fn close(self) -> Node {
        let stmt = match self.block {
            Block::Each { expr, binding } => Stmt::Each {
                expr,
                binding,
                body: self.nodes,
            },
            Block::If {
                cond,
                negate,
                then: Some(then),
            } => Stmt::If {
                cond,
                negate,
                then,
                otherwise: self.nodes,
            },
            Block::If {
                cond,
                negate,
                then: None,
            } => Stmt::If {
                cond,
                negate,
                then: self.nodes,
                otherwise: Vec::new(),
            },
        };
        Node {
            stmt,
            line: self.line,
        }
    }
}

struct Parser {
    root: Vec<Node>,
    open: Vec<OpenBlock>,
    line: usize,
}

impl Parser {
    fn push(&mut self, stmt: Stmt) {
        let node = Node {
            stmt,
            line: self.line,
        };
        match self.open.last_mut() {
            Some(block) => block.nodes.push(node),
            None => self.root.push(node),
        }
    }

    fn open(&mut self, block: Block, code_line: usize) {
        self.open.push(OpenBlock {
            block,
            line: self.line,
            code_line,
            nodes: Vec::new(),
        });
    }

    fn statement(&mut self, statement: &str, code_line: usize) -> Result<(), CompileFailure> {
        let (keyword, rest) = match statement.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (statement, ""),
        };

        match keyword {
            "@line" => {
                self.line = rest.parse().map_err(|_| {
                    CompileFailure::syntax(code_line, format!("invalid line number '{}'", rest))
                })?;
            }
            "emit" => {
                let text = serde_json::from_str::<String>(rest).map_err(|e| {
                    CompileFailure::syntax(code_line, format!("invalid literal: {}", e))
                })?;
                self.push(Stmt::Emit(text));
            }
            "print" | "print_raw" => {
                let expr = parse_expr(rest, code_line)?;
                self.push(Stmt::Print {
                    expr,
                    escape: keyword == "print",
                });
            }
            "each" => {
                let (expr, binding) = rest.rsplit_once(" as ").ok_or_else(|| {
                    CompileFailure::syntax(code_line, "expected 'each <expr> as <name>'")
                })?;
                let binding = binding.trim();
                if !is_identifier(binding) {
                    return Err(CompileFailure::syntax(
                        code_line,
                        format!("invalid loop variable '{}'", binding),
                    ));
                }
                let block = Block::Each {
                    expr: parse_expr(expr.trim(), code_line)?,
                    binding: binding.to_string(),
                };
                self.open(block, code_line);
            }
            "if" | "unless" => {
                let block = Block::If {
                    cond: parse_expr(rest, code_line)?,
                    negate: keyword == "unless",
                    then: None,
                };
                self.open(block, code_line);
            }
            "else" => match self.open.last_mut() {
                Some(OpenBlock {
                    block: Block::If { then, .. },
                    nodes,
                    ..
                }) if then.is_none() && rest.is_empty() => {
                    *then = Some(std::mem::take(nodes));
                }
                _ => {
                    return Err(CompileFailure::syntax(
                        code_line,
                        "'else' without a matching 'if'",
                    ))
                }
            },
            "end" => {
                let block = self.open.pop().ok_or_else(|| {
                    CompileFailure::syntax(code_line, "'end' without an open block")
                })?;
                let node = block.close();
                match self.open.last_mut() {
                    Some(parent) => parent.nodes.push(node),
                    None => self.root.push(node),
                }
            }
            "render" => {
                let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<String>();
                let path = match stream.next() {
                    Some(Ok(path)) => path,
                    _ => {
                        return Err(CompileFailure::syntax(
                            code_line,
                            "expected 'render \"<path>\" [partial]'",
                        ))
                    }
                };
                let partial = match rest[stream.byte_offset()..].trim() {
                    "" => false,
                    "partial" => true,
                    other => {
                        return Err(CompileFailure::syntax(
                            code_line,
                            format!("unexpected '{}' after render path", other),
                        ))
                    }
                };
                self.push(Stmt::Render { path, partial });
            }
            other => {
                return Err(CompileFailure::syntax(
                    code_line,
                    format!("unknown instruction '{}'", other),
                ))
            }
        }
        Ok(())
    }
}

/// Parse code text
pub(crate) fn parse(code: &str) -> Result<Program, CompileFailure> {
    let mut parser = Parser {
        root: Vec::new(),
        open: Vec::new(),
        line: 1,
    };

    for (index, raw) in code.lines().enumerate() {
        let statement = raw.trim();
        if statement.is_empty() || statement.starts_with('#') {
            continue;
        }
        parser.statement(statement, index + 1)?;
    }

    if let Some(block) = parser.open.last() {
        return Err(CompileFailure::syntax(
            block.code_line,
            format!("'{}' is never closed with 'end'", block.keyword()),
        ));
    }

    Ok(Program { nodes: parser.root })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn parse_expr(text: &str, code_line: usize) -> Result<Expr, CompileFailure> {
    let text = text.trim();
    match text {
        "" => return Err(CompileFailure::syntax(code_line, "missing expression")),
        "nil" => return Ok(Expr::Nil),
        "true" => return Ok(Expr::Bool(true)),
        "false" => return Ok(Expr::Bool(false)),
        _ => {}
    }

    if text.starts_with('"') {
        return serde_json::from_str::<String>(text)
            .map(Expr::Str)
            .map_err(|e| CompileFailure::syntax(code_line, format!("invalid string: {}", e)));
    }

    if text.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return text
            .parse()
            .map(Expr::Int)
            .map_err(|_| CompileFailure::syntax(code_line, format!("invalid number '{}'", text)));
    }

    let (is_assign, path) = match text.strip_prefix('@') {
        Some(path) => (true, path),
        None => (false, text),
    };
    let mut segments = path.split('.');
    let name = segments.next().unwrap_or_default();
    if !is_identifier(name) {
        return Err(CompileFailure::syntax(
            code_line,
            format!("invalid expression '{}'", text),
        ));
    }
    let keys: Vec<String> = segments.map(str::to_string).collect();
    if let Some(bad) = keys.iter().find(|key| !is_key(key)) {
        return Err(CompileFailure::syntax(
            code_line,
            format!("invalid key '{}' in '{}'", bad, text),
        ));
    }

    let root = if is_assign {
        Root::Assign(name.to_string())
    } else {
        Root::Local(name.to_string())
    };
    Ok(Expr::Path { root, keys })
}
