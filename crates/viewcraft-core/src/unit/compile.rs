//! IR to closure compilation

use super::code::{Expr, Node, Program, Root, Stmt};
use super::value::{escape_html, index, printable, truthy};
use crate::error::{ExecutionError, ViewError};
use crate::view::{Locals, View};
use serde_json::Value;
use std::borrow::Cow;

/// Variables visible while a unit runs
#[derive(Debug, Default)]
pub(crate) struct Scope {
    locals: Locals,
    /// Loop variables, innermost last
    bindings: Vec<(String, Value)>,
}

impl Scope {
    /// Bind each declared local from `supplied`, `null` when it is missing
    pub(crate) fn bind(declared: &[String], supplied: &Locals) -> Self {
        let locals = declared
            .iter()
            .map(|name| {
                let value = supplied.get(name).cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        Self {
            locals,
            bindings: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
            .or_else(|| self.locals.get(name))
    }

    /// Everything visible, loop variables shadowing locals
    fn visible(&self) -> Locals {
        let mut visible = self.locals.clone();
        for (name, value) in &self.bindings {
            visible.insert(name.clone(), value.clone());
        }
        visible
    }
}

type Op = Box<dyn Fn(&mut dyn View, &mut Scope) -> Result<(), ViewError> + Send + Sync>;

fn op(
    f: impl Fn(&mut dyn View, &mut Scope) -> Result<(), ViewError> + Send + Sync + 'static,
) -> Op {
    Box::new(f)
}

/// A compiled instruction sequence
pub(crate) struct Body {
    ops: Vec<Op>,
}

impl Body {
    pub(crate) fn run(&self, view: &mut dyn View, scope: &mut Scope) -> Result<(), ViewError> {
        for op in &self.ops {
            op(view, scope)?;
        }
        Ok(())
    }
}

pub(crate) fn compile(program: &Program) -> Body {
    compile_nodes(&program.nodes)
}

fn compile_nodes(nodes: &[Node]) -> Body {
    Body {
        ops: nodes.iter().map(compile_node).collect(),
    }
}

fn compile_node(node: &Node) -> Op {
    let line = node.line;
    match &node.stmt {
        Stmt::Emit(text) => {
            let text = text.clone();
            op(move |view, _| {
                view.output_buffer().push_str(&text);
                Ok(())
            })
        }
        Stmt::Print { expr, escape } => {
            let expr = expr.clone();
            let escape = *escape;
            op(move |view, scope| {
                let text = {
                    let value = eval(&expr, &*view, scope, line)?;
                    let text = printable(&value).map_err(|kind| ExecutionError::NotPrintable {
                        expr: expr.to_string(),
                        kind,
                        line,
                    })?;
                    if escape {
                        escape_html(&text).into_owned()
                    } else {
                        text.into_owned()
                    }
                };
                view.output_buffer().push_str(&text);
                Ok(())
            })
        }
        Stmt::Each {
            expr,
            binding,
            body,
        } => {
            let expr = expr.clone();
            let binding = binding.clone();
            let body = compile_nodes(body);
            op(move |view, scope| {
                let items = match eval(&expr, &*view, scope, line)?.into_owned() {
                    Value::Array(items) => items,
                    _ => {
                        return Err(ExecutionError::NotIterable {
                            expr: expr.to_string(),
                            line,
                        }
                        .into())
                    }
                };
                for item in items {
                    scope.bindings.push((binding.clone(), item));
                    let result = body.run(view, scope);
                    scope.bindings.pop();
                    result?;
                }
                Ok(())
            })
        }
        Stmt::If {
            cond,
            negate,
            then,
            otherwise,
        } => {
            let cond = cond.clone();
            let negate = *negate;
            let then = compile_nodes(then);
            let otherwise = compile_nodes(otherwise);
            op(move |view, scope| {
                let holds = truthy(eval(&cond, &*view, scope, line)?.as_ref()) != negate;
                if holds {
                    then.run(view, scope)
                } else {
                    otherwise.run(view, scope)
                }
            })
        }
        Stmt::Render { path, partial } => {
            let path = path.clone();
            let partial = *partial;
            op(move |view, scope| {
                let locals = scope.visible();
                let output = if partial {
                    view.render_partial(&path, &locals)?
                } else {
                    view.render_template(&path, &locals)?
                };
                view.output_buffer().push_str(&output);
                Ok(())
            })
        }
    }
}

fn eval<'s>(
    expr: &Expr,
    view: &'s dyn View,
    scope: &'s Scope,
    line: usize,
) -> Result<Cow<'s, Value>, ExecutionError> {
    let (root, keys) = match expr {
        Expr::Path { root, keys } => (root, keys),
        Expr::Str(text) => return Ok(Cow::Owned(Value::String(text.clone()))),
        Expr::Int(number) => return Ok(Cow::Owned(Value::from(*number))),
        Expr::Bool(flag) => return Ok(Cow::Owned(Value::Bool(*flag))),
        Expr::Nil => return Ok(Cow::Owned(Value::Null)),
    };

    let mut current = match root {
        Root::Local(name) => {
            Cow::Borrowed(
                scope
                    .lookup(name)
                    .ok_or_else(|| ExecutionError::UndefinedLocal {
                        name: name.clone(),
                        line,
                    })?,
            )
        }
        // Unset assigns read as nil
        Root::Assign(name) => view
            .assigns()
            .and_then(|assigns| assigns.get(name))
            .map(Cow::Borrowed)
            .unwrap_or(Cow::Owned(Value::Null)),
    };

    for key in keys {
        let next = match current {
            Cow::Borrowed(value) => index(value, key),
            Cow::Owned(ref value) => index(value, key).map(|found| Cow::Owned(found.into_owned())),
        };
        current = next.ok_or_else(|| ExecutionError::NotAnObject {
            expr: expr.to_string(),
            key: key.clone(),
            line,
        })?;
    }

    Ok(current)
}
