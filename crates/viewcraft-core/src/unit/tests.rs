use super::*;
use crate::error::{CompileFailure, ExecutionError};
use crate::handler::Handlers;
use crate::view::{BasicView, Engine, MemoryResolver};
use serde_json::json;

fn view_with(resolver: MemoryResolver) -> BasicView {
    let engine = Arc::new(Engine::default());
    BasicView::isolated(engine, Arc::new(resolver))
}

fn view() -> BasicView {
    view_with(MemoryResolver::new(Handlers::with_defaults()))
}

fn locals(value: serde_json::Value) -> Locals {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("Expected an object, got {:?}", other),
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

fn compile_into(
    namespace: &Arc<UnitRegistry>,
    name: &str,
    code: &str,
    declared: &[&str],
) -> CompiledHandle {
    build(
        name.to_string(),
        code.to_string(),
        &names(declared),
        namespace,
    )
    .unwrap()
}

#[test]
fn test_unit_name_sanitizes_identifier() {
    let name = unit_name("app/views/Posts/index.html.erb", 7);
    assert!(name.starts_with("_app_views__osts_index_html_erb__"));
    assert!(name.ends_with("_7"));
}

#[test]
fn test_unit_names_differ_per_instance() {
    assert_ne!(unit_name("same", 1), unit_name("same", 2));
    assert_eq!(unit_name("same", 1), unit_name("same", 1));
}

#[test]
fn test_call_binds_declared_locals() {
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(
        &namespace,
        "_hello",
        "@line 1\nemit \"Hello \"\nprint name\n",
        &["name"],
    );
    let mut view = view();

    let output = handle
        .unit()
        .call(&mut view, &locals(json!({"name": "World"})))
        .unwrap();

    assert_eq!(output, "Hello World");
}

#[test]
fn test_missing_declared_local_is_null() {
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(&namespace, "_nil", "emit \"[\"\nprint name\nemit \"]\"", &["name"]);

    let output = handle.unit().call(&mut view(), &Locals::new()).unwrap();

    assert_eq!(output, "[]");
}

#[test]
fn test_undeclared_local_fails_with_template_line() {
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(&namespace, "_undeclared", "@line 4\nprint title", &[]);

    let err = handle
        .unit()
        .call(&mut view(), &locals(json!({"title": "ignored"})))
        .unwrap_err();

    match err {
        ViewError::Execution(ExecutionError::UndefinedLocal { name, line }) => {
            assert_eq!(name, "title");
            assert_eq!(line, 4);
        }
        other => panic!("Expected UndefinedLocal, got {:?}", other),
    }
}

#[test]
fn test_output_buffer_restored_on_success_and_failure() {
    let namespace = UnitRegistry::new("test");
    let ok = compile_into(&namespace, "_ok", "emit \"inner\"", &[]);
    let failing = compile_into(&namespace, "_failing", "emit \"partial\"\nprint missing", &[]);
    let mut view = view();
    view.output_buffer().push_str("outer");

    assert_eq!(ok.unit().call(&mut view, &Locals::new()).unwrap(), "inner");
    assert_eq!(view.output_buffer().as_str(), "outer");

    assert!(failing.unit().call(&mut view, &Locals::new()).is_err());
    assert_eq!(view.output_buffer().as_str(), "outer");
}

#[test]
fn test_loops_conditionals_and_escaping() {
    let code = "\
each posts as post
  if post.published
    print post.title
  else
    emit \"(draft)\"
  end
  unless post.last
    emit \", \"
  end
end
";
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(&namespace, "_posts", code, &["posts"]);
    let posts = json!({
        "posts": [
            {"title": "Rust & <Ruby>", "published": true},
            {"title": "Unreleased", "published": false, "last": true}
        ]
    });

    let output = handle.unit().call(&mut view(), &locals(posts)).unwrap();

    assert_eq!(output, "Rust &amp; &lt;Ruby&gt;, (draft)");
}

#[test]
fn test_print_raw_and_literals() {
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(
        &namespace,
        "_raw",
        "print_raw html\nprint 42\nprint nil\nprint \"<b>\"",
        &["html"],
    );

    let output = handle
        .unit()
        .call(&mut view(), &locals(json!({"html": "<i>x</i>"})))
        .unwrap();

    assert_eq!(output, "<i>x</i>42&lt;b&gt;");
}

#[test]
fn test_execution_errors() {
    let namespace = UnitRegistry::new("test");
    let not_iterable = compile_into(&namespace, "_a", "@line 2\neach count as c\nend", &["count"]);
    let not_object = compile_into(&namespace, "_b", "@line 3\nprint count.value", &["count"]);
    let not_printable = compile_into(&namespace, "_c", "@line 5\nprint list", &["list"]);
    let bindings = locals(json!({"count": 3, "list": [1, 2]}));
    let mut view = view();

    assert_eq!(
        not_iterable.unit().call(&mut view, &bindings).unwrap_err().to_string(),
        "EXECUTION_FAILED: 'count' is not iterable at line 2"
    );
    assert!(matches!(
        not_object.unit().call(&mut view, &bindings).unwrap_err(),
        ViewError::Execution(ExecutionError::NotAnObject { ref key, line: 3, .. }) if key == "value"
    ));
    assert!(matches!(
        not_printable.unit().call(&mut view, &bindings).unwrap_err(),
        ViewError::Execution(ExecutionError::NotPrintable { kind: "an array", line: 5, .. })
    ));
}

#[test]
fn test_assigns_are_readable() {
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(&namespace, "_assigns", "print @user.name\nprint @missing", &[]);
    let mut view = view().with_assigns(locals(json!({"user": {"name": "Ada"}})));

    assert_eq!(handle.unit().call(&mut view, &Locals::new()).unwrap(), "Ada");
}

#[test]
fn test_render_forwards_visible_scope() {
    let resolver = MemoryResolver::new(Handlers::with_defaults())
        .with_template("posts/_comment.html.erb", "<%= who %>:<%= body %>;");
    let mut view = view_with(resolver);
    let namespace = UnitRegistry::new("test");
    let handle = compile_into(
        &namespace,
        "_comments",
        "each comments as body\nrender \"posts/comment\" partial\nend",
        &["who", "comments"],
    );

    let output = handle
        .unit()
        .call(
            &mut view,
            &locals(json!({"who": "ann", "comments": ["hi", "bye"]})),
        )
        .unwrap();

    assert_eq!(output, "ann:hi;ann:bye;");
}

#[test]
fn test_syntax_error_carries_code() {
    let namespace = UnitRegistry::new("test");
    let err = build(
        "_broken".to_string(),
        "emit \"ok\"\nif x".to_string(),
        &[],
        &namespace,
    )
    .unwrap_err();

    assert_eq!(err.code, "emit \"ok\"\nif x");
    assert!(matches!(err.cause, CompileFailure::Syntax { line: 2, .. }));
    assert!(namespace.is_empty());
}

#[test]
fn test_redefinition_is_rejected() {
    let namespace = UnitRegistry::new("shared");
    let _first = compile_into(&namespace, "_same", "emit \"a\"", &[]);

    let err = build("_same".to_string(), "emit \"b\"".to_string(), &[], &namespace).unwrap_err();

    assert_eq!(
        err.cause,
        CompileFailure::Redefinition {
            name: "_same".to_string(),
            namespace: "shared".to_string(),
        }
    );
    assert_eq!(namespace.get("_same").unwrap().code(), "emit \"a\"");
}

#[test]
fn test_dropping_handle_releases_registration() {
    let namespace = UnitRegistry::new("test");
    let first = compile_into(&namespace, "_first", "emit \"1\"", &[]);
    let second = compile_into(&namespace, "_second", "emit \"2\"", &[]);
    assert_eq!(namespace.names(), vec!["_first", "_second"]);
    assert_eq!(first.registration().namespace().as_deref(), Some("test"));

    drop(first);

    assert!(!namespace.contains("_first"));
    assert!(namespace.contains("_second"));
    assert_eq!(second.registration().name(), "_second");
}

#[test]
fn test_registration_outliving_namespace() {
    let namespace = UnitRegistry::new("ephemeral");
    let handle = compile_into(&namespace, "_orphan", "emit \"x\"", &[]);

    drop(namespace);

    assert_eq!(handle.registration().namespace(), None);
    drop(handle);
}
