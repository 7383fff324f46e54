//! End-to-end rendering through views, resolvers and handlers

use serde_json::json;
use std::sync::{Arc, Mutex};
use viewcraft_core::error::UsageError;
use viewcraft_core::handler::ErbHandler;
use viewcraft_core::unit::UnitRegistry;
use viewcraft_core::view::{
    Instrumenter, LookupContext, OutputBuffer, Phase, RenderEvent, Resolver,
};
use viewcraft_core::{
    BasicView, Engine, EngineConfig, Locals, MemoryResolver, Template, TemplateDetails, View,
    ViewError,
};

fn locals(value: serde_json::Value) -> Locals {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("Expected an object, got {:?}", other),
    }
}

fn resolver(engine: &Engine) -> MemoryResolver {
    MemoryResolver::new(engine.handlers().clone())
        .with_template("layouts/application.html.erb", "<main><%= render template: \"pages/index\" %></main>")
        .with_template("pages/index.html.erb", "<h1><%= title %></h1>\n<%= render \"pages/sidebar\" %>")
        .with_template("pages/_sidebar.html.erb", "<aside>\n<%= links.first %>\n</aside>")
}

/// Records render-by-path calls instead of performing them
struct RecordingView {
    engine: Arc<Engine>,
    lookup: LookupContext,
    namespace: Arc<UnitRegistry>,
    buffer: OutputBuffer,
    current: Option<Arc<Template>>,
    calls: Vec<(&'static str, String)>,
}

impl RecordingView {
    fn new() -> Self {
        let engine = Arc::new(Engine::default());
        let resolver: Arc<dyn Resolver> = Arc::new(MemoryResolver::new(engine.handlers().clone()));
        Self {
            engine,
            lookup: LookupContext::new(resolver),
            namespace: UnitRegistry::new("recording"),
            buffer: OutputBuffer::new(),
            current: None,
            calls: Vec::new(),
        }
    }
}

impl View for RecordingView {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn current_template(&self) -> Option<&Arc<Template>> {
        self.current.as_ref()
    }

    fn replace_current_template(
        &mut self,
        template: Option<Arc<Template>>,
    ) -> Option<Arc<Template>> {
        std::mem::replace(&mut self.current, template)
    }

    fn output_buffer(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    fn lookup_context(&self) -> &LookupContext {
        &self.lookup
    }

    fn namespace(&self) -> Arc<UnitRegistry> {
        Arc::clone(&self.namespace)
    }

    fn render_template(&mut self, path: &str, _locals: &Locals) -> Result<String, ViewError> {
        self.calls.push(("template", path.to_string()));
        Ok(String::new())
    }

    fn render_partial(&mut self, path: &str, _locals: &Locals) -> Result<String, ViewError> {
        self.calls.push(("partial", path.to_string()));
        Ok(String::new())
    }
}

#[derive(Default)]
struct RecordingInstrumenter {
    events: Mutex<Vec<RenderEvent>>,
}

impl Instrumenter for RecordingInstrumenter {
    fn instrument(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_hello_world() {
    let template = Arc::new(Template::new(
        "Hello <%= name %>",
        "hello",
        Arc::new(ErbHandler::default()),
        TemplateDetails::new().with_locals(["name"]),
    ));
    let engine = Arc::new(Engine::default());
    let mut view = BasicView::new(Arc::clone(&engine), Arc::new(resolver(&engine)));

    let output = template
        .render(&mut view, &locals(json!({"name": "World"})))
        .unwrap();

    assert_eq!(output, "Hello World");
}

#[test]
fn test_declared_latin1_source_renders_as_utf8() {
    let mut source = b"# encoding: ISO-8859-1\nCaf".to_vec();
    source.push(0xE9);
    let template = Arc::new(Template::new(
        source,
        "cafe",
        Arc::new(ErbHandler::default()),
        TemplateDetails::new(),
    ));
    let engine = Arc::new(Engine::default());
    let mut view = BasicView::new(Arc::clone(&engine), Arc::new(resolver(&engine)));

    let output = template.render(&mut view, &Locals::new()).unwrap();

    assert_eq!(output, "\nCafé");
}

#[test]
fn test_invalid_source_fails_with_declared_encoding() {
    let engine = Arc::new(Engine::default());
    let mut bytes = b"# encoding: Shift_JIS\n".to_vec();
    bytes.extend_from_slice(&[0x81, 0x20]);
    let resolver = resolver(&engine).with_template("pages/broken.html.erb", bytes);
    let mut view = BasicView::new(engine, Arc::new(resolver));

    let err = view.render_template("pages/broken", &Locals::new()).unwrap_err();

    match err {
        ViewError::WrongEncoding(err) => {
            assert_eq!(err.encoding, "Shift_JIS");
            assert!(err.to_string().starts_with("WRONG_ENCODING:"));
        }
        other => panic!("Expected WrongEncoding, got {:?}", other),
    }
}

#[test]
fn test_wrong_encoding_passes_through_enclosing_templates() {
    let engine = Arc::new(Engine::default());
    let resolver = resolver(&engine)
        .with_template("pages/outer.html.erb", "<%= render \"pages/bad\" %>")
        .with_template("pages/_bad.html.raw", vec![0xC3, 0x28]);
    let mut view = BasicView::new(engine, Arc::new(resolver));

    let err = view.render_template("pages/outer", &Locals::new()).unwrap_err();

    assert!(matches!(err, ViewError::WrongEncoding(ref e) if e.encoding == "UTF-8"));
}

#[test]
fn test_nested_templates_render() {
    let engine = Arc::new(Engine::default());
    let mut view = BasicView::new(Arc::clone(&engine), Arc::new(resolver(&engine)));

    let output = view
        .render_template(
            "layouts/application",
            &locals(json!({"title": "Home", "links": {"first": "/about"}})),
        )
        .unwrap();

    assert_eq!(
        output,
        "<main><h1>Home</h1>\n<aside>\n/about\n</aside></main>"
    );
}

#[test]
fn test_nested_failure_accumulates_sub_templates() {
    let engine = Arc::new(Engine::default());
    let mut view = BasicView::new(Arc::clone(&engine), Arc::new(resolver(&engine)))
        .with_assigns(locals(json!({"user": "ann"})));

    let err = view
        .render_template(
            "layouts/application",
            &locals(json!({"title": "Home", "links": ["/about"]})),
        )
        .unwrap_err();

    let render = match err {
        ViewError::Render(render) => render,
        other => panic!("Expected Render, got {:?}", other),
    };
    let chain: Vec<Option<&str>> = render
        .template_chain()
        .map(|template| template.virtual_path())
        .collect();
    assert_eq!(
        chain,
        vec![
            Some("pages/_sidebar"),
            Some("pages/index"),
            Some("layouts/application"),
        ]
    );
    assert_eq!(render.line_number(), Some(2));
    assert_eq!(render.assigns().get("user"), Some(&json!("ann")));
    assert_eq!(
        render.sub_template_message(),
        "Trace of template inclusion: pages/index.html.erb, layouts/application.html.erb"
    );
    assert_eq!(
        render.source_extract(0).unwrap(),
        "1: <aside>\n2: <%= links.first %>\n3: </aside>\n"
    );
    assert!(view.current_template().is_none());
}

#[test]
fn test_missing_partial_is_attributed_to_caller() {
    let engine = Arc::new(Engine::default());
    let resolver = resolver(&engine).with_template("pages/lonely.html.erb", "<%= render \"pages/ghost\" %>");
    let mut view = BasicView::new(engine, Arc::new(resolver));

    let err = view.render_template("pages/lonely", &Locals::new()).unwrap_err();

    let render = match err {
        ViewError::Render(render) => render,
        other => panic!("Expected Render, got {:?}", other),
    };
    assert_eq!(render.template().virtual_path(), Some("pages/lonely"));
    assert!(matches!(
        render.cause(),
        ViewError::MissingTemplate { path, partial: true } if path == "pages/_ghost"
    ));
}

#[test]
fn test_rerender_partial_delegates_to_partial_path() {
    let template = Template::new(
        "",
        "comment",
        Arc::new(ErbHandler::default()),
        TemplateDetails::new().with_virtual_path("posts/_comment"),
    );
    let mut view = RecordingView::new();

    template.rerender(&mut view).unwrap();

    assert_eq!(view.calls, vec![("partial", "posts/comment".to_string())]);
}

#[test]
fn test_rerender_template_delegates_to_template_path() {
    let template = Template::new(
        "",
        "show",
        Arc::new(ErbHandler::default()),
        TemplateDetails::new().with_virtual_path("posts/show"),
    );
    let mut view = RecordingView::new();

    template.rerender(&mut view).unwrap();

    assert_eq!(view.calls, vec![("template", "posts/show".to_string())]);
}

#[test]
fn test_rerender_through_basic_view() {
    let engine = Arc::new(Engine::default());
    let resolver = resolver(&engine).with_template("posts/_comment.html.erb", "comment!");
    let mut view = BasicView::new(engine, Arc::new(resolver));
    let template = view
        .lookup_context()
        .find_template("comment", &["posts".to_string()], true, &[])
        .unwrap();

    assert_eq!(template.rerender(&mut view).unwrap(), "comment!");
}

#[test]
fn test_usage_errors_are_not_wrapped() {
    let template = Template::new(
        "x",
        "anonymous",
        Arc::new(ErbHandler::default()),
        TemplateDetails::new(),
    );
    let mut view = RecordingView::new();

    assert!(matches!(
        template.rerender(&mut view),
        Err(ViewError::Usage(UsageError::RerenderWithoutVirtualPath { .. }))
    ));
    assert!(matches!(
        template.refresh(&view),
        Err(ViewError::Usage(UsageError::RefreshWithoutVirtualPath { .. }))
    ));
    assert!(view.calls.is_empty());
}

#[test]
fn test_instrumenter_brackets_each_render() {
    let instrumenter = Arc::new(RecordingInstrumenter::default());
    let engine = Arc::new(Engine::default().with_instrumenter(instrumenter.clone()));
    let resolver = resolver(&engine).with_template("pages/plain.text.raw", "plain");
    let mut view = BasicView::new(engine, Arc::new(resolver));

    view.render_template("pages/plain", &Locals::new()).unwrap();
    view.render_template("pages/index", &Locals::new()).unwrap_err();

    let events = instrumenter.events.lock().unwrap();
    let summary: Vec<(Phase, Option<&str>, bool)> = events
        .iter()
        .map(|event| (event.phase, event.virtual_path.as_deref(), event.failed))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Phase::Start, Some("pages/plain"), false),
            (Phase::Finish, Some("pages/plain"), false),
            (Phase::Start, Some("pages/index"), false),
            (Phase::Finish, Some("pages/index"), true),
        ]
    );
    assert!(events.iter().all(|event| event.name == "!render_template.viewcraft"));
    assert!(events[1].elapsed.is_some());
    assert!(events[0].elapsed.is_none());
}

#[test]
fn test_instrumentation_can_be_switched_off() {
    let instrumenter = Arc::new(RecordingInstrumenter::default());
    let config = EngineConfig::from_toml_str("[render]\ninstrument = false\n").unwrap();
    let engine = Arc::new(
        Engine::new(config)
            .unwrap()
            .with_instrumenter(instrumenter.clone()),
    );
    let resolver = resolver(&engine).with_template("pages/plain.text.raw", "plain");
    let mut view = BasicView::new(engine, Arc::new(resolver));

    assert_eq!(view.render_template("pages/plain", &Locals::new()).unwrap(), "plain");
    assert!(instrumenter.events.lock().unwrap().is_empty());
}

#[test]
fn test_mime_type_of_resolved_template() {
    let engine = Arc::new(Engine::default());
    let resolver = resolver(&engine).with_template("pages/feed.json.erb", "{}");
    let view = BasicView::new(Arc::clone(&engine), Arc::new(resolver));
    let template = view
        .lookup_context()
        .find_template("feed", &["pages".to_string()], false, &[])
        .unwrap();

    let mime = template.mime_type(engine.mime_registry()).unwrap();

    assert_eq!(mime.as_str(), "application/json");
}
