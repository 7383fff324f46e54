use super::{Instrumenter, MimeRegistry, StaticMimeRegistry};
use crate::config::{ConfigError, EngineConfig};
use crate::encoding::Normalizer;
use crate::handler::Handlers;
use crate::unit::UnitRegistry;
use std::fmt;
use std::sync::Arc;

/// State shared by every view of one application
pub struct Engine {
    config: EngineConfig,
    normalizer: Normalizer,
    shared: Arc<UnitRegistry>,
    handlers: Handlers,
    mime: Arc<dyn MimeRegistry>,
    instrumenter: Option<Arc<dyn Instrumenter>>,
}

impl Engine {
    /// Create an engine with the built-in handlers and MIME table
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = Normalizer::from_config(&config.encoding)?;
        Ok(Self {
            config,
            normalizer,
            shared: UnitRegistry::new("shared"),
            handlers: Handlers::with_defaults(),
            mime: Arc::new(StaticMimeRegistry::default()),
            instrumenter: None,
        })
    }

    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_mime_registry(mut self, mime: Arc<dyn MimeRegistry>) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_instrumenter(mut self, instrumenter: Arc<dyn Instrumenter>) -> Self {
        self.instrumenter = Some(instrumenter);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Namespace for units compiled through views that share compiled templates
    pub fn shared_namespace(&self) -> &Arc<UnitRegistry> {
        &self.shared
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    pub fn mime_registry(&self) -> &dyn MimeRegistry {
        self.mime.as_ref()
    }

    /// The instrumenter, unless instrumentation is switched off in the configuration
    pub fn instrumenter(&self) -> Option<&Arc<dyn Instrumenter>> {
        if self.config.render.instrument {
            self.instrumenter.as_ref()
        } else {
            None
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            normalizer: Normalizer::default(),
            shared: UnitRegistry::new("shared"),
            handlers: Handlers::with_defaults(),
            mime: Arc::new(StaticMimeRegistry::default()),
            instrumenter: None,
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("normalizer", &self.normalizer)
            .field("shared", &self.shared)
            .field("handlers", &self.handlers)
            .field("instrumented", &self.instrumenter.is_some())
            .finish()
    }
}
