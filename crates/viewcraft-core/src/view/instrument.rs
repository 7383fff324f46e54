use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Finish,
}

/// Payload of the event bracketing a render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEvent {
    pub name: &'static str,
    pub phase: Phase,
    pub identifier: String,
    pub virtual_path: Option<String>,
    /// Set on `Finish`
    pub elapsed: Option<Duration>,
    /// Set on `Finish` when the render failed
    pub failed: bool,
}

/// Receiver of render events
///
/// Events are fire-and-forget: nothing an instrumenter does feeds back into the render.
pub trait Instrumenter: Send + Sync {
    fn instrument(&self, event: &RenderEvent);
}
