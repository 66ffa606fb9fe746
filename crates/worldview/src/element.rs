use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use worldview_camera::Ray;
use worldview_common::MarkerRef;
use worldview_input::{MouseEvent, MouseEventKind};
use worldview_render::{DrawableCommand, MouseEventObject};

/// What a mouse handler receives: the ray under the pointer and the picked
/// objects, front to back.
#[derive(Debug, Clone)]
pub struct ClickInfo {
    pub ray: Ray,
    pub objects: Vec<MouseEventObject>,
}

/// Lets a handler stop the handlers after it from running.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    stopped: bool,
}

impl Propagation {
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

pub type MouseHandler = Rc<dyn Fn(&MouseEvent, &ClickInfo, &mut Propagation)>;

/// Handlers keyed by the event they answer.
#[derive(Clone, Default)]
pub struct MouseHandlers(HashMap<MouseEventKind, MouseHandler>);

impl MouseHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        kind: MouseEventKind,
        handler: impl Fn(&MouseEvent, &ClickInfo, &mut Propagation) + 'static,
    ) {
        self.0.insert(kind, Rc::new(handler));
    }

    pub fn remove(&mut self, kind: MouseEventKind) {
        self.0.remove(&kind);
    }

    pub fn get(&self, kind: MouseEventKind) -> Option<&MouseHandler> {
        self.0.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MouseHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// One declared drawable: a command, its markers and its handlers, under a
/// key that stays stable across frames.
///
/// Re-declaring a key replaces its command, markers and handlers in place,
/// keeping its position in the draw order.
#[derive(Clone)]
pub struct Element {
    pub key: String,
    pub command: Rc<dyn DrawableCommand>,
    /// `None` draws nothing this frame but keeps the element mounted.
    pub markers: Option<Vec<MarkerRef>>,
    pub layer_index: Option<i32>,
    pub handlers: MouseHandlers,
}

impl Element {
    pub fn new(key: impl Into<String>, command: Rc<dyn DrawableCommand>) -> Self {
        Self {
            key: key.into(),
            command,
            markers: Some(Vec::new()),
            layer_index: None,
            handlers: MouseHandlers::new(),
        }
    }

    pub fn with_markers(mut self, markers: Vec<MarkerRef>) -> Self {
        self.markers = Some(markers);
        self
    }

    pub fn with_layer(mut self, layer_index: i32) -> Self {
        self.layer_index = Some(layer_index);
        self
    }

    pub fn on(
        mut self,
        kind: MouseEventKind,
        handler: impl Fn(&MouseEvent, &ClickInfo, &mut Propagation) + 'static,
    ) -> Self {
        self.handlers.set(kind, handler);
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("key", &self.key)
            .field("command", &self.command.definition().label)
            .field("markers", &self.markers.as_ref().map(Vec::len))
            .field("layer_index", &self.layer_index)
            .field("handlers", &self.handlers)
            .finish()
    }
}
