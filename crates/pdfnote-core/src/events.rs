//! Annotation notifications.

use crate::record::{AnnotationId, AnnotationRecord};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Kinds of notification a host can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Selected,
    Deselected,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Created => "annotation:created",
            EventKind::Updated => "annotation:updated",
            EventKind::Deleted => "annotation:deleted",
            EventKind::Selected => "annotation:selected",
            EventKind::Deselected => "annotation:deselected",
        }
    }
}

/// Notification payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEvent {
    Created(AnnotationRecord),
    Updated(AnnotationRecord),
    Deleted { id: AnnotationId },
    Selected(AnnotationRecord),
    Deselected,
}

impl AnnotationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AnnotationEvent::Created(_) => EventKind::Created,
            AnnotationEvent::Updated(_) => EventKind::Updated,
            AnnotationEvent::Deleted { .. } => EventKind::Deleted,
            AnnotationEvent::Selected(_) => EventKind::Selected,
            AnnotationEvent::Deselected => EventKind::Deselected,
        }
    }
}

pub type Listener = Box<dyn FnMut(&AnnotationEvent)>;

/// Synchronous observer list keyed by [`EventKind`].
///
/// Listeners run in registration order. A panicking listener is logged and
/// skipped; the remaining listeners still run.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&AnnotationEvent) + 'static) {
        self.listeners.entry(kind).or_default().push(Box::new(listener));
    }

    pub fn emit(&mut self, event: &AnnotationEvent) {
        let kind = event.kind();
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return;
        };
        for listener in listeners.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!("Error in '{}' event listener", kind.name());
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<_> = self
            .listeners
            .iter()
            .map(|(kind, list)| (kind.name(), list.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
