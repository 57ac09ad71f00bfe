//! Event types for editor change notifications.
//!
//! These events let the persistence and host-messaging adapters observe the
//! pipeline without polling, and without writing back into its state.
//! They're also used by tests to verify ordering invariants (a `TextChanged`
//! always precedes the `Settled` it caused).

use crate::pipeline::RenderResult;

/// Events emitted by the pipeline from its single update entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Script and/or template text changed. Emitted after the change is
    /// applied, before recomputation settles.
    TextChanged(TextChangedEvent),

    /// One evaluation+render cycle finished for the current input pair.
    Settled(SettledEvent),
}

/// Emitted once per applied update. Carries the full current pair plus flags
/// for which fields this update actually touched, so observers that persist
/// per-key can skip untouched keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChangedEvent {
    pub script: String,
    pub template: String,
    pub script_changed: bool,
    pub template_changed: bool,
}

/// Emitted exactly once per recomputation, after the result replaces the
/// previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledEvent {
    pub result: RenderResult,
}

/// Callback type for receiving editor events.
pub type EventCallback = Box<dyn FnMut(&EditorEvent)>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<EditorEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: EditorEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[EditorEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only TextChanged events.
    pub fn text_changed(&self) -> Vec<&TextChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::TextChanged(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Filter to only Settled events.
    pub fn settled(&self) -> Vec<&SettledEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::Settled(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}
