//! Reactive evaluation/render pipeline.
//!
//! The pipeline owns the script text, the template text, and the single
//! current result. All mutation funnels through [`Pipeline::apply`], user
//! edits and inbound host commands alike, so observers can rely on a strict
//! ordering: text applied, `TextChanged` emitted, recomputation run to
//! completion, `Settled` emitted. Recomputation is synchronous; a settle
//! always reflects the most recent input pair and no stale result can ever
//! overwrite a newer one.

use crate::evaluator;
use crate::events::{EditorEvent, EventCallback, SettledEvent, TextChangedEvent};
use crate::template::TemplateEngine;

/// The single source of truth for the output views. `Rendered` HTML and a
/// displayed error are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderResult {
    Rendered { html: String },
    Failed { message: String },
}

impl RenderResult {
    /// The rendered HTML, absent when the pipeline failed.
    pub fn html(&self) -> Option<&str> {
        match self {
            RenderResult::Rendered { html } => Some(html),
            RenderResult::Failed { .. } => None,
        }
    }

    /// The diagnostic message, absent when rendering succeeded.
    pub fn error(&self) -> Option<&str> {
        match self {
            RenderResult::Rendered { .. } => None,
            RenderResult::Failed { message } => Some(message),
        }
    }
}

/// Pipeline lifecycle. Externally the pipeline is only ever observed
/// `Settled`; recomputation runs to completion inside `apply`/`new`.
#[derive(Debug)]
enum PipelineState {
    /// Constructed, initial recomputation not yet run.
    Idle,
    /// An update is being applied; the previous result is superseded.
    Recomputing,
    /// The current result for the current input pair.
    Settled(RenderResult),
}

/// An update to apply through the single entry point. Absent fields leave
/// the corresponding text alone.
#[derive(Debug, Clone, Default)]
pub struct TextUpdate {
    pub script: Option<String>,
    pub template: Option<String>,
}

impl TextUpdate {
    pub fn is_empty(&self) -> bool {
        self.script.is_none() && self.template.is_none()
    }
}

pub struct Pipeline {
    script: String,
    template: String,
    engine: TemplateEngine,
    state: PipelineState,
    subscribers: Vec<EventCallback>,
}

impl Pipeline {
    /// Build the pipeline and run the initial recomputation synchronously;
    /// the pipeline is settled before `new` returns. Subscribers attached
    /// afterwards see only subsequent changes, which is why the readiness
    /// handshake comes after construction.
    pub fn new(script: String, template: String, engine: TemplateEngine) -> Self {
        let mut pipeline = Self {
            script,
            template,
            engine,
            state: PipelineState::Idle,
            subscribers: Vec::new(),
        };
        pipeline.recompute();
        pipeline
    }

    /// Attach a read-only observer. Callbacks run synchronously, in
    /// subscription order, after the state they describe is in place.
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.subscribers.push(callback);
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The current result. Always present once `new` has returned.
    pub fn result(&self) -> Option<&RenderResult> {
        match &self.state {
            PipelineState::Settled(result) => Some(result),
            _ => None,
        }
    }

    /// The single update entry point. Applies present fields, notifies
    /// observers, recomputes, settles. An update with no fields is a no-op:
    /// nothing was observed to change, so no events fire.
    pub fn apply(&mut self, update: TextUpdate) {
        if update.is_empty() {
            return;
        }
        let script_changed = update.script.is_some();
        let template_changed = update.template.is_some();
        if let Some(script) = update.script {
            self.script = script;
        }
        if let Some(template) = update.template {
            self.template = template;
        }
        self.state = PipelineState::Recomputing;
        self.emit(EditorEvent::TextChanged(TextChangedEvent {
            script: self.script.clone(),
            template: self.template.clone(),
            script_changed,
            template_changed,
        }));
        self.recompute();
        if let PipelineState::Settled(result) = &self.state {
            let event = EditorEvent::Settled(SettledEvent {
                result: result.clone(),
            });
            self.emit(event);
        }
    }

    /// Evaluate then render the current pair. Evaluator failure
    /// short-circuits: the renderer never sees a broken context, and the
    /// evaluator's message is the one surfaced.
    fn recompute(&mut self) {
        self.state = PipelineState::Recomputing;
        let result = match evaluator::evaluate(&self.script) {
            Ok(ctx) => match self.engine.render(&self.template, &ctx) {
                Ok(html) => RenderResult::Rendered { html },
                Err(e) => RenderResult::Failed {
                    message: e.to_string(),
                },
            },
            Err(e) => RenderResult::Failed {
                message: e.to_string(),
            },
        };
        if let RenderResult::Failed { message } = &result {
            log::debug!("pipeline settled with failure: {}", message);
        }
        self.state = PipelineState::Settled(result);
    }

    fn emit(&mut self, event: EditorEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }
}
