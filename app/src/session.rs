//! Session wiring: store → pipeline → adapters.
//!
//! Startup order matters and is part of the external contract:
//!
//! 1. load both documents (seeding defaults for absent keys)
//! 2. construct the pipeline (the initial recomputation settles here)
//! 3. attach the persistence observer
//! 4. embedded only: send `editor:ready`, then attach the change notifier
//!
//! Because the loop is single-threaded, nothing can change between the
//! handshake and the notifier subscription, so a host that sends `setData`
//! before or after `ready` sees exactly one `dataChanged` per change either
//! way.

use ejslab_engine::defaults::{DEFAULT_SCRIPT, DEFAULT_TEMPLATE};
use ejslab_engine::events::EditorEvent;
use ejslab_engine::pipeline::{Pipeline, RenderResult, TextUpdate};
use ejslab_engine::template::TemplateEngine;
use ejslab_protocol::{parse_inbound, DataChangedPayload, HostInbound, HostOutbound};
use ejslab_store::{DocumentStore, KEY_SCRIPT, KEY_TEMPLATE};

pub struct Session {
    pipeline: Pipeline,
    embedded: bool,
}

impl Session {
    /// Build a running session. `outbound` is the host transport's write
    /// half; it is only ever invoked when `embedded` is true.
    pub fn start(
        store: DocumentStore,
        embedded: bool,
        mut outbound: impl FnMut(&HostOutbound) + 'static,
    ) -> Self {
        let script = store.load_or(KEY_SCRIPT, DEFAULT_SCRIPT);
        let template = store.load_or(KEY_TEMPLATE, DEFAULT_TEMPLATE);
        let mut pipeline = Pipeline::new(script, template, TemplateEngine::new());

        // Persistence observes applied changes; it never gates them. Only
        // the keys an update actually touched are written.
        pipeline.subscribe(Box::new(move |event| {
            if let EditorEvent::TextChanged(change) = event {
                if change.script_changed {
                    store.save(KEY_SCRIPT, &change.script);
                }
                if change.template_changed {
                    store.save(KEY_TEMPLATE, &change.template);
                }
            }
        }));

        if embedded {
            outbound(&HostOutbound::Ready);
            pipeline.subscribe(Box::new(move |event| {
                if let EditorEvent::TextChanged(change) = event {
                    outbound(&HostOutbound::DataChanged {
                        data: DataChangedPayload {
                            js_data: change.script.clone(),
                            ejs_template: change.template.clone(),
                        },
                    });
                }
            }));
        }

        Session { pipeline, embedded }
    }

    /// Process one inbound transport line. Anything unrecognized is dropped
    /// without touching editor state.
    pub fn handle_line(&mut self, line: &str) {
        match parse_inbound(line) {
            Some(HostInbound::SetData { data }) => {
                self.pipeline.apply(TextUpdate {
                    script: data.js_data,
                    template: data.ejs_template,
                });
            }
            None => {
                if !line.trim().is_empty() {
                    log::debug!("ignoring unrecognized host message");
                }
            }
        }
    }

    pub fn result(&self) -> Option<&RenderResult> {
        self.pipeline.result()
    }

    pub fn embedded(&self) -> bool {
        self.embedded
    }

    /// One-shot print flow for the current result. No-op when there is
    /// nothing rendered.
    pub fn print_current(&self) {
        if let Some(result) = self.result() {
            crate::preview::print(result);
        }
    }
}
