//! EJSLab Host Embedding Protocol: Frozen Wire Format
//!
//! This crate defines the canonical message types exchanged between the
//! editor and an embedding host. The wire format is JSONL (newline-delimited
//! JSON) over the embedding transport.
//!
//! # Wire format
//!
//! The `type` field carries a namespaced tag:
//!
//! - inbound  `{"type":"editor:setData","data":{"jsData":...,"ejsTemplate":...}}`
//! - outbound `{"type":"editor:ready"}`
//! - outbound `{"type":"editor:dataChanged","data":{"jsData":...,"ejsTemplate":...}}`
//!
//! Both `setData` payload fields are optional; only present fields are
//! applied. `dataChanged` always carries the full current pair, never a diff.
//!
//! The format is frozen: field names (`jsData`, `ejsTemplate`) and tags must
//! not change. Golden vectors live in `tests/wire_golden.rs`.
//!
//! # Tolerance
//!
//! Inbound parsing is tolerant by contract: a line that is not valid JSON, or
//! whose `type` is missing or unknown, yields `None` from [`parse_inbound`].
//! The host may speak newer dialects; the editor ignores what it does not
//! understand and never treats a bad message as fatal.

use serde::{Deserialize, Serialize};

// =============================================================================
// Host → Editor Messages
// =============================================================================

/// Messages sent from the embedding host to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostInbound {
    /// Replace the script and/or template text, as if the user had edited it.
    #[serde(rename = "editor:setData")]
    SetData { data: SetDataPayload },
}

/// Payload of `editor:setData`. Absent fields leave the current text alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDataPayload {
    #[serde(rename = "jsData", default, skip_serializing_if = "Option::is_none")]
    pub js_data: Option<String>,
    #[serde(rename = "ejsTemplate", default, skip_serializing_if = "Option::is_none")]
    pub ejs_template: Option<String>,
}

// =============================================================================
// Editor → Host Messages
// =============================================================================

/// Messages sent from the editor to the embedding host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostOutbound {
    /// Readiness handshake. Sent exactly once, after initial state is
    /// established and before any `dataChanged`.
    #[serde(rename = "editor:ready")]
    Ready,

    /// Sent once per observed change to either text. Full pair, not a diff.
    #[serde(rename = "editor:dataChanged")]
    DataChanged { data: DataChangedPayload },
}

/// Payload of `editor:dataChanged`: the complete current text pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChangedPayload {
    #[serde(rename = "jsData")]
    pub js_data: String,
    #[serde(rename = "ejsTemplate")]
    pub ejs_template: String,
}

/// Parse one inbound line. Returns `None` for anything malformed: bad JSON,
/// missing or unknown `type`, wrong payload shape. Never panics.
pub fn parse_inbound(line: &str) -> Option<HostInbound> {
    serde_json::from_str(line).ok()
}

/// Encode an outbound message as a single JSONL line (no trailing newline).
/// These types cannot fail to serialize; an empty string is returned in the
/// impossible case so callers never crash the session over messaging.
pub fn encode_outbound(msg: &HostOutbound) -> String {
    serde_json::to_string(msg).unwrap_or_default()
}
