//! Host embedding transport: JSONL over stdio.
//!
//! stdin carries inbound host commands, stdout carries outbound
//! notifications. Nothing else may write to stdout in embedded mode; the
//! evaluator already redirects script `print()` for this reason.

use std::io::{BufRead, Write};

use ejslab_protocol::{encode_outbound, HostOutbound};

use crate::session::Session;

/// Whether this process has an embedding host on the other end of stdio.
/// Derived once at startup, immutable thereafter.
pub fn detect_embedded(force: bool) -> bool {
    force || atty::isnt(atty::Stream::Stdin)
}

/// Write one outbound message. Transport failures are absorbed: a vanished
/// host must not take the editor down with it.
pub fn send(msg: &HostOutbound) {
    let line = encode_outbound(msg);
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if writeln!(handle, "{}", line).and_then(|_| handle.flush()).is_err() {
        log::warn!("host transport write failed");
    }
}

/// Drive the session from stdin until EOF. Each line is one discrete event;
/// the pipeline settles fully before the next line is read.
pub fn run_loop(session: &mut Session) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => session.handle_line(&line),
            Err(e) => {
                log::warn!("host transport read failed: {}", e);
                break;
            }
        }
    }
}
