//! The single diagnostic sink warnings flow through.
//!
//! Mirrors the emit/collect split `vex_diagnostics::DiagnosticEngine` uses,
//! scaled down to freeform lines since the module subsystem has no source
//! spans of its own to attach.

use std::sync::Mutex;

pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Prints `WARNING: {message}` to stderr, matching the literal warning
/// text callers expect (e.g. "WARNING: both A and B
/// export \"x\"; ...").
#[derive(Debug, Default)]
pub struct StderrSink;

impl WarningSink for StderrSink {
    fn warn(&self, message: &str) {
        eprintln!("WARNING: {message}");
        log::warn!("{message}");
    }
}

/// Buffers warnings instead of printing them, so tests can assert on exact
/// text and on how many times a warning fired (e.g. an ambiguity warning
/// must fire exactly once, not once per lookup).
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
        log::warn!("{message}");
    }
}
