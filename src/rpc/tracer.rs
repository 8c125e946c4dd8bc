use anyhow::Context;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Direction of a traced message.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// File-based tracer of RPC traffic and server diagnostics.
#[derive(Clone)]
pub struct FileTracer {
    file: Arc<Mutex<std::fs::File>>,
}

impl FileTracer {
    pub fn new(path: &std::path::Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn line(&self, text: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{text}");
        }
    }

    pub fn message(&self, direction: Direction, message: &Value) {
        let arrow = match direction {
            Direction::Incoming => "<-",
            Direction::Outgoing => "->",
        };
        if let Ok(line) = serde_json::to_string(message) {
            self.line(&format!("{arrow} {line}"));
        }
    }
}
