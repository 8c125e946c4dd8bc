use crate::bridge::address::AbsoluteAddress;
use crate::bridge::annotation::{AnnotationSink, Rgb};
use crate::sync_debug;
use std::sync::Arc;

/// Current instruction marker.
pub struct ExecutionMarker {
    position: Option<AbsoluteAddress>,
    sink: Arc<dyn AnnotationSink>,
    color: Rgb,
}

impl ExecutionMarker {
    pub fn new(sink: Arc<dyn AnnotationSink>, color: Rgb) -> Self {
        Self {
            position: None,
            sink,
            color,
        }
    }

    /// Current instruction address, `None` until first move.
    pub fn position(&self) -> Option<AbsoluteAddress> {
        self.position
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Move marker to `pc`. Old position highlight cleared before the new one is set.
    /// Return the previous position if it differs from `pc`.
    pub fn move_to(&mut self, pc: AbsoluteAddress) -> Option<AbsoluteAddress> {
        sync_debug!(target: "sync", "current_pc={pc}, old_pc={:?}", self.position);

        let left = self.position.filter(|&old| old != pc);
        if let Some(old) = left {
            self.sink.highlight(old, None);
        }
        if !self.sink.highlight(pc, Some(self.color)) {
            sync_debug!(target: "sync", "no routine at current instruction {pc}");
        }
        self.position = Some(pc);
        left
    }
}
