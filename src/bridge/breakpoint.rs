use crate::bridge::address::AbsoluteAddress;
use crate::bridge::annotation::{AnnotationSink, Rgb};
use crate::{sync_debug, sync_info};
use indexmap::IndexSet;
use std::sync::Arc;

/// Difference between current breakpoint set and the last committed snapshot.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct BreakpointDiff {
    /// Breakpoints that appear since the snapshot.
    pub added: Vec<AbsoluteAddress>,
    /// Breakpoints that disappear since the snapshot.
    pub removed: Vec<AbsoluteAddress>,
}

/// Set of breakpoints known to the disassembler side.
///
/// Breakpoint identified by its absolute address only, so set never contains duplicates.
/// Iteration order is an insertion order.
pub struct BreakpointStore {
    current: IndexSet<AbsoluteAddress>,
    previous: IndexSet<AbsoluteAddress>,
    sink: Arc<dyn AnnotationSink>,
    color: Rgb,
}

impl BreakpointStore {
    pub fn new(sink: Arc<dyn AnnotationSink>, color: Rgb) -> Self {
        Self {
            current: IndexSet::new(),
            previous: IndexSet::new(),
            sink,
            color,
        }
    }

    /// Add breakpoint and annotate it. Return false if breakpoint already exists.
    pub fn add(&mut self, addr: AbsoluteAddress) -> bool {
        if !self.current.insert(addr) {
            sync_debug!(target: "sync", "breakpoint {addr} already exists");
            return false;
        }
        sync_info!(target: "sync", "breakpoint {addr} added");
        self.sink.highlight(addr, Some(self.color));
        self.sink.attach_marker(addr);
        true
    }

    /// Remove breakpoint and its annotations. Return false if there is no such breakpoint.
    pub fn remove(&mut self, addr: AbsoluteAddress) -> bool {
        if !self.current.shift_remove(&addr) {
            sync_debug!(target: "sync", "breakpoint {addr} not found");
            return false;
        }
        sync_info!(target: "sync", "breakpoint {addr} removed");
        self.sink.highlight(addr, None);
        self.sink.detach_marker(addr);
        true
    }

    pub fn contains(&self, addr: AbsoluteAddress) -> bool {
        self.current.contains(&addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = AbsoluteAddress> + '_ {
        self.current.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Breakpoint color used for annotations.
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Compare current set with the last committed snapshot.
    pub fn diff_against_previous(&self) -> BreakpointDiff {
        BreakpointDiff {
            added: self.current.difference(&self.previous).copied().collect(),
            removed: self.previous.difference(&self.current).copied().collect(),
        }
    }

    /// Replace snapshot with a copy of current set.
    pub fn commit_snapshot(&mut self) {
        self.previous = self.current.clone();
    }
}
