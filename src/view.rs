//! Headless analysis view over an object file.
//!
//! Stands in for a disassembler engine: routines come from the symbol table, focus is
//! restricted to mapped segments, annotations are kept in memory.

use crate::bridge::address::AbsoluteAddress;
use crate::bridge::annotation::{AnnotationSink, Navigator, Rgb, Routine, SessionInfo};
use crate::error::Error;
use crate::{sync_debug, sync_info};
use object::{Object, ObjectSegment, ObjectSymbol, SymbolKind};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const TOOL_NAME: &str = "dbgsync";

/// Routine address range with an optional symbol name.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutineRange {
    pub range: Range<u64>,
    pub name: Option<String>,
}

#[derive(Default, Debug)]
struct Annotations {
    highlights: HashMap<u64, Rgb>,
    markers: BTreeSet<u64>,
    comments: HashMap<u64, String>,
    focus: Option<u64>,
}

pub struct ObjectView {
    entry_point: u64,
    page_size: u64,
    /// Sorted by range start.
    routines: Vec<RoutineRange>,
    segments: Vec<Range<u64>>,
    state: Mutex<Annotations>,
}

impl ObjectView {
    /// Load an object file and build routine and segment tables.
    pub fn load(path: &Path, page_size: u64) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let object = object::File::parse(&*mmap)?;

        let segments = object
            .segments()
            .filter(|seg| seg.size() > 0)
            .map(|seg| seg.address()..seg.address() + seg.size())
            .collect::<Vec<_>>();

        let symbols = object
            .symbols()
            .chain(object.dynamic_symbols())
            .filter(|sym| {
                sym.kind() == SymbolKind::Text && sym.is_definition() && sym.address() != 0
            })
            .map(|sym| {
                let name = sym
                    .name()
                    .ok()
                    .filter(|name| !name.is_empty())
                    .map(ToString::to_string);
                (sym.address(), sym.size(), name)
            })
            .collect::<Vec<_>>();

        let view = Self::from_parts(object.entry(), page_size, symbols, segments);
        sync_info!(
            target: "sync",
            "loaded {}: entry point {:#x}, {} routines, {} segments",
            path.display(),
            view.entry_point,
            view.routines.len(),
            view.segments.len()
        );
        Ok(view)
    }

    /// Build a view from raw `(start, size, name)` symbols.
    /// Zero-sized symbols cover the range up to the next symbol start.
    pub fn from_parts(
        entry_point: u64,
        page_size: u64,
        mut symbols: Vec<(u64, u64, Option<String>)>,
        segments: Vec<Range<u64>>,
    ) -> Self {
        // prefer sized and named symbol for the same start
        symbols.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.cmp(&a.1))
                .then(b.2.is_some().cmp(&a.2.is_some()))
        });
        symbols.dedup_by_key(|(start, _, _)| *start);

        let routines = symbols
            .iter()
            .enumerate()
            .map(|(i, (start, size, name))| {
                let end = if *size > 0 {
                    start.saturating_add(*size)
                } else {
                    symbols
                        .get(i + 1)
                        .map(|(next, _, _)| *next)
                        .or_else(|| {
                            segments
                                .iter()
                                .find(|seg| seg.contains(start))
                                .map(|seg| seg.end)
                        })
                        .unwrap_or(start.saturating_add(1))
                };
                RoutineRange {
                    range: *start..end,
                    name: name.clone(),
                }
            })
            .collect();

        Self {
            entry_point,
            page_size,
            routines,
            segments,
            state: Mutex::default(),
        }
    }

    pub fn routines(&self) -> &[RoutineRange] {
        &self.routines
    }

    pub fn highlight_at(&self, addr: AbsoluteAddress) -> Option<Rgb> {
        self.state().highlights.get(&addr.as_u64()).copied()
    }

    pub fn has_marker(&self, addr: AbsoluteAddress) -> bool {
        self.state().markers.contains(&addr.as_u64())
    }

    pub fn comment_at(&self, addr: AbsoluteAddress) -> Option<String> {
        self.state().comments.get(&addr.as_u64()).cloned()
    }

    pub fn focus(&self) -> Option<AbsoluteAddress> {
        self.state().focus.map(AbsoluteAddress::from)
    }

    fn state(&self) -> MutexGuard<'_, Annotations> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn routine_at(&self, addr: u64) -> Option<&RoutineRange> {
        let idx = self.routines.partition_point(|r| r.range.start <= addr);
        // ranges of sized symbols may overlap, so look back through preceding routines
        self.routines[..idx]
            .iter()
            .rev()
            .find(|r| r.range.contains(&addr))
    }
}

impl SessionInfo for ObjectView {
    fn entry_point(&self) -> AbsoluteAddress {
        AbsoluteAddress::from(self.entry_point)
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn tool_name(&self) -> String {
        TOOL_NAME.to_string()
    }

    fn tool_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

impl AnnotationSink for ObjectView {
    fn highlight(&self, addr: AbsoluteAddress, color: Option<Rgb>) -> bool {
        if self.routine_at(addr.as_u64()).is_none() {
            return false;
        }
        let mut state = self.state();
        match color {
            Some(color) => {
                sync_debug!(target: "sync", "highlight {addr} with {color}");
                state.highlights.insert(addr.as_u64(), color);
            }
            None => {
                sync_debug!(target: "sync", "clear highlight at {addr}");
                state.highlights.remove(&addr.as_u64());
            }
        }
        true
    }

    fn attach_marker(&self, addr: AbsoluteAddress) {
        sync_debug!(target: "sync", "breakpoint tag at {addr}");
        self.state().markers.insert(addr.as_u64());
    }

    fn detach_marker(&self, addr: AbsoluteAddress) {
        sync_debug!(target: "sync", "remove breakpoint tag at {addr}");
        self.state().markers.remove(&addr.as_u64());
    }

    fn find_containing_routine(&self, addr: AbsoluteAddress) -> Option<Routine> {
        self.routine_at(addr.as_u64()).map(|r| Routine {
            start: AbsoluteAddress::from(r.range.start),
            name: r.name.clone(),
        })
    }

    fn set_comment(&self, routine: &Routine, addr: AbsoluteAddress, text: &str) -> bool {
        sync_info!(target: "sync", "comment at {addr} ({routine}): {text}");
        self.state().comments.insert(addr.as_u64(), text.to_string());
        true
    }
}

impl Navigator for ObjectView {
    fn move_focus(&self, addr: AbsoluteAddress) -> bool {
        let mapped = self
            .segments
            .iter()
            .any(|seg| seg.contains(&addr.as_u64()));
        if mapped {
            sync_info!(target: "sync", "focus moved to {addr}");
            self.state().focus = Some(addr.as_u64());
        }
        mapped
    }
}
