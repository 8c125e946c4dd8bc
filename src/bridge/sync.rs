use crate::bridge::address::{AbsoluteAddress, Base, Offset};
use crate::bridge::annotation::{AnnotationSink, Palette};
use crate::bridge::breakpoint::BreakpointStore;
use crate::bridge::marker::ExecutionMarker;
use crate::error::Error;
use crate::{sync_debug, sync_warn, weak_error};
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;

/// Offset as sent by the debugger side, either an address literal or a plain integer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum OffsetArg {
    Text(String),
    Int(i128),
}

impl From<&str> for OffsetArg {
    fn from(s: &str) -> Self {
        OffsetArg::Text(s.to_string())
    }
}

impl From<u64> for OffsetArg {
    fn from(v: u64) -> Self {
        OffsetArg::Int(v as i128)
    }
}

/// Breakpoint changes made on the disassembler side since the previous synchronization,
/// expressed in offsets.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct SyncReply {
    pub added: Vec<Offset>,
    pub removed: Vec<Offset>,
}

/// Reconciliation of the current instruction and the breakpoint set between the debugger
/// and the disassembler.
pub struct SyncService {
    base: Base,
    store: BreakpointStore,
    marker: ExecutionMarker,
    sink: Arc<dyn AnnotationSink>,
}

impl SyncService {
    pub fn new(base: Base, sink: Arc<dyn AnnotationSink>, palette: Palette) -> Self {
        Self {
            base,
            store: BreakpointStore::new(sink.clone(), palette.breakpoint),
            marker: ExecutionMarker::new(sink.clone(), palette.current_instruction),
            sink,
        }
    }

    pub fn base(&self) -> Base {
        self.base
    }

    pub fn position(&self) -> Option<AbsoluteAddress> {
        self.marker.position()
    }

    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.store
    }

    /// Add breakpoint from the disassembler side. It is reported to the debugger
    /// on the next synchronization.
    pub fn add_breakpoint(&mut self, addr: AbsoluteAddress) -> bool {
        let added = self.store.add(addr);
        if added {
            self.keep_marker_on_top(addr);
        }
        added
    }

    /// Remove breakpoint from the disassembler side. It is reported to the debugger
    /// on the next synchronization.
    pub fn delete_breakpoint(&mut self, addr: AbsoluteAddress) -> bool {
        let removed = self.store.remove(addr);
        if removed {
            self.keep_marker_on_top(addr);
        }
        removed
    }

    /// Run one synchronization cycle.
    ///
    /// Moves the current instruction marker to `pc`, applies breakpoint deltas from the
    /// debugger (adds first, then removes) and returns changes of the local breakpoint set
    /// the debugger doesn't know about yet.
    ///
    /// All arguments are parsed before any state change, a malformed literal fails the whole
    /// call. Offsets out of address space are skipped.
    pub fn synchronize(
        &mut self,
        pc: &OffsetArg,
        added: &[OffsetArg],
        removed: &[OffsetArg],
    ) -> Result<SyncReply, Error> {
        let pc = self.translate(pc)?;
        let added = self.translate_all(added)?;
        let removed = self.translate_all(removed)?;

        if let Some(left) = self.marker.move_to(pc) {
            if self.store.contains(left) {
                self.sink.highlight(left, Some(self.store.color()));
            }
        }

        sync_debug!(target: "sync", "pre-debugger-add-breakpoints: {}", added.iter().join(", "));
        sync_debug!(target: "sync", "pre-debugger-del-breakpoints: {}", removed.iter().join(", "));
        sync_debug!(target: "sync", "pre-local-breakpoints: {}", self.store.iter().join(", "));

        for &addr in &added {
            self.add_breakpoint(addr);
        }
        for &addr in &removed {
            self.delete_breakpoint(addr);
        }

        let diff = self.store.diff_against_previous();
        self.store.commit_snapshot();

        // the debugger already knows about its own changes
        let added: HashSet<_> = added.into_iter().collect();
        let removed: HashSet<_> = removed.into_iter().collect();
        let reply = SyncReply {
            added: self.to_offsets(diff.added.into_iter().filter(|a| !added.contains(a))),
            removed: self.to_offsets(diff.removed.into_iter().filter(|a| !removed.contains(a))),
        };

        let post_added = reply.added.iter().join(", ");
        let post_removed = reply.removed.iter().join(", ");
        sync_debug!(target: "sync", "post-local-add-breakpoints: {post_added}");
        sync_debug!(target: "sync", "post-local-del-breakpoints: {post_removed}");
        sync_debug!(target: "sync", "post-local-breakpoints: {}", self.store.iter().join(", "));

        Ok(reply)
    }

    /// Breakpoint annotation changes must not hide the current instruction highlight.
    fn keep_marker_on_top(&self, addr: AbsoluteAddress) {
        if self.marker.position() == Some(addr) {
            self.sink.highlight(addr, Some(self.marker.color()));
        }
    }

    fn translate(&self, arg: &OffsetArg) -> Result<AbsoluteAddress, Error> {
        let offset = match arg {
            OffsetArg::Text(text) => text.parse::<Offset>()?,
            OffsetArg::Int(v) => {
                u64::try_from(*v)
                    .map(Offset::from)
                    .map_err(|_| Error::InvalidAddress {
                        address: v.to_string(),
                        base: self.base,
                    })?
            }
        };
        offset.relocate(self.base)
    }

    fn translate_all(&self, args: &[OffsetArg]) -> Result<Vec<AbsoluteAddress>, Error> {
        let mut addresses = Vec::with_capacity(args.len());
        for arg in args {
            match self.translate(arg) {
                Ok(addr) => addresses.push(addr),
                Err(e @ Error::MalformedAddress(_)) => return Err(e),
                Err(e) => sync_warn!(target: "sync", "skip breakpoint: {e:#}"),
            }
        }
        Ok(addresses)
    }

    fn to_offsets(&self, addresses: impl Iterator<Item = AbsoluteAddress>) -> Vec<Offset> {
        addresses
            .filter_map(|addr| weak_error!(addr.into_offset(self.base), "skip breakpoint:"))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bridge::annotation::recorder::{Call, Recorder};
    use crate::bridge::annotation::Rgb;

    const BASE: u64 = 0x400000;

    fn service() -> (Arc<Recorder>, SyncService) {
        let rec = Arc::new(Recorder::default());
        let base = Base::new(AbsoluteAddress::from(BASE));
        let service = SyncService::new(base, rec.clone(), Palette::default());
        (rec, service)
    }

    fn abs(off: u64) -> AbsoluteAddress {
        AbsoluteAddress::from(BASE + off)
    }

    fn offsets(v: &[u64]) -> Vec<Offset> {
        v.iter().copied().map(Offset::from).collect()
    }

    #[test]
    fn test_synchronize_bidirectional() {
        let (_, mut service) = service();

        let reply = service
            .synchronize(&"0x10".into(), &["0x100".into()], &[])
            .unwrap();
        assert!(service.breakpoints().contains(abs(0x100)));
        assert_eq!(reply, SyncReply::default());

        // breakpoint from the disassembler ui
        assert!(service.add_breakpoint(abs(0x200)));
        let reply = service.synchronize(&"0x20".into(), &[], &[]).unwrap();
        assert_eq!(reply.added, offsets(&[0x200]));
        assert!(reply.removed.is_empty());

        // already reported
        let reply = service.synchronize(&"0x20".into(), &[], &[]).unwrap();
        assert_eq!(reply, SyncReply::default());

        assert!(service.delete_breakpoint(abs(0x100)));
        let reply = service.synchronize(&"0x24".into(), &[], &[]).unwrap();
        assert!(reply.added.is_empty());
        assert_eq!(reply.removed, offsets(&[0x100]));
    }

    #[test]
    fn test_synchronize_position_transition() {
        let (rec, mut service) = service();
        service.synchronize(&"0x10".into(), &[], &[]).unwrap();
        rec.clear();
        service.synchronize(&"0x20".into(), &[], &[]).unwrap();

        assert_eq!(service.position(), Some(abs(0x20)));
        assert_eq!(
            rec.calls(),
            vec![
                Call::Highlight(BASE + 0x10, None),
                Call::Highlight(BASE + 0x20, Some(Rgb::GREEN)),
            ]
        );
    }

    #[test]
    fn test_synchronize_restores_breakpoint_highlight() {
        let (rec, mut service) = service();
        service
            .synchronize(&"0x10".into(), &["0x10".into()], &[])
            .unwrap();
        rec.clear();
        service.synchronize(&"0x14".into(), &[], &[]).unwrap();

        assert_eq!(
            rec.calls(),
            vec![
                Call::Highlight(BASE + 0x10, None),
                Call::Highlight(BASE + 0x14, Some(Rgb::GREEN)),
                Call::Highlight(BASE + 0x10, Some(Rgb::RED)),
            ]
        );
    }

    #[test]
    fn test_breakpoint_change_at_current_instruction() {
        let (rec, mut service) = service();
        service.synchronize(&"0x10".into(), &[], &[]).unwrap();

        rec.clear();
        service
            .synchronize(&"0x10".into(), &["0x10".into()], &[])
            .unwrap();
        assert_eq!(
            rec.calls(),
            vec![
                Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)),
                Call::Highlight(BASE + 0x10, Some(Rgb::RED)),
                Call::Attach(BASE + 0x10),
                Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)),
            ]
        );

        rec.clear();
        service
            .synchronize(&"0x10".into(), &[], &["0x10".into()])
            .unwrap();
        assert_eq!(
            rec.calls(),
            vec![
                Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)),
                Call::Highlight(BASE + 0x10, None),
                Call::Detach(BASE + 0x10),
                Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)),
            ]
        );

        // same for breakpoints from the disassembler ui
        rec.clear();
        assert!(service.add_breakpoint(abs(0x10)));
        assert!(service.delete_breakpoint(abs(0x10)));
        assert_eq!(
            rec.calls().last(),
            Some(&Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)))
        );
        assert_eq!(
            rec.calls()
                .iter()
                .filter(|c| **c == Call::Highlight(BASE + 0x10, Some(Rgb::GREEN)))
                .count(),
            2
        );
    }

    #[test]
    fn test_unrepresentable_pc_keeps_marker() {
        let (rec, mut service) = service();
        service.synchronize(&"0x10".into(), &[], &[]).unwrap();
        rec.clear();

        for pc in [OffsetArg::Int(-1), "0xffffffffffffffff".into()] {
            let err = service.synchronize(&pc, &["0x100".into()], &[]).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress { .. }), "pc {pc:?}");
        }
        assert_eq!(service.position(), Some(abs(0x10)));
        assert!(service.breakpoints().is_empty());
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_synchronize_overlapping_delta() {
        let (_, mut service) = service();
        let reply = service
            .synchronize(&"0x10".into(), &["0x100".into()], &["0x100".into()])
            .unwrap();
        assert!(!service.breakpoints().contains(abs(0x100)));
        assert_eq!(reply, SyncReply::default());
    }

    #[test]
    fn test_synchronize_remote_remove_of_local_add() {
        let (_, mut service) = service();
        service.add_breakpoint(abs(0x300));
        let reply = service
            .synchronize(&"0x10".into(), &[], &["0x300".into()])
            .unwrap();
        assert!(service.breakpoints().is_empty());
        assert_eq!(reply, SyncReply::default());
    }

    #[test]
    fn test_synchronize_integer_offsets() {
        let (_, mut service) = service();
        let reply = service
            .synchronize(&"16".into(), &[OffsetArg::Int(0x100), OffsetArg::Int(-1)], &[])
            .unwrap();
        assert_eq!(service.position(), Some(abs(0x10)));
        assert_eq!(service.breakpoints().len(), 1);
        assert!(service.breakpoints().contains(abs(0x100)));
        assert_eq!(reply, SyncReply::default());
    }

    #[test]
    fn test_synchronize_malformed_is_atomic() {
        let (rec, mut service) = service();
        service.synchronize(&"0x10".into(), &[], &[]).unwrap();
        rec.clear();

        let err = service
            .synchronize(&"0x20".into(), &["0x100".into(), "oops".into()], &[])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedAddress(_)));
        let err = service
            .synchronize(&"pc".into(), &["0x100".into()], &[])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedAddress(_)));

        assert_eq!(service.position(), Some(abs(0x10)));
        assert!(service.breakpoints().is_empty());
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_local_breakpoint_below_base_is_skipped() {
        let (_, mut service) = service();
        service.add_breakpoint(AbsoluteAddress::from(0x1000));
        service.add_breakpoint(abs(0x40));
        let reply = service.synchronize(&"0x10".into(), &[], &[]).unwrap();
        assert_eq!(reply.added, offsets(&[0x40]));
    }
}
