//! Breakpoint and current instruction reconciliation between an external debugger and a
//! disassembler view of the same program.

pub mod address;
pub mod annotation;
pub mod breakpoint;
pub mod marker;
pub mod session;
pub mod sync;

pub use address::{AbsoluteAddress, Base, Offset};
pub use annotation::{AnnotationSink, Navigator, Palette, Rgb, Routine, SessionInfo};
pub use session::{Session, SharedSession, ShutdownSignal};
pub use sync::{OffsetArg, SyncReply, SyncService};
