use crate::bridge::address::{AbsoluteAddress, Base};
use crate::bridge::annotation::{AnnotationSink, Navigator, Palette, SessionInfo};
use crate::bridge::sync::SyncService;
use crate::error::Error;
use crate::sync_info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cooperative stop flag shared between a session and the server loop.
#[derive(Clone, Default, Debug)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Raise the flag. Return false if it was already raised.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one bridge session: breakpoint and position synchronization plus
/// access to the host engine.
pub struct Session {
    sync: SyncService,
    sink: Arc<dyn AnnotationSink>,
    navigator: Arc<dyn Navigator>,
    tool: (String, String),
    shutdown: ShutdownSignal,
}

impl Session {
    /// Create a session. Base address computed once here from the engine entry point.
    pub fn new(
        info: &dyn SessionInfo,
        sink: Arc<dyn AnnotationSink>,
        navigator: Arc<dyn Navigator>,
        palette: Palette,
    ) -> Result<Self, Error> {
        let base = Base::from_entry_point(info.entry_point(), info.page_size())?;
        sync_info!(target: "sync", "session base: {base} (entry point {})", info.entry_point());
        Ok(Self {
            sync: SyncService::new(base, sink.clone(), palette),
            sink,
            navigator,
            tool: (info.tool_name(), info.tool_version()),
            shutdown: ShutdownSignal::default(),
        })
    }

    pub fn into_shared(self) -> SharedSession {
        SharedSession(Arc::new(Mutex::new(self)))
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncService {
        &mut self.sync
    }

    pub fn sink(&self) -> &dyn AnnotationSink {
        self.sink.as_ref()
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    /// Tool name and version of the host engine.
    pub fn tool(&self) -> (&str, &str) {
        (&self.tool.0, &self.tool.1)
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Mark session as terminated. Return false if already terminated.
    pub fn terminate(&self) -> bool {
        self.shutdown.raise()
    }

    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_raised()
    }
}

/// Session handle shared between the RPC worker and the host user interface thread.
#[derive(Clone)]
pub struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    pub fn lock(&self) -> Result<MutexGuard<'_, Session>, Error> {
        self.0.lock().map_err(|_| Error::SessionPoisoned)
    }

    /// Add breakpoint from the host side.
    pub fn add_breakpoint(&self, addr: AbsoluteAddress) -> Result<bool, Error> {
        Ok(self.lock()?.sync_mut().add_breakpoint(addr))
    }

    /// Delete breakpoint from the host side.
    pub fn delete_breakpoint(&self, addr: AbsoluteAddress) -> Result<bool, Error> {
        Ok(self.lock()?.sync_mut().delete_breakpoint(addr))
    }
}
