use dbgsync::bridge::{Palette, Session, SharedSession, ShutdownSignal};
use dbgsync::rpc::tracer::FileTracer;
use dbgsync::rpc::RpcServer;
use dbgsync::view::ObjectView;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

pub const ENTRY_POINT: u64 = 0x401a2c;

/// Host with two routines: `main` at `[0x401000, 0x401400)` and `helper` at `[0x401400, 0x402000)`.
pub fn host() -> Arc<ObjectView> {
    Arc::new(ObjectView::from_parts(
        ENTRY_POINT,
        0x1000,
        vec![
            (0x401000, 0x400, Some("main".to_string())),
            (0x401400, 0, Some("helper".to_string())),
        ],
        vec![0x400000..0x402000],
    ))
}

pub struct TestServer {
    pub host: Arc<ObjectView>,
    pub session: SharedSession,
    pub addr: SocketAddr,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with_tracer(None)
    }

    /// Start a server that traces its traffic.
    pub fn start_with_tracer(tracer: Option<FileTracer>) -> Self {
        let host = host();
        let session = Session::new(
            host.as_ref(),
            host.clone(),
            host.clone(),
            Palette::default(),
        )
        .unwrap()
        .into_shared();
        let server = RpcServer::bind("127.0.0.1:0", session.clone())
            .unwrap()
            .with_tracer(tracer, true);
        let addr = server.local_addr().unwrap();
        let handle = server.spawn().unwrap();
        Self {
            host,
            session,
            addr,
            handle: Some(handle),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.session.lock().unwrap().shutdown_signal()
    }

    /// Wait until the server worker exits.
    pub fn join(&mut self) -> anyhow::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().expect("rpc worker panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Ok(session) = self.session.lock() {
                session.terminate();
            }
            _ = self.join();
        }
    }
}
