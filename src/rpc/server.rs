use crate::bridge::session::{SharedSession, ShutdownSignal};
use crate::error::Error;
use crate::rpc::io::RpcIo;
use crate::rpc::protocol::{RpcRequest, RpcResponse};
use crate::rpc::registry::MethodRegistry;
use crate::rpc::tracer::FileTracer;
use crate::{sync_debug, sync_error, sync_info, sync_warn};
use serde_json::Value;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Period of shutdown flag checks while there is nothing to serve.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Connection dropped if no request arrives in this period.
const IDLE_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking request/response RPC server.
///
/// One worker serves connections sequentially: accept a connection, read one request,
/// dispatch it to completion, write the response and close the connection. An idle peer
/// never blocks the worker for longer than [`IDLE_TIMEOUT`]. Stops after answering a
/// `shutdown` call or when the session shutdown signal is raised by other means.
pub struct RpcServer {
    listener: TcpListener,
    registry: MethodRegistry,
    session: SharedSession,
    shutdown: ShutdownSignal,
    tracer: Option<FileTracer>,
    trace: bool,
    seq: i64,
}

impl RpcServer {
    /// Bind a listener. Bind failure is fatal for the server.
    pub fn bind(addr: &str, session: SharedSession) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let shutdown = session.lock()?.shutdown_signal();
        Ok(Self {
            listener,
            registry: MethodRegistry::new(),
            session,
            shutdown,
            tracer: None,
            trace: false,
            seq: 0,
        })
    }

    /// Write server diagnostics (and traffic, if `trace` is set) into a file.
    pub fn with_tracer(self, tracer: Option<FileTracer>, trace: bool) -> Self {
        Self {
            tracer,
            trace,
            ..self
        }
    }

    /// Raising this signal stops the server after the request in flight (if any).
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until shutdown.
    pub fn run(mut self) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        sync_info!(target: "rpc", "starting rpc server: {addr}");
        sync_debug!(target: "rpc", "registered {} methods", self.registry.len());

        self.listener.set_nonblocking(true)?;
        while !self.shutdown.is_raised() {
            let (stream, peer) = match self.listener.accept() {
                Ok(v) => v,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
                Err(err) => {
                    sync_warn!(target: "rpc", "accept failed: {err:#}");
                    continue;
                }
            };
            if let Err(err) = stream.set_nonblocking(false) {
                sync_warn!(target: "rpc", "failed to setup connection {peer}: {err:#}");
                continue;
            }
            sync_debug!(target: "rpc", "client connected: {peer}");
            self.trace_line(&format!("client connected: {peer}"));

            let io = match RpcIo::new(stream, self.tracer.clone(), self.trace) {
                Ok(v) => v,
                Err(err) => {
                    sync_warn!(target: "rpc", "failed to init rpc I/O: {err:#}");
                    continue;
                }
            };

            match self.serve_connection(io) {
                Ok(()) => self.trace_line(&format!("client disconnected: {peer}")),
                Err(err) if err.is_fatal() => {
                    sync_error!(target: "rpc", "rpc server failed: {err:#}");
                    return Err(err.into());
                }
                Err(err) => {
                    sync_warn!(target: "rpc", "connection {peer} ended with error: {err:#}");
                    self.trace_line(&format!("connection error: {err:#}"));
                }
            }
        }

        sync_info!(target: "rpc", "rpc server stopped");
        Ok(())
    }

    /// Run server in a background worker thread.
    pub fn spawn(self) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        let handle = thread::Builder::new()
            .name("rpc-worker".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn serve_connection(&mut self, mut io: RpcIo) -> Result<(), Error> {
        let shutdown = self.shutdown.clone();
        if !io.wait_message(POLL_INTERVAL, IDLE_TIMEOUT, IO_TIMEOUT, || shutdown.is_raised())? {
            return Ok(());
        }
        let Some(message) = io.read_message()? else {
            return Ok(());
        };
        let response = self.handle_message(message)?;
        io.write_message(&response)
    }

    fn handle_message(&mut self, message: Value) -> Result<RpcResponse, Error> {
        self.seq += 1;
        let request: RpcRequest = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(err) => {
                let err = Error::Protocol(format!("bad request: {err}"));
                sync_warn!(target: "rpc", "{err:#}");
                return Ok(RpcResponse::fault(self.seq, 0, "", &err));
            }
        };

        let result = {
            let mut session = self.session.lock()?;
            self.registry
                .dispatch(&mut session, &request.method, &request.params)
        };

        let response = match result {
            Ok(value) => RpcResponse::success(self.seq, request.seq, &request.method, value),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                sync_warn!(target: "rpc", "{} failed: {err:#}", request.method);
                RpcResponse::fault(self.seq, request.seq, &request.method, &err)
            }
        };
        Ok(response)
    }

    fn trace_line(&self, line: &str) {
        if let Some(tracer) = &self.tracer {
            tracer.line(line);
        }
    }
}
