use crate::error::Error;
use crate::rpc::io::RpcIo;
use crate::rpc::protocol::{RpcRequest, RpcResponse};
use crate::sync_debug;
use serde_json::Value;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

const IO_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Client side of the bridge protocol, used by the debugger side and by `--stop`.
///
/// Server answers one request per connection, so every call opens a new one.
pub struct RpcClient {
    addrs: Vec<SocketAddr>,
    next_seq: i64,
}

impl RpcClient {
    /// Resolve server address and check that it accepts connections, retrying until it starts
    /// listening or the connect timeout expires.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let client = Self {
            addrs: addr.to_socket_addrs()?.collect(),
            next_seq: 1,
        };
        client.open()?;
        Ok(client)
    }

    fn open(&self) -> Result<RpcIo, Error> {
        let start = Instant::now();
        let stream = loop {
            match TcpStream::connect(self.addrs.as_slice()) {
                Ok(stream) => break stream,
                Err(err) => {
                    if start.elapsed() > CONNECT_TIMEOUT {
                        return Err(Error::Transport(err));
                    }
                    thread::sleep(CONNECT_RETRY_DELAY);
                }
            }
        };
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        RpcIo::new(stream, None, false)
    }

    /// Call a remote method. Fault response is returned as [`Error::Fault`].
    pub fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let request = RpcRequest {
            seq,
            r#type: "request".to_string(),
            method: method.to_string(),
            params,
        };
        let mut io = self.open()?;
        io.write_message(&request)?;

        let Some(msg) = io.read_message()? else {
            return Err(Error::Protocol("connection closed before response".into()));
        };
        let response: RpcResponse = serde_json::from_value(msg)?;
        if response.request_seq != seq {
            return Err(Error::Protocol(format!(
                "response to request {} while waiting for {seq}",
                response.request_seq
            )));
        }
        if response.success {
            return Ok(response.result.unwrap_or(Value::Null));
        }
        Err(Error::Fault {
            kind: response.fault.unwrap_or_default(),
            message: response.message.unwrap_or_default(),
        })
    }
}

/// Ask a running server to stop. Transport failures (server already gone,
/// connection reset in the middle of the answer) are swallowed.
pub fn request_shutdown(addr: impl ToSocketAddrs) -> Result<(), Error> {
    let result = RpcClient::connect(addr).and_then(|mut client| client.call("shutdown", vec![]));
    match result {
        Ok(_) => Ok(()),
        Err(err @ (Error::Transport(_) | Error::Protocol(_))) => {
            sync_debug!(target: "rpc", "shutdown request: {err:#}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
