use crate::error::Error;
use crate::rpc::tracer::{Direction, FileTracer};
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Upper bound of a message body size.
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// `Content-Length` framed JSON messages over a TCP stream.
pub struct RpcIo {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    tracer: Option<FileTracer>,
    trace: bool,
}

impl RpcIo {
    pub fn new(stream: TcpStream, tracer: Option<FileTracer>, trace: bool) -> Result<Self, Error> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            stream,
            reader,
            tracer,
            trace,
        })
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Wait until the peer starts sending the next message.
    ///
    /// Return false if the peer closed connection, `stop` returned true or no data arrived
    /// during `idle_timeout`. Read timeout of the stream is reset to `io_timeout` afterwards.
    pub fn wait_message(
        &mut self,
        poll: Duration,
        idle_timeout: Duration,
        io_timeout: Duration,
        stop: impl Fn() -> bool,
    ) -> Result<bool, Error> {
        self.stream.set_read_timeout(Some(poll))?;
        let deadline = Instant::now() + idle_timeout;
        let ready = loop {
            match self.reader.fill_buf() {
                Ok(buf) => break !buf.is_empty(),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if stop() || Instant::now() > deadline {
                        break false;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        };
        self.stream.set_read_timeout(Some(io_timeout))?;
        Ok(ready)
    }

    /// Read a single message. Return `None` if the peer closed connection between messages.
    pub fn read_message(&mut self) -> Result<Option<Value>, Error> {
        let mut content_length: Option<usize> = None;
        let mut header_seen = false;
        loop {
            let mut line = String::new();
            let read_n = self.reader.read_line(&mut line)?;
            if read_n == 0 {
                if header_seen {
                    return Err(Error::Protocol("connection closed inside a header".into()));
                }
                return Ok(None);
            }
            header_seen = true;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(v) = line.strip_prefix("Content-Length:") {
                let len = v
                    .trim()
                    .parse()
                    .map_err(|_| Error::Protocol(format!("bad Content-Length `{}`", v.trim())))?;
                content_length = Some(len);
            }
        }

        let len = content_length
            .ok_or_else(|| Error::Protocol("missing Content-Length header".into()))?;
        if len > MAX_MESSAGE_LEN {
            return Err(Error::Protocol(format!(
                "message of {len} bytes exceeds limit of {MAX_MESSAGE_LEN} bytes"
            )));
        }
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let msg: Value = serde_json::from_slice(&buf)?;
        if let (true, Some(tracer)) = (self.trace, &self.tracer) {
            tracer.message(Direction::Incoming, &msg);
        }
        Ok(Some(msg))
    }

    pub fn write_message<T: Serialize>(&mut self, v: &T) -> Result<(), Error> {
        let payload = serde_json::to_vec(v)?;
        if let (true, Some(tracer)) = (self.trace, &self.tracer) {
            if let Ok(msg) = serde_json::to_value(v) {
                tracer.message(Direction::Outgoing, &msg);
            }
        }
        write!(self.stream, "Content-Length: {}\r\n\r\n", payload.len())?;
        self.stream.write_all(&payload)?;
        self.stream.flush()?;
        Ok(())
    }
}
