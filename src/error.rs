use crate::bridge::address::{AbsoluteAddress, Base};
use strum_macros::IntoStaticStr;

/// Bridge errors. Variant name (see [`Error::kind`]) is reported to RPC callers as a fault kind.
#[derive(Debug, thiserror::Error, IntoStaticStr)]
pub enum Error {
    // --------------------------------- address errors --------------------------------------------
    #[error("malformed address literal `{0}`")]
    MalformedAddress(String),
    #[error("address {address} is not translatable against base {base}")]
    InvalidAddress { address: String, base: Base },
    #[error("invalid color `{0}`, expected 0xRRGGBB")]
    InvalidColor(String),

    // --------------------------------- dispatch errors -------------------------------------------
    #[error("method \"{0}\" is not exposed")]
    MethodNotExposed(String),
    #[error("invalid params for `{method}`: {reason}")]
    InvalidParams {
        method: &'static str,
        reason: String,
    },
    #[error("routine not found at address {0}")]
    RoutineNotFound(AbsoluteAddress),
    #[error("session state poisoned by a panicked holder")]
    SessionPoisoned,

    // --------------------------------- transport errors ------------------------------------------
    #[strum(serialize = "TransportError")]
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),
    #[strum(serialize = "ProtocolError")]
    #[error("protocol: {0}")]
    Protocol(String),
    #[strum(serialize = "ProtocolError")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[strum(serialize = "BindError")]
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("remote fault ({kind}): {message}")]
    Fault { kind: String, message: String },

    // --------------------------------- session setup errors --------------------------------------
    #[error("page size {0:#x} is not a power of two")]
    InvalidPageSize(u64),
    #[error("object file parsing error: {0}")]
    ObjParsing(#[from] object::Error),
    #[strum(serialize = "ConfigError")]
    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Return a hint to the server loop - keep serving after error or stop the whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::MalformedAddress(_) => false,
            Error::InvalidAddress { .. } => false,
            Error::InvalidColor(_) => false,
            Error::MethodNotExposed(_) => false,
            Error::InvalidParams { .. } => false,
            Error::RoutineNotFound(_) => false,
            Error::Transport(_) => false,
            Error::Protocol(_) => false,
            Error::Json(_) => false,
            Error::Fault { .. } => false,
            Error::Config(_) => false,

            // currently fatal errors
            Error::SessionPoisoned => true,
            Error::Bind { .. } => true,
            Error::InvalidPageSize(_) => true,
            Error::ObjParsing(_) => true,
        }
    }

    /// Short error kind name, reported to RPC callers alongside the message.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "sync", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "sync", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
