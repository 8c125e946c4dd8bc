use crate::bridge::sync::OffsetArg;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn request_type() -> String {
    "request".to_string()
}

/// RPC request envelope. Arguments are positional.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub seq: i64,
    #[serde(rename = "type", default = "request_type")]
    pub r#type: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// RPC response envelope.
///
/// Successful call carries `result` (`null` is a valid result), failed one carries
/// a `message` and a `fault` kind.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: String,
    pub request_seq: i64,
    pub method: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl RpcResponse {
    pub fn success(seq: i64, request_seq: i64, method: &str, result: Value) -> Self {
        Self {
            seq,
            r#type: "response".to_string(),
            request_seq,
            method: method.to_string(),
            success: true,
            result: Some(result),
            message: None,
            fault: None,
        }
    }

    pub fn fault(seq: i64, request_seq: i64, method: &str, err: &Error) -> Self {
        Self {
            seq,
            r#type: "response".to_string(),
            request_seq,
            method: method.to_string(),
            success: false,
            result: None,
            message: Some(err.to_string()),
            fault: Some(err.kind().to_string()),
        }
    }
}

/// Positional arguments of a call together with the method name (for error reporting).
#[derive(Clone, Copy)]
pub struct Params<'a> {
    method: &'static str,
    values: &'a [Value],
}

impl<'a> Params<'a> {
    pub fn new(method: &'static str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidParams {
            method: self.method,
            reason: reason.into(),
        }
    }

    /// Check that arguments count is in `min..=max`.
    pub fn expect_len(&self, min: usize, max: usize) -> Result<(), Error> {
        let len = self.values.len();
        if len < min || len > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min}..={max}")
            };
            return Err(self.invalid(format!("expected {expected} arguments, got {len}")));
        }
        Ok(())
    }

    pub fn str(&self, idx: usize) -> Result<&'a str, Error> {
        match self.values.get(idx) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => {
                Err(self.invalid(format!("argument {idx} must be a string, got {other}")))
            }
            None => Err(self.invalid(format!("missing argument {idx}"))),
        }
    }

    /// String argument with a default for a missing (or `null`) value.
    pub fn str_or(&self, idx: usize, default: &'a str) -> Result<&'a str, Error> {
        match self.values.get(idx) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.str(idx),
        }
    }

    pub fn offset(&self, idx: usize) -> Result<OffsetArg, Error> {
        match self.values.get(idx) {
            Some(v) => self.to_offset_arg(v),
            None => Err(self.invalid(format!("missing argument {idx}"))),
        }
    }

    /// List of offsets, `null` is treated as an empty list.
    pub fn offsets(&self, idx: usize) -> Result<Vec<OffsetArg>, Error> {
        match self.values.get(idx) {
            Some(Value::Array(items)) => items.iter().map(|v| self.to_offset_arg(v)).collect(),
            Some(Value::Null) => Ok(vec![]),
            Some(other) => Err(self.invalid(format!("argument {idx} must be a list, got {other}"))),
            None => Err(self.invalid(format!("missing argument {idx}"))),
        }
    }

    fn to_offset_arg(&self, v: &Value) -> Result<OffsetArg, Error> {
        match v {
            Value::String(s) => Ok(OffsetArg::Text(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|n| OffsetArg::Int(n as i128))
                .or_else(|| n.as_i64().map(|n| OffsetArg::Int(n as i128)))
                .ok_or_else(|| self.invalid(format!("offset {n} is not an integer"))),
            other => Err(self.invalid(format!(
                "offset must be a string or an integer, got {other}"
            ))),
        }
    }
}
