use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorRecord, PathDbError, PathDbResult, TransportError};

/// Anything that carries a correlation token.
pub trait WireMessage {
    /// The opaque correlation token.
    fn token(&self) -> &str;
}

/// A call shipped across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Addressed target, e.g. a database name.
    pub target: String,
    /// Operation name looked up in the target's handler table.
    pub operation: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Opaque correlation token, echoed by the response.
    pub token: String,
}

impl Request {
    /// Creates a request.
    pub fn new(
        target: impl Into<String>,
        operation: impl Into<String>,
        args: Vec<Value>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            operation: operation.into(),
            args,
            token: token.into(),
        }
    }
}

impl WireMessage for Request {
    fn token(&self) -> &str {
        &self.token
    }
}

/// The answer to a [`Request`], carrying the same token.
///
/// `error` wins over `result` when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Target of the answered request.
    pub target: String,
    /// Operation of the answered request.
    pub operation: String,
    /// Handler result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure record; set means the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    /// Token of the answered request.
    pub token: String,
}

impl Response {
    /// Builds the response to `request` from a handler outcome.
    #[must_use]
    pub fn from_result(request: &Request, result: PathDbResult<Value>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err.to_record())),
        };
        Self {
            target: request.target.clone(),
            operation: request.operation.clone(),
            result,
            error,
            token: request.token.clone(),
        }
    }

    /// True if this response reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Turns the response back into a result on the calling side.
    ///
    /// A missing result (serialized `null` or absent) reads as `Value::Null`.
    pub fn into_result(self) -> PathDbResult<Value> {
        match self.error {
            Some(record) => Err(PathDbError::from(record)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

impl WireMessage for Response {
    fn token(&self) -> &str {
        &self.token
    }
}

/// Text envelope for pipe-style transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Request(Request),
    Response(Response),
}

impl Envelope {
    /// Serializes to one JSON line.
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode { message: e.to_string() })
    }

    /// Parses a JSON envelope.
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Decode { message: e.to_string() })
    }
}

impl WireMessage for Envelope {
    fn token(&self) -> &str {
        match self {
            Self::Request(r) => r.token(),
            Self::Response(r) => r.token(),
        }
    }
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Envelope {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}
