//! XML-RPC method calls for the print-management API.
//!
//! The wire format comes from the `xmlrpc` crate. This module adds the auth-first
//! parameter convention, call labels for errors, and the mapping of faults and
//! decode failures onto [`CallError`].

use std::io::Cursor;

use serde_json::Value as Json;
pub use xmlrpc::Value;

use crate::error::CallError;
use crate::session::Secret;

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "int",
        Value::Int64(_) => "i8",
        Value::Bool(_) => "boolean",
        Value::String(_) => "string",
        Value::Double(_) => "double",
        Value::DateTime(_) => "dateTime.iso8601",
        Value::Base64(_) => "base64",
        Value::Struct(_) => "struct",
        Value::Array(_) => "array",
        Value::Nil => "nil",
    }
}

pub fn string(value: impl Into<String>) -> Value {
    Value::String(value.into())
}

/// An array of strings, as the API takes property name lists.
pub fn strings(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

/// Converts an array of strings, failing on any other shape.
pub fn into_strings(operation: &str, value: Value) -> Result<Vec<String>, CallError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(CallError::shape(operation, "string", type_name(&other))),
            })
            .collect(),
        other => Err(CallError::shape(operation, "array of strings", type_name(&other))),
    }
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Int(i) => Json::from(*i),
        Value::Int64(i) => Json::from(*i),
        Value::Bool(b) => Json::from(*b),
        Value::String(s) => Json::from(s.clone()),
        Value::Double(d) => Json::from(*d),
        Value::DateTime(dt) => Json::from(format!("{dt:?}")),
        Value::Base64(bytes) => Json::from(bytes.clone()),
        Value::Struct(members) => Json::Object(
            members
                .iter()
                .map(|(n, v)| (n.clone(), to_json(v)))
                .collect(),
        ),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Nil => Json::Null,
    }
}

/// One remote call: method name plus ordered parameters.
///
/// When `auth` is set it is sent as the first parameter, ahead of `params`, and is
/// left out of [`MethodCall::label`].
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub auth: Option<Secret>,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            auth: None,
            params,
        }
    }

    pub fn authenticated(method: impl Into<String>, auth: &Secret, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            auth: Some(auth.clone()),
            params,
        }
    }

    /// Human-readable call description for errors and logs, e.g.
    /// `getUserProperty(alice, email)`.
    pub fn label(&self) -> String {
        let name = self.method.strip_prefix("api.").unwrap_or(&self.method);
        let args = self
            .params
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                Value::Array(items) => format!("[{} items]", items.len()),
                Value::Struct(_) => "{..}".to_string(),
                other => to_json(other).to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{name}({args})")
    }

    fn request(&self) -> xmlrpc::Request<'_> {
        let auth = self.auth.as_ref().map(|a| string(a.expose()));
        auth.into_iter()
            .chain(self.params.iter().cloned())
            .fold(xmlrpc::Request::new(&self.method), |request, param| {
                request.arg(param)
            })
    }

    /// The `<methodCall>` document to POST.
    pub fn encode(&self) -> Result<Vec<u8>, CallError> {
        let mut body = Vec::new();
        self.request()
            .write_as_xml(&mut body)
            .map_err(|e| CallError::transport(self.label(), e))?;
        Ok(body)
    }

    /// Decodes the `<methodResponse>` body the server sent back for this call.
    ///
    /// A `<fault>` becomes `RemoteFault` with the server's code and string; a body
    /// that does not parse is a transport-level failure.
    pub fn decode(&self, body: Vec<u8>) -> Result<Value, CallError> {
        self.request()
            .call(Received(body))
            .map_err(|e| fault_error(self.label(), e))
    }
}

/// Hands an already received response body to the `xmlrpc` response parser.
struct Received(Vec<u8>);

impl xmlrpc::Transport for Received {
    type Stream = Cursor<Vec<u8>>;

    fn transmit(
        self,
        _request: &xmlrpc::Request<'_>,
    ) -> Result<Self::Stream, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Cursor::new(self.0))
    }
}

pub fn fault_error(operation: impl Into<String>, error: xmlrpc::Error) -> CallError {
    let operation = operation.into();
    match error.fault() {
        Some(fault) => CallError::RemoteFault {
            operation,
            code: i64::from(fault.fault_code),
            message: fault.fault_string.clone(),
        },
        None => CallError::transport(operation, format!("malformed response: {error}")),
    }
}
