//! Connection state for the session-based API families.
//!
//! A session is an explicit value owned by whoever drives the calls (a one-shot
//! command or the tool server). There is no process-wide current session.

use std::fmt;

use serde::Serialize;

use crate::error::CallError;

/// A credential or auth token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Remote host and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, CallError> {
        let host = host.into();
        crate::error::require_non_empty("host", &host)?;
        if port == 0 {
            return Err(CallError::validation("port", "must be between 1 and 65535"));
        }
        Ok(Self { host, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Authenticated connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub endpoint: Endpoint,
    pub credential: Secret,
}

/// Holds at most one active session.
///
/// Every call wrapper asks the slot for the current session first, so a call made
/// while disconnected fails with `NotConnected` before it reaches a transport.
#[derive(Debug)]
pub struct SessionSlot<S> {
    current: Option<S>,
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<S> SessionSlot<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self, operation: &str) -> Result<&S, CallError> {
        self.current
            .as_ref()
            .ok_or_else(|| CallError::not_connected(operation))
    }

    /// Installs a verified session, returning the one it replaced.
    pub fn store(&mut self, session: S) -> Option<S> {
        self.current.replace(session)
    }

    /// Drops the active session, returning it if there was one.
    pub fn clear(&mut self) -> Option<S> {
        self.current.take()
    }
}
