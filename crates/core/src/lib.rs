//! Core library for admintools
//!
//! This crate implements the **Functional Core** of the admintools application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`admintools_core`** (this crate): parameter resolution, request building,
//!   response decoding and shaping. Zero I/O.
//! - **`admintools`**: transports, session ownership, the CLI and the tool server.
//!
//! Every remote call goes through the same steps: validate and default the
//! parameters, build the request, hand it to a transport (shell), and shape the
//! answer into [`record::Record`]s. Only the middle step touches the network, so
//! everything else here is tested with fixture data.
//!
//! # Module Organization
//!
//! - [`error`]: the [`error::CallError`] taxonomy shared by every family
//! - [`session`]: credentials, endpoints and the [`session::SessionSlot`]
//! - [`record`]: ordered output records and the positional property zipper
//! - [`directory`]: LDAP search defaults, path parsing and entry shaping
//! - [`rpc`]: XML-RPC method calls, labels and fault mapping
//! - [`papercut`]: print-management API requests, property whitelists and shapers
//! - [`updates`]: update-agent selection rules and history window
//! - [`mlb`]: MLB endpoint URLs, Gameday index scraping and subtree selection
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use admintools_core::directory::{resolve_search, SearchOptions};
//!
//! let resolved = resolve_search(SearchOptions {
//!     path: Some("LDAP://CN=alice,OU=Staff,DC=example,DC=com".to_string()),
//!     ..Default::default()
//! })?;
//!
//! // Paths naming a single entry force a base-scope lookup.
//! assert_eq!(resolved.wire_filter(), "(objectClass=*)");
//! ```

pub mod directory;
pub mod error;
pub mod mlb;
pub mod papercut;
pub mod record;
pub mod session;
pub mod updates;
pub mod rpc;
