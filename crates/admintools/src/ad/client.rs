use std::time::Duration;

use admintools_core::directory::{
    check_path_server, group_filter, member_dns, path_base, resolve_search, shape_entry,
    DirectoryEntry, DirectoryServer, SearchOptions, SearchScope, MEMBER_ATTRIBUTE,
};
use admintools_core::error::{require_non_empty, CallError};
use admintools_core::record::Record;
use admintools_core::session::SessionSlot;
use futures::{StreamExt, TryStreamExt};

use super::transport::{BindCredentials, DirectoryTransport, LdapTransport, SearchRequest};
use crate::call::bounded;

/// LDAP result code for a missing entry.
const NO_SUCH_OBJECT: i64 = 32;

/// A bound directory connection.
#[derive(Debug, Clone)]
pub struct DirectorySession {
    pub server: DirectoryServer,
    pub bind_dn: Option<String>,
    pub naming_context: String,
}

pub struct DirectoryClient {
    transport: Box<dyn DirectoryTransport>,
    slot: SessionSlot<DirectorySession>,
    timeout: Duration,
}

impl DirectoryClient {
    pub fn new(transport: Box<dyn DirectoryTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            slot: SessionSlot::new(),
            timeout,
        }
    }

    pub fn ldap(timeout: Duration) -> Self {
        Self::new(Box::new(LdapTransport::new()), timeout)
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    /// Binds to `server` and reads the RootDSE.
    pub async fn connect(
        &mut self,
        server: &str,
        bind: Option<BindCredentials>,
    ) -> Result<Record, CallError> {
        let server = DirectoryServer::parse(server)?;
        if let Some(bind) = &bind {
            require_non_empty("bind DN", &bind.dn)?;
        }

        let naming_context = bounded(
            self.timeout,
            "bind",
            self.transport.connect(&server, bind.as_ref()),
        )
        .await
        .map_err(|e| CallError::Authentication {
            target: server.url(),
            message: e.to_string(),
        })?;

        log::info!("bound to {} ({naming_context})", server.url());
        let session = DirectorySession {
            server,
            bind_dn: bind.map(|b| b.dn),
            naming_context,
        };
        let record = session_record(&session);
        self.slot.store(session);
        Ok(record)
    }

    pub fn status(&self) -> Record {
        match self.slot.current("status") {
            Ok(session) => session_record(session).with("Connected", true),
            Err(_) => Record::new().with("Connected", false),
        }
    }

    pub async fn disconnect(&mut self) -> Record {
        match self.slot.clear() {
            Some(session) => {
                self.transport.disconnect().await;
                Record::new()
                    .with("Server", session.server.url())
                    .with("Disconnected", true)
            }
            None => Record::new()
                .with("Disconnected", false)
                .with("Message", "No directory session was connected"),
        }
    }

    async fn lookup(&self, request: SearchRequest) -> Result<Vec<DirectoryEntry>, CallError> {
        let label = request.label();
        bounded(self.timeout, &label, self.transport.search(&request))
            .await
            .map_err(|e| e.in_operation(label))
    }

    fn shape(entry: &DirectoryEntry, properties: &[String]) -> Record {
        let shaped = shape_entry(entry, properties);
        if !shaped.truncated.is_empty() {
            log::warn!(
                "{}: kept only the first value of {}",
                entry.dn,
                shaped.truncated.join(", ")
            );
        }
        shaped.record
    }

    /// Searches the directory; one record per returned entry.
    pub async fn search(&self, options: SearchOptions) -> Result<Vec<Record>, CallError> {
        let session = self.slot.current("search")?;
        let resolved = resolve_search(options)?;

        check_path_server(resolved.host.as_deref(), resolved.port, &session.server)?;

        let request = SearchRequest {
            base: resolved
                .base
                .clone()
                .unwrap_or_else(|| session.naming_context.clone()),
            scope: resolved.scope,
            filter: resolved.wire_filter().to_string(),
            attributes: resolved.properties.clone(),
        };

        let entries = self.lookup(request).await?;
        Ok(entries
            .iter()
            .map(|e| Self::shape(e, &resolved.properties))
            .collect())
    }

    /// Expands the groups matching `name` into their member entries.
    ///
    /// One subtree search under `path` (the naming context when unset) finds the
    /// groups, then each member DN is read with a Base-scope lookup, up to
    /// `concurrency` at a time. Output keeps member order.
    pub async fn group_members(
        &self,
        name: &str,
        path: Option<&str>,
        properties: &[String],
        concurrency: usize,
    ) -> Result<Vec<Record>, CallError> {
        let session = self.slot.current("groupMembers")?;
        require_non_empty("name", name)?;
        let base = path_base(path, &session.server, &session.naming_context)?;

        let groups = self
            .lookup(SearchRequest {
                base,
                scope: SearchScope::Subtree,
                filter: group_filter(name),
                attributes: vec![MEMBER_ATTRIBUTE.to_string()],
            })
            .await?;

        if groups.is_empty() {
            return Err(CallError::RemoteFault {
                operation: format!("groupMembers({name})"),
                code: NO_SUCH_OBJECT,
                message: format!("no group named '{name}'"),
            });
        }

        let dns: Vec<String> = groups.iter().flat_map(member_dns).collect();
        log::debug!("{name}: {} member(s) in {} group(s)", dns.len(), groups.len());

        let members: Vec<Vec<DirectoryEntry>> = futures::stream::iter(dns)
            .map(|dn| self.lookup(SearchRequest::entry(dn, properties.to_vec())))
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        Ok(members
            .iter()
            .flatten()
            .map(|e| Self::shape(e, properties))
            .collect())
    }
}

fn session_record(session: &DirectorySession) -> Record {
    Record::new()
        .with("Server", session.server.endpoint.host.clone())
        .with("Port", session.server.endpoint.port)
        .with("Secure", session.server.secure)
        .with("NamingContext", session.naming_context.clone())
        .with("BindDn", session.bind_dn.clone().unwrap_or_default())
}
