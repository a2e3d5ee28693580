use admintools_core::directory::{DirectoryEntry, DirectoryServer, SearchScope, MATCH_ALL_FILTER};
use admintools_core::error::CallError;
use admintools_core::session::Secret;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tokio::sync::Mutex;

/// RootDSE attribute naming the directory's default base DN.
const NAMING_CONTEXT_ATTRIBUTE: &str = "defaultNamingContext";

/// Simple-bind credentials. No credentials means an anonymous bind.
#[derive(Debug, Clone)]
pub struct BindCredentials {
    pub dn: String,
    pub password: Secret,
}

/// One search as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Base-scope read of a single entry.
    pub fn entry(dn: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            base: dn.into(),
            scope: SearchScope::Base,
            filter: MATCH_ALL_FILTER.to_string(),
            attributes,
        }
    }

    pub fn label(&self) -> String {
        format!("search({}, {}, {})", self.base, self.scope, self.filter)
    }
}

#[async_trait::async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Opens a connection, binds and returns the default naming context.
    ///
    /// A failed connect leaves any earlier connection usable.
    async fn connect(
        &self,
        server: &DirectoryServer,
        bind: Option<&BindCredentials>,
    ) -> Result<String, CallError>;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, CallError>;

    async fn disconnect(&self);
}

/// LDAP over `ldap3`.
#[derive(Default)]
pub struct LdapTransport {
    handle: Mutex<Option<Ldap>>,
}

impl LdapTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, operation: &str) -> Result<Ldap, CallError> {
        self.handle
            .lock()
            .await
            .clone()
            .ok_or_else(|| CallError::not_connected(operation))
    }
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// LDAP result codes become remote faults; everything else failed below LDAP.
fn ldap_error(operation: &str, err: LdapError) -> CallError {
    match err {
        LdapError::LdapResult { result } => CallError::RemoteFault {
            operation: operation.to_string(),
            code: i64::from(result.rc),
            message: if result.text.is_empty() {
                result_code_name(result.rc).to_string()
            } else {
                result.text
            },
        },
        other => CallError::transport(operation, other),
    }
}

fn result_code_name(rc: u32) -> &'static str {
    match rc {
        1 => "operations error",
        4 => "size limit exceeded",
        10 => "referral",
        32 => "no such object",
        34 => "invalid DN syntax",
        49 => "invalid credentials",
        50 => "insufficient access rights",
        51 => "busy",
        52 => "unavailable",
        _ => "LDAP error",
    }
}

fn into_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut attributes: Vec<(String, Vec<String>)> = entry.attrs.into_iter().collect();
    attributes.extend(entry.bin_attrs.into_iter().map(|(name, values)| {
        let text = values
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        (name, text)
    }));
    DirectoryEntry {
        dn: entry.dn,
        attributes,
    }
}

#[async_trait::async_trait]
impl DirectoryTransport for LdapTransport {
    async fn connect(
        &self,
        server: &DirectoryServer,
        bind: Option<&BindCredentials>,
    ) -> Result<String, CallError> {
        let url = server.url();
        let (conn, mut ldap) = LdapConnAsync::with_settings(LdapConnSettings::new(), &url)
            .await
            .map_err(|e| ldap_error("connect", e))?;
        ldap3::drive!(conn);

        let (dn, password) = match bind {
            Some(bind) => (bind.dn.as_str(), bind.password.expose()),
            None => ("", ""),
        };
        ldap.simple_bind(dn, password)
            .await
            .and_then(|r| r.success())
            .map_err(|e| ldap_error("bind", e))?;

        let (entries, _) = ldap
            .search("", Scope::Base, MATCH_ALL_FILTER, vec![NAMING_CONTEXT_ATTRIBUTE])
            .await
            .and_then(|r| r.success())
            .map_err(|e| ldap_error("rootDSE", e))?;

        let naming_context = entries
            .into_iter()
            .map(SearchEntry::construct)
            .find_map(|e| {
                e.attrs
                    .into_iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(NAMING_CONTEXT_ATTRIBUTE))
                    .and_then(|(_, values)| values.into_iter().next())
            })
            .unwrap_or_default();

        let previous = self.handle.lock().await.replace(ldap);
        if let Some(mut previous) = previous {
            if let Err(e) = previous.unbind().await {
                log::debug!("unbinding the previous connection failed: {e}");
            }
        }

        Ok(naming_context)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, CallError> {
        let label = request.label();
        let mut ldap = self.handle(&label).await?;

        let (entries, _) = ldap
            .search(
                &request.base,
                scope(request.scope),
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .and_then(|r| r.success())
            .map_err(|e| ldap_error(&label, e))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(into_entry)
            .collect())
    }

    async fn disconnect(&self) {
        if let Some(mut ldap) = self.handle.lock().await.take() {
            if let Err(e) = ldap.unbind().await {
                log::debug!("unbind failed: {e}");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ldap_result_codes_become_remote_faults() {
        let err = ldap_error(
            "search(CN=gone, Base, (objectClass=*))",
            LdapError::LdapResult {
                result: ldap3::LdapResult {
                    rc: 32,
                    matched: String::new(),
                    text: String::new(),
                    refs: vec![],
                    ctrls: vec![],
                },
            },
        );
        assert_eq!(
            err,
            CallError::RemoteFault {
                operation: "search(CN=gone, Base, (objectClass=*))".to_string(),
                code: 32,
                message: "no such object".to_string(),
            }
        );
    }

    #[test]
    fn test_entry_request_is_base_scope() {
        let request = SearchRequest::entry("CN=alice,DC=example,DC=com", vec![]);
        assert_eq!(request.scope, SearchScope::Base);
        assert_eq!(request.filter, MATCH_ALL_FILTER);
        assert_eq!(
            request.label(),
            "search(CN=alice,DC=example,DC=com, Base, (objectClass=*))"
        );
    }
}
