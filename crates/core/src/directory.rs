//! Pure parameter resolution and result shaping for LDAP directory queries.
//!
//! Works against Active Directory but only relies on standard LDAP attributes
//! (`objectCategory`, `member`, `defaultNamingContext`).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CallError;
use crate::record::Record;
use crate::session::Endpoint;

pub const DEFAULT_LDAP_PORT: u16 = 389;
pub const DEFAULT_LDAPS_PORT: u16 = 636;

/// Filter sent when the resolved filter is empty (exact-entry lookups).
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Attribute holding a group's member DNs.
pub const MEMBER_ATTRIBUTE: &str = "member";

/// Field added to every shaped entry when the server did not return it.
pub const DN_FIELD: &str = "distinguishedName";

/// Object kinds selectable with `--type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    #[default]
    Computer,
    User,
    Group,
    OrganizationalUnit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Computer => "computer",
            ObjectType::User => "user",
            ObjectType::Group => "group",
            ObjectType::OrganizationalUnit => "organizationalunit",
        }
    }

    /// Generic filter used when the caller gives a type but no filter.
    pub fn category_filter(&self) -> String {
        format!("(objectCategory={})", self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "computer" => Ok(ObjectType::Computer),
            "user" => Ok(ObjectType::User),
            "group" => Ok(ObjectType::Group),
            "organizationalunit" => Ok(ObjectType::OrganizationalUnit),
            other => Err(CallError::validation(
                "type",
                format!("'{other}' is not one of computer, user, group, organizationalunit"),
            )),
        }
    }
}

/// How far below the base entry a search recurses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SearchScope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

impl FromStr for SearchScope {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(SearchScope::Base),
            "onelevel" => Ok(SearchScope::OneLevel),
            "subtree" => Ok(SearchScope::Subtree),
            other => Err(CallError::validation(
                "scope",
                format!("'{other}' is not one of Base, OneLevel, Subtree"),
            )),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchScope::Base => "Base",
            SearchScope::OneLevel => "OneLevel",
            SearchScope::Subtree => "Subtree",
        };
        f.write_str(name)
    }
}

/// Directory server address from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryServer {
    pub endpoint: Endpoint,
    pub secure: bool,
}

impl DirectoryServer {
    /// Parses `ldap://host[:port]`, `ldaps://host[:port]` or a bare `host[:port]`.
    pub fn parse(input: &str) -> Result<Self, CallError> {
        let trimmed = input.trim().trim_end_matches('/');
        let lower = trimmed.to_ascii_lowercase();

        let (secure, rest) = if lower.starts_with("ldaps://") {
            (true, &trimmed[8..])
        } else if lower.starts_with("ldap://") {
            (false, &trimmed[7..])
        } else {
            (false, trimmed)
        };

        let default_port = if secure {
            DEFAULT_LDAPS_PORT
        } else {
            DEFAULT_LDAP_PORT
        };

        let (host, port) = split_host_port(rest, default_port, "server")?;
        Ok(Self {
            endpoint: Endpoint::new(host, port)?,
            secure,
        })
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "ldaps" } else { "ldap" };
        format!("{scheme}://{}", self.endpoint)
    }
}

fn split_host_port<'a>(
    input: &'a str,
    default_port: u16,
    parameter: &str,
) -> Result<(&'a str, u16), CallError> {
    match input.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                CallError::validation(parameter, format!("'{port}' is not a valid port"))
            })?;
            Ok((host, port))
        }
        None => Ok((input, default_port)),
    }
}

/// A search path split into its optional server part and the base DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapPath {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dn: String,
}

/// Splits `LDAP://host[:port]/DN`, `LDAP://DN` or `DN`.
///
/// The segment before the first `/` is a server only if it contains no `=`; DN
/// components always do.
pub fn parse_ldap_path(path: &str) -> Result<LdapPath, CallError> {
    let trimmed = path.trim();
    let rest = if trimmed.to_ascii_uppercase().starts_with("LDAP://") {
        &trimmed[7..]
    } else {
        trimmed
    };

    if let Some((server, dn)) = rest.split_once('/') {
        if !server.contains('=') && !server.is_empty() {
            let (host, port) = match server.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| {
                        CallError::validation("path", format!("'{port}' is not a valid port"))
                    })?;
                    (host.to_string(), Some(port))
                }
                None => (server.to_string(), None),
            };
            return Ok(LdapPath {
                host: Some(host),
                port,
                dn: dn.to_string(),
            });
        }
    }

    Ok(LdapPath {
        host: None,
        port: None,
        dn: rest.to_string(),
    })
}

/// Rejects a path naming a server other than `connected`.
///
/// The port is compared only when the path gives one.
pub fn check_path_server(
    host: Option<&str>,
    port: Option<u16>,
    connected: &DirectoryServer,
) -> Result<(), CallError> {
    let Some(host) = host else {
        return Ok(());
    };
    let endpoint = &connected.endpoint;
    if host.eq_ignore_ascii_case(&endpoint.host) && port.map_or(true, |p| p == endpoint.port) {
        return Ok(());
    }

    let named = match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Err(CallError::validation(
        "path",
        format!("server '{named}' is not the connected server '{endpoint}'"),
    ))
}

/// Base DN for a search rooted at `path` on the `connected` server.
///
/// An absent path, or one naming only a server, falls back to `naming_context`.
pub fn path_base(
    path: Option<&str>,
    connected: &DirectoryServer,
    naming_context: &str,
) -> Result<String, CallError> {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(naming_context.to_string());
    };
    let parsed = parse_ldap_path(path)?;
    check_path_server(parsed.host.as_deref(), parsed.port, connected)?;
    if parsed.dn.is_empty() {
        Ok(naming_context.to_string())
    } else {
        Ok(parsed.dn)
    }
}

/// Caller-supplied search parameters, each optional.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub path: Option<String>,
    pub object_type: Option<ObjectType>,
    pub filter: Option<String>,
    pub scope: Option<SearchScope>,
    pub properties: Vec<String>,
}

/// Search parameters after defaulting; what actually goes to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSearch {
    /// Server named in the path, if any.
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Base DN; `None` means the directory's default naming context.
    pub base: Option<String>,
    pub object_type: ObjectType,
    /// May be empty; see [`ResolvedSearch::wire_filter`].
    pub filter: String,
    pub scope: SearchScope,
    pub properties: Vec<String>,
}

impl ResolvedSearch {
    /// Filter text to send; an empty filter matches every entry.
    pub fn wire_filter(&self) -> &str {
        if self.filter.trim().is_empty() {
            MATCH_ALL_FILTER
        } else {
            &self.filter
        }
    }
}

/// True when the path names one specific entry rather than a container to search.
pub fn names_single_entry(path: &str) -> bool {
    path.to_ascii_uppercase().contains("CN=")
}

/// Applies the defaulting rules for a directory search.
///
/// Unset type is `computer`; unset filter is the type's category filter; unset
/// scope is `Subtree`. A path naming a specific entry (it contains `CN=`) always
/// wins: scope becomes `Base` and the filter is blanked.
pub fn resolve_search(options: SearchOptions) -> Result<ResolvedSearch, CallError> {
    let object_type = options.object_type.unwrap_or_default();
    let mut filter = options
        .filter
        .unwrap_or_else(|| object_type.category_filter());
    let mut scope = options.scope.unwrap_or_default();

    let (host, port, base) = match options.path.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => {
            if names_single_entry(path) {
                filter = String::new();
                scope = SearchScope::Base;
            }
            let parsed = parse_ldap_path(path)?;
            let base = if parsed.dn.is_empty() {
                None
            } else {
                Some(parsed.dn)
            };
            (parsed.host, parsed.port, base)
        }
        _ => (None, None, None),
    };

    let properties = options
        .properties
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    Ok(ResolvedSearch {
        host,
        port,
        base,
        object_type,
        filter,
        scope,
        properties,
    })
}

/// Escapes LDAP filter metacharacters (RFC 4515) except `*`.
///
/// `*` is left alone so that wildcard group names keep working.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\5c"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Filter locating a group by name.
pub fn group_filter(name: &str) -> String {
    format!(
        "(&(objectCategory=group)(name={}))",
        escape_filter_value(name)
    )
}

/// A raw entry as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Vec<(String, Vec<String>)>,
}

impl DirectoryEntry {
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }
}

/// A shaped entry plus the attributes whose extra values were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedEntry {
    pub record: Record,
    pub truncated: Vec<String>,
}

/// Flattens an entry into a record holding the first value of every attribute.
///
/// Multi-valued attributes lose every value but the first; their names are
/// returned in `truncated` so the caller can report the loss.
pub fn shape_entry(entry: &DirectoryEntry, requested: &[String]) -> ShapedEntry {
    let mut ordered: Vec<&(String, Vec<String>)> = Vec::with_capacity(entry.attributes.len());

    for wanted in requested {
        if let Some(attr) = entry
            .attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
        {
            if !ordered.iter().any(|a| std::ptr::eq(*a, attr)) {
                ordered.push(attr);
            }
        }
    }

    let mut rest: Vec<&(String, Vec<String>)> = entry
        .attributes
        .iter()
        .filter(|attr| !ordered.iter().any(|a| std::ptr::eq(*a, *attr)))
        .collect();
    rest.sort_by_key(|(n, _)| n.to_ascii_lowercase());
    ordered.extend(rest);

    let mut record = Record::new();
    let mut truncated = Vec::new();
    for (name, values) in ordered {
        if values.len() > 1 {
            truncated.push(name.clone());
        }
        let first = values.first().cloned();
        record.insert(name.clone(), first);
    }

    if !record.names().any(|n| n.eq_ignore_ascii_case(DN_FIELD)) {
        record.insert(DN_FIELD, entry.dn.clone());
    }

    ShapedEntry { record, truncated }
}

/// Member DNs listed on a group entry.
pub fn member_dns(entry: &DirectoryEntry) -> Vec<String> {
    entry
        .values(MEMBER_ATTRIBUTE)
        .map(|values| values.to_vec())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> DirectoryEntry {
        DirectoryEntry {
            dn: dn.to_string(),
            attributes: attrs
                .iter()
                .map(|(n, vs)| (n.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect(),
        }
    }

    #[test]
    fn test_unset_type_defaults_to_computer_filter() {
        let resolved = resolve_search(SearchOptions::default()).unwrap();
        assert_eq!(resolved.object_type, ObjectType::Computer);
        assert_eq!(resolved.filter, "(objectCategory=computer)");
        assert_eq!(resolved.scope, SearchScope::Subtree);
        assert_eq!(resolved.base, None);
    }

    #[test]
    fn test_each_type_maps_to_its_category() {
        for (t, expected) in [
            (ObjectType::Computer, "(objectCategory=computer)"),
            (ObjectType::User, "(objectCategory=user)"),
            (ObjectType::Group, "(objectCategory=group)"),
            (ObjectType::OrganizationalUnit, "(objectCategory=organizationalunit)"),
        ] {
            let resolved = resolve_search(SearchOptions {
                object_type: Some(t),
                ..Default::default()
            })
            .unwrap();
            assert_eq!(resolved.filter, expected);
        }
    }

    #[test]
    fn test_explicit_filter_wins_over_type() {
        let resolved = resolve_search(SearchOptions {
            object_type: Some(ObjectType::User),
            filter: Some("(sAMAccountName=alice)".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(resolved.filter, "(sAMAccountName=alice)");
    }

    #[test]
    fn test_dn_path_forces_base_scope_and_empty_filter() {
        for path in [
            "CN=alice,OU=Staff,DC=example,DC=com",
            "LDAP://cn=alice,OU=Staff,DC=example,DC=com",
            "LDAP://dc1/Cn=alice,DC=example,DC=com",
        ] {
            let resolved = resolve_search(SearchOptions {
                path: Some(path.to_string()),
                filter: Some("(objectCategory=user)".to_string()),
                scope: Some(SearchScope::OneLevel),
                ..Default::default()
            })
            .unwrap();
            assert_eq!(resolved.scope, SearchScope::Base, "{path}");
            assert_eq!(resolved.filter, "", "{path}");
            assert_eq!(resolved.wire_filter(), MATCH_ALL_FILTER);
        }
    }

    #[test]
    fn test_container_path_keeps_scope() {
        let resolved = resolve_search(SearchOptions {
            path: Some("LDAP://OU=Staff,DC=example,DC=com".to_string()),
            scope: Some(SearchScope::OneLevel),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(resolved.scope, SearchScope::OneLevel);
        assert_eq!(resolved.base.as_deref(), Some("OU=Staff,DC=example,DC=com"));
        assert_eq!(resolved.host, None);
    }

    #[test]
    fn test_parse_ldap_path_with_server() {
        let parsed = parse_ldap_path("LDAP://dc1.example.com:3268/DC=example,DC=com").unwrap();
        assert_eq!(parsed.host.as_deref(), Some("dc1.example.com"));
        assert_eq!(parsed.port, Some(3268));
        assert_eq!(parsed.dn, "DC=example,DC=com");
    }

    #[test]
    fn test_check_path_server_compares_port_when_given() {
        let connected = DirectoryServer::parse("ldap://dc1.example.com").unwrap();

        assert!(check_path_server(None, None, &connected).is_ok());
        assert!(check_path_server(Some("DC1.example.com"), None, &connected).is_ok());
        assert!(check_path_server(Some("dc1.example.com"), Some(389), &connected).is_ok());

        let err = check_path_server(Some("dc1.example.com"), Some(3268), &connected).unwrap_err();
        assert_eq!(
            err,
            CallError::validation(
                "path",
                "server 'dc1.example.com:3268' is not the connected server 'dc1.example.com:389'"
            )
        );
        assert!(check_path_server(Some("dc2.example.com"), None, &connected).is_err());
    }

    #[test]
    fn test_path_base() {
        let connected = DirectoryServer::parse("dc1.example.com").unwrap();
        let base = |path| path_base(path, &connected, "DC=example,DC=com");

        assert_eq!(base(None).unwrap(), "DC=example,DC=com");
        assert_eq!(base(Some("  ")).unwrap(), "DC=example,DC=com");
        assert_eq!(
            base(Some("LDAP://dc1.example.com/OU=Groups,DC=example,DC=com")).unwrap(),
            "OU=Groups,DC=example,DC=com"
        );
        assert_eq!(base(Some("OU=Groups,DC=example,DC=com")).unwrap(), "OU=Groups,DC=example,DC=com");
        assert!(matches!(
            base(Some("LDAP://dc9.other.com/DC=other,DC=com")),
            Err(CallError::Validation { .. })
        ));
    }

    #[test]
    fn test_parse_ldap_path_bad_port() {
        assert!(parse_ldap_path("LDAP://dc1:abc/DC=example").is_err());
    }

    #[test]
    fn test_directory_server_parse() {
        let s = DirectoryServer::parse("ldaps://dc1.example.com").unwrap();
        assert!(s.secure);
        assert_eq!(s.endpoint.port, 636);
        assert_eq!(s.url(), "ldaps://dc1.example.com:636");

        let s = DirectoryServer::parse("dc1:1389").unwrap();
        assert!(!s.secure);
        assert_eq!(s.url(), "ldap://dc1:1389");

        assert!(DirectoryServer::parse("ldap://dc1:99999").is_err());
    }

    #[test]
    fn test_object_type_from_str() {
        assert_eq!(
            "OrganizationalUnit".parse::<ObjectType>().unwrap(),
            ObjectType::OrganizationalUnit
        );
        assert!("printer".parse::<ObjectType>().is_err());
        assert_eq!("subtree".parse::<SearchScope>().unwrap(), SearchScope::Subtree);
        assert!("deep".parse::<SearchScope>().is_err());
    }

    #[test]
    fn test_group_filter_escapes_but_keeps_wildcards() {
        assert_eq!(
            group_filter("Admins"),
            "(&(objectCategory=group)(name=Admins))"
        );
        assert_eq!(
            group_filter("R&D (EU)*"),
            "(&(objectCategory=group)(name=R&D \\28EU\\29*))"
        );
        assert_eq!(escape_filter_value("a\\b"), "a\\5cb");
    }

    #[test]
    fn test_shape_entry_first_value_and_truncation() {
        let e = entry(
            "CN=web01,OU=Servers,DC=example,DC=com",
            &[
                ("name", &["web01"]),
                ("servicePrincipalName", &["HOST/web01", "HOST/web01.example.com"]),
                ("operatingSystem", &["Linux"]),
            ],
        );

        let shaped = shape_entry(&e, &[]);
        assert_eq!(
            shaped.record.names().collect::<Vec<_>>(),
            vec![
                "name",
                "operatingSystem",
                "servicePrincipalName",
                "distinguishedName"
            ]
        );
        assert_eq!(shaped.record.get_text("servicePrincipalName"), "HOST/web01");
        assert_eq!(shaped.truncated, vec!["servicePrincipalName".to_string()]);
        assert_eq!(
            shaped.record.get_text("distinguishedName"),
            "CN=web01,OU=Servers,DC=example,DC=com"
        );
    }

    #[test]
    fn test_shape_entry_follows_requested_order() {
        let e = entry(
            "CN=alice,DC=example,DC=com",
            &[
                ("mail", &["alice@example.com"]),
                ("distinguishedName", &["CN=alice,DC=example,DC=com"]),
                ("cn", &["alice"]),
            ],
        );
        let requested = vec!["CN".to_string(), "mail".to_string(), "missing".to_string()];

        let shaped = shape_entry(&e, &requested);
        assert_eq!(
            shaped.record.names().collect::<Vec<_>>(),
            vec!["cn", "mail", "distinguishedName"]
        );
        assert!(shaped.truncated.is_empty());
    }

    #[test]
    fn test_shape_entry_attribute_without_values() {
        let e = entry("CN=x", &[("description", &[])]);
        let shaped = shape_entry(&e, &[]);
        assert_eq!(shaped.record.get("description"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn test_member_dns() {
        let group = entry(
            "CN=Admins,DC=example,DC=com",
            &[("Member", &["CN=alice,DC=example,DC=com", "CN=bob,DC=example,DC=com"])],
        );
        assert_eq!(member_dns(&group).len(), 2);
        assert!(member_dns(&entry("CN=Empty", &[])).is_empty());
    }
}
