//! PaperCut print-management API: request building and response shaping.
//!
//! Every request carries the server auth token as its first XML-RPC parameter.
//! Nothing here performs I/O; the shell sends the [`MethodCall`]s produced by
//! [`Requests`] and feeds the decoded values back through the shapers below.

use std::fmt;
use std::str::FromStr;

use crate::error::{require_non_empty, CallError};
use crate::record::{name_records, zip_properties, CallResult, Record};
use crate::rpc::{self, into_strings, type_name, MethodCall, Value};
use crate::session::{Endpoint, Secret};

pub const DEFAULT_PORT: u16 = 9191;
pub const DEFAULT_OFFSET: u32 = 0;
pub const DEFAULT_LIMIT: u32 = 1000;

/// XML-RPC endpoint of a PaperCut application server.
pub fn rpc_url(endpoint: &Endpoint) -> String {
    format!("http://{}:{}/rpc/api/xmlrpc", endpoint.host, endpoint.port)
}

pub mod methods {
    pub const GET_TOTAL_USERS: &str = "api.getTotalUsers";
    pub const LIST_USER_ACCOUNTS: &str = "api.listUserAccounts";
    pub const LIST_USER_GROUPS: &str = "api.listUserGroups";
    pub const LIST_PRINTERS: &str = "api.listPrinters";
    pub const LIST_SHARED_ACCOUNTS: &str = "api.listSharedAccounts";
    pub const IS_USER_EXISTS: &str = "api.isUserExists";
    pub const GET_USER_GROUPS: &str = "api.getUserGroups";
    pub const GET_USER_PROPERTY: &str = "api.getUserProperty";
    pub const GET_USER_PROPERTIES: &str = "api.getUserProperties";
    pub const SET_USER_PROPERTY: &str = "api.setUserProperty";
    pub const GET_USER_ACCOUNT_BALANCE: &str = "api.getUserAccountBalance";
    pub const SET_USER_ACCOUNT_BALANCE: &str = "api.setUserAccountBalance";
    pub const ADJUST_USER_ACCOUNT_BALANCE: &str = "api.adjustUserAccountBalance";
    pub const ADJUST_USER_ACCOUNT_BALANCE_BY_GROUP: &str = "api.adjustUserAccountBalanceByGroup";
    pub const RENAME_USER_ACCOUNT: &str = "api.renameUserAccount";
    pub const GET_SHARED_ACCOUNT_PROPERTY: &str = "api.getSharedAccountProperty";
    pub const SET_SHARED_ACCOUNT_PROPERTY: &str = "api.setSharedAccountProperty";
    pub const GET_SHARED_ACCOUNT_BALANCE: &str = "api.getSharedAccountAccountBalance";
    pub const ADJUST_SHARED_ACCOUNT_BALANCE: &str = "api.adjustSharedAccountAccountBalance";
    pub const GET_PRINTER_PROPERTY: &str = "api.getPrinterProperty";
}

macro_rules! property_whitelist {
    ($(#[$meta:meta])* $name:ident, $param:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CallError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let known = $name::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>();
                        CallError::validation(
                            $param,
                            format!("unknown property '{}', expected one of: {}", wanted, known.join(", ")),
                        )
                    })
            }
        }
    };
}

property_whitelist!(
    /// Readable user properties.
    UserProperty, "property" {
        Balance => "balance",
        CardNumber => "card-number",
        CardPin => "card-pin",
        Department => "department",
        DisabledPrint => "disabled-print",
        Email => "email",
        FullName => "full-name",
        Notes => "notes",
        Office => "office",
        Restricted => "restricted",
        AccountSelectionMode => "account-selection.mode",
    }
);

impl UserProperty {
    /// Subset of the readable properties the API accepts in `setUserProperty`.
    pub fn is_settable(&self) -> bool {
        matches!(
            self,
            UserProperty::CardNumber
                | UserProperty::CardPin
                | UserProperty::Department
                | UserProperty::Email
                | UserProperty::FullName
                | UserProperty::Notes
                | UserProperty::Office
        )
    }

    pub fn settable(s: &str) -> Result<Self, CallError> {
        let property = s.parse::<UserProperty>()?;
        if !property.is_settable() {
            return Err(CallError::validation(
                "property",
                format!("'{}' is read-only", property),
            ));
        }
        Ok(property)
    }
}

property_whitelist!(
    SharedAccountProperty, "property" {
        AccessGroups => "access-groups",
        AccessUsers => "access-users",
        Balance => "balance",
        CommentOption => "comment-option",
        Disabled => "disabled",
        InvoiceOption => "invoice-option",
        Notes => "notes",
        Pin => "pin",
        Restricted => "restricted",
    }
);

property_whitelist!(
    PrinterProperty, "property" {
        CostModel => "cost-model",
        Disabled => "disabled",
        JobCount => "print-stats.job-count",
        PageCount => "print-stats.page-count",
    }
);

/// Offset/limit pair forwarded verbatim to the list methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPage {
    pub offset: i32,
    pub limit: i32,
}

impl Default for ListPage {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET as i32,
            limit: DEFAULT_LIMIT as i32,
        }
    }
}

impl ListPage {
    /// The API takes 32-bit signed ints, so larger values are rejected up front.
    pub fn new(offset: u32, limit: u32) -> Result<Self, CallError> {
        let offset = i32::try_from(offset)
            .map_err(|_| CallError::validation("offset", "must fit in a 32-bit integer"))?;
        let limit = i32::try_from(limit)
            .map_err(|_| CallError::validation("limit", "must fit in a 32-bit integer"))?;
        Ok(Self { offset, limit })
    }

    fn params(&self) -> Vec<Value> {
        vec![Value::Int(self.offset), Value::Int(self.limit)]
    }
}

fn require_finite(parameter: &str, value: f64) -> Result<(), CallError> {
    if !value.is_finite() {
        return Err(CallError::validation(parameter, "must be a finite number"));
    }
    Ok(())
}

/// Builds the method calls of the API for one auth token.
///
/// Builders validate their arguments, so a request that leaves here is well formed.
pub struct Requests<'a> {
    token: &'a Secret,
}

impl<'a> Requests<'a> {
    pub fn new(token: &'a Secret) -> Self {
        Self { token }
    }

    fn call(&self, method: &str, params: Vec<Value>) -> MethodCall {
        MethodCall::authenticated(method, self.token, params)
    }

    pub fn total_users(&self) -> MethodCall {
        self.call(methods::GET_TOTAL_USERS, vec![])
    }

    pub fn list_users(&self, page: ListPage) -> MethodCall {
        self.call(methods::LIST_USER_ACCOUNTS, page.params())
    }

    pub fn list_groups(&self, page: ListPage) -> MethodCall {
        self.call(methods::LIST_USER_GROUPS, page.params())
    }

    pub fn list_printers(&self, page: ListPage) -> MethodCall {
        self.call(methods::LIST_PRINTERS, page.params())
    }

    pub fn list_shared_accounts(&self, page: ListPage) -> MethodCall {
        self.call(methods::LIST_SHARED_ACCOUNTS, page.params())
    }

    pub fn user_exists(&self, username: &str) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        Ok(self.call(methods::IS_USER_EXISTS, vec![rpc::string(username)]))
    }

    pub fn user_groups(&self, username: &str) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        Ok(self.call(methods::GET_USER_GROUPS, vec![rpc::string(username)]))
    }

    pub fn get_user_property(
        &self,
        username: &str,
        property: UserProperty,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        Ok(self.call(
            methods::GET_USER_PROPERTY,
            vec![rpc::string(username), rpc::string(property.as_str())],
        ))
    }

    pub fn get_user_properties(
        &self,
        username: &str,
        properties: &[UserProperty],
    ) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        if properties.is_empty() {
            return Err(CallError::validation("properties", "must not be empty"));
        }
        if let Some(duplicate) = properties
            .iter()
            .enumerate()
            .find_map(|(i, p)| properties[..i].contains(p).then_some(p))
        {
            return Err(CallError::validation(
                "properties",
                format!("'{duplicate}' is listed more than once"),
            ));
        }
        let names = properties
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<Vec<_>>();
        Ok(self.call(
            methods::GET_USER_PROPERTIES,
            vec![rpc::string(username), rpc::strings(names)],
        ))
    }

    pub fn set_user_property(
        &self,
        username: &str,
        property: UserProperty,
        value: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        require_non_empty("value", value)?;
        if !property.is_settable() {
            return Err(CallError::validation(
                "property",
                format!("'{}' is read-only", property),
            ));
        }
        Ok(self.call(
            methods::SET_USER_PROPERTY,
            vec![rpc::string(username), rpc::string(property.as_str()), rpc::string(value)],
        ))
    }

    pub fn get_user_balance(&self, username: &str) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        Ok(self.call(methods::GET_USER_ACCOUNT_BALANCE, vec![rpc::string(username)]))
    }

    pub fn set_user_balance(
        &self,
        username: &str,
        balance: f64,
        comment: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        require_finite("balance", balance)?;
        Ok(self.call(
            methods::SET_USER_ACCOUNT_BALANCE,
            vec![rpc::string(username), Value::Double(balance), rpc::string(comment)],
        ))
    }

    pub fn adjust_user_balance(
        &self,
        username: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("username", username)?;
        require_finite("adjustment", adjustment)?;
        Ok(self.call(
            methods::ADJUST_USER_ACCOUNT_BALANCE,
            vec![rpc::string(username), Value::Double(adjustment), rpc::string(comment)],
        ))
    }

    pub fn adjust_group_balance(
        &self,
        group: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("group", group)?;
        require_finite("adjustment", adjustment)?;
        Ok(self.call(
            methods::ADJUST_USER_ACCOUNT_BALANCE_BY_GROUP,
            vec![rpc::string(group), Value::Double(adjustment), rpc::string(comment)],
        ))
    }

    pub fn rename_user(&self, current: &str, new: &str) -> Result<MethodCall, CallError> {
        require_non_empty("current username", current)?;
        require_non_empty("new username", new)?;
        if current == new {
            return Err(CallError::validation(
                "new username",
                "must differ from the current username",
            ));
        }
        Ok(self.call(methods::RENAME_USER_ACCOUNT, vec![rpc::string(current), rpc::string(new)]))
    }

    pub fn get_shared_account_property(
        &self,
        account: &str,
        property: SharedAccountProperty,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("account", account)?;
        Ok(self.call(
            methods::GET_SHARED_ACCOUNT_PROPERTY,
            vec![rpc::string(account), rpc::string(property.as_str())],
        ))
    }

    pub fn set_shared_account_property(
        &self,
        account: &str,
        property: SharedAccountProperty,
        value: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("account", account)?;
        require_non_empty("value", value)?;
        Ok(self.call(
            methods::SET_SHARED_ACCOUNT_PROPERTY,
            vec![rpc::string(account), rpc::string(property.as_str()), rpc::string(value)],
        ))
    }

    pub fn get_shared_account_balance(&self, account: &str) -> Result<MethodCall, CallError> {
        require_non_empty("account", account)?;
        Ok(self.call(methods::GET_SHARED_ACCOUNT_BALANCE, vec![rpc::string(account)]))
    }

    pub fn adjust_shared_account_balance(
        &self,
        account: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("account", account)?;
        require_finite("adjustment", adjustment)?;
        Ok(self.call(
            methods::ADJUST_SHARED_ACCOUNT_BALANCE,
            vec![rpc::string(account), Value::Double(adjustment), rpc::string(comment)],
        ))
    }

    pub fn get_printer_property(
        &self,
        server: &str,
        printer: &str,
        property: PrinterProperty,
    ) -> Result<MethodCall, CallError> {
        require_non_empty("server", server)?;
        require_non_empty("printer", printer)?;
        Ok(self.call(
            methods::GET_PRINTER_PROPERTY,
            vec![rpc::string(server), rpc::string(printer), rpc::string(property.as_str())],
        ))
    }
}

pub fn expect_int(operation: &str, value: Value) -> Result<i64, CallError> {
    match value {
        Value::Int(i) => Ok(i64::from(i)),
        Value::Int64(i) => Ok(i),
        other => Err(CallError::shape(operation, "int", type_name(&other))),
    }
}

/// Doubles, and ints widened to doubles (servers are loose about balances).
pub fn expect_f64(operation: &str, value: Value) -> Result<f64, CallError> {
    match value {
        Value::Double(d) => Ok(d),
        Value::Int(i) => Ok(f64::from(i)),
        other => Err(CallError::shape(operation, "double", type_name(&other))),
    }
}

pub fn expect_bool(operation: &str, value: Value) -> Result<bool, CallError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(CallError::shape(operation, "boolean", type_name(&other))),
    }
}

pub fn expect_string(operation: &str, value: Value) -> Result<String, CallError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(CallError::shape(operation, "string", type_name(&other))),
    }
}

/// Splits `server\printer`; a name without a backslash has an empty server part.
pub fn split_printer_name(name: &str) -> (String, String) {
    match name.split_once('\\') {
        Some((server, printer)) => (server.to_string(), printer.to_string()),
        None => (String::new(), name.to_string()),
    }
}

pub fn printer_records(names: Vec<String>) -> Vec<Record> {
    names
        .iter()
        .map(|name| {
            let (server, printer) = split_printer_name(name);
            Record::new().with("Server", server).with("Printer", printer)
        })
        .collect()
}

/// `{Username}` / `{Name}` rows for the plain name lists.
pub fn list_result(field: &str, operation: &str, value: Value) -> Result<CallResult, CallError> {
    Ok(CallResult::Records(name_records(
        field,
        into_strings(operation, value)?,
    )))
}

/// Labels a `getUserProperties` answer with the names that were asked for.
pub fn user_properties_record(
    operation: &str,
    username: &str,
    properties: &[UserProperty],
    value: Value,
) -> Result<Record, CallError> {
    let names = properties
        .iter()
        .map(|p| p.as_str().to_string())
        .collect::<Vec<_>>();
    let values = into_strings(operation, value)?;
    let zipped = zip_properties(operation, &names, values)?;

    let mut record = Record::new().with("Username", username);
    for (name, value) in zipped.fields() {
        record.insert(name.clone(), value.clone());
    }
    Ok(record)
}

/// `{<owner field>, propertyName, propertyValue}`.
pub fn property_record(
    owner_field: &str,
    owner: &str,
    property: &str,
    value: impl Into<serde_json::Value>,
) -> Record {
    Record::new()
        .with(owner_field, owner)
        .with("propertyName", property)
        .with("propertyValue", value)
}
