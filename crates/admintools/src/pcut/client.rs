use std::time::Duration;

use admintools_core::error::CallError;
use admintools_core::papercut::{
    expect_bool, expect_f64, expect_int, list_result, printer_records, property_record, rpc_url,
    user_properties_record, ListPage, PrinterProperty, Requests, SharedAccountProperty,
    UserProperty,
};
use admintools_core::record::{name_records, CallResult, Record};
use admintools_core::session::{Endpoint, Secret, Session, SessionSlot};
use admintools_core::rpc::{into_strings, to_json, MethodCall, Value};

use super::transport::{HttpTransport, XmlRpcTransport};
use crate::call::bounded;

/// Typed PaperCut API bound to at most one server session.
pub struct PaperCutClient {
    transport: Box<dyn XmlRpcTransport>,
    slot: SessionSlot<Session>,
    timeout: Duration,
}

impl PaperCutClient {
    pub fn new(transport: Box<dyn XmlRpcTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            slot: SessionSlot::new(),
            timeout,
        }
    }

    pub fn http(timeout: Duration) -> Self {
        Self::new(Box::new(HttpTransport::new()), timeout)
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    /// Verifies the server and token with `getTotalUsers`, then keeps the session.
    ///
    /// A failed verification leaves any previous session in place.
    pub async fn connect(&mut self, host: &str, port: u16, token: Secret) -> Result<Record, CallError> {
        let endpoint = Endpoint::new(host.trim(), port)?;
        if token.is_empty() {
            return Err(CallError::validation("auth token", "must not be empty"));
        }

        let session = Session {
            endpoint,
            credential: token,
        };
        let call = Requests::new(&session.credential).total_users();
        let label = call.label();

        let total = self
            .send(&session, &call)
            .await
            .and_then(|value| expect_int(&label, value))
            .map_err(|e| CallError::Authentication {
                target: session.endpoint.to_string(),
                message: e.to_string(),
            })?;

        log::info!("connected to PaperCut at {}", session.endpoint);
        let record = Record::new()
            .with("Server", session.endpoint.host.clone())
            .with("Port", session.endpoint.port)
            .with("TotalUsers", total);
        self.slot.store(session);
        Ok(record)
    }

    /// `{Server, Port, Connected}` of the current session, without a remote call.
    pub fn status(&self) -> Record {
        match self.slot.current("status") {
            Ok(session) => Record::new()
                .with("Server", session.endpoint.host.clone())
                .with("Port", session.endpoint.port)
                .with("Connected", true),
            Err(_) => Record::new().with("Connected", false),
        }
    }

    pub fn disconnect(&mut self) -> Record {
        match self.slot.clear() {
            Some(session) => Record::new()
                .with("Server", session.endpoint.host)
                .with("Disconnected", true),
            None => Record::new()
                .with("Disconnected", false)
                .with("Message", "No PaperCut session was connected"),
        }
    }

    async fn send(&self, session: &Session, call: &MethodCall) -> Result<Value, CallError> {
        let label = call.label();
        let url = rpc_url(&session.endpoint);
        bounded(self.timeout, &label, self.transport.call(&url, call))
            .await
            .map_err(|e| e.in_operation(label))
    }

    /// Checks the session, builds the request and sends it.
    ///
    /// Returns the decoded value with the call label for error reporting.
    async fn invoke<F>(&self, operation: &str, build: F) -> Result<(Value, String), CallError>
    where
        F: FnOnce(&Requests) -> Result<MethodCall, CallError>,
    {
        let session = self.slot.current(operation)?;
        let call = build(&Requests::new(&session.credential))?;
        let label = call.label();
        let value = self.send(session, &call).await?;
        Ok((value, label))
    }

    fn server(&self) -> String {
        self.slot
            .current("server")
            .map(|s| s.endpoint.host.clone())
            .unwrap_or_default()
    }

    pub async fn total_users(&self) -> Result<Record, CallError> {
        let (value, label) = self
            .invoke("getTotalUsers", |r| Ok(r.total_users()))
            .await?;
        Ok(Record::new()
            .with("TotalUsers", expect_int(&label, value)?)
            .with("Server", self.server()))
    }

    pub async fn list_users(&self, page: ListPage) -> Result<CallResult, CallError> {
        let (value, label) = self
            .invoke("listUserAccounts", |r| Ok(r.list_users(page)))
            .await?;
        list_result("Username", &label, value)
    }

    pub async fn list_groups(&self, page: ListPage) -> Result<CallResult, CallError> {
        let (value, label) = self
            .invoke("listUserGroups", |r| Ok(r.list_groups(page)))
            .await?;
        list_result("Name", &label, value)
    }

    pub async fn list_printers(&self, page: ListPage) -> Result<CallResult, CallError> {
        let (value, label) = self
            .invoke("listPrinters", |r| Ok(r.list_printers(page)))
            .await?;
        Ok(CallResult::Records(printer_records(into_strings(&label, value)?)))
    }

    pub async fn list_shared_accounts(&self, page: ListPage) -> Result<CallResult, CallError> {
        let (value, label) = self
            .invoke("listSharedAccounts", |r| Ok(r.list_shared_accounts(page)))
            .await?;
        list_result("Name", &label, value)
    }

    pub async fn user_exists(&self, username: &str) -> Result<Record, CallError> {
        let (value, label) = self
            .invoke("isUserExists", |r| r.user_exists(username))
            .await?;
        Ok(Record::new()
            .with("Username", username)
            .with("Exists", expect_bool(&label, value)?))
    }

    pub async fn user_groups(&self, username: &str) -> Result<CallResult, CallError> {
        let (value, label) = self
            .invoke("getUserGroups", |r| r.user_groups(username))
            .await?;
        Ok(CallResult::Records(name_records(
            "Name",
            into_strings(&label, value)?,
        )))
    }

    pub async fn get_user_property(
        &self,
        username: &str,
        property: UserProperty,
    ) -> Result<Record, CallError> {
        let (value, _) = self
            .invoke("getUserProperty", |r| r.get_user_property(username, property))
            .await?;
        Ok(property_record(
            "Username",
            username,
            property.as_str(),
            to_json(&value),
        ))
    }

    /// Reads several properties in one call; an empty list reads every readable one.
    pub async fn get_user_properties(
        &self,
        username: &str,
        properties: &[UserProperty],
    ) -> Result<Record, CallError> {
        let properties = if properties.is_empty() {
            UserProperty::ALL
        } else {
            properties
        };
        let (value, label) = self
            .invoke("getUserProperties", |r| {
                r.get_user_properties(username, properties)
            })
            .await?;
        user_properties_record(&label, username, properties, value)
    }

    pub async fn set_user_property(
        &self,
        username: &str,
        property: UserProperty,
        value: &str,
    ) -> Result<Record, CallError> {
        self.invoke("setUserProperty", |r| {
            r.set_user_property(username, property, value)
        })
        .await?;
        Ok(property_record("Username", username, property.as_str(), value))
    }

    async fn user_balance(&self, username: &str) -> Result<f64, CallError> {
        let (value, label) = self
            .invoke("getUserAccountBalance", |r| r.get_user_balance(username))
            .await?;
        expect_f64(&label, value)
    }

    pub async fn get_user_balance(&self, username: &str) -> Result<Record, CallError> {
        let balance = self.user_balance(username).await?;
        Ok(Record::new()
            .with("Username", username)
            .with("Balance", balance))
    }

    pub async fn set_user_balance(
        &self,
        username: &str,
        balance: f64,
        comment: &str,
    ) -> Result<Record, CallError> {
        self.invoke("setUserAccountBalance", |r| {
            r.set_user_balance(username, balance, comment)
        })
        .await?;
        Ok(Record::new()
            .with("Username", username)
            .with("Balance", balance)
            .with("Comment", comment))
    }

    /// Reads the balance, applies the adjustment once, and reads it again.
    pub async fn adjust_user_balance(
        &self,
        username: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<Record, CallError> {
        // Validate before the first read so a bad amount sends nothing.
        let session = self.slot.current("adjustUserAccountBalance")?;
        Requests::new(&session.credential).adjust_user_balance(username, adjustment, comment)?;

        let old_balance = self.user_balance(username).await?;
        self.invoke("adjustUserAccountBalance", |r| {
            r.adjust_user_balance(username, adjustment, comment)
        })
        .await?;
        let balance = self.user_balance(username).await?;

        Ok(Record::new()
            .with("Username", username)
            .with("OldBalance", old_balance)
            .with("Adjustment", adjustment)
            .with("Balance", balance))
    }

    pub async fn adjust_group_balance(
        &self,
        group: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<Record, CallError> {
        self.invoke("adjustUserAccountBalanceByGroup", |r| {
            r.adjust_group_balance(group, adjustment, comment)
        })
        .await?;
        Ok(Record::new()
            .with("Name", group)
            .with("Adjustment", adjustment)
            .with("Comment", comment))
    }

    /// Renames an account and confirms the new name exists afterwards.
    pub async fn rename_user(&self, current: &str, new: &str) -> Result<Record, CallError> {
        let (_, label) = self
            .invoke("renameUserAccount", |r| r.rename_user(current, new))
            .await?;

        let (exists, exists_label) = self
            .invoke("isUserExists", |r| r.user_exists(new))
            .await?;
        if !expect_bool(&exists_label, exists)? {
            return Err(CallError::RemoteFault {
                operation: label,
                code: 0,
                message: format!("user '{new}' does not exist after the rename"),
            });
        }

        Ok(Record::new().with("NewUsername", new))
    }

    pub async fn get_shared_account_property(
        &self,
        account: &str,
        property: SharedAccountProperty,
    ) -> Result<Record, CallError> {
        let (value, _) = self
            .invoke("getSharedAccountProperty", |r| {
                r.get_shared_account_property(account, property)
            })
            .await?;
        Ok(property_record(
            "Name",
            account,
            property.as_str(),
            to_json(&value),
        ))
    }

    pub async fn set_shared_account_property(
        &self,
        account: &str,
        property: SharedAccountProperty,
        value: &str,
    ) -> Result<Record, CallError> {
        self.invoke("setSharedAccountProperty", |r| {
            r.set_shared_account_property(account, property, value)
        })
        .await?;
        Ok(property_record("Name", account, property.as_str(), value))
    }

    pub async fn get_shared_account_balance(&self, account: &str) -> Result<Record, CallError> {
        let (value, label) = self
            .invoke("getSharedAccountAccountBalance", |r| {
                r.get_shared_account_balance(account)
            })
            .await?;
        Ok(Record::new()
            .with("Name", account)
            .with("Balance", expect_f64(&label, value)?))
    }

    pub async fn adjust_shared_account_balance(
        &self,
        account: &str,
        adjustment: f64,
        comment: &str,
    ) -> Result<Record, CallError> {
        self.invoke("adjustSharedAccountAccountBalance", |r| {
            r.adjust_shared_account_balance(account, adjustment, comment)
        })
        .await?;
        Ok(Record::new()
            .with("Name", account)
            .with("Adjustment", adjustment)
            .with("Comment", comment))
    }

    pub async fn get_printer_property(
        &self,
        server: &str,
        printer: &str,
        property: PrinterProperty,
    ) -> Result<Record, CallError> {
        let (value, _) = self
            .invoke("getPrinterProperty", |r| {
                r.get_printer_property(server, printer, property)
            })
            .await?;
        Ok(Record::new()
            .with("Server", server)
            .with("Printer", printer)
            .with("propertyName", property.as_str())
            .with("propertyValue", to_json(&value)))
    }
}
