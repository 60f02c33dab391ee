//! JSON-RPC client for the barsystem service
//!
//! Every call is a JSON-RPC 2.0 envelope POSTed to the service URI. Once a
//! session exists its token travels in the envelope's `token` field. When
//! the service answers "access denied" the client renews the session and
//! logs in again, once, before re-issuing the call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{
    CustomCharge, InvoiceResult, InvoiceSummary, Person, PersonGroup, Product, ProductOrder,
};
use crate::ports::BarBackend;

/// Default service URI for a service running next to the bar
pub const DEFAULT_URI: &str = "http://127.0.0.1:8000";

const REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<JsonValue>,
}

/// Convert a JSON-RPC error member into an error
///
/// Some service builds send a bare message string instead of an error object.
fn rpc_error(error: JsonValue) -> Error {
    match error {
        JsonValue::Object(map) => {
            let code = map.get("code").and_then(JsonValue::as_i64).unwrap_or(-1);
            let message = match map.get("message") {
                Some(JsonValue::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => JsonValue::Object(map.clone()).to_string(),
            };
            Error::rpc(code, message)
        }
        JsonValue::String(message) => Error::rpc(-1, message),
        other => Error::rpc(-1, other.to_string()),
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
struct Credentials {
    user_name: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    credentials: Option<Credentials>,
}

/// JSON-RPC client with transparent session renewal
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    uri: String,
    timeout: Duration,
    next_id: AtomicU64,
    renewals: AtomicU64,
    session: Mutex<Session>,
}

impl RpcClient {
    /// Create a client for the service at `uri` (http or https)
    pub fn new(uri: &str) -> Result<Self> {
        Self::with_timeout(uri, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(uri: &str, timeout: Duration) -> Result<Self> {
        let parsed =
            Url::parse(uri).map_err(|e| Error::Config(format!("Invalid service URI '{}': {}", uri, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Service URI must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            uri: uri.to_string(),
            timeout,
            next_id: AtomicU64::new(1),
            renewals: AtomicU64::new(0),
            session: Mutex::new(Session::default()),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn has_session(&self) -> bool {
        self.lock_session()
            .map(|s| s.token.is_some())
            .unwrap_or(false)
    }

    /// Start a new session, replacing the current token
    pub fn create_session(&self) -> Result<()> {
        let token: String = self.request("session/create", &JsonValue::Null, false)?;
        self.lock_session()?.token = Some(token);
        Ok(())
    }

    /// Authenticate the current session
    ///
    /// The credentials are kept so an expired session can be renewed.
    pub fn login(&self, user_name: &str, password: &str) -> Result<JsonValue> {
        let credentials = Credentials {
            user_name: user_name.to_string(),
            password: password.to_string(),
        };
        self.lock_session()?.credentials = Some(credentials.clone());
        self.authenticate(&credentials)
    }

    /// Call `method` and decode its result, renewing the session once if the
    /// service denies access
    pub fn call<R: DeserializeOwned>(&self, method: &str, params: JsonValue) -> Result<R> {
        self.request(method, &params, true)
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<JsonValue> {
        self.request(
            "user/authenticate",
            &json!({
                "user_name": credentials.user_name,
                "password": credentials.password,
            }),
            false,
        )
    }

    fn renew_session(&self) -> Result<()> {
        let credentials = self.lock_session()?.credentials.clone();
        self.create_session()?;
        if let Some(credentials) = credentials {
            self.authenticate(&credentials)?;
        }
        Ok(())
    }

    fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: &JsonValue,
        retry: bool,
    ) -> Result<R> {
        let value = match self.send(method, params) {
            Err(e) if retry && e.is_access_denied() => {
                self.renewals.fetch_add(1, Ordering::Relaxed);
                // The call is re-issued even if the renewal failed; its
                // answer is what the caller gets
                let _ = self.renew_session();
                self.send(method, params)?
            }
            other => other?,
        };

        serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("Unexpected result for {}: {}", method, e)))
    }

    /// One round trip, without any retry
    fn send(&self, method: &str, params: &JsonValue) -> Result<JsonValue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.lock_session()?.token.clone();

        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
            token: token.as_deref(),
        };

        let response = self
            .client
            .post(&self.uri)
            .json(&request)
            .send()
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.map_request_error(e))?;

        let body: RpcResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(Error::Transport(format!(
                    "Service error: HTTP {}",
                    status.as_u16()
                )))
            }
            Err(e) => return Err(Error::protocol(format!("Invalid response: {}", e))),
        };

        if body.id != Some(JsonValue::from(id)) {
            return Err(Error::protocol("API returned incorrect id"));
        }
        if body.jsonrpc.as_deref() != Some("2.0") {
            return Err(Error::protocol("Invalid response"));
        }
        if let Some(error) = body.error {
            return Err(rpc_error(error));
        }

        Ok(body.result.unwrap_or(JsonValue::Null))
    }

    /// Sessions renewed after an access-denied answer
    pub fn renewals(&self) -> u64 {
        self.renewals.load(Ordering::Relaxed)
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Transport(format!(
                "Connection timed out after {}",
                describe_timeout(self.timeout)
            ))
        } else if error.is_connect() {
            Error::Transport(format!("Unable to connect to {}", self.uri))
        } else {
            Error::Transport(format!("Request failed: {}", error))
        }
    }
}

fn describe_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}

// =============================================================================
// BarBackend implementation
// =============================================================================

impl BarBackend for RpcClient {
    fn session_renewals(&self) -> u64 {
        self.renewals()
    }

    fn ping(&self) -> bool {
        matches!(
            self.call::<JsonValue>("ping", JsonValue::Null),
            Ok(JsonValue::String(ref s)) if s == "pong"
        )
    }

    fn find_person(&self, query: &str) -> Result<Option<Person>> {
        self.call("person/findForVending", json!(query))
    }

    fn list_persons(&self) -> Result<Vec<Person>> {
        self.call("person/listForVendingNoAvatar", json!({}))
    }

    fn register_person(&self, nickname: &str) -> Result<()> {
        self.call::<JsonValue>("person/create", json!(nickname))
            .map(|_| ())
    }

    fn find_products_by_identifier(&self, identifier: &str) -> Result<Vec<Product>> {
        self.call("product/findByIdentifier", json!(identifier))
    }

    fn find_products_by_name(&self, name: &str) -> Result<Vec<Product>> {
        self.call("product/find", json!(name))
    }

    fn list_products(&self) -> Result<Vec<Product>> {
        self.call("product/list/noimg", json!({}))
    }

    fn list_groups(&self) -> Result<Vec<PersonGroup>> {
        self.call("person/group/list", json!({}))
    }

    fn create_invoice(
        &self,
        person_id: i64,
        products: &[ProductOrder],
        other: &[CustomCharge],
    ) -> Result<InvoiceResult> {
        self.call(
            "invoice/create",
            json!({
                "person_id": person_id,
                "products": products,
                "other": other,
            }),
        )
    }

    fn last_invoices_of_person(
        &self,
        person_id: i64,
        count: usize,
    ) -> Result<Vec<InvoiceSummary>> {
        self.call(
            "invoice/list/last",
            json!({
                "query": { "person_id": person_id },
                "amount": count,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_description() {
        assert_eq!(describe_timeout(Duration::from_secs(10)), "10 seconds");
        assert_eq!(describe_timeout(Duration::from_millis(250)), "250 ms");
        assert_eq!(describe_timeout(Duration::from_millis(1500)), "1500 ms");
    }

    #[test]
    fn test_accepts_http_uri() {
        let client = RpcClient::new("http://127.0.0.1:8000").unwrap();
        assert_eq!(client.uri(), "http://127.0.0.1:8000");
        assert!(!client.has_session());
    }

    #[test]
    fn test_rejects_other_schemes() {
        let result = RpcClient::new("ftp://bar.example.org");
        assert!(result.unwrap_err().to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_malformed_uri() {
        assert!(RpcClient::new("not a uri").is_err());
    }

    #[test]
    fn test_envelope_omits_missing_token() {
        let params = json!({"a": 1});
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 5,
            method: "ping",
            params: &params,
            token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 5, "method": "ping", "params": {"a": 1}})
        );

        let request = RpcRequest {
            token: Some("abc"),
            ..request
        };
        assert_eq!(serde_json::to_value(&request).unwrap()["token"], "abc");
    }

    #[test]
    fn test_rpc_error_from_object_and_string() {
        let err = rpc_error(json!({"code": -32001, "message": "Access denied"}));
        assert!(err.is_access_denied());
        assert_eq!(err.to_string(), "Access denied");

        let err = rpc_error(json!("Something broke"));
        assert_eq!(err.rpc_code(), Some(-1));
        assert_eq!(err.to_string(), "Something broke");
    }

    #[test]
    fn test_ping_unreachable_service_is_false() {
        let client =
            RpcClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        assert!(!client.ping());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            user_name: "barsystem".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("barsystem"));
        assert!(!rendered.contains("hunter2"));
    }
}
