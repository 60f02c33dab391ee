//! Mock JSON-RPC service for testing
//!
//! A small HTTP server on a random local port that speaks enough of the
//! barsystem service protocol to exercise the client:
//! - `session/create` hands out a fresh, unauthenticated token
//! - `user/authenticate` authenticates the token of the request
//! - `ping` answers `"pong"` without a session
//! - every other method requires an authenticated token
//!
//! Failure modes (session expiry, persistent denial, error codes, wrong ids)
//! are switched on through `MockConfig`. Every call is recorded.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};

use crate::domain::result::ACCESS_DENIED;

/// Password the mock accepts for any user
pub const MOCK_PASSWORD: &str = "secret";

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Expire the session on this many authenticated calls
    pub expire_sessions: usize,
    /// Deny every call that needs a session
    pub always_deny: bool,
    /// Answer every call that needs a session with this error
    pub fail_with: Option<(i64, String)>,
    /// Answer with an id that does not match the request
    pub wrong_id: bool,
    /// Accept only the first `user/authenticate`; later logins are rejected
    pub reject_relogin: bool,
    /// Wait this long before answering
    pub delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    config: MockConfig,
    calls: Vec<String>,
    params: HashMap<String, JsonValue>,
    next_token: u64,
    logins: usize,
    authenticated: HashSet<String>,
}

pub struct MockRpcServer {
    port: u16,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<MockState>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockRpcServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(MockState {
            config,
            ..Default::default()
        }));

        // Non-blocking accept so the server can be stopped
        listener.set_nonblocking(true)?;

        let running_clone = Arc::clone(&running);
        let state_clone = Arc::clone(&state);
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let state = Arc::clone(&state_clone);
                        thread::spawn(move || handle_connection(stream, &state));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            state,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Methods called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// How often `method` was called
    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| *m == method).count()
    }

    /// Params of the most recent call of `method`
    pub fn last_params(&self, method: &str) -> Option<JsonValue> {
        self.state.lock().unwrap().params.get(method).cloned()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockRpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one HTTP request and return its body
fn read_body(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let body_start = header_end + 4;
            if data.len() >= body_start + content_length {
                return Some(
                    String::from_utf8_lossy(&data[body_start..body_start + content_length])
                        .into_owned(),
                );
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, state: &Mutex<MockState>) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let Some(body) = read_body(&mut stream) else {
        return;
    };
    let Ok(request) = serde_json::from_str::<JsonValue>(&body) else {
        send_response(&mut stream, 400, "Bad Request", r#"{"error": "Invalid JSON"}"#);
        return;
    };

    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let token = request["token"].as_str().map(str::to_string);

    let (outcome, wrong_id, delay) = {
        let mut state = state.lock().unwrap();
        state.calls.push(method.clone());
        state.params.insert(method.clone(), params.clone());
        let outcome = dispatch(&mut state, &method, &params, token.as_deref());
        (outcome, state.config.wrong_id, state.config.delay)
    };
    if let Some(delay) = delay {
        thread::sleep(delay);
    }

    let id = if wrong_id {
        json!(id.as_u64().unwrap_or(0) + 1000)
    } else {
        id
    };

    let response = match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message}
        }),
    };
    send_response(&mut stream, 200, "OK", &response.to_string());
}

fn dispatch(
    state: &mut MockState,
    method: &str,
    params: &JsonValue,
    token: Option<&str>,
) -> Result<JsonValue, (i64, String)> {
    let denied = || (ACCESS_DENIED, "Access denied".to_string());

    match method {
        "ping" => return Ok(json!("pong")),
        "session/create" => {
            state.next_token += 1;
            return Ok(json!(format!("token-{}", state.next_token)));
        }
        "user/authenticate" => {
            let token = token.ok_or_else(denied)?;
            if params["password"] != MOCK_PASSWORD
                || (state.config.reject_relogin && state.logins > 0)
            {
                return Err((-32000, "Invalid credentials".to_string()));
            }
            state.logins += 1;
            state.authenticated.insert(token.to_string());
            return Ok(json!({"user_name": params["user_name"]}));
        }
        _ => {}
    }

    let token = token.ok_or_else(denied)?;
    if state.config.always_deny || !state.authenticated.contains(token) {
        return Err(denied());
    }
    if state.config.expire_sessions > 0 {
        state.config.expire_sessions -= 1;
        state.authenticated.remove(token);
        return Err(denied());
    }
    if let Some(error) = state.config.fail_with.clone() {
        return Err(error);
    }

    Ok(match method {
        "person/findForVending" if params == "zeus" => json!({
            "id": 1,
            "nick_name": "zeus",
            "first_name": "Zeus",
            "last_name": "",
            "balance": 1000
        }),
        "person/findForVending" => JsonValue::Null,
        "product/findByIdentifier" | "product/find" => json!([]),
        "invoice/create" => {
            let mut rows = Vec::new();
            for product in params["products"].as_array().cloned().unwrap_or_default() {
                rows.push(json!({
                    "description": format!("Product {}", product["id"]),
                    "price": 150,
                    "amount": product["amount"]
                }));
            }
            for other in params["other"].as_array().cloned().unwrap_or_default() {
                rows.push(other);
            }
            let total: i64 = rows
                .iter()
                .map(|r| r["price"].as_i64().unwrap_or(0) * r["amount"].as_i64().unwrap_or(0))
                .sum();
            json!({
                "invoice": {"id": 1, "total": total},
                "person": {"id": params["person_id"], "balance": 1000 - total},
                "rows": rows
            })
        }
        _ => json!([]),
    })
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rpc::RpcClient;
    use crate::domain::{CustomCharge, Money, ProductOrder};
    use crate::ports::BarBackend;

    fn logged_in_client(server: &MockRpcServer) -> RpcClient {
        let client = RpcClient::new(&server.uri()).unwrap();
        client.create_session().unwrap();
        client.login("barsystem", MOCK_PASSWORD).unwrap();
        client
    }

    #[test]
    fn test_ping_without_session() {
        let server = MockRpcServer::start(MockConfig::default()).unwrap();
        let client = RpcClient::new(&server.uri()).unwrap();
        assert!(client.ping());
        assert_eq!(server.calls(), vec!["ping"]);
    }

    #[test]
    fn test_login_and_find_person() {
        let server = MockRpcServer::start(MockConfig::default()).unwrap();
        let client = logged_in_client(&server);
        assert!(client.has_session());

        let person = client.find_person("zeus").unwrap().unwrap();
        assert_eq!(person.display_name(), "Zeus");
        assert_eq!(person.balance, Money::from_cents(1000));

        assert!(client.find_person("nobody").unwrap().is_none());
        assert_eq!(
            server.calls(),
            vec![
                "session/create",
                "user/authenticate",
                "person/findForVending",
                "person/findForVending",
            ]
        );
    }

    #[test]
    fn test_wrong_password_fails_login() {
        let server = MockRpcServer::start(MockConfig::default()).unwrap();
        let client = RpcClient::new(&server.uri()).unwrap();
        client.create_session().unwrap();
        let err = client.login("barsystem", "wrong").unwrap_err();
        assert_eq!(err.rpc_code(), Some(-32000));
    }

    #[test]
    fn test_expired_session_is_renewed_once() {
        let server = MockRpcServer::start(MockConfig {
            expire_sessions: 1,
            ..Default::default()
        })
        .unwrap();
        let client = logged_in_client(&server);

        assert_eq!(client.session_renewals(), 0);

        let person = client.find_person("zeus").unwrap();
        assert!(person.is_some());
        assert_eq!(
            server.calls(),
            vec![
                "session/create",
                "user/authenticate",
                "person/findForVending",
                "session/create",
                "user/authenticate",
                "person/findForVending",
            ]
        );
        assert_eq!(client.session_renewals(), 1);

        client.find_person("zeus").unwrap();
        assert_eq!(client.session_renewals(), 1);
    }

    #[test]
    fn test_failed_renewal_still_reissues_the_call() {
        let server = MockRpcServer::start(MockConfig {
            expire_sessions: 1,
            reject_relogin: true,
            ..Default::default()
        })
        .unwrap();
        let client = logged_in_client(&server);

        let err = client.find_person("zeus").unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(
            server.calls(),
            vec![
                "session/create",
                "user/authenticate",
                "person/findForVending",
                "session/create",
                "user/authenticate",
                "person/findForVending",
            ]
        );
        assert_eq!(client.session_renewals(), 1);
    }

    #[test]
    fn test_timeout_names_configured_duration() {
        let server = MockRpcServer::start(MockConfig {
            delay: Some(Duration::from_millis(1500)),
            ..Default::default()
        })
        .unwrap();
        let client =
            RpcClient::with_timeout(&server.uri(), Duration::from_millis(300)).unwrap();

        let err = client.create_session().unwrap_err();
        assert_eq!(err.to_string(), "Connection timed out after 300 ms");
    }

    #[test]
    fn test_persistent_denial_is_returned_after_one_retry() {
        let server = MockRpcServer::start(MockConfig {
            always_deny: true,
            ..Default::default()
        })
        .unwrap();
        let client = logged_in_client(&server);

        let err = client.list_products().unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(server.call_count("product/list/noimg"), 2);
        assert_eq!(server.call_count("session/create"), 2);
        assert_eq!(server.call_count("user/authenticate"), 2);
    }

    #[test]
    fn test_other_errors_propagate_unchanged() {
        let server = MockRpcServer::start(MockConfig {
            fail_with: Some((-32602, "Invalid params".to_string())),
            ..Default::default()
        })
        .unwrap();
        let client = logged_in_client(&server);

        let err = client.find_products_by_name("mate").unwrap_err();
        assert_eq!(err.rpc_code(), Some(-32602));
        assert_eq!(err.to_string(), "Invalid params");
        assert_eq!(server.call_count("product/find"), 1);
        assert_eq!(server.call_count("session/create"), 1);
    }

    #[test]
    fn test_mismatched_id_is_rejected() {
        let server = MockRpcServer::start(MockConfig {
            wrong_id: true,
            ..Default::default()
        })
        .unwrap();
        let client = RpcClient::new(&server.uri()).unwrap();

        let err = client.create_session().unwrap_err();
        assert!(err.to_string().contains("incorrect id"));
        assert!(!client.ping());
    }

    #[test]
    fn test_create_invoice_sends_rows() {
        let server = MockRpcServer::start(MockConfig::default()).unwrap();
        let client = logged_in_client(&server);

        let result = client
            .create_invoice(
                1,
                &[ProductOrder { id: 12, amount: 2 }],
                &[CustomCharge::deposit(Money::from_cents(500))],
            )
            .unwrap();

        let params = server.last_params("invoice/create").unwrap();
        assert_eq!(params["person_id"], 1);
        assert_eq!(params["products"], json!([{"id": 12, "amount": 2}]));
        assert_eq!(
            params["other"],
            json!([{"description": "Deposit", "price": -500, "amount": 1}])
        );

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.invoice.total, Money::from_cents(-200));
        assert_eq!(result.person.balance, Money::from_cents(1200));
    }

    #[test]
    fn test_last_invoices_request_shape() {
        let server = MockRpcServer::start(MockConfig::default()).unwrap();
        let client = logged_in_client(&server);

        let invoices = client.last_invoices_of_person(1, 5).unwrap();
        assert!(invoices.is_empty());
        assert_eq!(
            server.last_params("invoice/list/last").unwrap(),
            json!({"query": {"person_id": 1}, "amount": 5})
        );
    }
}
