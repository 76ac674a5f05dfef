//! In-memory API double for coordinator and client tests

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use session_auth::{
    CredentialStorage, CredentialStore, LOGIN_PATH, LOGOUT_PATH, MemoryStorage, Principal,
    REFRESH_PATH, REGISTER_PATH, StoredCredentials,
};
use tokio::sync::Notify;
use transport::header::AUTHORIZATION;
use transport::{ApiRequest, ApiResponse, StatusCode, Transport};

use crate::signal::InvalidationSignal;

/// What the fake refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshReply {
    Issue {
        access: String,
        refresh: Option<String>,
    },
    Status(u16),
    Body(String),
    NetworkError,
    Panic,
}

impl RefreshReply {
    pub fn issue(access: &str, refresh: Option<&str>) -> Self {
        RefreshReply::Issue {
            access: access.into(),
            refresh: refresh.map(str::to_owned),
        }
    }
}

/// A call as the fake server saw it.
#[derive(Debug, Clone)]
pub struct Sent {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
    pub trace: Option<String>,
}

/// Fake API server.
///
/// Protected paths answer 200 only for `Bearer <accepted>` and 401 otherwise.
/// `/public/*` never checks credentials; `/forbidden`, `/boom`, `/missing`
/// and `/offline` produce 403, 500, 404 and a network error. When gated, the
/// refresh endpoint parks until `release_refresh` is called.
pub struct FakeApi {
    accepted: String,
    refresh_reply: RefreshReply,
    logout_status: u16,
    gate: Option<Notify>,
    refresh_calls: AtomicUsize,
    log: Mutex<Vec<Sent>>,
}

impl FakeApi {
    pub fn new(accepted: &str) -> Self {
        Self {
            accepted: accepted.into(),
            refresh_reply: RefreshReply::issue(accepted, None),
            logout_status: 204,
            gate: None,
            refresh_calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn refresh_reply(mut self, reply: RefreshReply) -> Self {
        self.refresh_reply = reply;
        self
    }

    pub fn logout_status(mut self, status: u16) -> Self {
        self.logout_status = status;
        self
    }

    pub fn release_refresh(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    /// Calls to `path`, in arrival order.
    pub fn sent_to(&self, path: &str) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.path == path).collect()
    }

    pub fn refresh_tokens_sent(&self) -> Vec<String> {
        self.sent_to(REFRESH_PATH)
            .into_iter()
            .filter_map(|s| s.body?["refreshToken"].as_str().map(str::to_owned))
            .collect()
    }

    async fn refresh(&self) -> transport::Result<ApiResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.refresh_reply {
            RefreshReply::Issue { access, refresh } => {
                let mut tokens = serde_json::json!({
                    "access": {"token": access, "expiresIn": 1800}
                });
                if let Some(refresh) = refresh {
                    tokens["refresh"] = serde_json::json!({"token": refresh, "expiresIn": 2592000});
                }
                let body = serde_json::json!({"user": {"id": "u_1"}, "tokens": tokens});
                Ok(json_response(200, body))
            }
            RefreshReply::Status(status) => Ok(json_response(
                *status,
                serde_json::json!({"code": status, "message": "Please authenticate"}),
            )),
            RefreshReply::Body(body) => Ok(ApiResponse::new(StatusCode::OK, body.clone())),
            RefreshReply::NetworkError => {
                Err(transport::Error::Network("connection reset".into()))
            }
            RefreshReply::Panic => panic!("refresh endpoint exploded"),
        }
    }

    fn respond(&self, sent: &Sent) -> transport::Result<ApiResponse> {
        let path = sent.path.as_str();
        if path == LOGIN_PATH || path == REGISTER_PATH {
            let body = serde_json::json!({
                "user": {"id": "u_login", "name": "Ada", "email": "ada@example.com"},
                "tokens": {
                    "access": {"token": "at_login", "expiresIn": 1800},
                    "refresh": {"token": "rt_login", "expiresIn": 2592000}
                }
            });
            return Ok(json_response(if path == LOGIN_PATH { 200 } else { 201 }, body));
        }
        if path == LOGOUT_PATH {
            return Ok(ApiResponse::new(
                StatusCode::from_u16(self.logout_status).unwrap(),
                "",
            ));
        }
        if path.starts_with("/public") {
            return Ok(json_response(200, serde_json::json!({"path": path})));
        }
        match path {
            "/forbidden" => return Ok(json_response(403, serde_json::json!({"code": 403}))),
            "/boom" => return Ok(json_response(500, serde_json::json!({"code": 500}))),
            "/missing" => return Ok(json_response(404, serde_json::json!({"code": 404}))),
            "/offline" => return Err(transport::Error::Timeout("30s elapsed".into())),
            _ => {}
        }

        let expected = format!("Bearer {}", self.accepted);
        if sent.authorization.as_deref() == Some(expected.as_str()) {
            Ok(json_response(200, serde_json::json!({"path": path})))
        } else {
            Ok(json_response(
                401,
                serde_json::json!({"code": 401, "message": "Please authenticate"}),
            ))
        }
    }
}

impl Transport for FakeApi {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + 'a>> {
        let sent = Sent {
            method: request.method.to_string(),
            path: request.path.clone(),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            body: request.body.clone(),
            trace: request
                .headers
                .get("x-trace-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        };
        self.log.lock().unwrap().push(sent.clone());

        Box::pin(async move {
            if sent.path == REFRESH_PATH {
                self.refresh().await
            } else {
                self.respond(&sent)
            }
        })
    }
}

fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    ApiResponse::new(StatusCode::from_u16(status).unwrap(), body.to_string())
}

pub fn principal() -> Principal {
    serde_json::from_value(serde_json::json!({
        "id": "u_1",
        "name": "Ada",
        "email": "ada@example.com",
        "role": "user"
    }))
    .unwrap()
}

/// A store hydrated with the given fields.
pub async fn store_with(
    with_principal: bool,
    access: Option<&str>,
    refresh: Option<&str>,
) -> Arc<CredentialStore> {
    let record = StoredCredentials {
        user: with_principal.then(principal),
        token: access.map(str::to_owned),
        refresh_token: refresh.map(str::to_owned),
        is_authenticated: with_principal && access.is_some(),
    };
    Arc::new(
        CredentialStore::load(MemoryStorage::with_record(record))
            .await
            .unwrap(),
    )
}

/// Storage that holds a record but refuses to remove it.
struct UnclearableStorage(MemoryStorage);

impl CredentialStorage for UnclearableStorage {
    fn read(
        &self,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<Option<StoredCredentials>>> + Send + '_>>
    {
        self.0.read()
    }

    fn write<'a>(
        &'a self,
        record: &'a StoredCredentials,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<()>> + Send + 'a>> {
        self.0.write(record)
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = session_auth::Result<()>> + Send + '_>> {
        Box::pin(async { Err(session_auth::Error::Io("read-only filesystem".into())) })
    }
}

/// A fully signed-in store whose backing storage cannot be cleared.
pub async fn store_with_unclearable_storage() -> Arc<CredentialStore> {
    let record = StoredCredentials {
        user: Some(principal()),
        token: Some("at_1".into()),
        refresh_token: Some("rt_1".into()),
        is_authenticated: true,
    };
    let storage = UnclearableStorage(MemoryStorage::with_record(record));
    Arc::new(CredentialStore::load(storage).await.unwrap())
}

/// Count invalidation events.
pub fn invalidation_counter(signal: &InvalidationSignal) -> Arc<AtomicUsize> {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    signal.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    fired
}

/// Yield until `condition` holds, failing the test after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
