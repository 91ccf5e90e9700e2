//! Integration tests for Stockwatch.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockwatch-integration-tests
//! ```
//!
//! Every test starts its own [`MockBackend`] on `127.0.0.1:0`, so tests run
//! in parallel without a real server or database.
//!
//! # Mock Backend
//!
//! Implements the user and product endpoints the client talks to:
//!
//! - `POST /users/login` - sets the `authToken` session cookie and returns an
//!   access token
//! - `GET /users/validate` - user record for a known session cookie
//! - `POST /users/logout` - drops the session and expires the cookie
//! - `POST /users/register` - rejects duplicate emails
//! - `POST /users/reissue` - new access token for a known session cookie
//! - `GET /products` - product list for the current access token only
//!
//! Knobs let tests expire the access token, slow down validate or reissue,
//! deny reissue, fail logout, change the role validate reports, and reject
//! every bearer token. Counters record reissue calls and the `Authorization`
//! headers `/products` has seen.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use stockwatch_client::{AppState, ClientConfig, CredentialStore};
use tokio::task::JoinHandle;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "authToken";

/// A registered account on the mock backend.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: i32,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Default)]
struct BackendState {
    users: Mutex<HashMap<String, MockUser>>,
    /// Session cookie value -> email
    sessions: Mutex<HashMap<String, String>>,
    /// Access tokens `/products` accepts
    valid_tokens: Mutex<HashSet<String>>,
    bearers_seen: Mutex<Vec<Option<String>>>,
    /// `Authorization` header values per `/products` request
    authorization_headers: Mutex<Vec<Vec<String>>>,
    /// Role reported by validate; `associate` when unset
    role: Mutex<Option<String>>,
    validate_delay: Mutex<Duration>,
    fail_logout: AtomicBool,
    products: Mutex<Vec<Value>>,
    reissue_delay: Mutex<Duration>,
    reissue_calls: AtomicUsize,
    login_calls: AtomicUsize,
    counter: AtomicUsize,
    deny_reissue: AtomicBool,
    reject_all_bearers: AtomicBool,
}

impl BackendState {
    fn next(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    fn issue_token(&self) -> String {
        let token = self.next("token");
        lock(&self.valid_tokens).insert(token.clone());
        token
    }
}

/// In-process stand-in for the Stockwatch API.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    /// Start a backend with one user (`associate@store.example` / `correct-horse`)
    /// and a small product list.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        lock(&state.users).insert(
            "associate@store.example".to_string(),
            MockUser {
                id: 1,
                email: "associate@store.example".to_string(),
                password: "correct-horse".to_string(),
                first_name: "Alex".to_string(),
                last_name: "Rivera".to_string(),
                phone: "555-0100".to_string(),
            },
        );
        *lock(&state.products) = vec![
            json!({ "id": 1, "name": "Whole Milk", "type": "Dairy", "quantity": 0, "aisle": "A1", "shelf": "S1" }),
            json!({ "id": 2, "name": "Cheddar", "type": "Dairy", "quantity": 3, "aisle": "A1", "shelf": "S2" }),
            json!({ "id": 3, "name": "Sparkling Water", "type": "Beverage", "quantity": 48, "aisle": "B4", "shelf": "S1" }),
        ];

        let app = Router::new()
            .route("/users/login", post(login))
            .route("/users/validate", get(validate))
            .route("/users/logout", post(logout))
            .route("/users/register", post(register))
            .route("/users/reissue", post(reissue))
            .route("/products", get(products))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the backend.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Panics if the URL is rejected (it never is).
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_api_url(&self.url()).expect("Mock backend URL is valid")
    }

    /// Fully wired client state over `store`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn app(&self, store: Arc<dyn CredentialStore>) -> AppState {
        AppState::new(self.config(), store).expect("Failed to build app state")
    }

    /// Invalidate every access token issued so far, as if they had expired.
    pub fn expire_access_tokens(&self) {
        lock(&self.state.valid_tokens).clear();
    }

    /// Accept `token` on `/products` without going through login.
    pub fn accept_token(&self, token: &str) {
        lock(&self.state.valid_tokens).insert(token.to_string());
    }

    /// Delay every reissue response by `delay`.
    pub fn set_reissue_delay(&self, delay: Duration) {
        *lock(&self.state.reissue_delay) = delay;
    }

    /// Delay every validate response by `delay`.
    pub fn set_validate_delay(&self, delay: Duration) {
        *lock(&self.state.validate_delay) = delay;
    }

    /// Report `role` for every user on validate.
    pub fn set_role(&self, role: &str) {
        *lock(&self.state.role) = Some(role.to_string());
    }

    /// Make logout answer 500 and keep the session alive.
    pub fn fail_logout(&self, fail: bool) {
        self.state.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Make reissue answer 401.
    pub fn deny_reissue(&self, deny: bool) {
        self.state.deny_reissue.store(deny, Ordering::SeqCst);
    }

    /// Make `/products` answer 401 whatever the bearer token.
    pub fn reject_all_bearers(&self, reject: bool) {
        self.state.reject_all_bearers.store(reject, Ordering::SeqCst);
    }

    /// Number of reissue requests received.
    #[must_use]
    pub fn reissue_calls(&self) -> usize {
        self.state.reissue_calls.load(Ordering::SeqCst)
    }

    /// Number of login requests received.
    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    /// Bearer tokens `/products` received, in arrival order.
    #[must_use]
    pub fn bearers_seen(&self) -> Vec<Option<String>> {
        lock(&self.state.bearers_seen).clone()
    }

    /// Every `Authorization` value of each `/products` request, in arrival order.
    #[must_use]
    pub fn authorization_headers_seen(&self) -> Vec<Vec<String>> {
        lock(&self.state.authorization_headers).clone()
    }

    /// Number of live server-side sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.state.sessions).len()
    }

    /// Registered user by email.
    #[must_use]
    pub fn user(&self, email: &str) -> Option<MockUser> {
        lock(&self.state.users).get(email).cloned()
    }
}

/// A URL on which nothing listens.
///
/// # Panics
///
/// Panics if no local port can be bound.
#[must_use]
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{addr}")
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<BackendState>>;

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    phone: String,
}

async fn login(State(state): Shared, Json(body): Json<LoginBody>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let Some(user) = lock(&state.users).get(&body.email).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "User not found" })),
        )
            .into_response();
    };
    if user.password != body.password {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Incorrect password" })),
        )
            .into_response();
    }

    let session = state.next("session");
    lock(&state.sessions).insert(session.clone(), user.email);
    let token = state.issue_token();

    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly"),
        )],
        Json(json!({ "success": true, "message": "Login successful", "accessToken": token })),
    )
        .into_response()
}

async fn validate(State(state): Shared, headers: HeaderMap) -> Response {
    let delay = *lock(&state.validate_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let role = lock(&state.role)
        .clone()
        .unwrap_or_else(|| "associate".to_string());
    let user = session_cookie(&headers)
        .and_then(|session| lock(&state.sessions).get(&session).cloned())
        .and_then(|email| lock(&state.users).get(&email).cloned());

    match user {
        Some(user) => Json(json!({
            "success": true,
            "user": {
                "id": user.id,
                "email": user.email,
                "first_name": user.first_name,
                "last_name": user.last_name,
                "phone": user.phone,
                "role": role,
                "created_at": "2024-03-01T09:30:00Z",
            }
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Not authenticated" })),
        )
            .into_response(),
    }
}

async fn logout(State(state): Shared, headers: HeaderMap) -> Response {
    if state.fail_logout.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Logout failed" })),
        )
            .into_response();
    }
    if let Some(session) = session_cookie(&headers) {
        lock(&state.sessions).remove(&session);
    }
    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}=; Path=/; Max-Age=0"),
        )],
        Json(json!({ "success": true })),
    )
        .into_response()
}

async fn register(State(state): Shared, Json(body): Json<RegisterBody>) -> Response {
    let mut users = lock(&state.users);
    if users.contains_key(&body.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "User already exists" })),
        )
            .into_response();
    }

    let id = i32::try_from(users.len() + 1).unwrap_or(i32::MAX);
    users.insert(
        body.email.clone(),
        MockUser {
            id,
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            phone: body.phone,
        },
    );

    (
        StatusCode::CREATED,
        Json(json!({ "message": "User added successfully" })),
    )
        .into_response()
}

async fn reissue(State(state): Shared, headers: HeaderMap) -> Response {
    state.reissue_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *lock(&state.reissue_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let known_session = session_cookie(&headers)
        .is_some_and(|session| lock(&state.sessions).contains_key(&session));

    if state.deny_reissue.load(Ordering::SeqCst) || !known_session {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Session expired" })),
        )
            .into_response();
    }

    // Rotation: every earlier token stops working
    lock(&state.valid_tokens).clear();
    let token = state.issue_token();
    Json(json!({ "accessToken": token })).into_response()
}

async fn products(State(state): Shared, headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);
    lock(&state.bearers_seen).push(bearer.clone());
    lock(&state.authorization_headers).push(
        headers
            .get_all(header::AUTHORIZATION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect(),
    );

    let accepted = !state.reject_all_bearers.load(Ordering::SeqCst)
        && bearer.is_some_and(|token| lock(&state.valid_tokens).contains(&token));

    if accepted {
        Json(Value::Array(lock(&state.products).clone())).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token expired" })),
        )
            .into_response()
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
