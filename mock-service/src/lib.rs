use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock};
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

const MAX_NAME_LEN: usize = 100;
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$";

/// How the mock answers.
#[derive(Clone, Debug)]
pub struct Behavior {
    /// Status of `GET /`.
    pub health: u16,
    /// Answer every signup with this status instead of creating the user.
    pub fail_with: Option<u16>,
    /// Echo a different email than the one sent.
    pub wrong_echo: bool,
    pub delay: Duration,
    /// Extra uniformly distributed delay on top of `delay`.
    pub jitter: Duration,
    /// Signups beyond this rate are answered with a 500.
    pub max_rps: Option<NonZeroU32>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            health: 200,
            fail_with: None,
            wrong_echo: false,
            delay: Duration::from_millis(5),
            jitter: Duration::from_millis(5),
            max_rps: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignupRequest {
    email: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Serialize)]
struct User {
    id: u64,
    email: String,
    first_name: String,
    last_name: String,
}

struct MockState {
    behavior: Behavior,
    limiter: Option<DefaultDirectRateLimiter>,
    users: Mutex<HashMap<String, u64>>,
    next_id: AtomicU64,
    requests: AtomicU64,
}

/// A mock signup service listening on an ephemeral local port.
#[derive(Clone)]
pub struct MockService {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockService {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `POST /signup` requests received.
    pub fn requests(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }

    /// Number of users created.
    pub fn users(&self) -> usize {
        self.state.users.lock().map(|u| u.len()).unwrap_or_default()
    }
}

pub async fn spawn(behavior: Behavior) -> anyhow::Result<MockService> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::new(behavior));
    let app = router(state.clone());

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });

    debug!("Mock service listening on {addr}");
    Ok(MockService { addr, state })
}

/// The signup routes, for mounting next to extra routes such as `/metrics`.
pub fn app(behavior: Behavior) -> Router {
    router(Arc::new(MockState::new(behavior)))
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/signup", post(signup))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

impl MockState {
    fn new(behavior: Behavior) -> Self {
        Self {
            limiter: behavior.max_rps.map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            behavior,
            users: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            requests: AtomicU64::new(0),
        }
    }
}

#[debug_handler]
async fn welcome(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(state.behavior.health).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"message": "welcome"})))
}

#[debug_handler]
async fn signup(
    State(state): State<Arc<MockState>>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::Relaxed);
    let (status, body) = create_user(&state, body).await;
    counter!("mock_service_signups", "status" => status.as_u16().to_string()).increment(1);
    (status, Json(body))
}

async fn create_user(
    state: &MockState,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> (StatusCode, Value) {
    let behavior = &state.behavior;

    let Ok(Json(req)) = body else {
        return error(StatusCode::BAD_REQUEST, "invalid request body");
    };
    let req = SignupRequest {
        email: req.email.trim().to_string(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
    };
    if let Err(msg) = validate(&req) {
        return error(StatusCode::BAD_REQUEST, msg);
    }

    let jitter = rand::thread_rng().gen_range(Duration::ZERO..=behavior.jitter);
    tokio::time::sleep(behavior.delay + jitter).await;

    if let Some(code) = behavior.fail_with {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error(status, "failed to create user");
    }

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            debug!("Signup rejected by rate limit");
            return error(StatusCode::INTERNAL_SERVER_ERROR, "failed to create user");
        }
    }

    let id = {
        let Ok(mut users) = state.users.lock() else {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "failed to create user");
        };
        if users.contains_key(&req.email) {
            return error(StatusCode::CONFLICT, "email already exists");
        }
        let id = state.next_id.fetch_add(1, Ordering::Relaxed);
        users.insert(req.email.clone(), id);
        id
    };

    let user = User {
        id,
        email: if behavior.wrong_echo {
            format!("not-{}", req.email)
        } else {
            req.email
        },
        first_name: req.first_name,
        last_name: req.last_name,
    };

    (
        StatusCode::CREATED,
        json!({"message": "user created successfully", "user": user}),
    )
}

fn validate(req: &SignupRequest) -> Result<(), &'static str> {
    if req.email.is_empty() {
        return Err("email is required");
    }
    if !valid_email(&req.email) {
        return Err("invalid email format");
    }
    if req.first_name.is_empty() {
        return Err("first name is required");
    }
    if req.first_name.len() > MAX_NAME_LEN {
        return Err("first name must be less than 100 characters");
    }
    if req.last_name.is_empty() {
        return Err("last name is required");
    }
    if req.last_name.len() > MAX_NAME_LEN {
        return Err("last name must be less than 100 characters");
    }
    Ok(())
}

fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).expect("EMAIL_PATTERN is a valid regex"))
        .is_match(email)
}

fn error(status: StatusCode, msg: &str) -> (StatusCode, Value) {
    (status, json!({"error": msg}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(email: &str) -> Value {
        json!({"email": email, "first_name": "John", "last_name": "Smith"})
    }

    #[tokio::test]
    async fn creates_and_rejects_duplicates() {
        let service = spawn(Behavior::default()).await.unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/signup", service.base_url());

        let res = client.post(&url).json(&body("a@b.co")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 201);
        let json: Value = res.json().await.unwrap();
        assert_eq!(json["user"]["email"], "a@b.co");
        assert_eq!(json["user"]["id"], 1);

        let res = client.post(&url).json(&body("a@b.co")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 409);
        assert_eq!(service.users(), 1);
        assert_eq!(service.requests(), 2);
    }

    #[tokio::test]
    async fn rejects_invalid_bodies() {
        let service = spawn(Behavior::default()).await.unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/signup", service.base_url());

        let res = client.post(&url).json(&body("not-an-email")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 400);

        let res = client
            .post(&url)
            .header("content-type", "application/json")
            .body("{")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 400);
        assert_eq!(service.users(), 0);
    }

    #[tokio::test]
    async fn health_status_is_configurable() {
        let service = spawn(Behavior {
            health: 503,
            ..Default::default()
        })
        .await
        .unwrap();
        let res = reqwest::get(service.base_url()).await.unwrap();
        assert_eq!(res.status().as_u16(), 503);
    }

    #[test]
    fn email_validation() {
        assert!(valid_email("user1700000000000-3-7-123@loadtest.com"));
        assert!(valid_email("first.last+tag@sub.example.org"));
        assert!(!valid_email("user@localhost"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("user@example.c0m"));
        assert!(!valid_email("first last@example.com"));
        assert!(!valid_email("user@example.com\n"));
        assert!(!valid_email("user@@example.com"));
    }

    #[tokio::test]
    async fn rate_limited_signups_fail() {
        let service = spawn(Behavior {
            max_rps: NonZeroU32::new(1),
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            ..Default::default()
        })
        .await
        .unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/signup", service.base_url());

        let res = client.post(&url).json(&body("a@b.co")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 201);
        let res = client.post(&url).json(&body("c@d.co")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 500);
        assert_eq!(service.users(), 1);
    }
}
