use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use backoffice_auth::{GateBinding, Presentation, RouteTable};
use backoffice_client::{
    AuthBackend, AuthError, ClientConfig, Credentials, FileTokenStore, Gate, GuardVerdict,
    HttpAuthBackend, LoginOutcome, MemoryTokenStore, Navigator, RouteGuard, SessionContext,
    SessionEvent, TokenStore,
};

const PASSWORD: &str = "s3cret";
const TWO_FACTOR_EMAIL: &str = "otp@example.com";
const TWO_FACTOR_CODE: &str = "424242";
const USER_ID: &str = "0190a0a0-0000-7000-8000-000000000001";

/// In-process stand-in for the back-office API.
#[derive(Default)]
struct Backend {
    tokens: Mutex<HashSet<String>>,
    permissions: Mutex<Vec<String>>,
    issued: AtomicUsize,
    profile_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    fail_logout: AtomicBool,
}

impl Backend {
    fn user(&self, email: &str) -> Value {
        json!({
            "id": USER_ID,
            "display_name": "Amina Diallo",
            "email": email,
            "user_type": "staff",
            "roles": ["manager"],
            "permissions": self.permissions.lock().unwrap().clone(),
        })
    }

    fn issue(&self) -> String {
        let token = format!("tok-{}", self.issued.fetch_add(1, Ordering::SeqCst));
        self.tokens.lock().unwrap().insert(token.clone());
        token
    }

    fn revoke_all(&self) {
        self.tokens.lock().unwrap().clear();
    }

    fn grant(&self, permissions: &[&str]) {
        *self.permissions.lock().unwrap() = permissions.iter().map(|p| p.to_string()).collect();
    }

    fn bearer(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .to_string();
        self.tokens.lock().unwrap().contains(&token).then_some(token)
    }
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid credentials" })),
        )
            .into_response();
    }
    if email == TWO_FACTOR_EMAIL {
        return Json(json!({ "two_factor_required": true, "email": email })).into_response();
    }
    Json(json!({ "token": backend.issue(), "user": backend.user(&email) })).into_response()
}

async fn verify(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    if body["email"] != TWO_FACTOR_EMAIL || body["code"] != TWO_FACTOR_CODE {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "invalid code" })),
        )
            .into_response();
    }
    Json(json!({ "token": backend.issue(), "user": backend.user(TWO_FACTOR_EMAIL) }))
        .into_response()
}

async fn profile(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.profile_calls.fetch_add(1, Ordering::SeqCst);
    // Slow enough for concurrent callers to overlap.
    tokio::time::sleep(Duration::from_millis(20)).await;
    match backend.bearer(&headers) {
        Some(_) => Json(backend.user("amina@example.com")).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn refresh(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let Some(old) = backend.bearer(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    backend.tokens.lock().unwrap().remove(&old);
    Json(json!({ "token": backend.issue() })).into_response()
}

async fn logout(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    if backend.fail_logout.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if let Some(token) = backend.bearer(&headers) {
        backend.tokens.lock().unwrap().remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

struct TestServer {
    api_url: String,
    backend: Arc<Backend>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let backend = Arc::new(Backend::default());
        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/verify-2fa", post(verify))
            .route("/api/profile", get(profile))
            .route("/api/refresh-token", post(refresh))
            .route("/api/logout", post(logout))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let api_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            api_url,
            backend,
            handle,
        }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::default().with_api_url(&self.api_url)
    }

    fn http(&self) -> Arc<HttpAuthBackend> {
        Arc::new(HttpAuthBackend::new(&self.config()).unwrap())
    }

    fn session(&self, store: Arc<dyn TokenStore>) -> SessionContext {
        SessionContext::bootstrap(self.http(), store, Duration::from_secs(300))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn credentials(email: &str) -> Credentials {
    Credentials::new(email, PASSWORD)
}

#[tokio::test]
async fn http_backend_maps_statuses() {
    let srv = TestServer::spawn().await;
    let http = srv.http();

    let bad = http.login(&Credentials::new("amina@example.com", "wrong")).await;
    assert_eq!(bad, Err(AuthError::InvalidCredentials));

    let challenge = http.login(&credentials(TWO_FACTOR_EMAIL)).await.unwrap();
    assert_eq!(
        challenge,
        LoginOutcome::TwoFactorRequired {
            email: TWO_FACTOR_EMAIL.to_string()
        }
    );

    assert_eq!(http.fetch_profile("nope").await, Err(AuthError::Unauthorized));
    assert_eq!(http.refresh_token("nope").await, Err(AuthError::Unauthorized));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let config = ClientConfig::default().with_api_url("http://127.0.0.1:1/api");
    let http = HttpAuthBackend::new(&config).unwrap();

    let err = http.login(&credentials("amina@example.com")).await.unwrap_err();
    assert!(matches!(err, AuthError::NetworkError(_)), "{err:?}");
}

#[tokio::test]
async fn login_grants_routes_matching_permissions() {
    let srv = TestServer::spawn().await;
    srv.backend.grant(&["can_view_job_offer"]);
    let ctx = srv.session(Arc::new(MemoryTokenStore::new()));
    let guard = RouteGuard::new(ctx.clone(), Arc::new(RouteTable::dashboard()));

    ctx.login(&credentials("amina@example.com")).await.unwrap();

    assert!(ctx.check_auth());
    assert!(ctx.has_role("manager"));
    assert_eq!(guard.evaluate("/job-offers").await, GuardVerdict::Allowed);
    assert_eq!(guard.evaluate("/job-offers/42").await, GuardVerdict::Allowed);
    assert_eq!(
        guard.evaluate("/job-offers/create").await,
        GuardVerdict::RedirectForbidden {
            required: "can_create_job_offer".to_string()
        }
    );
}

#[tokio::test]
async fn two_factor_login_completes_with_code() {
    let srv = TestServer::spawn().await;
    let ctx = srv.session(Arc::new(MemoryTokenStore::new()));

    let err = ctx.login(&credentials(TWO_FACTOR_EMAIL)).await.unwrap_err();
    assert_eq!(
        err,
        AuthError::TwoFactorRequired {
            email: TWO_FACTOR_EMAIL.to_string()
        }
    );
    assert!(!ctx.check_auth());
    assert_eq!(ctx.snapshot().pending_verification(), Some(TWO_FACTOR_EMAIL));

    assert_eq!(ctx.verify_two_factor("000000").await, Err(AuthError::InvalidCredentials));
    assert!(!ctx.check_auth());

    ctx.verify_two_factor(TWO_FACTOR_CODE).await.unwrap();
    assert!(ctx.check_auth());
    assert_eq!(ctx.snapshot().pending_verification(), None);
}

#[tokio::test]
async fn session_survives_restart_through_file_store() {
    let srv = TestServer::spawn().await;
    srv.backend.grant(&["can_view_payment"]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = srv.session(Arc::new(FileTokenStore::new(&path)));
    first.login(&credentials("amina@example.com")).await.unwrap();
    drop(first);

    let second = srv.session(Arc::new(FileTokenStore::new(&path)));
    assert!(second.check_auth());
    assert!(second.has_permission("can_view_payment"));

    // Backend grants changed while we were away; a reload picks them up.
    srv.backend.grant(&["can_view_payment", "can_refund_payment"]);
    second.load_profile().await.unwrap();
    assert!(second.has_permission("can_refund_payment"));
}

#[tokio::test]
async fn revoked_token_expires_session_during_navigation() {
    let srv = TestServer::spawn().await;
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = srv.session(store.clone());
    ctx.login(&credentials("amina@example.com")).await.unwrap();
    let mut events = ctx.events();

    srv.backend.revoke_all();
    let err = ctx.load_profile().await.unwrap_err();
    assert_eq!(err, AuthError::Unauthorized);

    assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    assert_eq!(ctx.token(), None);
    assert!(store.snapshot().is_none());

    let guard = RouteGuard::new(ctx, Arc::new(RouteTable::dashboard()));
    assert_eq!(
        guard.evaluate("/payments").await,
        GuardVerdict::RedirectLogin {
            redirect: "/payments".to_string()
        }
    );
}

#[tokio::test]
async fn stored_token_reload_is_coalesced_across_navigations() {
    let srv = TestServer::spawn().await;
    let token = srv.backend.issue();
    let store = Arc::new(MemoryTokenStore::new());
    store
        .save(&backoffice_client::PersistedSession { token, user: None })
        .unwrap();
    let ctx = srv.session(store);
    let guard = RouteGuard::new(ctx, Arc::new(RouteTable::dashboard()));

    let (a, b, c) = tokio::join!(
        guard.evaluate("/dashboard"),
        guard.evaluate("/profile"),
        guard.evaluate("/")
    );

    assert_eq!((a, b, c), (GuardVerdict::Allowed, GuardVerdict::Allowed, GuardVerdict::Allowed));
    assert_eq!(srv.backend.profile_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_local_state_even_when_server_fails() {
    let srv = TestServer::spawn().await;
    srv.backend.fail_logout.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = srv.session(store.clone());
    ctx.login(&credentials("amina@example.com")).await.unwrap();

    ctx.logout().await;

    assert_eq!(srv.backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!ctx.check_auth());
    assert_eq!(ctx.token(), None);
    assert!(store.snapshot().is_none());
}

#[tokio::test]
async fn refreshed_token_keeps_working() {
    let srv = TestServer::spawn().await;
    let ctx = srv.session(Arc::new(MemoryTokenStore::new()));
    ctx.login(&credentials("amina@example.com")).await.unwrap();
    let before = ctx.token().unwrap();

    ctx.refresh_token().await.unwrap();

    let after = ctx.token().unwrap();
    assert_ne!(before, after);
    assert!(ctx.check_auth());
    ctx.load_profile().await.unwrap();
    assert!(ctx.check_auth());
}

#[tokio::test]
async fn gate_and_navigator_follow_the_session() {
    let srv = TestServer::spawn().await;
    srv.backend.grant(&["can_view_user", "can_create_user"]);
    let ctx = srv.session(Arc::new(MemoryTokenStore::new()));
    let navigator = Navigator::new(
        RouteGuard::new(ctx.clone(), Arc::new(RouteTable::dashboard())),
        "/login",
    );
    let mut gate = Gate::mount(&ctx, GateBinding::permission("can_create_user"));

    assert_eq!(
        navigator.navigate("/users/create").await.as_deref(),
        Some("/login?redirect=%2Fusers%2Fcreate")
    );
    assert_eq!(gate.presentation(), Presentation::Hidden);

    ctx.login(&credentials("amina@example.com")).await.unwrap();
    assert_eq!(gate.changed().await, Some(Presentation::Visible));
    assert_eq!(navigator.navigate("/users/create").await.as_deref(), Some("/users/create"));
    assert_eq!(
        navigator.navigate("/roles").await.as_deref(),
        Some("/forbidden?required=can_view_role")
    );
}
