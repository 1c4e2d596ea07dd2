#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
fn global_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[cfg(test)]
pub(crate) fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    global_env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) struct ScopedEnvVar {
    key: &'static str,
    original: Option<String>,
}

#[cfg(test)]
impl ScopedEnvVar {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }

    pub(crate) fn unset(key: &'static str) -> Self {
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self { key, original }
    }
}

#[cfg(test)]
impl Drop for ScopedEnvVar {
    fn drop(&mut self) {
        if let Some(value) = self.original.as_deref() {
            std::env::set_var(self.key, value);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

#[cfg(test)]
pub(crate) fn credential(account_id: &str, token: &str) -> crate::models::Credential {
    crate::models::Credential {
        account_id: account_id.to_string(),
        token: token.to_string(),
        proxy: None,
        user_agent: "test-agent".to_string(),
    }
}

/// Renewer that always hands back the same token, or fails when it has none.
#[cfg(test)]
pub(crate) struct StaticRenewer {
    token: Option<String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticRenewer {
    pub(crate) fn new(token: Option<&str>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            token: token.map(str::to_string),
            calls: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl crate::modules::credentials::CredentialRenewer for StaticRenewer {
    fn renew<'a>(
        &'a self,
        _record: &'a crate::models::AccountRecord,
    ) -> futures::future::BoxFuture<'a, Result<String, String>> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let result = self
            .token
            .clone()
            .ok_or_else(|| "login flow failed".to_string());
        Box::pin(async move { result })
    }
}

#[cfg(test)]
pub(crate) use mock_server::MockGameServer;

/// In-process stand-in for the game API. Accounts are keyed by token; a token
/// the server does not know answers 401.
#[cfg(test)]
mod mock_server {
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post, put},
        Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct MockAccount {
        charges: u32,
        balance: f64,
        claimed: bool,
        subscribed: HashSet<u64>,
        boosts: HashSet<String>,
        tasks: HashSet<String>,
    }

    #[derive(Default)]
    struct MockState {
        accounts: HashMap<String, MockAccount>,
        pixels: HashMap<u32, String>,
        missing: HashSet<u32>,
        expire_on_paint: HashSet<String>,
        paints: Vec<(String, u32, String)>,
        seen_headers: Vec<(String, String)>,
        failures_left: usize,
        paint_failures_left: usize,
        latency: Duration,
    }

    #[derive(Clone, Default)]
    struct Shared {
        state: Arc<Mutex<MockState>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        requests: Arc<AtomicUsize>,
    }

    struct InFlight(Arc<AtomicUsize>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Shared {
        /// Records the request, applies injected faults and resolves the
        /// token. `Err` is the response to send back.
        async fn enter(&self, headers: &HeaderMap) -> Result<(String, InFlight), Response> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            let guard = InFlight(self.in_flight.clone());

            let auth = header_value(headers, "authorization");
            let ua = header_value(headers, "user-agent");
            let latency = {
                let mut state = self.state.lock();
                state.seen_headers.push((auth.clone(), ua));
                state.latency
            };
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let mut state = self.state.lock();
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(StatusCode::GATEWAY_TIMEOUT.into_response());
            }
            let token = auth.strip_prefix("initData ").unwrap_or_default().to_string();
            if !state.accounts.contains_key(&token) {
                return Err(StatusCode::UNAUTHORIZED.into_response());
            }
            Ok((token, guard))
        }
    }

    fn header_value(headers: &HeaderMap, name: &str) -> String {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn users_me(State(shared): State<Shared>, headers: HeaderMap) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let state = shared.state.lock();
        let balance = state.accounts.get(&token).map(|a| a.balance).unwrap_or_default();
        Json(json!({
            "firstName": format!("Painter {}", token),
            "balance": balance,
            "league": "bronze",
            "squad": {"name": "Canvas"}
        }))
        .into_response()
    }

    async fn mining_status(State(shared): State<Shared>, headers: HeaderMap) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let state = shared.state.lock();
        let account = state.accounts.get(&token);
        Json(json!({
            "charges": account.map(|a| a.charges).unwrap_or_default(),
            "maxCharges": 6,
            "userBalance": account.map(|a| a.balance).unwrap_or_default(),
        }))
        .into_response()
    }

    async fn repaint(
        State(shared): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let pixel_id = body.get("pixelId").and_then(Value::as_u64).unwrap_or_default() as u32;
        let color = body
            .get("newColor")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut state = shared.state.lock();
        if state.paint_failures_left > 0 {
            state.paint_failures_left -= 1;
            return StatusCode::GATEWAY_TIMEOUT.into_response();
        }
        if state.expire_on_paint.remove(&token) {
            state.accounts.remove(&token);
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if state.missing.contains(&pixel_id) {
            return StatusCode::NOT_FOUND.into_response();
        }
        let Some(account) = state.accounts.get_mut(&token) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        if account.charges == 0 {
            return (StatusCode::BAD_REQUEST, "no charges left").into_response();
        }
        account.charges -= 1;
        account.balance += 1.0;
        let balance = account.balance;
        state.pixels.insert(pixel_id, color.clone());
        state.paints.push((token, pixel_id, color));
        Json(json!({ "balance": balance })).into_response()
    }

    async fn pixel_details(
        State(shared): State<Shared>,
        headers: HeaderMap,
        Path(pixel_id): Path<u32>,
    ) -> Response {
        let (_token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let state = shared.state.lock();
        if state.missing.contains(&pixel_id) {
            return StatusCode::NOT_FOUND.into_response();
        }
        let color = state
            .pixels
            .get(&pixel_id)
            .cloned()
            .unwrap_or_else(|| "#000000".to_string());
        Json(json!({ "pixel": { "id": pixel_id, "color": color } })).into_response()
    }

    async fn subscribe(
        State(shared): State<Shared>,
        headers: HeaderMap,
        Path(template_id): Path<u64>,
    ) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let mut state = shared.state.lock();
        let Some(account) = state.accounts.get_mut(&token) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        if !account.subscribed.insert(template_id) {
            return StatusCode::PAYMENT_REQUIRED.into_response();
        }
        StatusCode::NO_CONTENT.into_response()
    }

    async fn claim(State(shared): State<Shared>, headers: HeaderMap) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let mut state = shared.state.lock();
        let Some(account) = state.accounts.get_mut(&token) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        if account.claimed {
            return (StatusCode::BAD_REQUEST, "nothing to claim").into_response();
        }
        account.claimed = true;
        Json(json!({ "claimed": 12.5 })).into_response()
    }

    async fn boost(
        State(shared): State<Shared>,
        headers: HeaderMap,
        Path(key): Path<String>,
    ) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let mut state = shared.state.lock();
        let Some(account) = state.accounts.get_mut(&token) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        if !account.boosts.insert(key.clone()) {
            return (StatusCode::BAD_REQUEST, "insufficient balance").into_response();
        }
        Json(json!({ key: true })).into_response()
    }

    async fn task(
        State(shared): State<Shared>,
        headers: HeaderMap,
        Path(key): Path<String>,
    ) -> Response {
        let (token, _guard) = match shared.enter(&headers).await {
            Ok(ok) => ok,
            Err(resp) => return resp,
        };
        let mut state = shared.state.lock();
        let Some(account) = state.accounts.get_mut(&token) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        if !account.tasks.insert(key.clone()) {
            return (StatusCode::BAD_REQUEST, "already claimed").into_response();
        }
        Json(json!({ key: true })).into_response()
    }

    pub(crate) struct MockGameServer {
        base_url: String,
        shared: Shared,
        handle: tokio::task::JoinHandle<()>,
    }

    impl MockGameServer {
        pub(crate) async fn start() -> Self {
            let shared = Shared::default();
            let app = Router::new()
                .route("/users/me", get(users_me))
                .route("/mining/status", get(mining_status))
                .route("/mining/claim", get(claim))
                .route("/mining/boost/check/:key", get(boost))
                .route("/mining/task/check/:key", get(task))
                .route("/repaint/start", post(repaint))
                .route("/image/get/:id", get(pixel_details))
                .route("/image/template/subscribe/:id", put(subscribe))
                .with_state(shared.clone());
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind mock game listener");
            let addr = listener.local_addr().expect("mock game local addr");
            let handle = tokio::spawn(async move {
                axum::serve(listener, app).await.expect("serve mock game");
            });
            Self {
                base_url: format!("http://{}", addr),
                shared,
                handle,
            }
        }

        pub(crate) fn base_url(&self) -> String {
            self.base_url.clone()
        }

        /// Registers `token` (if new) and sets its charges.
        pub(crate) fn set_charges(&self, token: &str, charges: u32) {
            let mut state = self.shared.state.lock();
            state.accounts.entry(token.to_string()).or_default().charges = charges;
        }

        pub(crate) fn charges_of(&self, token: &str) -> Option<u32> {
            self.shared.state.lock().accounts.get(token).map(|a| a.charges)
        }

        /// Forgets `token`; further calls with it answer 401.
        pub(crate) fn revoke(&self, token: &str) {
            self.shared.state.lock().accounts.remove(token);
        }

        /// The first repaint made with `token` revokes it and answers 401.
        pub(crate) fn expire_on_first_paint(&self, token: &str) {
            self.shared
                .state
                .lock()
                .expire_on_paint
                .insert(token.to_string());
        }

        pub(crate) fn set_pixel(&self, cell_id: u32, color: &str) {
            self.shared
                .state
                .lock()
                .pixels
                .insert(cell_id, color.to_string());
        }

        pub(crate) fn mark_missing(&self, cell_id: u32) {
            self.shared.state.lock().missing.insert(cell_id);
        }

        /// The next `count` requests answer 504 before any other handling.
        /// The next `count` requests of any kind answer 504.
        pub(crate) fn fail_next(&self, count: usize) {
            self.shared.state.lock().failures_left = count;
        }

        /// The next `count` repaint calls answer 504 without spending a charge.
        pub(crate) fn fail_next_paints(&self, count: usize) {
            self.shared.state.lock().paint_failures_left = count;
        }

        pub(crate) fn set_latency(&self, latency: Duration) {
            self.shared.state.lock().latency = latency;
        }

        pub(crate) fn paints(&self) -> Vec<(String, u32, String)> {
            self.shared.state.lock().paints.clone()
        }

        pub(crate) fn seen_headers(&self) -> Vec<(String, String)> {
            self.shared.state.lock().seen_headers.clone()
        }

        pub(crate) fn request_count(&self) -> usize {
            self.shared.requests.load(Ordering::SeqCst)
        }

        pub(crate) fn max_in_flight(&self) -> usize {
            self.shared.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl Drop for MockGameServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }
}
