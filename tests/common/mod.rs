//! In-process stand-in for the Spotify accounts and Web API endpoints.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use lofisync::{
    config::{Config, OAuthConfig, RetryConfig, StoreBackend},
    management::{MemoryCredentialStore, TokenManager},
    spotify::{
        auth::{BrowserOpener, OAuthClient},
        client::{ApiClient, RetryPolicy},
    },
    utils::NameTemplate,
};
use serde::Deserialize;
use serde_json::{Value, json};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const SOURCE: &str = "source";
pub const DESTINATION: &str = "destination";

/// Response served instead of the normal one for the next resource request.
#[derive(Debug, Clone, Copy)]
pub struct Scripted {
    pub status: u16,
    pub retry_after: Option<u64>,
}

#[derive(Default)]
pub struct Provider {
    base: Mutex<String>,
    pub page_size: AtomicUsize,
    pub token_delay_ms: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub refresh_tokens_seen: Mutex<Vec<String>>,
    pub reject_refresh: AtomicBool,
    pub rotate_refresh: AtomicBool,
    pub expired: Mutex<HashSet<String>>,
    pub playlists: Mutex<HashMap<String, Vec<(String, u64)>>>,
    pub scripted: Mutex<VecDeque<Scripted>>,
    pub page_requests: AtomicUsize,
    /// Page offset to the number of 502s it still answers with.
    pub fail_offsets: Mutex<HashMap<usize, usize>>,
    pub insert_requests: Mutex<Vec<Vec<String>>>,
    pub fail_inserts: Mutex<HashSet<usize>>,
    pub renames: Mutex<Vec<String>>,
}

impl Provider {
    pub fn base(&self) -> String {
        self.base.lock().unwrap().clone()
    }

    pub fn set_playlist(&self, id: &str, tracks: &[(&str, u64)]) {
        self.playlists.lock().unwrap().insert(
            id.to_string(),
            tracks.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
        );
    }

    pub fn playlist_ids(&self, id: &str) -> Vec<String> {
        self.playlists
            .lock()
            .unwrap()
            .get(id)
            .map(|tracks| tracks.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default()
    }

    pub fn script(&self, status: u16, retry_after: Option<u64>) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Scripted { status, retry_after });
    }

    pub fn insert_sizes(&self) -> Vec<usize> {
        self.insert_requests
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub fn renames(&self) -> Vec<String> {
        self.renames.lock().unwrap().clone()
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    fn next_scripted(&self) -> Option<Response> {
        let scripted = self.scripted.lock().unwrap().pop_front()?;
        let status = StatusCode::from_u16(scripted.status).unwrap();
        let mut response = (status, Json(json!({ "error": { "status": scripted.status } })))
            .into_response();
        if let Some(secs) = scripted.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, secs.to_string().parse().unwrap());
        }
        Some(response)
    }

    fn check_bearer(&self, headers: &HeaderMap) -> Option<Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        match token {
            None => Some(StatusCode::UNAUTHORIZED.into_response()),
            Some(t) if self.expired.lock().unwrap().contains(&t) => {
                Some(StatusCode::UNAUTHORIZED.into_response())
            }
            Some(_) => None,
        }
    }

    fn duration_of(&self, id: &str) -> u64 {
        self.playlists
            .lock()
            .unwrap()
            .values()
            .flat_map(|tracks| tracks.iter())
            .find(|(t, _)| t == id)
            .map(|(_, d)| *d)
            .unwrap_or(0)
    }
}

#[derive(Deserialize)]
struct PageQuery {
    offset: Option<usize>,
}

async fn token(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "))
    {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let delay = provider.token_delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let n = provider.token_calls.fetch_add(1, Ordering::SeqCst) + 1;

    match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {
            if let Some(refresh) = form.get("refresh_token") {
                provider
                    .refresh_tokens_seen
                    .lock()
                    .unwrap()
                    .push(refresh.clone());
            }
            if provider.reject_refresh.load(Ordering::SeqCst) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_grant" })),
                )
                    .into_response();
            }
            let mut body = json!({
                "access_token": format!("access-{n}"),
                "token_type": "Bearer",
                "expires_in": 3600,
            });
            if provider.rotate_refresh.load(Ordering::SeqCst) {
                body["refresh_token"] = json!(format!("rotated-{n}"));
            }
            Json(body).into_response()
        }
        Some("authorization_code") => {
            if form.get("code").map(String::as_str) == Some("bad-code") {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_grant" })),
                )
                    .into_response();
            }
            Json(json!({
                "access_token": format!("access-{n}"),
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-from-code",
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Token endpoint that answers 200 with a body no client can decode.
async fn garbled_token(State(provider): State<Arc<Provider>>) -> Response {
    provider.token_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, "<html>maintenance</html>").into_response()
}

async fn list_tracks(
    State(provider): State<Arc<Provider>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    provider.page_requests.fetch_add(1, Ordering::SeqCst);
    if let Some(rejected) = provider.check_bearer(&headers) {
        return rejected;
    }
    if let Some(scripted) = provider.next_scripted() {
        return scripted;
    }

    let offset = query.offset.unwrap_or(0);
    if let Some(remaining) = provider
        .fail_offsets
        .lock()
        .unwrap()
        .get_mut(&offset)
        .filter(|n| **n > 0)
    {
        *remaining -= 1;
        return StatusCode::BAD_GATEWAY.into_response();
    }

    let Some(tracks) = provider.playlists.lock().unwrap().get(&id).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let page_size = provider.page_size.load(Ordering::SeqCst).max(1);
    let items: Vec<Value> = tracks
        .iter()
        .skip(offset)
        .take(page_size)
        .map(|(t, d)| json!({ "track": { "id": t, "duration_ms": d } }))
        .collect();
    let next = (offset + page_size < tracks.len()).then(|| {
        format!(
            "{}/playlists/{}/tracks?offset={}",
            provider.base(),
            id,
            offset + page_size
        )
    });

    Json(json!({ "items": items, "next": next })).into_response()
}

async fn add_tracks(
    State(provider): State<Arc<Provider>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejected) = provider.check_bearer(&headers) {
        return rejected;
    }
    if let Some(scripted) = provider.next_scripted() {
        return scripted;
    }

    let ids: Vec<String> = body["uris"]
        .as_array()
        .map(|uris| {
            uris.iter()
                .filter_map(Value::as_str)
                .map(|u| u.trim_start_matches("spotify:track:").to_string())
                .collect()
        })
        .unwrap_or_default();

    let index = {
        let mut requests = provider.insert_requests.lock().unwrap();
        requests.push(ids.clone());
        requests.len()
    };
    if provider.fail_inserts.lock().unwrap().contains(&index) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "status": 400, "message": "Invalid track uri" } })),
        )
            .into_response();
    }

    let appended: Vec<(String, u64)> = ids
        .iter()
        .map(|t| (t.clone(), provider.duration_of(t)))
        .collect();
    provider
        .playlists
        .lock()
        .unwrap()
        .entry(id)
        .or_default()
        .extend(appended);

    (
        StatusCode::CREATED,
        Json(json!({ "snapshot_id": format!("snapshot-{index}") })),
    )
        .into_response()
}

async fn rename(
    State(provider): State<Arc<Provider>>,
    Path(_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejected) = provider.check_bearer(&headers) {
        return rejected;
    }
    if let Some(scripted) = provider.next_scripted() {
        return scripted;
    }

    let name = body["name"].as_str().unwrap_or_default().to_string();
    provider.renames.lock().unwrap().push(name);
    StatusCode::OK.into_response()
}

/// Starts the fake provider and returns it with its root URL.
pub async fn start_provider() -> (Arc<Provider>, String) {
    let provider = Arc::new(Provider::default());
    provider.page_size.store(100, Ordering::SeqCst);

    let app = Router::new()
        .route("/api/token", post(token))
        .route("/api/garbled-token", post(garbled_token))
        .route("/v1/playlists/{id}/tracks", get(list_tracks).post(add_tracks))
        .route("/v1/playlists/{id}", put(rename))
        .with_state(Arc::clone(&provider));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root = format!("http://{}", listener.local_addr().unwrap());
    *provider.base.lock().unwrap() = format!("{root}/v1");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (provider, root)
}

#[derive(Default)]
pub struct RecordingBrowser {
    pub opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        delay: Duration::from_millis(10),
        max_rate_limit_wait: Duration::from_secs(120),
    }
}

pub fn config(root: &str) -> Config {
    Config {
        server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        oauth: OAuthConfig {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            scope: "playlist-read-private playlist-modify-public".to_string(),
            auth_url: format!("{root}/authorize"),
            token_url: format!("{root}/api/token"),
            show_dialog: false,
        },
        api_url: format!("{root}/v1"),
        source_playlist: SOURCE.to_string(),
        destination_playlist: DESTINATION.to_string(),
        name_template: NameTemplate::parse("Lofi Mix ({hours} hours)").unwrap(),
        interval: Duration::from_secs(3600),
        retry: retry_config(),
        chunk_size: 100,
        auth_timeout: Duration::from_secs(5),
        store: StoreBackend::File,
    }
}

/// Everything a test needs, wired against one fake provider.
pub struct Harness {
    pub provider: Arc<Provider>,
    pub config: Config,
    pub store: Arc<MemoryCredentialStore>,
    pub browser: Arc<RecordingBrowser>,
    pub tokens: TokenManager,
    pub api: ApiClient,
}

pub async fn harness(refresh_token: Option<&str>) -> Harness {
    let (provider, root) = start_provider().await;
    harness_with(provider, config(&root), refresh_token)
}

pub fn harness_with(
    provider: Arc<Provider>,
    config: Config,
    refresh_token: Option<&str>,
) -> Harness {
    let store = Arc::new(match refresh_token {
        Some(token) => MemoryCredentialStore::with_refresh_token(token),
        None => MemoryCredentialStore::new(),
    });
    let browser = Arc::new(RecordingBrowser::default());
    let http = reqwest::Client::new();

    let tokens = TokenManager::new(
        OAuthClient::new(http.clone(), config.oauth.clone()),
        store.clone(),
        browser.clone(),
    );
    let api = ApiClient::new(
        http,
        config.api_url.clone(),
        tokens.clone(),
        RetryPolicy::from(&config.retry),
    );

    Harness {
        provider,
        config,
        store,
        browser,
        tokens,
        api,
    }
}

/// Value of the `state` query parameter in an authorization URL.
pub fn state_param(url: &str) -> String {
    reqwest::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
