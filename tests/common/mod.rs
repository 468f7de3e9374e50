#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    io::Cursor,
    path::Path as FsPath,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc;

use bingen::{
    config::AppConfig,
    events::GenerationEvent,
    providers::{GeneratedItem, ImageProvider, ProviderError},
    Controller,
};

pub const ENRICHED: &str = "A playful cat drawn in vibrant anime style";

#[derive(Clone, Default)]
pub struct FakeState {
    pub generate_calls: Arc<AtomicUsize>,
    pub poll_calls: Arc<AtomicUsize>,
    pub create_bodies: Arc<Mutex<Vec<String>>>,
    /// `rt` mode of every create call, in order.
    pub create_modes: Arc<Mutex<Vec<String>>>,
}

/// Local stand-in for Ollama, an image host, and the Bing create flow.
pub struct FakeServer {
    pub base: String,
    pub state: FakeState,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state = FakeState::default();
        let app = Router::new()
            .route("/api/tags", get(tags))
            .route("/garbled/api/tags", get(garbled_tags))
            .route("/api/generate", post(generate))
            .route("/images/create", get(landing).post(create))
            .route("/images/create/async/results/{id}", get(results))
            .route("/img/{name}", get(image))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base: format!("http://{addr}"), state }
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/img/{name}", self.base)
    }

    pub fn config(&self, out_dir: &FsPath) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.output_dir = out_dir.to_path_buf();
        cfg.ollama.host = self.base.clone();
        cfg.ollama.generate_timeout_secs = 1;
        cfg.fetch_timeout_secs = 2;
        cfg.bing.base_url = self.base.clone();
        cfg.bing.poll_interval_ms = 10;
        cfg.bing.poll_timeout_secs = 5;
        cfg
    }
}

async fn tags() -> Json<Value> {
    Json(json!({
        "models": [
            {"name": "llama3:latest", "size": 4661224676u64},
            {"name": "broken"},
            {"name": "slow"},
            {"name": "empty"}
        ]
    }))
}

/// Something that answers 200 on the Ollama port but is not Ollama.
async fn garbled_tags() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], "<html>It works!</html>").into_response()
}

async fn generate(State(st): State<FakeState>, Json(body): Json<Value>) -> Response {
    st.generate_calls.fetch_add(1, Ordering::SeqCst);
    assert_eq!(body["stream"], json!(false));
    match body["model"].as_str().unwrap_or_default() {
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"response": "too late"})).into_response()
        }
        "empty" => Json(json!({"response": "   \n"})).into_response(),
        _ => Json(json!({"response": format!("  {ENRICHED}\n")})).into_response(),
    }
}

/// Behaves by prompt: `blocked` gets the content-policy page, `stubborn`
/// never redirects, `legacy` only redirects in mode 3, `stalled` gets a
/// request id whose results never arrive. Anything else redirects at once.
async fn create(
    State(st): State<FakeState>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    st.create_bodies.lock().unwrap().push(body);
    let prompt = query.get("q").cloned().unwrap_or_default();
    let rt = query.get("rt").cloned().unwrap_or_default();
    st.create_modes.lock().unwrap().push(rt.clone());

    let redirect = |id: &str| {
        let location = format!("/images/create?q=x&rt={rt}&FORM=GENCRE&id={id}&nfy=1");
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    };
    match prompt.as_str() {
        "blocked" => (
            StatusCode::OK,
            "<html><div class=\"gil_err_mt\">This prompt has been blocked. Our system flagged this prompt.</div></html>",
        )
            .into_response(),
        "stubborn" => (StatusCode::OK, "<html>try again later</html>").into_response(),
        "legacy" if rt == "4" => (StatusCode::OK, "<html>mode unavailable</html>").into_response(),
        "stalled" => redirect("req-stalled"),
        _ => redirect("req-42"),
    }
}

async fn landing() -> &'static str {
    "<html>pending</html>"
}

async fn results(State(st): State<FakeState>, Path(id): Path<String>) -> Response {
    let n = st.poll_calls.fetch_add(1, Ordering::SeqCst);
    if id == "req-stalled" {
        return (StatusCode::OK, "{\"errorMessage\":\"Pending\"}").into_response();
    }
    assert_eq!(id, "req-42");
    // first poll: still rendering
    if n == 0 {
        return (StatusCode::OK, "").into_response();
    }
    (
        StatusCode::OK,
        r#"<div>
            <img src="https://tse1.mm.bing.net/th/id/OIG.one?w=270&h=270" />
            <img src="https://tse1.mm.bing.net/th/id/OIG.two?w=270&h=270" />
            <img src="https://tse1.mm.bing.net/th/id/OIG.one?w=540" />
            <img src="https://tse1.mm.bing.net/th/id/OIG.three" />
        </div>"#,
    )
        .into_response()
}

async fn image(Path(name): Path<String>) -> Response {
    if name.starts_with("missing") {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes(&name)).into_response()
}

/// Deterministic JPEG whose pixels depend on `seed`.
pub fn jpeg_bytes(seed: &str) -> Vec<u8> {
    let tint = seed.bytes().fold(0u8, |a, b| a.wrapping_add(b));
    let img = image::RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8 * 3, y as u8 * 5, tint]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)
        .unwrap();
    out
}

enum Outcome {
    Items(Vec<GeneratedItem>),
    Error(String),
    Panic,
}

/// Provider that replays scripted outcomes and counts calls.
#[derive(Default)]
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Outcome>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, u8)>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_urls(&self, urls: &[String]) {
        let items = urls.iter().cloned().map(GeneratedItem::Url).collect();
        self.outcomes.lock().unwrap().push_back(Outcome::Items(items));
    }

    pub fn push_error(&self, msg: &str) {
        self.outcomes.lock().unwrap().push_back(Outcome::Error(msg.to_string()));
    }

    pub fn push_panic(&self) {
        self.outcomes.lock().unwrap().push_back(Outcome::Panic);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str, count: u8) -> Result<Vec<GeneratedItem>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((prompt.to_string(), count));
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Items(items)) => Ok(items),
            Some(Outcome::Error(msg)) => Err(ProviderError::Fatal(msg)),
            Some(Outcome::Panic) => panic!("scripted provider panic"),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Feeds worker events to the controller until the generation ends.
pub async fn finish_generation(c: &mut Controller, rx: &mut mpsc::UnboundedReceiver<GenerationEvent>) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("worker did not report back")
            .expect("event channel closed");
        let done = event.is_terminal();
        c.handle_event(event).await;
        if done {
            return;
        }
    }
}
