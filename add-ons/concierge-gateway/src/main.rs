//! Axum-based gateway: HTTP entry point for the command pipeline. Config-driven via CoreConfig.

use axum::{
    extract::{Json, Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post, put},
    Router,
};
use axum::http::{Method, StatusCode};
use concierge_core::{
    Answer, CommandContext, CommandPipeline, CoreConfig, OperationRegistry, PendingCommand,
    PipelineOutcome, PipelineResponse, SnapshotContext,
};
use concierge_skills::Runtime;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Captures the "message" field from a tracing event.
struct MessageCollector<'a>(&'a mut String);

impl Visit for MessageCollector<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.0 = value.to_string();
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

/// Sends each tracing event as a line to a broadcast channel for SSE log streaming.
#[derive(Clone)]
struct LogBroadcastLayer {
    tx: broadcast::Sender<String>,
}

impl LogBroadcastLayer {
    fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogBroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageCollector(&mut message));
        let line = format!(
            "{} [{}] {}",
            event.metadata().level(),
            event.metadata().target(),
            message
        );
        let _ = self.tx.send(line);
    }
}

/// Pre-flight check: config loads, the catalog resolves, and the port is free.
async fn run_verify() -> Result<(), String> {
    print!("Loading config... ");
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;
    println!("OK ({}, llm_mode={})", config.app_name, config.llm_mode);

    print!("Loading operation catalog... ");
    let port = config.port;
    let runtime = Runtime::start(config).await;
    let catalog = runtime.registry.catalog();
    println!("OK ({} operations, origin {:?})", catalog.len(), catalog.origin());
    println!(
        "Handler chain: {}",
        runtime.pipeline.chain().handler_names().join(", ")
    );
    drop(runtime);

    print!("Checking port {}... ", port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", port, e));
        }
    }

    println!("\n✅ SUCCESS: All systems GO. Ready to start gateway.");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[concierge-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify().await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("❌ PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    let (log_tx, _) = broadcast::channel(1000);
    let log_layer = LogBroadcastLayer::new(log_tx.clone());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(log_layer)
        .init();

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Config load failed: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = Runtime::start(config).await;
    let state = AppState::from_runtime(runtime, log_tx);
    tokio::spawn(session_sweeper(state.clone(), state.config.session_ttl()));

    let port = state.config.port;
    let app_name = state.config.app_name.clone();
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("{} listening on {}", app_name, addr);
    if let Err(e) = axum::serve(listener, build_app(state)).await {
        tracing::error!("Gateway stopped: {}", e);
    }
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &axum::http::HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            let port = s
                .split(':')
                .last()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(0);
            (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .expose_headers(tower_http::cors::Any);

    Router::new()
        .route("/ping", get(ping))
        .route("/api/v1/health", get(health))
        .route("/api/v1/logs", get(logs_stream))
        .route("/api/v1/context", put(replace_context))
        .route("/v1/status", get(status))
        .route("/v1/operations", get(operations))
        .route("/v1/catalog/reload", post(reload_catalog))
        .route("/command", post(command))
        .route("/command/answer", post(answer))
        .route("/command/:session_id", delete(cancel))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) registry: Arc<OperationRegistry>,
    pub(crate) pipeline: Arc<CommandPipeline>,
    pub(crate) context: Arc<SnapshotContext>,
    /// Complex commands waiting on `/command/answer`, keyed by session id.
    pub(crate) sessions: Arc<DashMap<String, ParkedCommand>>,
    pub(crate) log_tx: broadcast::Sender<String>,
}

/// A suspended command and the moment it last asked a question.
pub(crate) struct ParkedCommand {
    pending: PendingCommand,
    parked_at: Instant,
}

impl AppState {
    fn from_runtime(runtime: Runtime, log_tx: broadcast::Sender<String>) -> Self {
        Self {
            config: Arc::new(runtime.config),
            registry: runtime.registry,
            pipeline: runtime.pipeline,
            context: runtime.context,
            sessions: Arc::new(DashMap::new()),
            log_tx,
        }
    }

    /// Renders a pipeline response. A suspended command is parked under `session_id`
    /// (a fresh id when none is given) so the next answer can pick it up.
    fn respond(&self, response: PipelineResponse, session_id: Option<String>) -> serde_json::Value {
        let mut body = json!({
            "status": response.status(),
            "intent": &response.intent,
            "message": response.message(),
            "succeeded": response.succeeded(),
        });
        match response.outcome {
            PipelineOutcome::Handled(reply) => {
                body["handler"] = json!(reply.handler);
            }
            PipelineOutcome::Report(report) => {
                body["results"] = json!(report.outcomes());
            }
            PipelineOutcome::NeedsInput { question, pending } => {
                let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                tracing::info!(
                    target: "concierge::gateway",
                    session_id = %session_id,
                    rounds = pending.rounds(),
                    "Command waiting for parameters"
                );
                self.sessions.insert(
                    session_id.clone(),
                    ParkedCommand {
                        pending,
                        parked_at: Instant::now(),
                    },
                );
                body["question"] = json!(question);
                body["session_id"] = json!(session_id);
            }
            PipelineOutcome::Fallback(_) | PipelineOutcome::Failed(_) => {}
        }
        body
    }

    /// Cancels every session left unanswered for at least `ttl`. Returns how many were reclaimed.
    async fn expire_sessions(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now.duration_since(entry.parked_at) >= ttl)
            .map(|entry| entry.key().clone())
            .collect();
        let mut reclaimed = 0;
        for session_id in stale {
            // Re-checked: the session may have been answered and parked again since the scan.
            let Some((_, parked)) = self
                .sessions
                .remove_if(&session_id, |_, parked| now.duration_since(parked.parked_at) >= ttl)
            else {
                continue;
            };
            let response = self.pipeline.cancel(parked.pending).await;
            tracing::info!(
                target: "concierge::gateway",
                session_id = %session_id,
                status = response.status(),
                "Session expired, command cancelled"
            );
            reclaimed += 1;
        }
        reclaimed
    }
}

/// Periodically cancels sessions whose requester went away.
async fn session_sweeper(state: AppState, ttl: Duration) {
    let tick = (ttl / 4).max(Duration::from_secs(1));
    tracing::info!(
        target: "concierge::gateway",
        ttl_secs = ttl.as_secs(),
        "Session sweeper started"
    );
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        state.expire_sessions(ttl).await;
    }
}

fn unknown_session(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({ "error": format!("Unknown session: {}", session_id) })),
    )
        .into_response()
}

async fn ping() -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "message": "pong" }))
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "status": "ok" }))
}

/// GET /v1/status – app identity, catalog and handler chain.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let catalog = state.registry.catalog();
    axum::Json(json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "llm_mode": state.config.llm_mode,
        "catalog": {
            "origin": catalog.origin(),
            "operations": catalog.len(),
        },
        "handlers": state.pipeline.chain().handler_names(),
        "pending_sessions": state.sessions.len(),
    }))
}

/// GET /v1/operations – active catalog, sorted by name.
async fn operations(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let catalog = state.registry.catalog();
    axum::Json(json!({
        "origin": catalog.origin(),
        "operations": catalog.definitions(),
    }))
}

/// POST /v1/catalog/reload – re-reads the catalog sources and swaps the active catalog.
async fn reload_catalog(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let catalog = state.registry.reload().await;
    axum::Json(json!({
        "status": "reloaded",
        "origin": catalog.origin(),
        "operations": catalog.len(),
    }))
}

/// PUT /api/v1/context – replaces the ambient context used when a command carries none.
async fn replace_context(
    State(state): State<AppState>,
    Json(context): Json<CommandContext>,
) -> axum::Json<serde_json::Value> {
    let keys = context.values.len();
    state.context.replace(context);
    axum::Json(json!({ "status": "ok", "keys": keys }))
}

#[derive(serde::Deserialize)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    context: Option<CommandContext>,
}

#[derive(serde::Deserialize)]
struct AnswerRequest {
    session_id: String,
    answer: String,
}

/// POST /command – runs one command through the pipeline.
async fn command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> axum::Json<serde_json::Value> {
    tracing::info!(target: "concierge::gateway", command = %req.command, "Command received");
    let response = state.pipeline.process(&req.command, req.context).await;
    axum::Json(state.respond(response, None))
}

/// POST /command/answer – feeds one answer to a suspended command.
async fn answer(State(state): State<AppState>, Json(req): Json<AnswerRequest>) -> Response {
    let Some((session_id, parked)) = state.sessions.remove(&req.session_id) else {
        return unknown_session(&req.session_id);
    };
    let response = state
        .pipeline
        .resume(parked.pending, Answer::Text(req.answer))
        .await;
    axum::Json(state.respond(response, Some(session_id))).into_response()
}

/// DELETE /command/:session_id – abandons a suspended command.
async fn cancel(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let Some((_, parked)) = state.sessions.remove(&session_id) else {
        return unknown_session(&session_id);
    };
    tracing::info!(target: "concierge::gateway", session_id = %session_id, "Command cancelled");
    let response = state.pipeline.cancel(parked.pending).await;
    axum::Json(state.respond(response, None)).into_response()
}

/// GET /api/v1/logs – Server-Sent Events stream of gateway logs (tracing output).
async fn logs_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static> {
    use async_stream::stream;
    let mut rx = state.log_tx.subscribe();
    let stream = stream! {
        loop {
            match rx.recv().await {
                Ok(line) => yield Ok(Event::default().data(line)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Ok(Event::default().data(format!("... {} log lines dropped", n)));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
