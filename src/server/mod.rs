//! HTTP API over the assistant: answers, conversation history, document
//! ingestion, graph views and snapshot management.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::chat::Assistant;
use crate::db::Db;
use crate::error::{AssistError, Result};
use crate::graph::{self, ExportFormat};
use crate::ingest::forget_all;
use crate::knowledge::{KnowledgeSnapshot, SnapshotStore};

const DEFAULT_USER: &str = "anonymous";
const DEFAULT_SESSION: &str = "default";
const DEFAULT_DEPTH: usize = 2;
const DEFAULT_TOP_K: usize = 10;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// Shared handler state
#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    ledger: Option<Db>,
}

impl AppState {
    async fn persist(&self) -> Result<()> {
        if let Some(snapshots) = &self.snapshots {
            snapshots.save(&self.assistant.store().dump()).await?;
        }
        Ok(())
    }
}

pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    /// Server without persistence; knowledge lives only in memory.
    pub fn new(assistant: Arc<Assistant>, allowed_origins: Vec<String>) -> Self {
        Self {
            state: AppState {
                assistant,
                snapshots: None,
                ledger: None,
            },
            allowed_origins,
        }
    }

    /// Server that persists every knowledge change through `ctx`.
    pub fn from_context(ctx: &AppContext) -> Result<Self> {
        let assistant = Arc::new(ctx.assistant()?);
        Ok(Self {
            state: AppState {
                assistant,
                snapshots: Some(Arc::clone(&ctx.snapshots)),
                ledger: Some(ctx.db.clone()),
            },
            allowed_origins: ctx.config.http_server.allowed_origins.clone(),
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting MOSDAC assistant API on http://{}", addr);

        if !check_port_available(port).await {
            return Err(AssistError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AssistError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            AssistError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        // Any origin unless a list is configured.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/api/answer", post(handle_answer))
            .route("/api/conversations/:user_id", get(handle_sessions))
            .route("/api/conversations/:user_id/:session_id", get(handle_history))
            .route("/api/documents", post(handle_document))
            .route("/api/graph", get(handle_graph_export))
            .route("/api/graph/metrics", get(handle_graph_metrics))
            .route("/api/graph/related/:entity", get(handle_related))
            .route(
                "/api/knowledge",
                get(handle_dump).put(handle_load).delete(handle_clear),
            )
            .route("/api/stats", get(handle_stats))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }
}

fn error_response(err: AssistError) -> Response {
    let status = match &err {
        AssistError::InvalidInput(_) | AssistError::Export(_) => StatusCode::BAD_REQUEST,
        AssistError::Snapshot(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "mosdac-assist",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    query: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    /// Include intent, retrieval result and metrics in the response.
    #[serde(default)]
    detailed: bool,
}

async fn handle_answer(State(state): State<AppState>, Json(req): Json<AnswerRequest>) -> Response {
    if req.query.trim().is_empty() {
        return error_response(AssistError::InvalidInput("query must not be empty".to_string()));
    }
    let user_id = req.user_id.as_deref().unwrap_or(DEFAULT_USER);
    let session_id = req.session_id.as_deref().unwrap_or(DEFAULT_SESSION);

    let answer = state
        .assistant
        .answer_detailed(&req.query, user_id, session_id)
        .await;
    if req.detailed {
        Json(answer).into_response()
    } else {
        Json(answer.message).into_response()
    }
}

async fn handle_sessions(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    Json(json!({
        "user_id": user_id,
        "sessions": state.assistant.conversations().sessions(&user_id),
    }))
    .into_response()
}

async fn handle_history(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Response {
    Json(state.assistant.conversations().history(&user_id, &session_id)).into_response()
}

#[derive(Debug, Deserialize)]
struct DocumentRequest {
    text: String,
    source_id: String,
}

async fn handle_document(State(state): State<AppState>, Json(req): Json<DocumentRequest>) -> Response {
    if req.source_id.trim().is_empty() {
        return error_response(AssistError::InvalidInput("source_id must not be empty".to_string()));
    }
    let assistant = Arc::clone(&state.assistant);
    let report = match tokio::task::spawn_blocking(move || {
        assistant.ingest_document(&req.text, &req.source_id)
    })
    .await
    {
        Ok(report) => report,
        Err(e) => {
            return error_response(AssistError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("extraction task failed: {}", e),
            )))
        }
    };
    if let Err(e) = state.persist().await {
        return error_response(e);
    }
    Json(report).into_response()
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

async fn handle_graph_export(State(state): State<AppState>, Query(q): Query<ExportQuery>) -> Response {
    let format: ExportFormat = match q.format.as_deref().unwrap_or("json").parse() {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };
    let graph = state.assistant.store().graph();
    match graph::export(&graph, format) {
        Ok(body) => ([(header::CONTENT_TYPE, format.content_type())], body).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    top: Option<usize>,
}

async fn handle_graph_metrics(State(state): State<AppState>, Query(q): Query<MetricsQuery>) -> Response {
    let graph = state.assistant.store().graph();
    Json(graph::metrics(&graph, q.top.unwrap_or(DEFAULT_TOP_K))).into_response()
}

#[derive(Debug, Deserialize)]
struct RelatedQuery {
    depth: Option<usize>,
    /// Comma-separated relation types to follow.
    relation: Option<String>,
}

async fn handle_related(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(q): Query<RelatedQuery>,
) -> Response {
    let set = state.assistant.store().snapshot();
    let start_id = match set
        .entity_by_id(&entity)
        .or_else(|| set.entity_by_name(&entity))
    {
        Some(e) => e.id.clone(),
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("unknown entity: {}", entity) })),
            )
                .into_response()
        }
    };
    drop(set);

    let relations: Option<Vec<String>> = q.relation.map(|r| {
        r.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });
    let graph = state.assistant.store().graph();
    let related = graph::related_entities(
        &graph,
        &start_id,
        relations.as_deref(),
        q.depth.unwrap_or(DEFAULT_DEPTH),
    );
    Json(json!({ "entity_id": start_id, "related": related })).into_response()
}

async fn handle_dump(State(state): State<AppState>) -> Response {
    Json(state.assistant.store().dump()).into_response()
}

/// Replace the knowledge set; the previous set is restored if it cannot be saved.
async fn handle_load(State(state): State<AppState>, body: String) -> Response {
    let result = async {
        let snapshot = KnowledgeSnapshot::from_json(&body)?;
        let store = state.assistant.store();
        let previous = store.dump();
        store.load(snapshot)?;
        if let Err(e) = state.persist().await {
            log::warn!("Snapshot save failed, restoring previous knowledge: {}", e);
            store.load(previous)?;
            return Err(e);
        }
        Ok(())
    }
    .await;
    match result {
        Ok(()) => Json(state.assistant.store().dump().metadata).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_clear(State(state): State<AppState>) -> Response {
    state.assistant.store().clear();
    let result = async {
        let forgotten = match &state.ledger {
            Some(db) => forget_all(db).await?,
            None => 0,
        };
        state.persist().await?;
        Ok::<usize, AssistError>(forgotten)
    }
    .await;
    match result {
        Ok(forgotten) => Json(json!({
            "cleared": true,
            "version": state.assistant.store().version(),
            "forgotten_files": forgotten,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_stats(State(state): State<AppState>) -> Response {
    let set = state.assistant.store().snapshot();
    let (hits, misses) = state
        .assistant
        .cache()
        .map(|c| c.stats())
        .unwrap_or((0, 0));
    Json(json!({
        "version": set.version(),
        "last_updated": set.last_updated(),
        "entities": set.entities().len(),
        "relationships": set.relationships().len(),
        "faqs": set.faqs().len(),
        "conversations": state.assistant.conversations().conversation_count(),
        "cache": {
            "entries": state.assistant.cache().map(|c| c.len()).unwrap_or(0),
            "hits": hits,
            "misses": misses,
        },
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let assistant = Assistant::new(Arc::new(KnowledgeStore::new()));
        HttpServer::new(Arc::new(assistant), vec![])
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn ingest(router: &Router, text: &str, source_id: &str) {
        let (status, _) = send(
            router.clone(),
            "POST",
            "/api/documents",
            Some(json!({ "text": text, "source_id": source_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(server().router(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["status"], "ok");
    }

    #[tokio::test]
    async fn test_document_then_answer_and_history() {
        let router = server().router();
        ingest(&router, "INSAT-3D carries an Imager for weather monitoring.", "insat3d.md").await;

        let (status, body) = send(
            router.clone(),
            "POST",
            "/api/answer",
            Some(json!({ "query": "What sensors does INSAT-3D carry?", "user_id": "u1", "session_id": "s1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let message: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(message["role"], "assistant");
        assert!(message["content"].as_str().unwrap().contains("Imager"));

        let (_, body) = send(router.clone(), "GET", "/api/conversations/u1/s1", None).await;
        let history: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "user");

        let (_, body) = send(router, "GET", "/api/conversations/u1", None).await;
        let sessions: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(sessions["sessions"], json!(["s1"]));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (status, _) = send(
            server().router(),
            "POST",
            "/api/answer",
            Some(json!({ "query": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_graph_export_formats() {
        let router = server().router();
        ingest(&router, "INSAT-3D carries an Imager for weather monitoring.", "insat3d.md").await;

        let (status, body) = send(router.clone(), "GET", "/api/graph?format=csv", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("INSAT-3D"));

        let (status, body) = send(router.clone(), "GET", "/api/graph", None).await;
        assert_eq!(status, StatusCode::OK);
        let graph: Value = serde_json::from_str(&body).unwrap();
        let nodes = graph["nodes"].as_array().unwrap();
        assert!(nodes.iter().any(|n| n["label"] == "INSAT-3D"));
        assert_eq!(graph["edges"].as_array().unwrap().len(), 1);

        let (status, _) = send(router, "GET", "/api/graph?format=pdf", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_related_and_metrics() {
        let router = server().router();
        ingest(&router, "INSAT-3D carries an Imager for weather monitoring.", "insat3d.md").await;

        let (status, body) = send(router.clone(), "GET", "/api/graph/related/INSAT-3D", None).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["related"].as_array().unwrap().len(), 1);

        let (status, _) = send(router.clone(), "GET", "/api/graph/related/SARAL", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(router, "GET", "/api/graph/metrics?top=1", None).await;
        let m: Value = serde_json::from_str(&body).unwrap();
        assert!(m["node_count"].as_u64().unwrap() >= 2);
        assert_eq!(m["edge_count"], 1);
        assert_eq!(m["central_nodes"].as_array().unwrap().len(), 1);
    }

    struct UnwritableSnapshots;

    #[async_trait::async_trait]
    impl SnapshotStore for UnwritableSnapshots {
        async fn save(&self, _snapshot: &KnowledgeSnapshot) -> Result<()> {
            Err(AssistError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only snapshot store",
            )))
        }

        async fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_knowledge() {
        let assistant = Assistant::new(Arc::new(KnowledgeStore::new()));
        assistant.ingest_document("INSAT-3D carries an Imager for weather monitoring.", "insat3d.md");
        let before = assistant.store().snapshot().entities().len();
        assert!(before >= 2);
        let server = HttpServer {
            state: AppState {
                assistant: Arc::new(assistant),
                snapshots: Some(Arc::new(UnwritableSnapshots)),
                ledger: None,
            },
            allowed_origins: vec![],
        };
        let store = Arc::clone(server.state.assistant.store());

        let empty: Value = serde_json::from_str(&KnowledgeStore::new().dump().to_json().unwrap()).unwrap();
        let (status, _) = send(server.router(), "PUT", "/api/knowledge", Some(empty)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let set = store.snapshot();
        assert_eq!(set.entities().len(), before);
        assert_eq!(set.relationships().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_dump_load_and_clear() {
        let source = server().router();
        ingest(&source, "INSAT-3D carries an Imager for weather monitoring.", "insat3d.md").await;
        let (_, dump) = send(source.clone(), "GET", "/api/knowledge", None).await;

        let (_, source_stats) = send(source, "GET", "/api/stats", None).await;
        let source_stats: Value = serde_json::from_str(&source_stats).unwrap();

        let target = server().router();
        let snapshot: Value = serde_json::from_str(&dump).unwrap();
        let (status, _) = send(target.clone(), "PUT", "/api/knowledge", Some(snapshot)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, stats) = send(target.clone(), "GET", "/api/stats", None).await;
        let stats: Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(stats["entities"], source_stats["entities"]);
        assert_eq!(stats["relationships"], 1);

        let (status, _) = send(target.clone(), "PUT", "/api/knowledge", Some(json!({ "entities": 3 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(target.clone(), "DELETE", "/api/knowledge", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, stats) = send(target, "GET", "/api/stats", None).await;
        let stats: Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(stats["entities"], 0);
    }
}
