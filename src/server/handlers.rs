use super::{spawn_reindex, ApiError, AppState};
use crate::files::{FileEntry, UploadOutcome};
use crate::rag::{ChatMode, SystemInfo};
use crate::search::{FilterRequest, MetadataFilter, MetadataHit};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent means automatic routing
    #[serde(default)]
    pub use_rag: Option<bool>,
    #[serde(default)]
    pub filters: Option<FilterRequest>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub used_rag: bool,
    pub source: &'static str,
    pub mode: ChatMode,
    /// Seconds, two decimals
    pub response_time: f64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<FileEntry>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: FilterRequest,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<MetadataHit>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub rag_initialized: bool,
    pub total_files: usize,
    pub system_status: &'static str,
    pub mode: &'static str,
    pub model: String,
    pub details: SystemInfo,
}

#[derive(Debug, Deserialize)]
pub struct ReinitializeParams {
    /// Reprocess every file instead of only stale ones
    #[serde(default)]
    pub full: bool,
}

fn parse_filters(request: Option<&FilterRequest>) -> Result<Option<MetadataFilter>, ApiError> {
    match request {
        Some(req) if !req.is_empty() => Ok(Some(MetadataFilter::parse(req, Utc::now())?)),
        _ => Ok(None),
    }
}

pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult<ChatResponse> {
    let start = std::time::Instant::now();
    let filters = parse_filters(request.filters.as_ref())?;

    let reply = state.engine.query(&request.message, request.use_rag, filters).await;
    let elapsed = start.elapsed().as_secs_f64();
    log::info!("Chat answered in {:.2}s (mode {})", elapsed, reply.mode.as_str());

    Ok(Json(ChatResponse {
        reply: reply.reply,
        used_rag: reply.used_rag,
        source: reply.source,
        mode: reply.mode,
        response_time: (elapsed * 100.0).round() / 100.0,
    }))
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing filename"))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?;

        return match state.engine.upload_file(&filename, &bytes, content_type.as_deref()).await? {
            UploadOutcome::Duplicate { .. } => Ok(Json(UploadResponse {
                status: "duplicate",
                filename,
                message: "El archivo ya existe en el sistema".to_string(),
            })),
            UploadOutcome::Stored(_) => {
                spawn_reindex(state.engine.clone(), true);
                Ok(Json(UploadResponse {
                    status: "success",
                    filename,
                    message: "Archivo subido. Sistema RAG se está actualizando.".to_string(),
                }))
            }
        };
    }
    Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing multipart field 'file'"))
}

pub async fn delete_file(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Value> {
    if !state.engine.delete_file(&filename).await? {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Archivo no encontrado"));
    }
    spawn_reindex(state.engine.clone(), true);
    Ok(Json(json!({
        "message": format!("Archivo {} eliminado exitosamente. Sistema RAG se está actualizando.", filename)
    })))
}

pub async fn list_files(State(state): State<AppState>) -> ApiResult<FilesResponse> {
    let files = state.engine.list_files().await;
    Ok(Json(FilesResponse {
        total_count: files.len(),
        files,
    }))
}

pub async fn search(State(state): State<AppState>, Json(request): Json<SearchRequest>) -> ApiResult<SearchResponse> {
    let filter = MetadataFilter::parse(&request.filters, Utc::now())?;
    let results = state.engine.metadata_search(&request.query, &filter).await?;
    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

pub async fn rag_status(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({
        "rag_initialized": state.engine.is_initialized(),
        "file_count": state.engine.file_count().await,
    })))
}

pub async fn rag_filters(State(state): State<AppState>) -> ApiResult<BTreeMap<&'static str, &'static str>> {
    Ok(Json(state.engine.available_filters()))
}

pub async fn reinitialize(State(state): State<AppState>, Query(params): Query<ReinitializeParams>) -> ApiResult<Value> {
    spawn_reindex(state.engine.clone(), !params.full);
    Ok(Json(json!({ "message": "Reinicialización del sistema RAG iniciada" })))
}

pub async fn initialize_legacy(State(state): State<AppState>) -> ApiResult<Value> {
    spawn_reindex(state.engine.clone(), true);
    Ok(Json(json!({ "message": "Inicialización del sistema RAG iniciada" })))
}

pub async fn system_status(State(state): State<AppState>) -> ApiResult<SystemStatusResponse> {
    let details = state.engine.get_system_info().await?;
    let initialized = details.rag.initialized;
    Ok(Json(SystemStatusResponse {
        rag_initialized: initialized,
        total_files: state.engine.file_count().await,
        system_status: if initialized { "healthy" } else { "simple_mode" },
        mode: details.rag.mode,
        model: state.engine.chat_model().to_string(),
        details,
    }))
}

pub async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({
        "message": "🚀 Chatbot RAG Optimizado - Modo Quantizado",
        "status": "operational",
        "rag_initialized": state.engine.is_initialized(),
        "file_count": state.engine.file_count().await,
        "model": state.engine.chat_model(),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

pub async fn health() -> ApiResult<Value> {
    Ok(Json(json!({
        "status": "ok",
        "service": "ragchat",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

#[cfg(test)]
mod tests {
    use crate::config::HttpServerConfig;
    use crate::server::router;
    use crate::test_support::{build_engine, HashingEmbedder, RecordingLlm, StubLoader};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app(temp_dir: &TempDir) -> Router {
        let engine = build_engine(
            temp_dir.path(),
            Arc::new(HashingEmbedder::default()),
            Arc::new(RecordingLlm::replying("respuesta")),
            StubLoader::new(),
        )
        .await;
        router(Arc::new(engine), &HttpServerConfig::default())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(filename: &str, content: &str) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_simple_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir).await;

        let (status, body) = send(&app, post_json("/chat", serde_json::json!({"message": "hola"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "respuesta");
        assert_eq!(body["used_rag"], false);
        assert_eq!(body["source"], "simple");
        assert_eq!(body["mode"], "simple_fallback");
        assert!(body["response_time"].is_number());
    }

    #[tokio::test]
    async fn test_chat_bad_filter_is_400() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir).await;

        let request = post_json(
            "/chat",
            serde_json::json!({"message": "informe", "filters": {"file_size": "grande"}}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("file_size"));
    }

    #[tokio::test]
    async fn test_upload_duplicate_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir).await;

        let (status, body) = send(&app, multipart("notas.txt", "contenido")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["filename"], "notas.txt");

        let (_, body) = send(&app, multipart("copia.txt", "contenido")).await;
        assert_eq!(body["status"], "duplicate");

        let (status, _) = send(&app, multipart("imagen.png", "x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let list = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let (_, body) = send(&app, list).await;
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["files"][0]["filename"], "notas.txt");

        let del = |name: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/files/{}", name))
                .body(Body::empty())
                .unwrap()
        };
        let (status, _) = send(&app, del("notas.txt")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, del("notas.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Archivo no encontrado");
    }

    #[tokio::test]
    async fn test_status_endpoints() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir).await;

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, body) = send(&app, get("/rag/status")).await;
        assert_eq!(body["rag_initialized"], false);
        assert_eq!(body["file_count"], 0);

        let (_, body) = send(&app, get("/system/status")).await;
        assert_eq!(body["system_status"], "simple_mode");
        assert_eq!(body["mode"], "simple");
        assert_eq!(body["details"]["incremental_indexing"], true);

        let (_, body) = send(&app, get("/rag/filters")).await;
        assert!(body.get("top_k").is_some());

        let (_, body) = send(&app, get("/")).await;
        assert_eq!(body["status"], "operational");
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir).await;

        let request = post_json(
            "/search",
            serde_json::json!({"query": "ventas", "filters": {"date_range": "last_week"}}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let request = post_json(
            "/search",
            serde_json::json!({"query": "ventas", "filters": {"date_range": "ayer"}}),
        );
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
