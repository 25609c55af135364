mod cache;
mod config;
mod metrics;
mod retry;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use cache::AnswerCache;
use config::AppConfig;
use graph::GraphStore;
use index::Importer;
use llm::ChatClient;
use metrics::Metrics;
use query::{GraphRagPipeline, GraphSchema, Orchestrator, Target};
use retry::RetryPolicy;
use vector::{EmbeddingClient, VectorStore};

struct AppState {
    // One in-flight query at a time per orchestrator instance
    orchestrator: Mutex<Orchestrator>,
    pipeline: Option<GraphRagPipeline>,
    importer: Importer,
    graph: GraphStore,
    cache: AnswerCache,
    metrics: Arc<Metrics>,
    qdrant_url: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    /// "both" (default), "graph", or a vector collection name.
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum QueryResponse {
    Answer { answer: String },
    Error { error: String, message: String },
}

#[derive(Deserialize)]
struct PathRequest {
    path: String,
}

#[derive(Serialize)]
struct ImportResponse {
    papers_imported: usize,
    nodes_written: usize,
    relationships_written: usize,
    relationships_skipped: usize,
}

#[derive(Serialize)]
struct IngestResponse {
    documents_ingested: usize,
    chunks_stored: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    qdrant: String,
    neo4j: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    info!(bind = %config.bind_addr, "Starting server");

    let connect_policy = RetryPolicy::new(5, 1000, 10_000);
    let graph = connect_policy
        .retry("neo4j connect", || {
            GraphStore::connect(
                &config.neo4j_uri,
                &config.neo4j_username,
                &config.neo4j_password,
            )
        })
        .await?;
    graph.init_schema().await?;

    let embedding_client =
        EmbeddingClient::new(config.ollama_url.clone(), config.embedding_model.clone());
    let vector = VectorStore::new(config.qdrant_url.clone(), embedding_client);
    let llm = ChatClient::new(
        config.ollama_url.clone(),
        config.chat_model.clone(),
        config.temperature,
    );

    let pipeline = match &config.graph_schema_path {
        Some(path) => match GraphSchema::from_file(path) {
            Ok(schema) => Some(GraphRagPipeline::new(graph.clone(), llm.clone(), schema)),
            Err(e) => {
                error!(error = %e, "Graph schema not loaded; /pipeline disabled");
                None
            }
        },
        None => None,
    };

    let state = Arc::new(AppState {
        orchestrator: Mutex::new(Orchestrator::new(vector.clone(), graph.clone(), llm)),
        pipeline,
        importer: Importer::new(graph.clone(), vector),
        graph,
        cache: AnswerCache::new(10_000),
        metrics: Metrics::new(),
        qdrant_url: config.qdrant_url.clone(),
    });

    let app = Router::new()
        .route("/query", post(post_query))
        .route("/pipeline", post(post_pipeline))
        .route("/import", post(import_ontologies))
        .route("/ingest", post(ingest_documents))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Entry point for user queries. Always responds 200; failures come
/// back as an error payload.
async fn post_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    if request.query.trim().is_empty() {
        return Json(QueryResponse::Answer {
            answer: "Please ask a valid question".to_string(),
        });
    }

    let target = Target::from_mode(request.mode.as_deref());
    // Answers differ per target, so the mode is part of the cache key
    let cache_key = format!("{:?}|{}", target, request.query);

    if let Some(answer) = state.cache.get(&cache_key) {
        state.metrics.record_cache_hit();
        state.metrics.record_request(true);
        return Json(QueryResponse::Answer { answer });
    }

    let started = Instant::now();
    let mut orchestrator = state.orchestrator.lock().await;
    let result = orchestrator.query(&request.query, target).await;
    drop(orchestrator);
    state.metrics.record_query(started.elapsed());

    match result {
        Ok(answer) => {
            state.cache.set(&cache_key, answer.clone());
            state.metrics.record_request(true);
            Json(QueryResponse::Answer { answer })
        }
        Err(e) => {
            error!(error = %e, "Query failed");
            state.metrics.record_request(false);
            Json(QueryResponse::Error {
                error: e.to_string(),
                message: "Sorry, an error occurred".to_string(),
            })
        }
    }
}

/// Graph-native retrieval through the staged pipeline.
async fn post_pipeline(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    let Some(pipeline) = &state.pipeline else {
        return Json(QueryResponse::Error {
            error: "pipeline disabled".to_string(),
            message: "No graph schema configured".to_string(),
        });
    };

    if request.query.trim().is_empty() {
        return Json(QueryResponse::Answer {
            answer: "Please ask a valid question".to_string(),
        });
    }

    let started = Instant::now();
    let result = pipeline.query(&request.query).await;
    state.metrics.record_query(started.elapsed());

    match result {
        Ok(result) => {
            state.metrics.record_request(true);
            Json(QueryResponse::Answer {
                answer: result.answer,
            })
        }
        Err(e) => {
            error!(error = %e, "Pipeline query failed");
            state.metrics.record_request(false);
            Json(QueryResponse::Error {
                error: e.to_string(),
                message: "Sorry, an error occurred".to_string(),
            })
        }
    }
}

/// Import extracted ontology JSON, one file or a directory of them.
/// Failed files are logged and skipped.
async fn import_ontologies(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> Json<ImportResponse> {
    let mut response = ImportResponse {
        papers_imported: 0,
        nodes_written: 0,
        relationships_written: 0,
        relationships_skipped: 0,
    };

    for path in collect_files(&request.path, "json").await {
        match state.importer.import_ontology_file(&path).await {
            Ok(stats) => {
                response.papers_imported += 1;
                response.nodes_written += stats.nodes_written;
                response.relationships_written += stats.relationships_written;
                response.relationships_skipped += stats.relationships_skipped;
            }
            Err(e) => {
                error!(file = ?path, error = %e, "Ontology import failed");
            }
        }
    }

    state.metrics.record_import(response.papers_imported);
    Json(response)
}

/// Chunk paper full texts into the Vector collection.
async fn ingest_documents(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> Json<IngestResponse> {
    let mut response = IngestResponse {
        documents_ingested: 0,
        chunks_stored: 0,
    };

    let mut files = collect_files(&request.path, "md").await;
    files.extend(collect_files(&request.path, "txt").await);

    for path in files {
        let doc_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let stored = state.importer.import_document(&doc_id, &text).await;
                if stored > 0 {
                    response.documents_ingested += 1;
                    response.chunks_stored += stored;
                }
            }
            Err(e) => {
                error!(file = ?path, error = %e, "Failed to read document");
            }
        }
    }

    state.metrics.record_ingest(response.documents_ingested);
    Json(response)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let qdrant = match reqwest::get(&state.qdrant_url).await {
        Ok(resp) if resp.status().is_success() => "ok".to_string(),
        Ok(resp) => format!("error: status {}", resp.status()),
        Err(e) => format!("error: {}", e),
    };

    let neo4j = match state.graph.inner().run(neo4rs::query("RETURN 1")).await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse { qdrant, neo4j })
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let graph_stats = match state.graph.stats().await {
        Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
        Err(e) => serde_json::json!({"error": e.to_string()}),
    };

    Json(serde_json::json!({
        "graph": graph_stats,
        "metrics": state.metrics.snapshot(),
        "cached_answers": state.cache.len(),
    }))
}

/// A single file with the extension, or every matching file in a
/// directory.
async fn collect_files(path: &str, extension: &str) -> Vec<PathBuf> {
    let path = PathBuf::from(path);
    if path.is_file() {
        return if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            vec![path]
        } else {
            Vec::new()
        };
    }

    let mut files = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&path).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let entry_path = entry.path();
            if entry_path.is_file()
                && entry_path.extension().and_then(|e| e.to_str()) == Some(extension)
            {
                files.push(entry_path);
            }
        }
    }
    files
}
