use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use dotenv::dotenv;
use tower_http::{
    auth::AsyncRequireAuthorizationLayer, cors::CorsLayer, trace::TraceLayer,
};
use tracing::info;

use docqa_auth::{jwt::JwtService, middleware::BearerAuthorizer};
use docqa_llm::{make_providers, ChatProviderConfig, EmbedProviderConfig};
use docqa_rag::{
    ChunkerConfig, HttpParserClient, IngestPipeline, MemoryVectorIndex, ParserConfig,
    QdrantIndexConfig, QdrantVectorIndex, RagResponder, ResponderConfig, TextChunker, VectorIndex,
};
use serde::Deserialize;

mod auth_routes;
mod db;
mod doc_routes;
mod files;

use auth_routes::AuthServices;
use db::Store;
use files::LocalFileStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub files: LocalFileStore,
    pub index: Arc<dyn VectorIndex>,
    pub ingest: Arc<IngestPipeline>,
    pub responder: Arc<RagResponder>,
}

#[derive(Debug, Deserialize)]
struct AppConfig {
    server: ServerCfg,
    database: DatabaseCfg,
    storage: StorageCfg,
    auth: AuthCfg,
    parser: ParserCfg,
    chat_provider: ChatCfgYaml,
    embedding_provider: EmbedCfgYaml,
    vector_store: VectorStoreCfg,
    ingest: Option<IngestCfg>,
    retrieval: Option<RetrievalCfg>,
}

#[derive(Debug, Deserialize)]
struct ServerCfg {
    host: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct DatabaseCfg {
    url_env: String,
}

#[derive(Debug, Deserialize)]
struct StorageCfg {
    root: String,
}

#[derive(Debug, Deserialize)]
struct AuthCfg {
    jwt_secret_env: String,
}

#[derive(Debug, Deserialize)]
struct ParserCfg {
    base_url: Option<String>,
    api_key_env: String,
    poll_interval_secs: Option<u64>,
    max_polls: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCfgYaml {
    kind: String,
    base_url: Option<String>,
    api_url: Option<String>,
    api_key_env: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedCfgYaml {
    kind: String,
    base_url: Option<String>,
    api_url: Option<String>,
    api_key_env: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VectorStoreCfg {
    kind: String,
    url: Option<String>,
    collection: Option<String>,
    vector_dim: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IngestCfg {
    chunk_size: Option<usize>,
    overlap: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RetrievalCfg {
    top_k: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let cfg: AppConfig = load_config()?;

    let store = Store::connect(&read_env(&cfg.database.url_env)?).await?;
    store.migrate().await?;

    let files = LocalFileStore::new(&cfg.storage.root);
    let jwt_service = Arc::new(JwtService::new(&read_env(&cfg.auth.jwt_secret_env)?));

    // Build providers
    let chat_cfg = match cfg.chat_provider.kind.as_str() {
        "gemini" => ChatProviderConfig::Gemini {
            api_url: cfg.chat_provider.api_url,
            api_key: read_env(
                &cfg.chat_provider
                    .api_key_env
                    .unwrap_or_else(|| "GEMINI_API_KEY".into()),
            )?,
            model: cfg.chat_provider.model,
        },
        "openai_compat" => ChatProviderConfig::OpenAiCompat {
            base_url: cfg
                .chat_provider
                .base_url
                .unwrap_or_else(|| "https://api.openai.com".into()),
            api_key: read_env(
                &cfg.chat_provider
                    .api_key_env
                    .unwrap_or_else(|| "OPENAI_API_KEY".into()),
            )?,
            model: cfg.chat_provider.model,
        },
        other => anyhow::bail!("unsupported chat provider kind={}", other),
    };

    let embed_cfg = match cfg.embedding_provider.kind.as_str() {
        "gemini" => EmbedProviderConfig::Gemini {
            api_url: cfg.embedding_provider.api_url.clone(),
            api_key: read_env(
                &cfg.embedding_provider
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "GEMINI_API_KEY".into()),
            )?,
            model: cfg.embedding_provider.model.clone(),
        },
        "openai_compat" => EmbedProviderConfig::OpenAiCompat {
            base_url: cfg
                .embedding_provider
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".into()),
            api_key: read_env(
                &cfg.embedding_provider
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "OPENAI_API_KEY".into()),
            )?,
            model: cfg.embedding_provider.model.clone(),
        },
        other => anyhow::bail!("unsupported embedding provider kind={}", other),
    };

    let providers =
        make_providers(chat_cfg, embed_cfg).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let index: Arc<dyn VectorIndex> = match cfg.vector_store.kind.as_str() {
        "qdrant" => Arc::new(
            QdrantVectorIndex::new(QdrantIndexConfig {
                url: cfg
                    .vector_store
                    .url
                    .unwrap_or_else(|| "http://localhost:6334".into()),
                collection: cfg
                    .vector_store
                    .collection
                    .unwrap_or_else(|| "docqa_chunks".into()),
                vector_dim: cfg.vector_store.vector_dim.unwrap_or(768),
            })
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
        ),
        "memory" => Arc::new(MemoryVectorIndex::new()),
        other => anyhow::bail!("unsupported vector store kind={}", other),
    };

    let parser = Arc::new(HttpParserClient::new(ParserConfig {
        base_url: cfg
            .parser
            .base_url
            .unwrap_or_else(|| ParserConfig::default().base_url),
        api_key: read_env(&cfg.parser.api_key_env)?,
        poll_interval_secs: cfg
            .parser
            .poll_interval_secs
            .unwrap_or_else(|| ParserConfig::default().poll_interval_secs),
        max_polls: cfg
            .parser
            .max_polls
            .unwrap_or_else(|| ParserConfig::default().max_polls),
    }));

    let chunker_cfg = ChunkerConfig {
        chunk_size: cfg
            .ingest
            .as_ref()
            .and_then(|i| i.chunk_size)
            .unwrap_or(ChunkerConfig::default().chunk_size),
        overlap: cfg
            .ingest
            .as_ref()
            .and_then(|i| i.overlap)
            .unwrap_or(ChunkerConfig::default().overlap),
    };
    let chunker = TextChunker::new(chunker_cfg).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let ingest = Arc::new(IngestPipeline::new(
        parser,
        providers.embed.clone(),
        index.clone(),
        Arc::new(store.clone()),
        chunker,
    ));

    let responder = Arc::new(RagResponder::new(
        providers.embed,
        index.clone(),
        providers.chat,
        ResponderConfig {
            top_k: cfg
                .retrieval
                .as_ref()
                .and_then(|r| r.top_k)
                .unwrap_or(ResponderConfig::default().top_k),
        },
    ));

    let state = AppState {
        store: store.clone(),
        files,
        index,
        ingest,
        responder,
    };

    let auth_services = AuthServices {
        store,
        jwt_service: jwt_service.clone(),
    };

    let app = Router::new()
        .nest(
            "/auth",
            auth_routes::create_auth_routes().with_state(auth_services),
        )
        .nest(
            "/api",
            doc_routes::create_document_routes()
                .layer(AsyncRequireAuthorizationLayer::new(BearerAuthorizer::new(
                    jwt_service,
                )))
                .with_state(state),
        )
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!(%addr, "docqa-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tower_http=info"))
        .unwrap();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config() -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string("configs/default.yaml")?;
    let cfg: AppConfig = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn read_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing env {}", key))
}
