use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Method,
    http::Request,
    http::header::{CONTENT_TYPE, HeaderName, HeaderValue},
    middleware,
    middleware::Next,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use dotenvy::dotenv;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use ar_common::catalog_file::{load_catalog, resolve_catalog_path};
use ar_common::embedding::{EmbedderKind, EmbeddingConfig};
use ar_common::logging::{self, LogConfig};
use ar_common::{EngineConfig, IndexStats, RecommendationService};

pub mod error;
pub mod handlers;

use error::ApiError;
use handlers::{catalog, health, info, recommend};

const SHUTDOWN_DRAIN_GRACE: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, Clone, Parser)]
#[command(name = "ar-api", about = "HTTP API for the assessment recommender")]
struct Cli {
    /// Server port
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "AR_BIND_ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Catalog JSON loaded at startup. Well-known locations are searched when unset.
    #[arg(long, env = "AR_CATALOG_PATH")]
    catalog_path: Option<PathBuf>,

    /// Comma separated list of allowed CORS origins, or `*`
    #[arg(long, env = "AR_CORS_ORIGINS", default_value = "*")]
    cors_origins: String,

    /// Largest accepted catalog upload in bytes
    #[arg(long, env = "AR_MAX_UPLOAD_BYTES", default_value_t = 8 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// top_k used when a recommendation request omits it
    #[arg(long, env = "AR_DEFAULT_TOP_K", default_value_t = 5)]
    default_top_k: usize,

    /// Embedder: hash | fastembed | none
    #[arg(long, env = "AR_EMBEDDER", default_value = "hash")]
    embedder: EmbedderKind,

    /// Dimension of hash embeddings
    #[arg(long, env = "AR_EMBEDDING_DIMENSION", default_value_t = 384)]
    embedding_dimension: usize,

    /// Rank lexically when embedding fails
    #[arg(
        long,
        env = "AR_LEXICAL_FALLBACK",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    lexical_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub catalog_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub default_top_k: usize,
    pub engine: EngineConfig,
}

impl AppConfig {
    fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let cors_origins = cli
            .cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();

        if cli.default_top_k == 0 {
            return Err(ApiError::BadRequest(
                "AR_DEFAULT_TOP_K must be positive".into(),
            ));
        }

        if cli.max_upload_bytes == 0 {
            return Err(ApiError::BadRequest(
                "AR_MAX_UPLOAD_BYTES must be positive".into(),
            ));
        }

        if cli.embedding_dimension == 0 {
            return Err(ApiError::BadRequest(
                "AR_EMBEDDING_DIMENSION must be positive".into(),
            ));
        }

        Ok(Self {
            bind: cli.bind,
            port: cli.port,
            catalog_path: cli.catalog_path,
            cors_origins,
            max_upload_bytes: cli.max_upload_bytes,
            default_top_k: cli.default_top_k,
            engine: EngineConfig {
                embedding: EmbeddingConfig {
                    kind: cli.embedder,
                    dimension: cli.embedding_dimension,
                },
                lexical_fallback: cli.lexical_fallback,
            },
        })
    }

    pub fn for_tests() -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 8000,
            catalog_path: None,
            cors_origins: vec!["*".into()],
            max_upload_bytes: 64 * 1024,
            default_top_k: 5,
            engine: EngineConfig::default(),
        }
    }
}

pub struct AppState {
    pub service: RecommendationService,
    pub config: AppConfig,
    pub readiness: Arc<AtomicBool>,
}

pub type SharedState = Arc<AppState>;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>()
            .into()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    Ok(error::with_request_id(request_id, next.run(req)).await)
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
            status = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/", get(info::service_info))
        .route("/recommend", post(recommend::recommend))
        .route("/upload", post(catalog::upload_catalog))
        .route("/catalog", get(catalog::list_catalog))
        .route("/health", get(health::readyz))
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .layer(cors)
        .with_state(state)
}

/// Indexes the startup catalog, if one can be found.
///
/// A missing catalog is not an error: the service starts not-ready and waits
/// for an upload. A catalog that exists but cannot be read or indexed is.
pub fn bootstrap_catalog(
    service: &RecommendationService,
    explicit: Option<&Path>,
    base: &Path,
) -> Result<Option<IndexStats>, ApiError> {
    let Some(path) = resolve_catalog_path(explicit, base) else {
        warn!("no catalog file found; waiting for an upload");
        return Ok(None);
    };

    let raw = load_catalog(&path).map_err(|err| ApiError::Internal(err.to_string()))?;
    let stats = service.index(&raw).map_err(|err| {
        ApiError::Internal(format!(
            "failed to index catalog {}: {err}",
            path.display()
        ))
    })?;

    info!(
        path = %path.display(),
        count = stats.count,
        generation_id = %stats.generation_id,
        scoring_mode = stats.scoring_mode.as_ref(),
        "loaded startup catalog"
    );
    Ok(Some(stats))
}

pub fn test_state() -> SharedState {
    let config = AppConfig::for_tests();

    Arc::new(AppState {
        service: RecommendationService::new(&config.engine),
        config,
        readiness: Arc::new(AtomicBool::new(true)),
    })
}

pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    logging::init(env!("CARGO_PKG_NAME"), &LogConfig::from_env());

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;

    let service = RecommendationService::new(&config.engine);
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    bootstrap_catalog(&service, config.catalog_path.as_deref(), &base)?;

    let state = Arc::new(AppState {
        service,
        config: config.clone(),
        readiness: Arc::new(AtomicBool::new(true)),
    });

    let addr = SocketAddr::new(config.bind, config.port);
    let app = create_router(state.clone());

    info!(
        %addr,
        run_id = ar_common::run_id::get(),
        embedder = state.service.embedder_name().unwrap_or("none"),
        "ar-api listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.readiness.store(false, Ordering::SeqCst);

    // Let load balancers observe /readyz as not ready before connections stop.
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["ar-api"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_flags_build_engine_config() {
        let config = AppConfig::from_cli(parse(&[
            "--port",
            "9000",
            "--embedder",
            "none",
            "--lexical-fallback",
            "OFF",
            "--cors-origins",
            "http://a.test, http://b.test",
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.engine.embedding.kind, EmbedderKind::Disabled);
        assert!(!config.engine.lexical_fallback);
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
    }

    #[test]
    fn zero_default_top_k_is_rejected() {
        let err = AppConfig::from_cli(parse(&["--default-top-k", "0"])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn bootstrap_without_catalog_leaves_service_not_ready() {
        let service = RecommendationService::new(&EngineConfig::default());
        let base = std::env::temp_dir().join(format!("ar-api-bootstrap-{}", std::process::id()));
        std::fs::create_dir_all(&base).unwrap();

        let stats = bootstrap_catalog(&service, None, &base).unwrap();

        assert!(stats.is_none());
        assert!(!service.is_ready());
    }

    #[test]
    fn bootstrap_fails_for_explicit_missing_file() {
        let service = RecommendationService::new(&EngineConfig::default());
        let missing = std::env::temp_dir().join("ar-api-definitely-missing.json");

        assert!(bootstrap_catalog(&service, Some(&missing), Path::new(".")).is_err());
    }

    #[tokio::test]
    async fn sets_request_id_when_missing() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
