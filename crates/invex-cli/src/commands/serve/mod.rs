//! Serve command - browser UI for uploading invoice images and viewing the tables.

mod page;
mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::extract::multipart::MultipartError;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use clap::Args;
use console::style;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use invex_core::{GeminiExtractor, InvoiceExtractor, NoopObserver, Upload};

use self::store::SessionStore;
use super::load_config;

const SESSION_COOKIE: &str = "invex_session";

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    store: Arc<SessionStore>,
    extractor: Arc<dyn InvoiceExtractor>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let extractor = GeminiExtractor::from_env(&config.extraction)?;
    let store = SessionStore::new(
        Duration::from_secs(config.server.session_ttl_secs),
        config.extraction.max_image_bytes,
    );
    let state = AppState {
        store: Arc::new(store),
        extractor: Arc::new(extractor),
    };
    let app = router(state, config.server.max_upload_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    info!("Using model {}", config.extraction.model);
    eprintln!("{} Open http://{} in your browser", style("✓").green(), addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/parse", post(parse))
        .route("/reset", post(reset))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Session id from the request cookie, if present and well formed.
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|id| Uuid::parse_str(id).ok())
}

fn with_session_cookie(mut response: Response, id: Uuid) -> Response {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, html) = state.store.view(session_id(&headers), page::render);
    with_session_cookie(Html(html).into_response(), id)
}

async fn parse(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let uploads = match read_uploads(&mut multipart).await {
        Ok(uploads) => uploads,
        Err(e) => return e.into_response(),
    };
    debug!("Received {} uploaded files", uploads.len());

    let (id, mut session) = state.store.checkout(session_id(&headers));
    session
        .parse_batch(state.extractor.as_ref(), &uploads, &mut NoopObserver)
        .await;
    state.store.restore(id, session);

    with_session_cookie(Redirect::to("/").into_response(), id)
}

async fn reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = state.store.reset(session_id(&headers));
    with_session_cookie(Redirect::to("/").into_response(), id)
}

async fn health() -> &'static str {
    "OK"
}

/// Collect the `files` parts, skipping the empty part browsers send when nothing was chosen.
async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<Upload>, MultipartError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let data = field.bytes().await?;
        uploads.push(Upload::new(filename, data.to_vec()));
    }

    Ok(uploads)
}
