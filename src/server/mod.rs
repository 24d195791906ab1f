//! Local HTTP backend - stores images and JSON data under the base directory

mod handlers;

use crate::config::Paths;
use crate::error::AppError;
use crate::store::Store;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct AppState {
    pub store: Store,
    // Writers take it exclusively for read-modify-write cycles on the data files
    pub data_lock: RwLock<()>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(paths: Paths) -> SharedState {
        Arc::new(Self {
            store: Store::new(paths),
            data_lock: RwLock::new(()),
        })
    }

    pub fn paths(&self) -> &Paths {
        self.store.paths()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        // Static files
        .route("/files/{kind}/{name}", get(handlers::serve_file))
        // Status
        .route("/api/status", get(handlers::status))
        // Image files
        .route("/api/files/save-output", post(handlers::save_output))
        .route("/api/files/save-input", post(handlers::save_input))
        .route("/api/files/save-desktop", post(handlers::save_desktop))
        .route("/api/files/{kind}", get(handlers::list_files))
        .route("/api/files/{kind}/{name}", delete(handlers::delete_file))
        // Creative ideas
        .route(
            "/api/creative-ideas",
            get(handlers::list_ideas).post(handlers::create_idea),
        )
        .route("/api/creative-ideas/import", post(handlers::import_ideas))
        .route("/api/creative-ideas/reorder", post(handlers::reorder_ideas))
        .route(
            "/api/creative-ideas/{id}",
            get(handlers::get_idea)
                .put(handlers::update_idea)
                .delete(handlers::delete_idea),
        )
        // History
        .route(
            "/api/history",
            get(handlers::list_history)
                .post(handlers::add_history)
                .delete(handlers::clear_history),
        )
        .route("/api/history/{id}", delete(handlers::delete_history))
        // Settings & desktop
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::save_settings),
        )
        .route(
            "/api/desktop",
            get(handlers::get_desktop).post(handlers::save_desktop_items),
        )
        .fallback(unknown_route)
        .method_not_allowed_fallback(unknown_route)
        .layer(middleware::from_fn(cors_and_log))
        .with_state(state)
}

async fn unknown_route() -> AppError {
    AppError::NotFound("unknown route".into())
}

fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

/// Answers CORS preflights, tags every response with CORS headers and logs it
async fn cors_and_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };
    add_cors_headers(response.headers_mut());

    let status = response.status();
    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), "Request");
    } else {
        debug!(method = %method, path = %path, status = status.as_u16(), "Request");
    }
    response
}

pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Backend listening");
    Ok(listener)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
