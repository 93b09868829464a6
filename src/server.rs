//! HTTP surface.
//!
//! | route            | auth   | purpose                                   |
//! |------------------|--------|-------------------------------------------|
//! | `POST /post`     | bearer | multipart upload of one geo-tagged post   |
//! | `GET /search`    | bearer | posts within a radius                     |
//! | `GET /cluster`   | bearer | posts whose score clears a threshold      |
//! | `POST /signup`   | none   | create an account                         |
//! | `POST /login`    | none   | exchange credentials for a token          |
//! | `GET /media/*`   | none   | stored media, when kept on local disk     |
//! | `GET /healthz`   | none   | liveness                                  |

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{NearbyError, Result};

pub use self::error::ApiError;
pub use self::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let mut router = Router::new()
        .route("/post", post(handlers::create_post))
        .route("/search", get(handlers::search))
        .route("/cluster", get(handlers::cluster))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/healthz", get(handlers::healthz));

    if let Some(media_dir) = &state.media_dir {
        router = router.nest_service("/media", ServeDir::new(media_dir));
    }

    router
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM, then drain in-flight
/// requests.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| NearbyError::config(format!("failed to bind to {addr}: {e}")))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "nearby server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received; draining connections"),
        _ = sigterm => tracing::info!("SIGTERM received; draining connections"),
    }
}
