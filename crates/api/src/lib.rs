//! Chat registration endpoints for the staking watch.

mod handlers;
mod routes;
mod types;

pub use handlers::ApiState;
pub use routes::create_router;
pub use types::{AddChatGroupRequest, ApiResponse, HealthResponse, RemoveChatGroupQuery};

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serves the API on `0.0.0.0:port` until `shutdown` is cancelled.
pub async fn serve(state: Arc<ApiState>, port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "registration api listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
