//! Process shutdown signal handling.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wait for ctrl-c (or SIGTERM on unix), then cancel the token so every
/// refresh loop winds down. Intended as the graceful-shutdown future of the
/// HTTP server.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
    token.cancel();
}
