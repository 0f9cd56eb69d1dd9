//! Server loop and the coverage exit hook.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use covrig_common::constants;
use covrig_coverage::artifact::CoverageData;
use tokio::net::TcpListener;

use crate::error::{Result, ServiceError};
use crate::routes::{AppState, router};

/// Runtime settings for one service process.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub bind: SocketAddr,
    /// Coverage artifact path. No agent is attached when unset.
    pub coverage_out: Option<PathBuf>,
    /// Extra delay before the flush, simulating a slow agent.
    pub flush_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], constants::SERVICE_PORT)),
            coverage_out: None,
            flush_delay: Duration::ZERO,
        }
    }
}

/// Binds the configured address and serves until SIGTERM or Ctrl-C.
///
/// # Errors
///
/// Returns an error if binding, serving, or the coverage flush fails.
pub async fn serve(config: ServiceConfig) -> Result<Option<CoverageData>> {
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServiceError::Bind {
            addr: config.bind,
            source,
        })?;
    let shutdown = shutdown_signal()?;
    serve_on(listener, AppState::new(), &config, shutdown).await
}

/// Serves on an already bound listener until `shutdown` resolves, then runs
/// the exit hook.
///
/// In-flight requests are drained before the flush, so every answered
/// request is counted in the artifact.
///
/// # Errors
///
/// Returns an error if serving or the coverage flush fails.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: AppState,
    config: &ServiceConfig,
    shutdown: F,
) -> Result<Option<CoverageData>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().map_err(ServiceError::Serve)?;
    tracing::info!(
        addr = %local,
        coverage = config.coverage_out.is_some(),
        "listening"
    );

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServiceError::Serve)?;

    tracing::info!("shutdown signal received, server drained");
    exit_hook(&state, config).await
}

/// Flushes coverage if an agent is attached.
async fn exit_hook(state: &AppState, config: &ServiceConfig) -> Result<Option<CoverageData>> {
    let Some(path) = &config.coverage_out else {
        return Ok(None);
    };
    if !config.flush_delay.is_zero() {
        tracing::debug!(
            delay_ms = u64::try_from(config.flush_delay.as_millis()).unwrap_or(u64::MAX),
            "delaying coverage flush"
        );
        tokio::time::sleep(config.flush_delay).await;
    }
    let data = state.recorder.flush(path)?;
    Ok(Some(data))
}

/// Resolves on the first SIGTERM or Ctrl-C.
///
/// Handlers are installed before returning so a signal that arrives while
/// the server is still starting is not lost.
///
/// # Errors
///
/// Returns `ServiceError::Signal` if the SIGTERM handler cannot be installed.
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|source| ServiceError::Signal {
            signal: "SIGTERM",
            source,
        })?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            let _ = terminate.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!(signal = "SIGINT", "stopping"),
            () = terminate => tracing::info!(signal = "SIGTERM", "stopping"),
        }
    })
}
