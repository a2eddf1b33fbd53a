//! `actrouter daemon`: router, channel bridge and UDS server in one process.

use actrouter_router::{
    ACTIVITY_CHANNEL, ActivityBroadcaster, ActivityRouter, ChannelHub, SubscriptionBridge,
};
use tokio_util::sync::CancellationToken;

use crate::cli::DaemonOpts;
use crate::config;
use crate::server::{self, ServerContext};

/// Run the daemon until ctrl-c or SIGTERM.
pub async fn run_daemon(opts: DaemonOpts, socket_path: &str) -> anyhow::Result<()> {
    let config = config::load(&opts)?;
    tracing::info!(
        dwell_ms = config.dwell_ms,
        max_history = config.max_history,
        oneshot_retention_ms = config.oneshot_retention_ms,
        progress_retention_ms = config.progress_retention_ms,
        "router config loaded"
    );

    let cancel = CancellationToken::new();
    let (router, router_task) = ActivityRouter::spawn(config, cancel.child_token());

    let hub = ChannelHub::with_activity_channel();
    let bridge = SubscriptionBridge::with_cancel(router.clone(), cancel.child_token());
    // A failed attach is logged by the bridge; the daemon still serves.
    let _channel_sub = bridge.attach_channel(&hub, ACTIVITY_CHANNEL);
    let (source, _sim_sub) = bridge.attach_simulated();

    let ctx = ServerContext {
        router,
        broadcaster: ActivityBroadcaster::new(hub.clone()),
        hub,
        source,
    };

    let server_socket = socket_path.to_string();
    let server_cancel = cancel.child_token();
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(&server_socket, ctx, server_cancel).await {
            tracing::error!("UDS server error: {e}");
        }
    });

    let server_done = tokio::select! {
        () = shutdown_signal() => false,
        _ = &mut server_handle => {
            tracing::warn!("server exited unexpectedly");
            true
        }
    };

    // Stops the bridge and server, and the router aborts its pending timers.
    cancel.cancel();
    if let Err(e) = router_task.await {
        tracing::warn!("router task failed: {e}");
    }
    // A server that never started must not remove another daemon's socket.
    if !server_done {
        let _ = server_handle.await;
        let _ = std::fs::remove_file(socket_path);
    }
    tracing::info!("daemon stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("cannot register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}
