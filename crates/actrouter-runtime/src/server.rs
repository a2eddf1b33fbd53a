//! UDS JSON-RPC server: minimal hand-rolled implementation.
//! Connection-per-request, newline-delimited JSON.

use actrouter_core::Location;
use actrouter_router::{
    ACTIVITY_CHANNEL, ActivityBroadcaster, BridgeError, ChannelHub, RouterHandle, SimulatedSource,
    SimulationPlan, ToLocation, simulate_activity,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

/// Everything a request handler can reach.
#[derive(Clone)]
pub(crate) struct ServerContext {
    pub router: RouterHandle,
    pub hub: ChannelHub,
    pub broadcaster: ActivityBroadcaster,
    pub source: SimulatedSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn method_not_found() -> Self {
        Self {
            code: -32601,
            message: "method not found".to_string(),
        }
    }

    fn invalid_params(message: impl std::fmt::Display) -> Self {
        Self {
            code: -32602,
            message: format!("invalid params: {message}"),
        }
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
        }
    }
}

impl From<actrouter_router::RouterError> for RpcError {
    fn from(e: actrouter_router::RouterError) -> Self {
        Self::internal(e)
    }
}

impl From<BridgeError> for RpcError {
    fn from(e: BridgeError) -> Self {
        Self::internal(e)
    }
}

/// Run the UDS JSON-RPC server until `cancel` fires.
pub(crate) async fn run_server(
    socket_path: &str,
    ctx: ServerContext,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    // Create socket directory with mode 0700
    let socket_dir = std::path::Path::new(socket_path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid socket path"))?;

    std::fs::create_dir_all(socket_dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    // Check for stale socket
    if std::path::Path::new(socket_path).exists() {
        if tokio::net::UnixStream::connect(socket_path).await.is_err() {
            std::fs::remove_file(socket_path)?;
            tracing::info!("removed stale socket at {socket_path}");
        } else {
            anyhow::bail!("another daemon is already running at {socket_path}");
        }
    }

    let listener = UnixListener::bind(socket_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("UDS server listening on {socket_path}");

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = cancel.cancelled() => {
                tracing::debug!("UDS server stopping");
                return Ok(());
            }
        };
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                tracing::debug!("connection error: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    ctx: ServerContext,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let request: serde_json::Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();

    let response = match handle_request(&ctx, method, &request["params"]).await {
        Ok(result) => serde_json::json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": id,
        }),
        Err(err) => {
            tracing::debug!(method, code = err.code, "rpc error: {}", err.message);
            serde_json::json!({
                "jsonrpc": "2.0",
                "error": {"code": err.code, "message": err.message},
                "id": id,
            })
        }
    };
    let mut resp = serde_json::to_string(&response)?;
    resp.push('\n');
    writer.write_all(resp.as_bytes()).await?;

    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SurfaceParams {
    surface: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct StartTitleParams {
    #[serde(default)]
    surface: Option<Location>,
    activity_id: String,
}

#[derive(Debug, Deserialize)]
struct NotifyParams {
    #[serde(default)]
    location: Location,
    #[serde(default = "default_notify_activity")]
    activity_id: String,
    title: String,
    #[serde(default)]
    detail: Option<String>,
}

fn default_notify_activity() -> String {
    "actrouter/cli".to_string()
}

fn parse_params<T: serde::de::DeserializeOwned + Default>(
    params: &serde_json::Value,
) -> Result<T, RpcError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(RpcError::invalid_params)
}

/// Dispatch one request. Split from the socket handling so it can be
/// exercised without a listener.
pub(crate) async fn handle_request(
    ctx: &ServerContext,
    method: &str,
    params: &serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "publish" => {
            // Same path as a backend producer: through the channel.
            let delivered = match ctx.hub.publish(ACTIVITY_CHANNEL, params.clone()) {
                Ok(n) => n,
                Err(BridgeError::NoSubscribers(_)) => 0,
                Err(e) => return Err(e.into()),
            };
            Ok(serde_json::json!({ "delivered": delivered }))
        }
        "inject" => {
            ctx.source.inject(params.clone()).await?;
            Ok(serde_json::json!({ "ok": true }))
        }
        "notify" => {
            let p: NotifyParams =
                serde_json::from_value(params.clone()).map_err(RpcError::invalid_params)?;
            let id = ctx
                .broadcaster
                .emit_oneshot(ToLocation::new(p.location, p.activity_id, p.title, p.detail))?;
            Ok(serde_json::json!({ "id": id }))
        }
        "simulate" => {
            let plan: SimulationPlan = parse_params(params)?;
            let events = plan.events().len();
            let activity_id = plan.activity_id.clone();
            let router = ctx.router.clone();
            let source = ctx.source.clone();
            tokio::spawn(async move {
                if let Err(e) = simulate_activity(&router, &source, &plan).await {
                    tracing::warn!(activity_id = %plan.activity_id, "simulation aborted: {e}");
                }
            });
            Ok(serde_json::json!({ "activity_id": activity_id, "events": events }))
        }
        "snapshot" => {
            let p: SurfaceParams = parse_params(params)?;
            match p.surface {
                Some(location) => to_value(ctx.router.surface(location).await?),
                None => to_value(ctx.router.snapshot().await?),
            }
        }
        "start_title" => {
            let p: StartTitleParams =
                serde_json::from_value(params.clone()).map_err(RpcError::invalid_params)?;
            let title = ctx
                .router
                .start_title_for_activity(p.surface.unwrap_or_default(), &p.activity_id)
                .await?;
            Ok(serde_json::json!({ "title": title }))
        }
        "clear_events" => {
            ctx.router.clear_events().await?;
            Ok(serde_json::json!({ "cleared": true }))
        }
        _ => Err(RpcError::method_not_found()),
    }
}

fn to_value(value: impl serde::Serialize) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrouter_core::RouterConfig;
    use actrouter_router::{ActivityRouter, SubscriptionBridge};
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        ctx: ServerContext,
        _bridge: SubscriptionBridge,
        _subs: Vec<actrouter_router::Subscription>,
    }

    fn harness() -> Harness {
        let (router, _task) = ActivityRouter::spawn(RouterConfig::default(), CancellationToken::new());
        let hub = ChannelHub::with_activity_channel();
        let bridge = SubscriptionBridge::new(router.clone());
        let channel_sub = bridge
            .attach_channel(&hub, ACTIVITY_CHANNEL)
            .expect("channel open");
        let (source, sim_sub) = bridge.attach_simulated();
        let ctx = ServerContext {
            router,
            broadcaster: ActivityBroadcaster::new(hub.clone()),
            hub,
            source,
        };
        Harness {
            ctx,
            _bridge: bridge,
            _subs: vec![channel_sub, sim_sub],
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn publish_goes_through_channel() {
        let h = harness();
        let result = handle_request(
            &h.ctx,
            "publish",
            &json!({"oneshot": {"id": 1, "title": "Saved", "location": "toast"}}),
        )
        .await
        .expect("publish");
        assert_eq!(result["delivered"], 1);
        settle().await;

        let snap = handle_request(&h.ctx, "snapshot", &json!({"surface": "toast"}))
            .await
            .expect("snapshot");
        assert_eq!(snap["location"], "toast");
        assert_eq!(snap["history"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn inject_uses_simulated_source() {
        let h = harness();
        handle_request(
            &h.ctx,
            "inject",
            &json!({"start": {"id": 1, "activityId": "a", "title": "Indexing"}}),
        )
        .await
        .expect("inject");
        settle().await;

        let result = handle_request(&h.ctx, "start_title", &json!({"activity_id": "a"}))
            .await
            .expect("start_title");
        assert_eq!(result["title"], "Indexing");
    }

    #[tokio::test(start_paused = true)]
    async fn notify_emits_oneshot_via_broadcaster() {
        let h = harness();
        let result = handle_request(
            &h.ctx,
            "notify",
            &json!({"location": "notification", "title": "Update available"}),
        )
        .await
        .expect("notify");
        assert!(result["id"].is_u64());
        settle().await;

        let snap = h.ctx.router.surface(Location::Notification).await.expect("surface");
        assert_eq!(snap.oneshots.len(), 1);
        assert_eq!(snap.oneshots[0].title(), Some("Update available"));
    }

    #[tokio::test(start_paused = true)]
    async fn simulate_runs_in_background() {
        let h = harness();
        let result = handle_request(
            &h.ctx,
            "simulate",
            &json!({"count": 2, "delay_ms": 10, "location": "toast"}),
        )
        .await
        .expect("simulate");
        assert_eq!(result["events"], 4);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = h.ctx.router.surface(Location::Toast).await.expect("surface");
        assert_eq!(snap.history.len(), 4);
        assert!(snap.active_activities.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn whole_snapshot_and_clear() {
        let h = harness();
        handle_request(&h.ctx, "inject", &json!({"oneshot": {"id": 1, "title": "x"}}))
            .await
            .expect("inject");
        settle().await;

        let snap = handle_request(&h.ctx, "snapshot", &serde_json::Value::Null)
            .await
            .expect("snapshot");
        assert_eq!(snap["surfaces"].as_array().map(Vec::len), Some(3));

        handle_request(&h.ctx, "clear_events", &serde_json::Value::Null)
            .await
            .expect("clear");
        let window = h.ctx.router.surface(Location::Window).await.expect("surface");
        assert!(window.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_method_and_bad_params() {
        let h = harness();
        let err = handle_request(&h.ctx, "nope", &serde_json::Value::Null)
            .await
            .expect_err("unknown");
        assert_eq!(err.code, -32601);

        let err = handle_request(&h.ctx, "snapshot", &json!({"surface": "sidebar"}))
            .await
            .expect_err("bad surface");
        assert_eq!(err.code, -32602);

        let err = handle_request(&h.ctx, "start_title", &json!({}))
            .await
            .expect_err("missing activity_id");
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn socket_round_trip() {
        let h = harness();
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("rt.sock");
        let socket = socket.to_string_lossy().into_owned();
        let cancel = CancellationToken::new();
        let server = tokio::spawn({
            let socket = socket.clone();
            let ctx = h.ctx.clone();
            let cancel = cancel.clone();
            async move { run_server(&socket, ctx, cancel).await }
        });

        let mut result = None;
        for _ in 0..50 {
            match crate::client::rpc_call(&socket, "snapshot", serde_json::json!({})).await {
                Ok(v) => {
                    result = Some(v);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        let snap = result.expect("server answered");
        assert_eq!(snap["tracked_activities"], 0);

        cancel.cancel();
        server.await.expect("join").expect("server exits cleanly");
    }
}
