//! `actrouter emit`: publish one event through the daemon.

use anyhow::Context;

use crate::cli::EmitOpts;
use crate::client::rpc_call;

/// Pick the RPC for `opts`: a raw payload goes out verbatim on the channel,
/// a title becomes a oneshot built by the daemon's broadcaster.
pub(crate) fn build_emit(opts: &EmitOpts) -> anyhow::Result<(&'static str, serde_json::Value)> {
    if let Some(raw) = &opts.payload {
        let payload: serde_json::Value =
            serde_json::from_str(raw).context("payload is not valid JSON")?;
        return Ok(("publish", payload));
    }
    let title = opts
        .title
        .as_deref()
        .context("either a JSON payload or --title is required")?;
    Ok((
        "notify",
        serde_json::json!({
            "location": opts.location,
            "title": title,
            "detail": opts.detail,
        }),
    ))
}

pub async fn cmd_emit(socket_path: &str, opts: &EmitOpts) -> anyhow::Result<()> {
    let (method, params) = build_emit(opts)?;
    let result = rpc_call(socket_path, method, params).await?;
    println!("{result}");
    Ok(())
}
