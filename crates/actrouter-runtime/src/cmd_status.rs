//! `actrouter status`: print the router snapshot as JSON.

use actrouter_core::Location;

use crate::client::rpc_call;

pub(crate) fn snapshot_params(surface: Option<Location>) -> serde_json::Value {
    match surface {
        Some(location) => serde_json::json!({ "surface": location }),
        None => serde_json::json!({}),
    }
}

pub async fn cmd_status(socket_path: &str, surface: Option<Location>) -> anyhow::Result<()> {
    let snapshot = rpc_call(socket_path, "snapshot", snapshot_params(surface)).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_name_surface_in_lowercase() {
        assert_eq!(
            snapshot_params(Some(Location::Notification)),
            serde_json::json!({"surface": "notification"})
        );
        assert_eq!(snapshot_params(None), serde_json::json!({}));
    }
}
