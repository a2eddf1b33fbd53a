//! `actrouter watch`: live view of what each surface is showing.

use std::time::Duration;

use actrouter_core::{ActivityEvent, RouterSnapshot, SurfaceSnapshot};

use crate::client::rpc_call;

/// Text a surface would render for `event`. Progress and finish events
/// borrow the title of the start that opened their activity.
pub(crate) fn describe(surface: &SurfaceSnapshot, event: &ActivityEvent) -> String {
    let title = event.title().or_else(|| {
        event
            .activity_id()
            .and_then(|id| surface.start_title_for_activity(id))
    });
    match (title, event.detail()) {
        (Some(title), Some(detail)) => format!("{title}: {detail}"),
        (Some(title), None) => title.to_string(),
        (None, Some(detail)) => detail.to_string(),
        (None, None) => format!("#{} {}", event.id(), event.kind()),
    }
}

pub(crate) fn format_surface(surface: &SurfaceSnapshot) -> String {
    let showing = match &surface.latest_event {
        Some(event) => describe(surface, event),
        None => "-".to_string(),
    };
    let mut line = format!("{:<13} {showing}", surface.location.as_str());
    if surface.active_count > 0 {
        line.push_str(&format!("  [{} active]", surface.active_count));
    }
    if surface.queue_len() > 1 {
        line.push_str(&format!("  [{} queued]", surface.queue_len() - 1));
    }
    line
}

pub(crate) fn format_watch(snapshot: &RouterSnapshot) -> String {
    snapshot
        .surfaces
        .iter()
        .map(format_surface)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Entry point for `actrouter watch`.
pub async fn cmd_watch(socket_path: &str, interval_ms: u64) -> anyhow::Result<()> {
    loop {
        // Clear screen + cursor home
        print!("\x1b[2J\x1b[H");

        match rpc_call(socket_path, "snapshot", serde_json::json!({})).await {
            Ok(value) => match serde_json::from_value::<RouterSnapshot>(value) {
                Ok(snapshot) => println!("{}", format_watch(&snapshot)),
                Err(e) => println!("Unexpected snapshot from daemon: {e}"),
            },
            Err(e) => {
                println!("Cannot connect to daemon: {e}");
            }
        }

        println!(
            "\nactrouter watch {} (Ctrl-C to quit)",
            chrono::Local::now().format("%H:%M:%S")
        );

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(interval_ms)) => {}
            _ = tokio::signal::ctrl_c() => { break; }
        }
    }

    Ok(())
}
