//! CLI definition using clap derive.

use std::path::PathBuf;

use actrouter_core::Location;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "actrouter", about = "Activity event router for workbench surfaces")]
pub struct Cli {
    /// UDS socket path (default: /tmp/actrouter-$USER/actrouterd.sock)
    #[arg(long, short = 's', global = true)]
    pub socket_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon (router + UDS server)
    Daemon(DaemonOpts),
    /// Print the current snapshot as JSON
    Status(StatusOpts),
    /// Live view of what each surface is showing
    Watch(WatchOpts),
    /// Play a simulated activity through the daemon
    Simulate(SimulateOpts),
    /// Publish one event on the activity channel
    Emit(EmitOpts),
    /// Reset every surface
    Clear,
}

#[derive(clap::Args, Debug, Default)]
pub struct DaemonOpts {
    /// TOML file with router settings
    #[arg(long, env = "ACTROUTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Time one event occupies a surface's display slot
    #[arg(long)]
    pub dwell_ms: Option<u64>,

    /// Events kept in each surface's history
    #[arg(long)]
    pub max_history: Option<usize>,

    /// How long oneshots stay listed after arrival
    #[arg(long)]
    pub oneshot_retention_ms: Option<u64>,

    /// How long a finished activity's progress stays inspectable
    #[arg(long)]
    pub progress_retention_ms: Option<u64>,
}

#[derive(clap::Args, Debug, Default)]
pub struct StatusOpts {
    /// Only this surface (window, notification, toast)
    #[arg(long)]
    pub surface: Option<Location>,
}

#[derive(clap::Args, Debug)]
pub struct WatchOpts {
    /// Refresh interval in milliseconds
    #[arg(long, default_value = "250")]
    pub interval_ms: u64,
}

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    /// Number of progress events
    #[arg(long, default_value = "10")]
    pub count: u32,

    /// Delay between events in milliseconds
    #[arg(long, default_value = "1000")]
    pub delay_ms: u64,

    #[arg(long, default_value = "test/simulation")]
    pub activity_id: String,

    #[arg(long, default_value = "Test Indexing")]
    pub title: String,

    #[arg(long, default_value = "window")]
    pub location: Location,

    /// Clear all events before starting
    #[arg(long)]
    pub clear: bool,
}

#[derive(clap::Args, Debug)]
pub struct EmitOpts {
    /// Raw JSON payload, sent as-is (e.g. '{"oneshot":{"id":1,"title":"Hi"}}')
    #[arg(conflicts_with_all = ["title", "detail"])]
    pub payload: Option<String>,

    /// Oneshot title; the daemon assigns the id
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub detail: Option<String>,

    #[arg(long, default_value = "toast")]
    pub location: Location,
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/actrouter/actrouterd.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/actrouter-{user}/actrouterd.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_overrides_parse() {
        let cli = Cli::try_parse_from([
            "actrouter",
            "daemon",
            "--dwell-ms",
            "250",
            "--max-history",
            "50",
        ])
        .expect("parse");
        let Command::Daemon(opts) = cli.command else {
            panic!("expected daemon");
        };
        assert_eq!(opts.dwell_ms, Some(250));
        assert_eq!(opts.max_history, Some(50));
        assert!(opts.oneshot_retention_ms.is_none());
    }

    #[test]
    fn socket_path_is_global() {
        let cli = Cli::try_parse_from(["actrouter", "status", "-s", "/tmp/x.sock"]).expect("parse");
        assert_eq!(cli.socket_path.as_deref(), Some("/tmp/x.sock"));
    }

    #[test]
    fn surface_parses_case_insensitively() {
        let cli = Cli::try_parse_from(["actrouter", "status", "--surface", "Toast"]).expect("parse");
        let Command::Status(opts) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(opts.surface, Some(Location::Toast));
    }

    #[test]
    fn unknown_surface_is_rejected() {
        assert!(Cli::try_parse_from(["actrouter", "status", "--surface", "sidebar"]).is_err());
    }

    #[test]
    fn simulate_defaults() {
        let cli = Cli::try_parse_from(["actrouter", "simulate"]).expect("parse");
        let Command::Simulate(opts) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(opts.count, 10);
        assert_eq!(opts.delay_ms, 1000);
        assert_eq!(opts.location, Location::Window);
        assert!(!opts.clear);
    }

    #[test]
    fn emit_payload_conflicts_with_title() {
        assert!(
            Cli::try_parse_from(["actrouter", "emit", "{}", "--title", "x"]).is_err()
        );
    }

    #[test]
    fn default_socket_path_ends_with_sock() {
        assert!(default_socket_path().ends_with("/actrouterd.sock"));
    }
}
