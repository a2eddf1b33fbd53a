//! actrouter: activity router daemon and CLI.
//! The daemon hosts the router in-process; every other subcommand is a thin
//! JSON-RPC client of it.

use clap::Parser;

mod cli;
mod client;
mod cmd_emit;
mod cmd_simulate;
mod cmd_status;
mod cmd_watch;
mod config;
mod daemon;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);

    match args.command {
        cli::Command::Daemon(opts) => {
            let filter = std::env::var("ACTROUTER_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("actrouter daemon starting");
            daemon::run_daemon(opts, &socket_path).await?;
        }
        cli::Command::Status(opts) => {
            cmd_status::cmd_status(&socket_path, opts.surface).await?;
        }
        cli::Command::Watch(opts) => {
            cmd_watch::cmd_watch(&socket_path, opts.interval_ms).await?;
        }
        cli::Command::Simulate(opts) => {
            cmd_simulate::cmd_simulate(&socket_path, &opts).await?;
        }
        cli::Command::Emit(opts) => {
            cmd_emit::cmd_emit(&socket_path, &opts).await?;
        }
        cli::Command::Clear => {
            client::rpc_call(&socket_path, "clear_events", serde_json::json!({})).await?;
            println!("cleared");
        }
    }

    Ok(())
}
