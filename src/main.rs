//! Bootstrap: clap CLI with `--print-config`/`--validate-config`, config
//! load, logging init, axum serve.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "lobby-coordinator", about = "Real-time matchmaking and lobby coordinator")]
struct Cli {
    /// Validate the merged configuration and exit without starting the server.
    #[arg(short = 'c', long, conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the merged configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = lobby_coordinator::config::load();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if cli.validate_config {
        println!("configuration OK: {:?}", config);
        return Ok(());
    }

    lobby_coordinator::logging::init_with_config(&config.logging);

    let state = lobby_coordinator::server::AppState::from_config(&config);
    let app = lobby_coordinator::server::ws::router("*").with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "starting lobby coordinator");

    axum::serve(listener, app).await?;
    Ok(())
}
