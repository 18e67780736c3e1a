use server::config::Config;
use server::state::AppState;
use server::{connection, lan_discovery, ping};
use tokio::net::TcpListener;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::from_args();
    let state = AppState::new(config.clone());

    tokio::spawn(lan_discovery::run(config.clone(), state.registry.clone()));
    tokio::spawn(ping::run(state.clone()));

    let listener = match TcpListener::bind(("0.0.0.0", config.tcp_port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, port = config.tcp_port, "failed to bind TCP listener");
            return;
        }
    };

    info!(
        server_name = %config.server_name,
        tcp_port = config.tcp_port,
        discovery_port = config.discovery_port,
        "listening"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!(%err, "failed to accept connection");
                        continue;
                    }
                };
                info!(%addr, "accepted connection");
                let state = state.clone();
                tokio::spawn(async move {
                    connection::handle(state, stream, addr).await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, exiting");
                break;
            }
        }
    }
}
