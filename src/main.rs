use actix_web::{web, App, HttpServer};
use log::info;
use std::io;
use vote_ledger::api::{self, AppState};
use vote_ledger::{Ledger, LedgerConfig, ServerConfig};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let ledger_config =
        LedgerConfig::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let server_config =
        ServerConfig::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    info!(
        "starting ledger with difficulty {} on {}:{}",
        ledger_config.difficulty, server_config.host, server_config.port
    );

    let state = web::Data::new(AppState::new(
        Ledger::with_config(ledger_config),
        server_config.mine_timeout,
    ));

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, cancelling in-flight mining");
            shutdown.cancel();
        }
    });

    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind(server_config.bind_addr())?
        .run()
        .await
}
