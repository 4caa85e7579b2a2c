use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::{debug, error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use satilp::cache::ProblemCache;
use satilp::config::Config;
use satilp::domain::coordinator::RunCoordinator;
use satilp::handlers::{configure, json_config, AppState};

// ---------- Server bootstrap ----------
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };
    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Invalid solver configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    let coordinator = RunCoordinator::new(config.coordinator_config());

    // Log run transitions as they happen
    let mut progress = coordinator.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(event) => debug!("{} on {}: {}", event.source, event.solver, event.state),
                Err(RecvError::Lagged(skipped)) => warn!("Progress log skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let state = web::Data::new(AppState::new(
        registry,
        coordinator,
        ProblemCache::new(config.cache_size),
        config.report_path.clone(),
    ));
    let json_limit = config.json_limit;
    let port = config.port;

    info!(
        "Starting server on http://127.0.0.1:{} with solvers [{}]",
        port,
        config
            .solvers
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(json_config(json_limit))
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
