use world_server::config::AppConfig;
use world_server::{logging, rocket};

#[rocket::main]
async fn main() {
    logging::init();
    let config = AppConfig::from_env();

    if let Err(e) = rocket(config).launch().await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
