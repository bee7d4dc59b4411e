use expo_contacts::config::CONFIG;
use expo_contacts::db::ExpoStorage;
use expo_contacts::ocr::TesseractCli;
use expo_contacts::{ExpoState, expo_router};
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Arc::new(CONFIG.clone());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        uploads = %cfg.uploads.root_dir.display(),
        auth_check = %cfg.auth.check_url,
        tesseract = %cfg.ocr.tesseract_bin.display(),
        loglevel = %cfg.basic.loglevel,
    );

    let db = ExpoStorage::connect(&cfg.basic.database_url).await?;
    tokio::fs::create_dir_all(&cfg.uploads.root_dir).await?;

    let recognizer = Arc::new(TesseractCli::from_config(&cfg.ocr));
    let state = ExpoState::new(db, cfg.clone(), recognizer)?;
    let app = expo_router(state);

    let addr = cfg.basic.listen_addr.as_str();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
