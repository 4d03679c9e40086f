use log_pose::{app::App, logging, settings::Settings};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let loaded = Settings::load();
    let settings = match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => Settings::default(),
    }
    .with_env_overrides();

    if let Err(e) = logging::init(&settings) {
        eprintln!("Logging disabled: {}", e);
    }
    log::info!("Log Pose start: {}", chrono::Local::now());
    if let Err(e) = loaded {
        log::warn!("Using default settings: {}", e);
    }

    let mut app = App::new(settings).await;
    let result = app.run().await;
    if let Err(e) = &result {
        log::error!("Application error: {:?}", e);
    }
    result
}
