use std::{io, path::PathBuf};

use clap::Parser;
use log::{info, LevelFilter};
use tokio::sync::broadcast;

use segue::{
    app_bootstrap::services::{spawn_background_services, BackgroundServicesConfig},
    config::sanitize_config,
    config_persistence::{default_config_path, load_or_create_config},
    console::Console,
    db_manager::DbManager,
};

/// Headless music playback session driven from the terminal.
#[derive(Parser, Debug)]
#[command(name = "segue", version, about)]
struct Cli {
    /// Config file (created with defaults when missing).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite library file.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory tracks must exist in, by title, to be playable.
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut clog = colog::default_builder();
    clog.filter(None, LevelFilter::Trace);
    clog.init();
    log::set_max_level(cli.log_level.unwrap_or(LevelFilter::Info));

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = load_or_create_config(&config_path)?;
    if let Some(database) = cli.database {
        config.storage.database_path = Some(database.to_string_lossy().into_owned());
    }
    if let Some(media_dir) = cli.media_dir {
        config.output.media_dir = Some(media_dir.to_string_lossy().into_owned());
    }
    let config = sanitize_config(config);
    log::set_max_level(cli.log_level.unwrap_or_else(|| config.logging.level_filter()));
    info!("Loaded config from {}", config_path.display());

    let database_file = config.storage.database_file();
    let store = DbManager::new(database_file.clone())?;
    let library = DbManager::new(database_file)?;

    let (bus_sender, _) = broadcast::channel(config.playback.bus_capacity);
    let services = spawn_background_services(BackgroundServicesConfig {
        bus_sender,
        config,
        store,
    });

    let console = Console::new(services.handle.clone(), library);
    let console_result = console.run(io::stdin().lock(), &mut io::stdout());
    services.shutdown();
    console_result?;
    info!("Bye");
    Ok(())
}
