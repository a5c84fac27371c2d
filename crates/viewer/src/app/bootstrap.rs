use std::path::PathBuf;
use std::time::Duration;

use mapview::{ViewConfig, CONFIG_ENV_VAR};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::ViewerError;

const OUTPUT_ENV_VAR: &str = "MAPVIEW_OUTPUT";
const DEFAULT_OUTPUT_PATH: &str = "mapview.png";
const DEFAULT_FRAME_COUNT: u32 = 96;
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub(crate) struct AppWiring {
    pub(crate) config: ViewConfig,
    pub(crate) output_path: PathBuf,
    pub(crate) frames: u32,
    pub(crate) frame_interval: Duration,
}

pub(crate) fn build_app() -> Result<AppWiring, ViewerError> {
    init_tracing();
    info!("=== Map View Startup ===");

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
    let config = match config_path {
        Some(path) => {
            info!(path = %path.display(), "view_config_loading");
            ViewConfig::load(&path)?
        }
        None => {
            info!("view_config_default");
            ViewConfig::default()
        }
    };

    let output_path = std::env::var_os(OUTPUT_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

    Ok(AppWiring {
        config,
        output_path,
        frames: DEFAULT_FRAME_COUNT,
        frame_interval: FRAME_INTERVAL,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
