//! crashwatchd - vehicle collision detection daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + CRASHWATCH_* environment overrides)
//! 2. Builds the detector backend registry
//! 3. Opens the upload store
//! 4. Serves the HTTP API: MJPEG streaming, single-image detection, uploads
//! 5. Runs until interrupted, then shuts the server down cleanly

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crashwatch::api::{ApiConfig, ApiServer};
use crashwatch::{BackendRegistry, CrashwatchConfig, LogSink, StubBackend, VideoStore};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = CrashwatchConfig::load()?;

    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());
    #[cfg(feature = "backend-tract")]
    if let Some(model_path) = &cfg.detector.model_path {
        let backend = crashwatch::detect::TractBackend::new(
            model_path,
            cfg.device.width,
            cfg.device.height,
        )?;
        registry.register(backend);
    }
    registry.set_default(&cfg.detector.backend)?;
    let detector = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;
    {
        let mut backend = detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        backend.warm_up()?;
        log::info!("detector backend: {}", backend.name());
    }

    let store = VideoStore::new(&cfg.upload_dir)?;
    log::info!("upload store at {}", store.dir().display());

    let api_config = ApiConfig {
        addr: cfg.http_addr.clone(),
        jpeg_quality: cfg.jpeg_quality,
        device: cfg.device.clone(),
    };
    let api_handle = ApiServer::new(api_config, store, detector, Arc::new(LogSink)).spawn()?;
    log::info!("crashwatchd listening on {}", api_handle.addr);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("failed to install signal handler: {}", e))?;
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    api_handle.stop()
}
