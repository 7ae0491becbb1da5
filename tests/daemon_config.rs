//! Configuration loading: file values, environment overrides, validation.

use std::sync::Mutex;

use tempfile::NamedTempFile;

use crashwatch::CrashwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CRASHWATCH_CONFIG",
        "CRASHWATCH_HTTP_ADDR",
        "CRASHWATCH_UPLOAD_DIR",
        "CRASHWATCH_JPEG_QUALITY",
        "CRASHWATCH_DETECTOR_BACKEND",
        "CRASHWATCH_MODEL_PATH",
        "CRASHWATCH_DEVICE_FPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CrashwatchConfig::load().unwrap();
    assert_eq!(cfg.http_addr, "127.0.0.1:8080");
    assert_eq!(cfg.upload_dir, "static/videos");
    assert_eq!(cfg.jpeg_quality, 85);
    assert_eq!(cfg.detector.backend, "stub");
    assert!(cfg.detector.model_path.is_none());
    assert_eq!(cfg.device.width, 640);
    assert_eq!(cfg.device.height, 480);
}

#[test]
fn env_overrides_win_over_the_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = NamedTempFile::new().expect("temp config");
    std::fs::write(
        file.path(),
        r#"{
            "http_addr": "0.0.0.0:9000",
            "upload_dir": "/srv/crashwatch/videos",
            "jpeg_quality": 70,
            "detector": { "backend": "stub" },
            "device": { "target_fps": 30, "width": 1280, "height": 720 }
        }"#,
    )
    .unwrap();

    std::env::set_var("CRASHWATCH_CONFIG", file.path());
    std::env::set_var("CRASHWATCH_HTTP_ADDR", "127.0.0.1:9100");
    std::env::set_var("CRASHWATCH_JPEG_QUALITY", "92");

    let cfg = CrashwatchConfig::load().unwrap();
    // Env beats file where both are set.
    assert_eq!(cfg.http_addr, "127.0.0.1:9100");
    assert_eq!(cfg.jpeg_quality, 92);
    // File values survive where the env says nothing.
    assert_eq!(cfg.upload_dir, "/srv/crashwatch/videos");
    assert_eq!(cfg.device.target_fps, 30);
    assert_eq!(cfg.device.width, 1280);

    clear_env();
}

#[test]
fn out_of_range_quality_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CRASHWATCH_JPEG_QUALITY", "0");
    assert!(CrashwatchConfig::load().is_err());

    std::env::set_var("CRASHWATCH_JPEG_QUALITY", "banana");
    assert!(CrashwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn malformed_config_files_are_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = NamedTempFile::new().expect("temp config");
    std::fs::write(file.path(), "not json at all").unwrap();
    std::env::set_var("CRASHWATCH_CONFIG", file.path());
    assert!(CrashwatchConfig::load().is_err());

    clear_env();
}
