//! HTTP surface.
//!
//! A deliberately small, dependency-light server: one `TcpListener`, one
//! accept thread with a shutdown flag, one worker thread per connection.
//! Streaming sessions are long-lived, so per-connection threads double as the
//! one-task-per-session scheduling model; sessions share nothing mutable but
//! the detector behind its mutex.
//!
//! Routes:
//! - `GET  /health`                     liveness probe
//! - `GET  /stream/video/{filename}`    MJPEG stream of a stored upload
//! - `GET  /stream/device/{index}`      MJPEG stream of a capture device
//! - `POST /detect-image`               one-shot detection on an uploaded image
//! - `POST /upload-video?filename=...`  store a video for later streaming

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::config::DeviceSettings;
use crate::detect::{json_confidence, DetectorBackend};
use crate::ingest::{DeviceConfig, DeviceSource, FileConfig, FileSource};
use crate::session::{CloseReason, StreamSession};
use crate::storage::{CollisionSink, VideoStore};
use crate::stream::MULTIPART_CONTENT_TYPE;
use crate::OpenError;

const MAX_HEAD_BYTES: usize = 8192;
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub jpeg_quality: u8,
    pub device: DeviceSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            jpeg_quality: crate::encode::DEFAULT_JPEG_QUALITY,
            device: DeviceSettings {
                target_fps: 15,
                width: 640,
                height: 480,
            },
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("api accept thread panicked"))?;
        }
        Ok(())
    }
}

struct ApiState {
    cfg: ApiConfig,
    store: VideoStore,
    detector: Arc<Mutex<dyn DetectorBackend>>,
    sink: Arc<dyn CollisionSink>,
}

pub struct ApiServer {
    cfg: ApiConfig,
    store: VideoStore,
    detector: Arc<Mutex<dyn DetectorBackend>>,
    sink: Arc<dyn CollisionSink>,
}

impl ApiServer {
    pub fn new(
        cfg: ApiConfig,
        store: VideoStore,
        detector: Arc<Mutex<dyn DetectorBackend>>,
        sink: Arc<dyn CollisionSink>,
    ) -> Self {
        Self {
            cfg,
            store,
            detector,
            sink,
        }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let state = Arc::new(ApiState {
            cfg: self.cfg,
            store: self.store,
            detector: self.detector,
            sink: self.sink,
        });

        let join = std::thread::spawn(move || {
            if let Err(err) = run_accept_loop(listener, state, shutdown_thread) {
                log::error!("api server stopped: {:#}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_accept_loop(
    listener: TcpListener,
    state: Arc<ApiState>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let state = state.clone();
                // One thread per connection; streaming sessions live here for
                // their whole duration.
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &state) {
                        log::warn!("connection from {} failed: {:#}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: &ApiState) -> Result<()> {
    let request = read_request(&mut stream)?;
    let segments: Vec<&str> = request
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", ["stream", "video", name]) => stream_video(&mut stream, state, name),
        ("GET", ["stream", "device", index]) => stream_device(&mut stream, state, index),
        ("POST", ["detect-image"]) => detect_image(&mut stream, state, &request),
        ("POST", ["upload-video"]) => upload_video(&mut stream, state, &request),
        ("GET", _) | ("POST", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)
        }
        _ => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

// ----------------------------------------------------------------------------
// Streaming
// ----------------------------------------------------------------------------

fn stream_video(stream: &mut TcpStream, state: &ApiState, name: &str) -> Result<()> {
    let Some(path) = state.store.resolve(name) else {
        return write_json_response(stream, 404, r#"{"error":"source_unavailable"}"#);
    };
    let source = match FileSource::open(FileConfig {
        path: path.to_string_lossy().to_string(),
        target_fps: 0,
    }) {
        Ok(source) => source,
        Err(err) => return write_open_error(stream, err),
    };
    run_stream(stream, state, Box::new(source))
}

fn stream_device(stream: &mut TcpStream, state: &ApiState, index: &str) -> Result<()> {
    let Ok(index) = index.parse::<u32>() else {
        return write_json_response(stream, 400, r#"{"error":"invalid_device_index"}"#);
    };
    let source = match DeviceSource::open(DeviceConfig {
        index,
        target_fps: state.cfg.device.target_fps,
        width: state.cfg.device.width,
        height: state.cfg.device.height,
    }) {
        Ok(source) => source,
        Err(err) => return write_open_error(stream, err),
    };
    run_stream(stream, state, Box::new(source))
}

/// Drive one streaming session over this connection.
///
/// The multipart header is written only after the origin opened, so an open
/// failure never leaks body bytes. Each chunk is pulled only when the
/// previous blocking write finished; a failed write means the client went
/// away and closes the session as cancelled, releasing the source on drop.
fn run_stream(
    stream: &mut TcpStream,
    state: &ApiState,
    source: Box<dyn crate::FrameSource>,
) -> Result<()> {
    let mut session = StreamSession::new(
        source,
        state.detector.clone(),
        state.sink.clone(),
        state.cfg.jpeg_quality,
    );

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        MULTIPART_CONTENT_TYPE
    );
    if stream.write_all(header.as_bytes()).is_err() {
        session.close(CloseReason::Cancelled);
        return Ok(());
    }

    while let Some(chunk) = session.next_part() {
        if let Err(err) = stream.write_all(&chunk) {
            log::debug!("stream client disconnected: {}", err);
            session.close(CloseReason::Cancelled);
            break;
        }
    }
    Ok(())
}

fn write_open_error(stream: &mut TcpStream, err: OpenError) -> Result<()> {
    match err {
        OpenError::SourceUnavailable(reason) => {
            log::warn!("stream rejected: {}", reason);
            write_json_response(stream, 404, r#"{"error":"source_unavailable"}"#)
        }
        OpenError::DeviceBusy(index) => {
            log::warn!("stream rejected: device {} busy", index);
            write_json_response(stream, 409, r#"{"error":"device_busy"}"#)
        }
    }
}

// ----------------------------------------------------------------------------
// Single-image detection
// ----------------------------------------------------------------------------

/// Run the detector once over an uploaded image and answer with an array of
/// `[x1, y1, x2, y2, label, confidence]` tuples. Every detection is reported:
/// no vehicle filter and no collision analysis on this path.
fn detect_image(stream: &mut TcpStream, state: &ApiState, request: &HttpRequest) -> Result<()> {
    if request.body.is_empty() {
        return write_json_response(stream, 400, r#"{"error":"empty_body"}"#);
    }
    let image = match image::load_from_memory(&request.body) {
        Ok(image) => image.to_rgb8(),
        Err(err) => {
            log::warn!("detect-image: undecodable upload: {}", err);
            return write_json_response(stream, 400, r#"{"error":"invalid_image"}"#);
        }
    };

    let (width, height) = image.dimensions();
    let detections = {
        let mut backend = state
            .detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        match backend.detect(image.as_raw(), width, height) {
            Ok(detections) => detections,
            Err(err) => {
                log::error!("detect-image: detector failed: {:#}", err);
                return write_json_response(stream, 500, r#"{"error":"detection_failed"}"#);
            }
        }
    };

    let tuples: Vec<serde_json::Value> = detections
        .iter()
        .map(|d| {
            json!([
                d.bbox.x1,
                d.bbox.y1,
                d.bbox.x2,
                d.bbox.y2,
                d.label,
                json_confidence(d.confidence)
            ])
        })
        .collect();
    let payload = serde_json::to_vec(&tuples)?;
    write_response(stream, 200, "application/json", &payload)
}

// ----------------------------------------------------------------------------
// Video upload
// ----------------------------------------------------------------------------

fn upload_video(stream: &mut TcpStream, state: &ApiState, request: &HttpRequest) -> Result<()> {
    let Some(filename) = request.query_param("filename") else {
        return write_json_response(stream, 400, r#"{"error":"missing_filename"}"#);
    };
    if request.body.is_empty() {
        return write_json_response(stream, 400, r#"{"error":"empty_body"}"#);
    }
    match state.store.store(&filename, &request.body) {
        Ok(stored) => {
            let payload = serde_json::to_vec(&json!({ "filename": stored }))?;
            write_response(stream, 200, "application/json", &payload)
        }
        Err(err) => {
            log::warn!("upload rejected: {:#}", err);
            write_json_response(stream, 400, r#"{"error":"invalid_filename"}"#)
        }
    }
}

// ----------------------------------------------------------------------------
// Minimal HTTP plumbing
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    raw_path: String,
    #[allow(dead_code)]
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl HttpRequest {
    fn query_param(&self, key: &str) -> Option<String> {
        let query = self.raw_path.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                if k == key {
                    return Some(percent_decode(v));
                }
            }
        }
        None
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let head_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .ok_or_else(|| anyhow!("connection closed mid-request"))?;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEAD_BYTES {
            return Err(anyhow!("request head too large"));
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_UPLOAD_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        raw_path: raw_path.to_string(),
        headers,
        body,
    })
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&value[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(if bytes[i] == b'+' { b' ' } else { bytes[i] });
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        409 => "HTTP/1.1 409 Conflict",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}
