//! End-to-end pipeline scenarios over synthetic origins.

use std::sync::{Arc, Mutex};

use crashwatch::ingest::{DeviceConfig, FileConfig};
use crashwatch::storage::MemorySink;
use crashwatch::{
    BoundingBox, CloseReason, Detection, DeviceSource, FileSource, FrameSource, OpenError,
    SessionState, StreamSession, StubBackend,
};

const CHUNK_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

fn file_source(frames: u64) -> Box<dyn FrameSource> {
    Box::new(
        FileSource::open(FileConfig {
            path: format!("stub://footage?frames={}", frames),
            target_fps: 0,
        })
        .expect("synthetic file source opens"),
    )
}

fn vehicle(label: &str, x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
    Detection::new(BoundingBox { x1, y1, x2, y2 }, label, 0.9)
}

#[test]
fn three_frame_stream_emits_in_order_with_one_collision() {
    // Frame 2 carries two overlapping vehicles; frames 1 and 3 carry nothing.
    let script = vec![
        vec![],
        vec![
            vehicle("car", 100, 100, 200, 200),
            vehicle("truck", 150, 150, 260, 260),
        ],
        vec![],
    ];
    let detector = Arc::new(Mutex::new(StubBackend::with_script(script)));
    let sink = Arc::new(MemorySink::new());
    let mut session = StreamSession::new(file_source(3), detector, sink.clone(), 85);

    let mut chunks = Vec::new();
    while let Some(chunk) = session.next_part() {
        chunks.push(chunk);
    }

    // Three encoded frames, in capture order, each framed as one multipart
    // part carrying a JPEG payload.
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.starts_with(CHUNK_HEADER));
        assert_eq!(&chunk[CHUNK_HEADER.len()..CHUNK_HEADER.len() + 2], &[0xFF, 0xD8]);
        assert!(chunk.ends_with(b"\r\n"));
    }

    // Exactly one collision, tagged with the second frame.
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].frame_seq, 2);
    assert_eq!(events[0].first.label, "CAR");
    assert_eq!(events[0].second.label, "TRUCK");

    assert_eq!(session.state(), SessionState::Closed(CloseReason::Normal));
}

#[test]
fn collision_frames_differ_from_calm_frames() {
    // Same synthetic footage twice; the only difference is the scripted
    // collision, so any pixel difference comes from boxes + banner.
    let calm_detector = Arc::new(Mutex::new(StubBackend::new()));
    let crash_detector = Arc::new(Mutex::new(StubBackend::with_script(vec![vec![
        vehicle("car", 100, 100, 200, 200),
        vehicle("bus", 150, 150, 260, 260),
    ]])));

    let mut calm = StreamSession::new(
        file_source(1),
        calm_detector,
        Arc::new(MemorySink::new()),
        85,
    );
    let mut crash = StreamSession::new(
        file_source(1),
        crash_detector,
        Arc::new(MemorySink::new()),
        85,
    );

    let calm_chunk = calm.next_part().expect("calm frame");
    let crash_chunk = crash.next_part().expect("crash frame");
    assert_ne!(calm_chunk, crash_chunk);
}

#[test]
fn missing_file_fails_before_any_output() {
    let err = FileSource::open(FileConfig {
        path: "/nonexistent/uploads/pileup.mp4".to_string(),
        target_fps: 0,
    })
    .unwrap_err();
    assert!(matches!(err, OpenError::SourceUnavailable(_)));
}

#[test]
fn cancelled_device_session_releases_its_claim() {
    let config = DeviceConfig {
        index: 930,
        target_fps: 0,
        width: 64,
        height: 48,
    };

    let source = DeviceSource::open(config.clone()).expect("device opens");
    let detector = Arc::new(Mutex::new(StubBackend::new()));
    let sink = Arc::new(MemorySink::new());
    let mut session = StreamSession::new(Box::new(source), detector, sink, 85);

    // Unbounded origin: pull a few frames as if a client were consuming.
    for _ in 0..5 {
        assert!(session.next_part().is_some());
    }

    // While the session lives, the device is exclusively held.
    assert!(matches!(
        DeviceSource::open(config.clone()),
        Err(OpenError::DeviceBusy(930))
    ));

    // Client goes away: cancellation, then teardown.
    session.close(CloseReason::Cancelled);
    assert!(session.next_part().is_none());
    assert_eq!(
        session.state(),
        SessionState::Closed(CloseReason::Cancelled)
    );
    drop(session);

    // The claim is gone; a new session can own the device.
    DeviceSource::open(config).expect("device reopens after teardown");
}
