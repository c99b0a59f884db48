//! State sync integration tests
//!
//! A mirror built only from broadcast messages must track the engine's view.

use flowzone::prelude::*;
use flowzone::{apply_patch, Broadcast, BroadcastConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client-side replica fed from the transport.
#[derive(Default)]
struct Mirror {
    doc: Value,
    revisions: Vec<u64>,
}

impl Mirror {
    fn apply(&mut self, text: &str) {
        match StateMessage::parse(text).unwrap() {
            StateMessage::Full { revision_id, data } => {
                self.doc = data;
                self.revisions.push(revision_id);
            }
            StateMessage::Patch { revision_id, ops } => {
                apply_patch(&mut self.doc, &ops).unwrap();
                self.revisions.push(revision_id);
            }
        }
    }
}

fn attach_mirror(engine: &FlowEngine) -> Arc<Mutex<Mirror>> {
    let mirror = Arc::new(Mutex::new(Mirror::default()));
    let sink = Arc::clone(&mirror);
    engine
        .broadcaster()
        .set_transport(move |text: &str| sink.lock().apply(text));
    mirror
}

#[test]
fn test_mirror_follows_full_then_patches() {
    let engine = FlowEngine::builder().build().unwrap();
    let mirror = attach_mirror(&engine);

    let mut state = AppState::default();
    engine.refresh_state(&mut state);
    let revision = engine.broadcaster().broadcast_full_state(&state).unwrap();
    assert_eq!(revision, 1);

    state.transport.bpm = 128.0;
    state.transport.is_playing = true;
    let sent = engine.broadcaster().broadcast_state_update(&state).unwrap();
    match sent {
        Broadcast::Patch {
            revision_id,
            op_count,
            ..
        } => {
            assert_eq!(revision_id, 2);
            assert_eq!(op_count, 2);
        }
        other => panic!("expected a patch, got {:?}", other),
    }

    assert_eq!(
        engine.broadcaster().broadcast_state_update(&state).unwrap(),
        Broadcast::Unchanged
    );

    let mirror = mirror.lock();
    assert_eq!(mirror.revisions, vec![1, 2]);
    assert_eq!(mirror.doc, state.to_value().unwrap());
    let rebuilt = AppState::from_value(mirror.doc.clone()).unwrap();
    assert_eq!(rebuilt.transport.bpm, 128.0);
    assert!(rebuilt.transport.is_playing);
}

#[test]
fn test_large_change_falls_back_to_full_snapshot() {
    let engine = FlowEngine::builder().build().unwrap();
    let mirror = attach_mirror(&engine);

    let mut state = AppState::default();
    engine.broadcaster().broadcast_full_state(&state).unwrap();

    state.ui = (0..30)
        .map(|i| (format!("panel{i}"), Value::Bool(true)))
        .collect();
    let sent = engine.broadcaster().broadcast_state_update(&state).unwrap();
    assert_eq!(sent, Broadcast::Full { revision_id: 2 });

    let mirror = mirror.lock();
    assert_eq!(mirror.doc, state.to_value().unwrap());
}

#[test]
fn test_ticker_streams_consecutive_revisions() {
    let engine = FlowEngine::builder()
        .retrospective_seconds(1.0)
        .broadcast_config(BroadcastConfig::default().with_tick_rate(200))
        .build()
        .unwrap();
    let mirror = attach_mirror(&engine);

    let mut bpm = 90.0;
    let mut ticker = engine
        .spawn_ticker(move || {
            let mut state = AppState::default();
            bpm = f64::min(bpm + 1.0, 95.0);
            state.transport.bpm = bpm;
            state
        })
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while ticker.ticks() < 10 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    ticker.stop();
    assert!(ticker.ticks() >= 10);

    let mirror = mirror.lock();
    assert_eq!(mirror.revisions, vec![1, 2, 3, 4, 5]);
    assert_eq!(mirror.doc["transport"]["bpm"], 95.0);
    assert_eq!(mirror.doc["looper"]["waveformData"].as_array().unwrap().len(), 256);
    assert_eq!(engine.broadcaster().revision_id(), 5);
}
