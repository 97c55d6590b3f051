//! Allocation-free render path tests.
//!
//! The renderer runs on the audio device thread, so nothing it does once
//! warmed up may touch the heap: not steady playback, not a seek, not a
//! gain or source swap published from the control side, not end of stream.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use sp_master::{Controller, ControllerConfig, LayoutPreset, PlaybackState, Renderer, SpeakerLayout};

const RATE: u32 = 48_000;
const BUFFER: usize = 256;

fn tone(frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / RATE as f32).sin() * 0.5)
        .collect()
}

fn playing_controller(output_channels: Option<u16>) -> (Controller, Renderer, Vec<f32>) {
    let layout = SpeakerLayout::preset(LayoutPreset::Surround50).unwrap();
    let config = ControllerConfig {
        output_channels,
        block_frames: 128,
        ..Default::default()
    };
    let mut ctrl = Controller::new(layout, config).unwrap();
    ctrl.load(tone(RATE as usize), RATE).unwrap();
    let mut renderer = ctrl.renderer();
    let mut out = vec![0.0; BUFFER * ctrl.output_channels()];

    // First load on this thread registers arc-swap bookkeeping.
    renderer.render(&mut out);
    ctrl.play().unwrap();
    (ctrl, renderer, out)
}

#[test]
fn steady_playback_alloc_free() {
    let (_ctrl, mut renderer, mut out) = playing_controller(None);
    assert_no_alloc(|| {
        for _ in 0..50 {
            renderer.render(&mut out);
        }
    });
    assert!(out.iter().any(|&s| s != 0.0));
}

#[test]
fn direction_and_volume_changes_alloc_free() {
    let (mut ctrl, mut renderer, mut out) = playing_controller(None);
    for step in 0..36 {
        ctrl.select_direction(step as f32 * 10.0).unwrap();
        ctrl.set_volume(1.0 - step as f32 / 36.0);
        assert_no_alloc(|| renderer.render(&mut out));
    }
}

#[test]
fn folded_output_alloc_free() {
    let (mut ctrl, mut renderer, mut out) = playing_controller(Some(2));
    ctrl.select_direction("Rear Right").unwrap();
    assert_no_alloc(|| {
        for _ in 0..20 {
            renderer.render(&mut out);
        }
    });
}

#[test]
fn seek_and_source_swap_alloc_free() {
    let (mut ctrl, mut renderer, mut out) = playing_controller(None);
    ctrl.seek(RATE as usize / 2).unwrap();
    assert_no_alloc(|| renderer.render(&mut out));

    ctrl.load(tone(RATE as usize / 4), RATE).unwrap();
    assert_no_alloc(|| renderer.render(&mut out));
    assert_eq!(ctrl.position_frames(), BUFFER);
}

#[test]
fn end_of_stream_alloc_free() {
    let (ctrl, mut renderer, mut out) = playing_controller(None);
    assert_no_alloc(|| {
        // One second of source, 256-frame buffers: 188 buffers run it out.
        for _ in 0..200 {
            renderer.render(&mut out);
        }
    });
    assert_eq!(ctrl.state(), PlaybackState::Idle);
}

#[test]
fn burst_of_reloads_alloc_free() {
    let (mut ctrl, mut renderer, mut out) = playing_controller(None);
    renderer.render(&mut out);

    // Many loads inside one render period: the renderer's reference to the
    // first source must not be the last one when it moves on.
    for _ in 0..10 {
        ctrl.load(tone(RATE as usize / 10), RATE).unwrap();
    }
    assert_no_alloc(|| {
        for _ in 0..4 {
            renderer.render(&mut out);
        }
    });
    assert!(ctrl.is_playing());
}
