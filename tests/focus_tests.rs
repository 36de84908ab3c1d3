//! Focus Mode Integration Tests
//!
//! Focus chains driven through the command surface: lifecycle, styling,
//! composition with ducking, capture conflicts.

use approx::assert_abs_diff_eq;
use serde_json::json;
use test_case::test_case;

use duckit::focus::{FocusChain, FocusStyle, ImpulseGenerator};
use duckit::host::{AudioParamTarget, BiquadKind, ElementId, MediaKind};
use duckit::sim::{RecordingSink, SimAudio, SimDocument};
use duckit::{AudioBackend, AudioSensor, MediaHost};

type Sensor = AudioSensor<SimDocument, SimAudio, RecordingSink>;

fn sensor() -> Sensor {
    let mut sensor = AudioSensor::new(SimDocument::new(), SimAudio::new(), RecordingSink::new())
        .with_impulses(ImpulseGenerator::with_seed(11));
    sensor.start();
    sensor
}

fn playing(sensor: &mut Sensor, kind: MediaKind, volume: f64) -> ElementId {
    let el = match kind {
        MediaKind::Audio => sensor.host_mut().add_audio(),
        MediaKind::Video => sensor.host_mut().add_video(),
    };
    sensor.host_mut().set_volume(el, volume).unwrap();
    sensor.host_mut().play(el).unwrap();
    sensor.pump();
    el
}

fn enable(sensor: &mut Sensor, style: &str) {
    sensor.handle_command(&json!({"type": "ENABLE_FOCUS", "style": style}));
}

fn chain(sensor: &Sensor, el: ElementId) -> FocusChain {
    *sensor.state().focus.engine(el).unwrap().chain()
}

fn gain(sensor: &Sensor, node: duckit::host::AudioNodeId) -> f32 {
    sensor.backend().param_value(AudioParamTarget::gain(node)).unwrap()
}

fn frequency(sensor: &Sensor, node: duckit::host::AudioNodeId) -> f32 {
    sensor
        .backend()
        .param_value(AudioParamTarget::frequency(node))
        .unwrap()
}

// === Lifecycle ===

#[test]
fn test_enable_attaches_playing_element() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");

    let focus = &sensor.state().focus;
    assert!(focus.is_attached(el));
    assert_eq!(focus.style(), FocusStyle::Muffle);

    let c = chain(&sensor, el);
    let dest = sensor.backend().destination(focus.engine(el).unwrap().context()).unwrap();
    assert!(sensor.backend().is_connected(c.source, c.filter));
    assert!(sensor.backend().is_connected(c.duck_gain, dest));
    assert!(!sensor.backend().is_connected(c.source, dest));
}

#[test]
fn test_focus_context_is_not_page_audio() {
    let mut sensor = sensor();
    playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "far_away");
    assert_eq!(sensor.state().interceptor.graph_count(), 0);
    assert_eq!(sensor.backend().context_count(), 1);
}

#[test]
fn test_element_attached_when_it_starts_playing() {
    let mut sensor = sensor();
    enable(&mut sensor, "muffle");
    let el = playing(&mut sensor, MediaKind::Video, 1.0);
    assert!(sensor.state().focus.is_attached(el));
}

#[test]
fn test_repeated_enable_is_idempotent() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "far_away");
    let nodes = sensor.backend().node_count();
    let convolver = chain(&sensor, el).convolver;
    assert_eq!(sensor.backend().convolver_writes(convolver), 1);

    enable(&mut sensor, "far_away");
    assert_eq!(sensor.backend().node_count(), nodes);
    assert_eq!(sensor.backend().convolver_writes(convolver), 1);
    assert_eq!(sensor.state().focus.active_count(), 1);
    assert_eq!(sensor.backend().media_source_count(), 1);
}

#[test]
fn test_disable_reconnects_raw_source() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");
    let c = chain(&sensor, el);
    let ctx = sensor.state().focus.engine(el).unwrap().context();

    sensor.handle_command(&json!({"type": "DISABLE_FOCUS"}));
    let dest = sensor.backend().destination(ctx).unwrap();
    assert!(!sensor.state().focus.is_attached(el));
    assert_eq!(sensor.backend().outputs(c.source), vec![dest]);
    assert!(sensor.backend().outputs(c.duck_gain).is_empty());
}

#[test]
fn test_disable_then_enable_matches_single_enable() {
    let mut once = sensor();
    let a = playing(&mut once, MediaKind::Audio, 1.0);
    enable(&mut once, "focus_background");

    let mut twice = sensor();
    let b = playing(&mut twice, MediaKind::Audio, 1.0);
    enable(&mut twice, "focus_background");
    twice.handle_command(&json!({"type": "DISABLE_FOCUS"}));
    enable(&mut twice, "focus_background");

    once.backend_mut().advance(2.0);
    twice.backend_mut().advance(2.0);

    let (ca, cb) = (chain(&once, a), chain(&twice, b));
    assert_eq!(once.backend().biquad_type(ca.filter), twice.backend().biquad_type(cb.filter));
    assert_abs_diff_eq!(frequency(&once, ca.filter), frequency(&twice, cb.filter), epsilon = 1e-3);
    assert_abs_diff_eq!(frequency(&once, ca.wet_tone), frequency(&twice, cb.wet_tone), epsilon = 1e-3);
    for (x, y) in [
        (ca.dry_gain, cb.dry_gain),
        (ca.wet_gain, cb.wet_gain),
        (ca.focus_gain, cb.focus_gain),
        (ca.duck_gain, cb.duck_gain),
    ] {
        assert_abs_diff_eq!(gain(&once, x), gain(&twice, y), epsilon = 1e-5);
    }
    // Captured source was reused, not captured twice
    assert_eq!(twice.backend().media_source_count(), 1);
}

#[test]
fn test_short_audio_clip_skipped_but_video_kept() {
    let mut sensor = sensor();
    let sfx = sensor.host_mut().add_audio();
    sensor.host_mut().set_duration(sfx, 1.5).unwrap();
    sensor.host_mut().play(sfx).unwrap();
    let clip = sensor.host_mut().add_video();
    sensor.host_mut().set_duration(clip, 1.5).unwrap();
    sensor.host_mut().play(clip).unwrap();
    sensor.pump();

    enable(&mut sensor, "muffle");
    assert!(!sensor.state().focus.is_attached(sfx));
    assert!(sensor.state().focus.is_attached(clip));
}

#[test]
fn test_element_detached_when_it_stops_qualifying() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");
    assert!(sensor.state().focus.is_attached(el));

    sensor.host_mut().set_duration(el, 2.0).unwrap();
    sensor.pump();
    assert!(!sensor.state().focus.is_attached(el));
}

#[test]
fn test_removed_element_drops_chain() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Video, 1.0);
    enable(&mut sensor, "muffle");
    sensor.host_mut().detach(el);
    sensor.pump();
    assert_eq!(sensor.state().focus.active_count(), 0);
}

// === Styling ===

#[test_case("normal", BiquadKind::Lowpass, 22_000.0 ; "normal bypasses")]
#[test_case("muffle", BiquadKind::Lowpass, 800.0 ; "muffle")]
#[test_case("voice_band", BiquadKind::Bandpass, 1_000.0 ; "voice band")]
#[test_case("no_such_style", BiquadKind::Lowpass, 22_000.0 ; "unknown is normal")]
fn test_style_filter_settles(style: &str, kind: BiquadKind, freq: f32) {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, style);
    sensor.backend_mut().advance(3.0);

    let c = chain(&sensor, el);
    assert_eq!(sensor.backend().biquad_type(c.filter), Some(kind));
    assert_abs_diff_eq!(frequency(&sensor, c.filter), freq, epsilon = 0.5);
}

#[test]
fn test_style_change_ramps_instead_of_snapping() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "normal");
    sensor.backend_mut().advance(3.0);
    let c = chain(&sensor, el);
    assert_abs_diff_eq!(gain(&sensor, c.focus_gain), 1.0, epsilon = 1e-4);

    sensor.handle_command(&json!({"type": "SET_FOCUS_STYLE", "style": "far_away"}));
    assert_abs_diff_eq!(gain(&sensor, c.focus_gain), 1.0, epsilon = 1e-4);

    // One time constant later: 63% of the way to 0.7
    sensor.backend_mut().advance(0.1);
    let expected = 0.7 + 0.3 * (-1.0_f32).exp();
    assert_abs_diff_eq!(gain(&sensor, c.focus_gain), expected, epsilon = 1e-3);
}

#[test]
fn test_impulse_regenerated_only_on_style_change() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");
    let convolver = chain(&sensor, el).convolver;
    assert_eq!(sensor.backend().convolver_writes(convolver), 0);

    sensor.handle_command(&json!({"type": "SET_FOCUS_STYLE", "style": "soft_room"}));
    assert_eq!(sensor.backend().convolver_writes(convolver), 1);
    let impulse = sensor.backend().convolver_buffer(convolver).unwrap();
    assert_eq!(impulse.num_channels(), 2);
    assert_eq!(impulse.channel(0), impulse.channel(1));

    sensor.handle_command(&json!({"type": "SET_FOCUS_STYLE", "style": "soft_room"}));
    assert_eq!(sensor.backend().convolver_writes(convolver), 1);

    sensor.handle_command(&json!({"type": "SET_FOCUS_STYLE", "style": "far_away"}));
    assert_eq!(sensor.backend().convolver_writes(convolver), 2);
}

// === Composition with Ducking ===

#[test]
fn test_volume_duck_goes_through_duck_gain() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");
    let c = chain(&sensor, el);

    sensor.handle_command(&json!({"type": "SET_VOLUME", "value": 0.2}));
    sensor.backend_mut().advance(2.0);
    assert_eq!(sensor.host().volume(el), Some(1.0));
    assert_abs_diff_eq!(gain(&sensor, c.duck_gain), 0.2, epsilon = 1e-4);

    sensor.handle_command(&json!({"type": "RESTORE_VOLUME"}));
    sensor.backend_mut().advance(2.0);
    assert_abs_diff_eq!(gain(&sensor, c.duck_gain), 1.0, epsilon = 1e-4);
}

#[test]
fn test_enable_while_ducked_hands_volume_to_chain() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 0.8);
    sensor.handle_command(&json!({"type": "SET_VOLUME", "value": 0.5}));
    assert_abs_diff_eq!(sensor.host().volume(el).unwrap(), 0.4, epsilon = 1e-6);

    enable(&mut sensor, "muffle");
    sensor.backend_mut().advance(2.0);
    let c = chain(&sensor, el);
    assert_eq!(sensor.host().volume(el), Some(0.8));
    assert_abs_diff_eq!(gain(&sensor, c.duck_gain), 0.5, epsilon = 1e-4);

    sensor.handle_command(&json!({"type": "RESTORE_VOLUME"}));
    assert_eq!(sensor.host().volume(el), Some(0.8));
}

#[test]
fn test_disable_while_ducked_falls_back_to_volume() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "muffle");
    sensor.handle_command(&json!({"type": "SET_VOLUME", "value": 0.5}));
    assert_eq!(sensor.host().volume(el), Some(1.0));

    sensor.handle_command(&json!({"type": "DISABLE_FOCUS"}));
    assert_abs_diff_eq!(sensor.host().volume(el).unwrap(), 0.5, epsilon = 1e-6);

    sensor.handle_command(&json!({"type": "RESTORE_VOLUME"}));
    assert_eq!(sensor.host().volume(el), Some(1.0));
}

#[test]
fn test_capture_conflict_keeps_volume_ducking() {
    let mut sensor = sensor();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    // The page captured the element itself
    sensor.backend_mut().claim_element(el);

    enable(&mut sensor, "muffle");
    assert!(!sensor.state().focus.is_attached(el));
    assert!(sensor.state().focus.has_failed(el));

    sensor.handle_command(&json!({"type": "SET_VOLUME", "value": 0.2}));
    assert_abs_diff_eq!(sensor.host().volume(el).unwrap(), 0.2, epsilon = 1e-6);

    // Later attaches stay no-ops even once the capture is released
    sensor.backend_mut().release_element(el);
    enable(&mut sensor, "muffle");
    assert!(!sensor.state().focus.is_attached(el));
}

#[test]
fn test_unsupported_environment_is_silent() {
    let mut sensor = AudioSensor::new(SimDocument::new(), SimAudio::unsupported(), RecordingSink::new());
    sensor.start();
    let el = playing(&mut sensor, MediaKind::Audio, 1.0);
    enable(&mut sensor, "far_away");
    assert!(!sensor.state().focus.is_attached(el));
    assert!(sensor.audio().create_context().is_err());

    sensor.handle_command(&json!({"type": "SET_VOLUME", "value": 0.5}));
    assert_abs_diff_eq!(sensor.host().volume(el).unwrap(), 0.5, epsilon = 1e-6);
    assert!(sensor.is_audible());
}
