use std::sync::Arc;
use std::time::Duration;

use slap_capture::device::runtime::SdkRuntime;
use slap_capture::device::simulated::{SimConfig, SimEvent, SimulatedDevice};
use slap_capture::device::ImageInfo;
use slap_capture::session::{SessionController, SessionSettings};
use slap_capture::{CaptureMode, RequestError};

const LIMIT: Duration = Duration::from_secs(10);

fn sim(events: Vec<SimEvent>) -> SimConfig {
    SimConfig {
        image_info: ImageInfo {
            width: 120,
            height: 90,
            resolution: 500,
        },
        events,
        event_delay: Duration::from_millis(5),
        ..SimConfig::default()
    }
}

fn start(config: SimConfig, emulator: bool) -> (SessionController, Arc<SimulatedDevice>) {
    let device = Arc::new(SimulatedDevice::new(config));
    let runtime = SdkRuntime::start(device.clone(), emulator);
    (
        SessionController::new(runtime, SessionSettings::default()),
        device,
    )
}

fn open(controller: &mut SessionController) {
    controller.open_device().unwrap();
    assert!(controller.wait_until_idle(LIMIT));
    assert!(controller.state().device().is_some());
}

#[test]
fn single_finger_progress_then_success() {
    let (mut c, _) = start(
        sim(vec![SimEvent::Progress, SimEvent::Success { segments: Some(1) }]),
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.wait_until_idle(LIMIT));

    let state = c.state();
    assert_eq!(state.status().text, "Successfully captured 1 fingerprint(s)!");
    assert!(!state.status().is_error());
    assert_eq!(state.results().len(), 1);
    assert_eq!(state.results()[0].position.label(), "Right Index");
    assert!(!state.results()[0].feature_data.is_empty());
}

#[test]
fn timeout_leaves_no_results() {
    let (mut c, _) = start(sim(vec![SimEvent::Timeout]), false);
    open(&mut c);
    c.capture(CaptureMode::BothThumbs).unwrap();
    assert!(c.wait_until_idle(LIMIT));

    let state = c.state();
    assert!(state.status().text.contains("Timeout"));
    assert!(state.status().is_error());
    assert!(state.results().is_empty());
    assert!(!state.is_capturing());
}

#[test]
fn wrong_count_names_mode_expectation() {
    for mode in CaptureMode::ALL {
        let (mut c, _) = start(sim(vec![SimEvent::WrongCount]), false);
        open(&mut c);
        c.capture(mode).unwrap();
        assert!(c.wait_until_idle(LIMIT));
        let text = &c.state().status().text;
        assert!(
            text.contains(&mode.expected_fingers().to_string()),
            "{mode}: {text}"
        );
    }
}

#[test]
fn four_finger_slap_yields_one_result_per_segment() {
    let (mut c, _) = start(sim(vec![SimEvent::Success { segments: None }]), false);
    open(&mut c);
    c.capture(CaptureMode::FourFingersLeft).unwrap();
    assert!(c.wait_until_idle(LIMIT));

    let results = c.state().results();
    assert_eq!(results.len(), 4);
    for r in results {
        assert!(r.quality <= 100);
        assert!(!r.position.label().is_empty());
    }
}

#[test]
fn unreadable_segments_produce_partial_results() {
    let (mut c, _) = start(
        SimConfig {
            unreadable_segments: 2,
            ..sim(vec![SimEvent::Success { segments: None }])
        },
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::FourFingersRight).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().results().len(), 2);
    assert_eq!(
        c.state().status().text,
        "Successfully captured 2 fingerprint(s)!"
    );
}

#[test]
fn undecodable_frame_reports_zero_results() {
    let (mut c, _) = start(
        SimConfig {
            decode_error: Some("codec missing".into()),
            ..sim(vec![SimEvent::Success { segments: Some(2) }])
        },
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::BothThumbs).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert!(c.state().results().is_empty());
    assert_eq!(
        c.state().status().text,
        "Successfully captured 0 fingerprint(s)!"
    );
}

#[test]
fn bogus_segment_count_is_survived() {
    let (mut c, _) = start(
        sim(vec![SimEvent::Success {
            segments: Some(i32::MAX as usize),
        }]),
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert!(!c.state().results().is_empty());
    assert!(c.state().results().len() <= 10);
    assert!(!c.state().status().is_error());
}

#[test]
fn decoder_panic_becomes_callback_error() {
    let (mut c, _) = start(
        SimConfig {
            decode_panic: Some("decoder blew up".into()),
            ..sim(vec![SimEvent::Progress, SimEvent::Success { segments: None }])
        },
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::FourFingersLeft).unwrap();
    assert!(c.wait_until_idle(LIMIT));

    let state = c.state();
    assert_eq!(state.status().text, "Error (callback): decoder blew up");
    assert!(!state.is_capturing());
    assert!(state.results().is_empty());
    assert!(state.device().is_some());
}

#[test]
fn empty_success_is_not_terminal() {
    let (mut c, _) = start(
        sim(vec![
            SimEvent::Success { segments: Some(0) },
            SimEvent::NoFinger,
        ]),
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().status().text, "Error: No fingers detected");
}

#[test]
fn low_quality_asks_for_retry() {
    let (mut c, _) = start(sim(vec![SimEvent::LowQuality]), false);
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().status().text, "Error: Low quality. Try again.");
}

#[test]
fn new_capture_clears_previous_results() {
    let (mut c, _) = start(sim(vec![SimEvent::Success { segments: None }]), false);
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().results().len(), 1);

    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(c.state().results().is_empty());
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().results().len(), 1);
}

#[test]
fn in_flight_flags_are_mutually_exclusive() {
    let (mut c, _) = start(
        sim(vec![SimEvent::Progress, SimEvent::Success { segments: None }]),
        false,
    );
    c.open_device().unwrap();
    while c.state().is_busy() {
        assert!(!(c.state().is_opening() && c.state().is_capturing()));
        assert_eq!(c.capture(CaptureMode::SingleFinger), Err(RequestError::Busy));
        c.wait_for(Duration::from_millis(5));
    }

    c.capture(CaptureMode::SingleFinger).unwrap();
    while c.state().is_busy() {
        assert!(c.state().is_capturing() && !c.state().is_opening());
        assert_eq!(c.open_device(), Err(RequestError::Busy));
        assert_eq!(c.close_device(), Err(RequestError::Busy));
        assert_eq!(c.capture(CaptureMode::SingleFinger), Err(RequestError::Busy));
        c.wait_for(Duration::from_millis(5));
    }
    assert!(!c.state().is_capturing());
}

#[test]
fn close_clears_everything_even_when_close_fails() {
    let (mut c, device) = start(
        SimConfig {
            close_error: Some("usb stall".into()),
            ..sim(vec![SimEvent::Success { segments: None }])
        },
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::BothThumbs).unwrap();
    assert!(c.wait_until_idle(LIMIT));
    assert_eq!(c.state().results().len(), 2);

    c.close_device().unwrap();
    assert!(c.state().results().is_empty());
    assert!(c.state().device().is_none());
    assert_eq!(c.state().status().text, "Device Closed");
    assert_eq!(device.close_calls(), 1);
    assert_eq!(c.capture(CaptureMode::BothThumbs), Err(RequestError::NotOpen));
}

#[test]
fn emulator_keeps_controls_disabled() {
    let (mut c, device) = start(sim(vec![SimEvent::Success { segments: None }]), true);
    assert!(c.state().status().is_error());
    assert!(!c.state().capture_enabled());

    assert_eq!(c.open_device(), Err(RequestError::Disabled));
    assert_eq!(c.capture(CaptureMode::SingleFinger), Err(RequestError::Disabled));
    assert_eq!(c.close_device(), Err(RequestError::Disabled));
    assert_eq!(c.select_mode(CaptureMode::BothThumbs), Err(RequestError::Disabled));
    c.pump();
    assert!(!c.state().can_open() && !c.state().can_capture() && !c.state().can_close());
    assert!(c.sdk_info().is_none());

    drop(c);
    assert_eq!(device.init_calls(), 0);
    assert_eq!(device.open_calls(), 0);
    assert_eq!(device.release_calls(), 0);
}

#[test]
fn initialisation_failure_disables_capture() {
    let (mut c, _) = start(
        SimConfig {
            init_error: Some("libtrust.so not found".into()),
            ..sim(vec![])
        },
        false,
    );
    assert_eq!(
        c.state().status().text,
        "Error: SDK initialization failed: libtrust.so not found"
    );
    assert_eq!(c.open_device(), Err(RequestError::Disabled));
}

#[test]
fn refused_capture_clears_in_flight_flag() {
    let (mut c, _) = start(
        SimConfig {
            capture_refused: Some("sensor busy".into()),
            ..sim(vec![])
        },
        false,
    );
    open(&mut c);
    c.capture(CaptureMode::SingleFinger).unwrap();
    assert!(!c.state().is_capturing());
    assert_eq!(c.state().status().text, "Error: sensor busy");
}

#[test]
fn teardown_releases_the_device_layer() {
    let (mut c, device) = start(sim(vec![]), false);
    open(&mut c);
    c.teardown();
    assert!(c.state().device().is_none());
    assert!(!c.state().capture_enabled());
    assert_eq!(device.close_calls(), 1);
    assert_eq!(device.release_calls(), 1);
}
