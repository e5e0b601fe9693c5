//! In-process stand-in for the vendor SDK.
//!
//! Produces a synthetic slap frame, encodes it as BMP and replays a scripted
//! sequence of capture events from a background thread, the way the real
//! library calls back from its own worker.

use std::f32::consts::PI;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{GrayImage, ImageFormat};
use tracing::debug;

use super::{
    CaptureCallback, CaptureParams, DeviceLayer, DeviceSession, ImageInfo, OpenListener,
    RawCaptureEvent, SegmentDescriptor,
};
use crate::error::{event_code, DeviceError};
use crate::mode::CaptureMode;

/// Bytes of synthetic template data per segment.
const FEATURE_LEN: usize = 512;

/// A slap never has more segments than hands have fingers.
const MAX_DESCRIPTORS: usize = 10;

/// One scripted callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Progress,
    /// Success reporting `segments` fingers; `None` uses the mode's count.
    Success { segments: Option<usize> },
    LowQuality,
    Timeout,
    NoFinger,
    WrongCount,
    Code(i32),
}

impl FromStr for SimEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(n) = s.strip_prefix("success:") {
            let segments = n
                .parse::<usize>()
                .ok()
                .filter(|&c| i32::try_from(c).is_ok())
                .ok_or_else(|| format!("invalid segment count '{}'", n))?;
            return Ok(SimEvent::Success {
                segments: Some(segments),
            });
        }
        match s {
            "progress" => Ok(SimEvent::Progress),
            "success" => Ok(SimEvent::Success { segments: None }),
            "low-quality" => Ok(SimEvent::LowQuality),
            "timeout" => Ok(SimEvent::Timeout),
            "no-finger" => Ok(SimEvent::NoFinger),
            "wrong-count" => Ok(SimEvent::WrongCount),
            other => other
                .parse::<i32>()
                .map(SimEvent::Code)
                .map_err(|_| format!("unknown simulated event '{}'", other)),
        }
    }
}

/// Parse a comma separated event script such as `progress,success:2`.
pub fn parse_script(script: &str) -> Result<Vec<SimEvent>, String> {
    script
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(SimEvent::from_str)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub device_count: usize,
    pub sdk_version: String,
    pub algorithm_version: String,
    pub image_info: ImageInfo,
    pub init_error: Option<String>,
    /// Reported through the open listener.
    pub open_error: Option<String>,
    /// Returned synchronously from `open`.
    pub open_refused: Option<String>,
    pub capture_refused: Option<String>,
    pub close_error: Option<String>,
    pub decode_error: Option<String>,
    /// The decoder panics with this message, like a crashing native library.
    pub decode_panic: Option<String>,
    pub decode_delay: Duration,
    pub quality_error: Option<String>,
    /// Descriptors withheld from a success event while still counted.
    pub unreadable_segments: usize,
    /// Empty means the capture callback is never invoked.
    pub events: Vec<SimEvent>,
    pub event_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_count: 1,
            sdk_version: "sim-1.0.0".to_string(),
            algorithm_version: "sim-alg-1.0".to_string(),
            image_info: ImageInfo {
                width: 1600,
                height: 1500,
                resolution: 500,
            },
            init_error: None,
            open_error: None,
            open_refused: None,
            capture_refused: None,
            close_error: None,
            decode_error: None,
            decode_panic: None,
            decode_delay: Duration::ZERO,
            quality_error: None,
            unreadable_segments: 0,
            events: vec![SimEvent::Progress, SimEvent::Success { segments: None }],
            event_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    init: AtomicUsize,
    release: AtomicUsize,
    open: AtomicUsize,
    capture: AtomicUsize,
    close: AtomicUsize,
    decode: AtomicUsize,
    params: Mutex<Vec<CaptureParams>>,
}

pub struct SimulatedDevice {
    config: Arc<SimConfig>,
    counters: Arc<Counters>,
}

impl SimulatedDevice {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn init_calls(&self) -> usize {
        self.counters.init.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.counters.release.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.counters.capture.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.counters.close.load(Ordering::SeqCst)
    }

    /// Frames that finished going through `raw_to_bmp`.
    pub fn decode_calls(&self) -> usize {
        self.counters.decode.load(Ordering::SeqCst)
    }

    /// Parameters of every capture request received so far.
    pub fn capture_params(&self) -> Vec<CaptureParams> {
        self.counters
            .params
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl DeviceLayer for SimulatedDevice {
    fn initialize(&self) -> Result<(), DeviceError> {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
        match &self.config.init_error {
            Some(msg) => Err(DeviceError::new(msg.clone())),
            None => Ok(()),
        }
    }

    fn sdk_version(&self) -> String {
        self.config.sdk_version.clone()
    }

    fn algorithm_version(&self) -> String {
        self.config.algorithm_version.clone()
    }

    fn device_count(&self) -> Result<usize, DeviceError> {
        Ok(self.config.device_count)
    }

    fn open(&self, index: usize, listener: OpenListener) -> Result<(), DeviceError> {
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.config.open_refused {
            return Err(DeviceError::new(msg.clone()));
        }
        if index >= self.config.device_count {
            return Err(DeviceError::new(format!("no device at index {}", index)));
        }

        let config = self.config.clone();
        let counters = self.counters.clone();
        thread::spawn(move || {
            thread::sleep(config.event_delay);
            let result = match &config.open_error {
                Some(msg) => Err(DeviceError::new(msg.clone())),
                None => {
                    let session: Arc<dyn DeviceSession> = Arc::new(SimulatedSession {
                        config: config.clone(),
                        counters,
                        closed: AtomicBool::new(false),
                    });
                    Ok(session)
                }
            };
            listener(result);
        });
        Ok(())
    }

    fn release(&self) {
        self.counters.release.fetch_add(1, Ordering::SeqCst);
    }
}

struct SimulatedSession {
    config: Arc<SimConfig>,
    counters: Arc<Counters>,
    closed: AtomicBool,
}

impl SimulatedSession {
    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::new("device closed"));
        }
        Ok(())
    }
}

impl DeviceSession for SimulatedSession {
    fn image_info(&self) -> Result<ImageInfo, DeviceError> {
        self.ensure_open()?;
        Ok(self.config.image_info)
    }

    fn multi_finger_capture(
        &self,
        params: CaptureParams,
        mut callback: CaptureCallback,
    ) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.counters.capture.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.counters.params.lock() {
            p.push(params);
        }
        if let Some(msg) = &self.config.capture_refused {
            return Err(DeviceError::new(msg.clone()));
        }

        let mode = CaptureMode::ALL
            .into_iter()
            .find(|m| m.input_image_type() == params.input_image_type)
            .unwrap_or_default();
        let config = self.config.clone();
        thread::spawn(move || {
            for event in &config.events {
                thread::sleep(config.event_delay);
                let raw = build_event(&config, mode, *event);
                debug!(code = raw.code, "simulated capture event");
                callback(raw);
            }
        });
        Ok(())
    }

    fn raw_to_bmp(&self, raw: &[u8], info: ImageInfo) -> Result<Vec<u8>, DeviceError> {
        self.ensure_open()?;
        if let Some(msg) = &self.config.decode_panic {
            panic!("{}", msg);
        }
        if let Some(msg) = &self.config.decode_error {
            return Err(DeviceError::new(msg.clone()));
        }
        thread::sleep(self.config.decode_delay);
        let img = GrayImage::from_raw(info.width, info.height, raw.to_vec()).ok_or_else(|| {
            DeviceError::new(format!(
                "raw buffer of {} bytes does not match {}x{}",
                raw.len(),
                info.width,
                info.height
            ))
        })?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Bmp)
            .map_err(|e| DeviceError::new(format!("BMP encode failed: {}", e)))?;
        self.counters.decode.fetch_add(1, Ordering::SeqCst);
        Ok(out.into_inner())
    }

    fn bmp_quality(&self, bmp: &[u8]) -> Result<u8, DeviceError> {
        if let Some(msg) = &self.config.quality_error {
            return Err(DeviceError::new(msg.clone()));
        }
        let img = image::load_from_memory_with_format(bmp, ImageFormat::Bmp)
            .map_err(|e| DeviceError::new(format!("BMP decode failed: {}", e)))?
            .to_luma8();
        Ok(contrast_score(&img))
    }

    fn close(&self) -> Result<(), DeviceError> {
        self.counters.close.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        match &self.config.close_error {
            Some(msg) => Err(DeviceError::new(msg.clone())),
            None => Ok(()),
        }
    }
}

fn build_event(config: &SimConfig, mode: CaptureMode, event: SimEvent) -> RawCaptureEvent {
    match event {
        SimEvent::Progress => RawCaptureEvent::with_code(event_code::PROGRESS),
        SimEvent::LowQuality => RawCaptureEvent::with_code(event_code::LOW_QUALITY),
        SimEvent::Timeout => RawCaptureEvent::with_code(event_code::TIMEOUT),
        SimEvent::NoFinger => RawCaptureEvent::with_code(event_code::NO_FINGER),
        SimEvent::WrongCount => RawCaptureEvent::with_code(event_code::WRONG_FINGER_COUNT),
        SimEvent::Code(code) => RawCaptureEvent::with_code(code),
        SimEvent::Success { segments } => {
            let positions = mode.finger_positions();
            let count = segments.unwrap_or(positions.len());
            let readable = count
                .saturating_sub(config.unreadable_segments)
                .min(MAX_DESCRIPTORS);
            let segments = (0..readable)
                .map(|i| SegmentDescriptor {
                    finger_position: positions
                        .get(i)
                        .map(|p| p.code())
                        .unwrap_or(0),
                    feature_data: Some(feature_bytes(i)),
                })
                .collect();
            RawCaptureEvent {
                code: event_code::SUCCESS,
                raw_data: synth_frame(config.image_info, count),
                segments,
                segment_count: i32::try_from(count).unwrap_or(i32::MAX),
            }
        }
    }
}

fn feature_bytes(seed: usize) -> Vec<u8> {
    (0..FEATURE_LEN)
        .map(|i| ((i * 31 + seed * 97) % 251) as u8)
        .collect()
}

/// Synthetic slap: `fingers` elliptical ridge patches on a white field.
fn synth_frame(info: ImageInfo, fingers: usize) -> Vec<u8> {
    let (w, h) = (info.width as usize, info.height as usize);
    let mut frame = vec![255u8; w * h];
    if fingers == 0 || w == 0 || h == 0 {
        return frame;
    }
    let fingers = fingers.min(w);

    let slot = w as f32 / fingers as f32;
    let rx = slot * 0.35;
    let ry = h as f32 * 0.4;
    let period = (info.resolution as f32 / 50.0).max(4.0);

    for f in 0..fingers {
        let cx = slot * (f as f32 + 0.5);
        let cy = h as f32 * 0.5;
        let angle = 0.3 + f as f32 * 0.2;
        let (sin, cos) = angle.sin_cos();
        let x0 = (cx - rx).max(0.0) as usize;
        let x1 = ((cx + rx) as usize).min(w);
        let y0 = (cy - ry).max(0.0) as usize;
        let y1 = ((cy + ry) as usize).min(h);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = (x as f32 - cx) / rx;
                let dy = (y as f32 - cy) / ry;
                if dx * dx + dy * dy > 1.0 {
                    continue;
                }
                let t = (x as f32 * cos + y as f32 * sin) * 2.0 * PI / period;
                frame[y * w + x] = (128.0 + 100.0 * t.sin()) as u8;
            }
        }
    }
    frame
}

/// Quality from global contrast: standard deviation of 128 maps to 100.
fn contrast_score(img: &GrayImage) -> u8 {
    let n = img.as_raw().len();
    if n == 0 {
        return 0;
    }
    let mean = img.as_raw().iter().map(|&p| p as f64).sum::<f64>() / n as f64;
    let var = img
        .as_raw()
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    (var.sqrt() * 100.0 / 128.0).clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn small_config() -> SimConfig {
        SimConfig {
            image_info: ImageInfo {
                width: 64,
                height: 48,
                resolution: 500,
            },
            event_delay: Duration::from_millis(1),
            ..SimConfig::default()
        }
    }

    #[test]
    fn parses_scripts() {
        let script = parse_script("progress, success:2,timeout,-8").unwrap();
        assert_eq!(
            script,
            vec![
                SimEvent::Progress,
                SimEvent::Success { segments: Some(2) },
                SimEvent::Timeout,
                SimEvent::Code(-8),
            ]
        );
        assert!(parse_script("bogus").is_err());
        assert!(parse_script("success:x").is_err());
        assert!(parse_script("success:4294967296").is_err());
        assert!(parse_script("success:2147483647").is_ok());
    }

    #[test]
    fn success_event_carries_mode_positions() {
        let config = small_config();
        let raw = build_event(
            &config,
            CaptureMode::FourFingersLeft,
            SimEvent::Success { segments: None },
        );
        assert_eq!(raw.code, event_code::SUCCESS);
        assert_eq!(raw.segment_count, 4);
        let codes: Vec<i32> = raw.segments.iter().map(|s| s.finger_position).collect();
        assert_eq!(codes, vec![7, 8, 9, 10]);
        assert_eq!(raw.raw_data.len(), 64 * 48);
    }

    #[test]
    fn oversized_count_is_reported_but_not_delivered() {
        let config = small_config();
        let raw = build_event(
            &config,
            CaptureMode::SingleFinger,
            SimEvent::Success {
                segments: Some(i32::MAX as usize),
            },
        );
        assert_eq!(raw.segment_count, i32::MAX);
        assert_eq!(raw.segments.len(), MAX_DESCRIPTORS);
    }

    #[test]
    fn unreadable_segments_are_withheld() {
        let config = SimConfig {
            unreadable_segments: 1,
            ..small_config()
        };
        let raw = build_event(
            &config,
            CaptureMode::BothThumbs,
            SimEvent::Success { segments: None },
        );
        assert_eq!(raw.segment_count, 2);
        assert_eq!(raw.segments.len(), 1);
    }

    #[test]
    fn bmp_round_trip_scores_quality() {
        let config = small_config();
        let session = SimulatedSession {
            config: Arc::new(config.clone()),
            counters: Arc::new(Counters::default()),
            closed: AtomicBool::new(false),
        };
        let raw = synth_frame(config.image_info, 1);
        let bmp = session.raw_to_bmp(&raw, config.image_info).unwrap();
        assert_eq!(&bmp[..2], b"BM");
        let q = session.bmp_quality(&bmp).unwrap();
        assert!(q > 0 && q <= 100, "quality {q}");
        assert!(session.raw_to_bmp(&raw[1..], config.image_info).is_err());
        assert_eq!(session.counters.decode.load(Ordering::SeqCst), 1);

        session.close().unwrap();
        assert!(session.raw_to_bmp(&raw, config.image_info).is_err());
    }

    #[test]
    fn open_reports_through_listener() {
        let sim = SimulatedDevice::new(small_config());
        let (tx, rx) = mpsc::channel();
        sim.open(
            0,
            Box::new(move |res| {
                let _ = tx.send(res.map(|s| s.image_info()));
            }),
        )
        .unwrap();
        let info = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap().unwrap();
        assert_eq!(info.width, 64);
        assert!(sim.open(3, Box::new(|_| {})).is_err());
    }
}
