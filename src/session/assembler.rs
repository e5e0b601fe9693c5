use std::sync::Arc;

use image::{GrayImage, ImageFormat};
use tracing::{debug, warn};

use crate::device::{DeviceSession, RawCaptureEvent};
use crate::error::CaptureError;
use crate::finger::FingerPosition;

use super::state::FingerprintResult;

/// Output of one assembly pass. `skipped` holds the per-segment failures
/// that were dropped from `results`.
#[derive(Debug, Default)]
pub struct Assembly {
    pub results: Vec<FingerprintResult>,
    pub skipped: Vec<CaptureError>,
}

/// Build one result per reported segment of a successful capture.
///
/// Pixels come from the full-frame buffer, decoded once and shared by every
/// segment; per-segment image pointers are not trusted after the callback
/// returns. Quality is scored once on the whole frame, falling back to 0 when
/// scoring fails. A segment that cannot be read or decoded is skipped.
/// Segments counted by the device but never delivered are recorded as a
/// single skip, whatever the reported count.
pub fn assemble(
    session: &dyn DeviceSession,
    event: &RawCaptureEvent,
    segments: usize,
) -> Assembly {
    let mut out = Assembly::default();

    let frame = decode_frame(session, &event.raw_data);
    let quality = match &frame {
        Ok((_, bmp)) => session.bmp_quality(bmp).unwrap_or_else(|e| {
            warn!(error = %e, "whole-frame quality scoring failed");
            0
        }),
        Err(_) => 0,
    }
    .min(100);

    let delivered = segments.min(event.segments.len());
    for (index, desc) in event.segments[..delivered].iter().enumerate() {
        let image = match &frame {
            Ok((image, _)) => image.clone(),
            Err(reason) => {
                out.skipped.push(CaptureError::Decode {
                    index,
                    reason: reason.clone(),
                });
                continue;
            }
        };
        out.results.push(FingerprintResult {
            image,
            quality,
            feature_data: desc.feature_data.clone().unwrap_or_default(),
            position: FingerPosition::from_code(desc.finger_position),
        });
    }

    if segments > delivered {
        out.skipped.push(CaptureError::Decode {
            index: delivered,
            reason: format!("{} segment descriptor(s) unavailable", segments - delivered),
        });
    }

    for err in &out.skipped {
        warn!(%err, "segment skipped");
    }
    debug!(
        assembled = out.results.len(),
        skipped = out.skipped.len(),
        quality,
        "capture assembled"
    );
    out
}

/// Decode the full frame into a raster plus the encoded BMP it came from.
fn decode_frame(
    session: &dyn DeviceSession,
    raw: &[u8],
) -> Result<(Arc<GrayImage>, Vec<u8>), String> {
    let info = session.image_info().map_err(|e| e.to_string())?;
    let bmp = session.raw_to_bmp(raw, info).map_err(|e| e.to_string())?;
    let image = image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)
        .map_err(|e| format!("BMP decode failed: {}", e))?
        .to_luma8();
    Ok((Arc::new(image), bmp))
}
