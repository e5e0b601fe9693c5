use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde_json::json;

use slap_capture::session::{FingerprintResult, SessionController};
use slap_capture::CaptureMode;

use crate::output::*;

use super::{wait_with_status, Context};

pub struct CaptureOptions {
    pub mode: Option<CaptureMode>,
    pub save_dir: Option<PathBuf>,
    pub json: bool,
}

pub fn run_capture(ctx: &Context, opts: CaptureOptions) -> Result<()> {
    let mode = opts.mode.unwrap_or(ctx.config.default_mode);
    if !opts.json {
        print_header(&format!("Capture: {}", mode.label()));
    }

    let (mut controller, _) = ctx.start_session()?;
    if !controller.state().capture_enabled() {
        if opts.json {
            println!("{}", summary(&controller, mode, &[]));
        } else {
            print_status(controller.state().status());
            print_fail("Capture is disabled for this session");
        }
        return Ok(());
    }

    controller.open_device()?;
    report(&mut controller, opts.json);
    if controller.state().device().is_none() {
        if opts.json {
            println!("{}", summary(&controller, mode, &[]));
        }
        return Ok(());
    }

    if !opts.json {
        print_step(&format!("Place {} on the sensor", mode.label()));
    }
    controller.capture(mode)?;
    report(&mut controller, opts.json);

    let results = controller.state().results().to_vec();
    let saved = match &opts.save_dir {
        Some(dir) => save_images(dir, &results)?,
        None => Vec::new(),
    };

    if opts.json {
        println!("{}", summary_with_files(&controller, mode, &saved));
    } else if results.is_empty() {
        print_fail("No fingerprints captured");
    } else {
        print_pass(&format!("Captured: {} fingerprint(s)", results.len()));
        for (i, result) in results.iter().enumerate() {
            print_result(i, result);
            if let Some(path) = saved.get(i) {
                print_info("    Saved", &path.display().to_string());
            }
        }
    }

    controller.close_device()?;
    if !opts.json {
        print_status(controller.state().status());
    }
    Ok(())
}

fn report(controller: &mut SessionController, quiet: bool) {
    if quiet {
        while controller.state().is_busy() {
            controller.wait_for(std::time::Duration::from_millis(250));
        }
    } else {
        print_status(controller.state().status());
        wait_with_status(controller);
    }
}

fn save_images(dir: &Path, results: &[FingerprintResult]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut paths = Vec::with_capacity(results.len());
    for (i, result) in results.iter().enumerate() {
        let name = result.position.label().to_lowercase().replace(' ', "-");
        let path = dir.join(format!("finger-{}-{}.png", i + 1, name));
        result
            .image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

fn summary(
    controller: &SessionController,
    mode: CaptureMode,
    results: &[FingerprintResult],
) -> serde_json::Value {
    let state = controller.state();
    json!({
        "mode": mode,
        "status": state.status(),
        "device": state.device(),
        "results": results.iter().map(|r| json!({
            "position": r.position.label(),
            "quality": r.quality,
            "quality_band": r.quality_band(),
            "feature_bytes": r.feature_data.len(),
            "width": r.image.width(),
            "height": r.image.height(),
        })).collect::<Vec<_>>(),
    })
}

fn summary_with_files(
    controller: &SessionController,
    mode: CaptureMode,
    saved: &[PathBuf],
) -> serde_json::Value {
    let mut value = summary(controller, mode, controller.state().results());
    if let Some(results) = value["results"].as_array_mut() {
        for (entry, path) in results.iter_mut().zip(saved) {
            entry["file"] = json!(path.display().to_string());
        }
    }
    value
}
