use colored::Colorize;

use slap_capture::session::{FingerprintResult, QualityBand, SessionStatus};

pub fn print_header(title: &str) {
    println!();
    println!("{}", format!("=== {} ===", title).bold().cyan());
}

pub fn print_pass(msg: &str) {
    println!("  {} {}", "[PASS]".bold().green(), msg);
}

pub fn print_fail(msg: &str) {
    println!("  {} {}", "[FAIL]".bold().red(), msg);
}

pub fn print_warn(msg: &str) {
    println!("  {} {}", "[WARN]".bold().yellow(), msg);
}

pub fn print_info(label: &str, value: &str) {
    println!("  {}: {}", label.bold(), value);
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "-->".bold().blue(), msg);
}

/// The status line, red when it carries an error marker.
pub fn print_status(status: &SessionStatus) {
    if status.is_error() {
        println!("  {} {}", "[STATUS]".bold().red(), status.text.red());
    } else {
        println!("  {} {}", "[STATUS]".bold().blue(), status.text);
    }
}

pub fn print_result(index: usize, result: &FingerprintResult) {
    let quality = result.quality.to_string();
    let quality = match result.quality_band() {
        QualityBand::Good => quality.green(),
        QualityBand::Fair => quality.yellow(),
        QualityBand::Poor => quality.red(),
    };
    println!();
    print_info(&format!("  Finger #{}", index + 1), result.position.label());
    println!("    {}: {}", "Quality".bold(), quality);
    print_info(
        "    Feature size",
        &format!("{} bytes", result.feature_data.len()),
    );
    print_info(
        "    Image",
        &format!("{}x{}", result.image.width(), result.image.height()),
    );
}
