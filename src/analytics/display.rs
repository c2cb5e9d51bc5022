//! Human-readable sizes and durations

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with a 1024 base, two decimals and trailing zeros trimmed
///
/// Negative, NaN and zero sizes all format as `0 Bytes`.
pub fn format_file_size(bytes: f64) -> String {
    if bytes.is_nan() || bytes <= 0.0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{:.2}", value);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// `Xm Ys` above one minute, `Xs` otherwise
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_processing_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds > 60.0 {
        let whole = seconds.floor() as u64;
        format!("{}m {}s", whole / 60, whole % 60)
    } else {
        format!("{}s", seconds.floor() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sizes() {
        assert_eq!(format_file_size(0.0), "0 Bytes");
        assert_eq!(format_file_size(-5.0), "0 Bytes");
        assert_eq!(format_file_size(f64::NAN), "0 Bytes");
        assert_eq!(format_file_size(512.0), "512 Bytes");
        assert_eq!(format_file_size(1024.0), "1 KB");
        assert_eq!(format_file_size(1536.0), "1.5 KB");
        assert_eq!(format_file_size(1_300_000.0), "1.24 MB");
        assert_eq!(format_file_size(5.0 * 1024.0 * 1024.0 * 1024.0), "5 GB");
        assert_eq!(format_file_size(3.0 * 1024f64.powi(4)), "3072 GB");
    }

    #[test]
    fn test_processing_time() {
        assert_eq!(format_processing_time(0.0), "0s");
        assert_eq!(format_processing_time(12.9), "12s");
        assert_eq!(format_processing_time(60.0), "60s");
        assert_eq!(format_processing_time(125.4), "2m 5s");
    }
}
