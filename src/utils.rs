use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// "1.46 GB" style label, 1024-based, at most two decimals.
pub fn human_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut exp = 0;
    while value >= 1024.0 && exp < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        exp += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[exp])
}

/// Parse a "<number> <MB|GB>" label into gigabytes. Anything else counts as zero.
pub fn size_label_to_gb(label: &str) -> f64 {
    let mut parts = label.split_whitespace();
    let (Some(number), Some(unit)) = (parts.next(), parts.next()) else {
        return 0.0;
    };
    let Ok(value) = number.parse::<f64>() else {
        return 0.0;
    };
    if !value.is_finite() {
        return 0.0;
    }
    match unit {
        "MB" => value / 1024.0,
        "GB" => value,
        _ => 0.0,
    }
}

/// Compare credentials without leaking length or prefix timing.
pub fn credentials_match(given: &str, expected: &str) -> bool {
    let a = Sha256::digest(given.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    constant_time_eq(&a, &b)
}
