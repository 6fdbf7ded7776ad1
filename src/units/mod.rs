//! Kubernetes quantity parsing and display formatting.
//!
//! The metrics API reports CPU as strings like `"123m"` or `"1234567n"` and
//! memory as `"512Mi"` or `"2Gi"`. Everything here normalizes to millicores
//! and MiB. The parsers are total: invalid or empty input degrades to zero
//! rather than erroring, so a bad quantity shows up as "no usage" instead of
//! breaking a whole table.

use once_cell::sync::Lazy;

/// MiB multiplier per memory suffix. Two-letter binary suffixes come first so
/// "1Ki" never matches the decimal "K" entry; the order of this slice is the
/// match order.
static MEMORY_SUFFIXES: Lazy<[(&'static str, f64); 8]> = Lazy::new(|| {
    [
        ("Ki", 1.0 / 1024.0),
        ("Mi", 1.0),
        ("Gi", 1024.0),
        ("Ti", 1024.0 * 1024.0),
        ("K", 1.0 / 1024.0 / 1.024),
        ("M", 1.0 / 1.024),
        ("G", 1024.0 / 1.024),
        ("T", 1024.0 * 1024.0 / 1.024),
    ]
});

/// Parse a Kubernetes CPU quantity into millicores.
///
/// `"123m"` -> 123.0, `"1234n"` -> 0.001234, `"2"` -> 2000.0.
pub fn parse_cpu(cpu: &str) -> f64 {
    let trimmed = cpu.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Some(value) = trimmed.strip_suffix('n') {
        // nanocores to millicores
        value.parse::<f64>().unwrap_or(0.0) / 1_000_000.0
    } else if let Some(value) = trimmed.strip_suffix('m') {
        value.parse::<f64>().unwrap_or(0.0)
    } else {
        // cores to millicores
        trimmed.parse::<f64>().unwrap_or(0.0) * 1000.0
    }
}

/// Parse a Kubernetes memory quantity into MiB.
///
/// `"123Mi"` -> 123.0, `"1024Ki"` -> 1.0, `"1Gi"` -> 1024.0. A bare number is
/// raw bytes.
pub fn parse_memory(memory: &str) -> f64 {
    let trimmed = memory.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    for (suffix, multiplier) in MEMORY_SUFFIXES.iter() {
        if let Some(value) = trimmed.strip_suffix(suffix) {
            return value.parse::<f64>().unwrap_or(0.0) * multiplier;
        }
    }

    // Plain bytes to MiB
    trimmed.parse::<f64>().unwrap_or(0.0) / (1024.0 * 1024.0)
}

/// Format millicores as a vCPU figure, e.g. `"0.50 vCPU"`.
pub fn format_cpu(millicores: f64) -> String {
    if millicores == 0.0 {
        return "0.00 vCPU".to_string();
    }
    format!("{:.2} vCPU", millicores / 1000.0)
}

/// Format MiB for display, e.g. `"256 MiB"` or `"1.50 GiB"`.
pub fn format_memory(mib: f64) -> String {
    if mib == 0.0 {
        return "0 MiB".to_string();
    }
    if mib >= 1024.0 {
        format!("{:.2} GiB", mib / 1024.0)
    } else {
        format!("{:.0} MiB", mib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parse_cpu_suffixes() {
        assert!(approx(parse_cpu("123m"), 123.0));
        assert!(approx(parse_cpu("1234n"), 0.001234));
        assert!(approx(parse_cpu("2"), 2000.0));
        assert!(approx(parse_cpu("0.5"), 500.0));
        assert!(approx(parse_cpu(" 250m "), 250.0));
    }

    #[test]
    fn parse_cpu_invalid_is_zero() {
        assert_eq!(parse_cpu(""), 0.0);
        assert_eq!(parse_cpu("   "), 0.0);
        assert_eq!(parse_cpu("abc"), 0.0);
        assert_eq!(parse_cpu("12x"), 0.0);
    }

    #[test]
    fn parse_memory_binary_suffixes() {
        assert!(approx(parse_memory("1024Ki"), 1.0));
        assert!(approx(parse_memory("123Mi"), 123.0));
        assert!(approx(parse_memory("1Gi"), 1024.0));
        assert!(approx(parse_memory("1Ti"), 1024.0 * 1024.0));
    }

    #[test]
    fn parse_memory_decimal_suffixes() {
        assert!(approx(parse_memory("1M"), 1.0 / 1.024));
        assert!(approx(parse_memory("1G"), 1024.0 / 1.024));
        // "Ki" must win over "K"
        assert!(approx(parse_memory("2048Ki"), 2.0));
    }

    #[test]
    fn parse_memory_raw_bytes() {
        assert!(approx(parse_memory("1048576"), 1.0));
    }

    #[test]
    fn parse_memory_invalid_is_zero() {
        assert_eq!(parse_memory(""), 0.0);
        assert_eq!(parse_memory("lots"), 0.0);
    }

    #[test]
    fn formats_cpu() {
        assert_eq!(format_cpu(0.0), "0.00 vCPU");
        assert_eq!(format_cpu(500.0), "0.50 vCPU");
        assert_eq!(format_cpu(2100.0), "2.10 vCPU");
    }

    #[test]
    fn formats_memory() {
        assert_eq!(format_memory(0.0), "0 MiB");
        assert_eq!(format_memory(256.0), "256 MiB");
        assert_eq!(format_memory(1536.0), "1.50 GiB");
    }
}
