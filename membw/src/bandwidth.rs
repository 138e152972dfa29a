/// Bytes moved by the timed iterations: every logical element reads a window
/// of `halo + 1` values, and the warm-up iteration is not counted.
pub fn measured_bytes(element_bytes: usize, halo: usize, logical_count: usize, iterations: u32) -> f64 {
    let timed = iterations.saturating_sub(1) as f64;
    element_bytes as f64 * (halo as f64 + 1.0) * logical_count as f64 * timed
}

/// Bytes per second, or NaN when nothing was timed.
pub fn bytes_per_second(bytes: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        bytes / seconds
    } else {
        f64::NAN
    }
}

pub fn to_megabytes(bytes_per_second: f64) -> f64 {
    bytes_per_second / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_byte_count() {
        // 4 bytes x 32 reads x 1M elements x 9 timed iterations
        let bytes = measured_bytes(4, 31, 1_048_576, 10);
        assert_eq!(bytes, 4.0 * 32.0 * 1_048_576.0 * 9.0);
    }

    #[test]
    fn test_halving_duration_doubles_bandwidth() {
        let bytes = measured_bytes(4, 31, 4096, 5);
        let slow = bytes_per_second(bytes, 0.008);
        let fast = bytes_per_second(bytes, 0.004);
        assert_eq!(fast, slow * 2.0);
    }

    #[test]
    fn test_single_iteration_is_nan() {
        let bytes = measured_bytes(4, 31, 4096, 1);
        assert_eq!(bytes, 0.0);
        assert!(bytes_per_second(bytes, 0.0).is_nan());
    }

    #[test]
    fn test_megabytes() {
        assert_eq!(to_megabytes(3.0 * 1024.0 * 1024.0), 3.0);
    }
}
