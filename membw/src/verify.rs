use serde::Serialize;
use std::fmt;

/// Enumeration stops once more than this many mismatches have been seen.
pub const MISMATCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mismatch {
    pub index: usize,
    pub output: f32,
    pub golden: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Elements compared before stopping.
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// True when enumeration stopped early at the mismatch limit.
    pub fn truncated(&self) -> bool {
        self.mismatches.len() > MISMATCH_LIMIT
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.mismatches {
            writeln!(f, "{}: {:.6} != {:.6}", m.index, m.output, m.golden)?;
        }
        if self.truncated() {
            write!(f, "stopped after {} mismatches", self.mismatches.len())
        } else {
            write!(f, "{} mismatches in {} elements", self.mismatches.len(), self.checked)
        }
    }
}

/// Exact element-wise comparison of the first `logical_count` elements.
pub fn verify(output: &[f32], golden: &[f32], logical_count: usize) -> VerifyReport {
    let count = logical_count.min(output.len()).min(golden.len());
    let mut mismatches = Vec::new();
    let mut checked = 0;

    for (index, (&out, &gold)) in output[..count].iter().zip(&golden[..count]).enumerate() {
        if mismatches.len() > MISMATCH_LIMIT {
            break;
        }
        checked += 1;
        if out != gold {
            mismatches.push(Mismatch {
                index,
                output: out,
                golden: gold,
            });
        }
    }

    if count < logical_count {
        // Missing elements never match.
        mismatches.push(Mismatch {
            index: count,
            output: f32::NAN,
            golden: golden.get(count).copied().unwrap_or(f32::NAN),
        });
    }

    VerifyReport { checked, mismatches }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_buffers_pass() {
        let golden = vec![32.0f32; 4096];
        let report = verify(&golden.clone(), &golden, 4096);
        assert!(report.passed());
        assert_eq!(report.checked, 4096);
    }

    #[test]
    fn test_single_difference_reported() {
        let golden = vec![5.0f32; 100];
        let mut output = golden.clone();
        output[42] = 4.0;
        let report = verify(&output, &golden, 100);
        assert!(!report.passed());
        assert_eq!(
            report.mismatches,
            vec![Mismatch { index: 42, output: 4.0, golden: 5.0 }]
        );
    }

    #[test]
    fn test_short_window_kernel_fails_everywhere() {
        let golden = vec![32.0f32; 4096];
        let output = vec![31.0f32; 4096];
        let report = verify(&output, &golden, 4096);
        assert!(!report.passed());
        assert!(report.truncated());
        assert_eq!(report.mismatches.len(), MISMATCH_LIMIT + 1);
        for (i, m) in report.mismatches.iter().enumerate() {
            assert_eq!(m.index, i);
            assert_eq!(m.output, 31.0);
            assert_eq!(m.golden, 32.0);
        }
    }

    #[test]
    fn test_elements_past_logical_count_ignored() {
        let golden = vec![1.0f32, 1.0, 1.0, 7.0];
        let output = vec![1.0f32, 1.0, 1.0, 0.0];
        assert!(verify(&output, &golden, 3).passed());
    }

    #[test]
    fn test_short_output_fails() {
        let golden = vec![1.0f32; 8];
        let output = vec![1.0f32; 6];
        let report = verify(&output, &golden, 8);
        assert!(!report.passed());
        assert_eq!(report.mismatches[0].index, 6);
    }

    #[test]
    fn test_display_lists_index_and_values() {
        let report = verify(&[1.0, 3.0], &[1.0, 2.0], 2);
        let text = report.to_string();
        assert!(text.starts_with("1: 3.000000 != 2.000000\n"));
    }
}
