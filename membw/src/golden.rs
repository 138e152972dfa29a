//! Host reference for the reduction kernels.

use crate::pattern;
use crate::{AccessPattern, Error, Result};

/// Fill `golden[..logical_count]` with what the kernel for `pattern` must write.
///
/// Each element is zeroed and then accumulated in ascending window order, the
/// same order the device kernel adds in, so results compare bit-for-bit.
pub fn compute_into(
    input: &[f32],
    pattern: AccessPattern,
    logical_count: usize,
    halo: usize,
    golden: &mut [f32],
) -> Result<()> {
    let reduction = pattern::reduction(pattern)?;
    check_lengths(input.len(), golden.len(), logical_count, halo)?;

    for (i, out) in golden[..logical_count].iter_mut().enumerate() {
        let start = reduction.window_start(i);
        *out = 0.0;
        for value in &input[start..=start + halo] {
            *out += *value;
        }
    }
    Ok(())
}

pub fn compute(
    input: &[f32],
    pattern: AccessPattern,
    logical_count: usize,
    halo: usize,
) -> Result<Vec<f32>> {
    let mut golden = vec![0.0; logical_count];
    compute_into(input, pattern, logical_count, halo, &mut golden)?;
    Ok(golden)
}

fn check_lengths(input: usize, golden: usize, logical_count: usize, halo: usize) -> Result<()> {
    if logical_count == 0 {
        return Ok(());
    }
    // The window of the last element ends at logical_count - 1 + halo.
    let needed = logical_count + halo;
    if input < needed {
        return Err(Error::InvalidConfig(format!(
            "input holds {} elements, golden model needs {}",
            input, needed
        )));
    }
    if golden < logical_count {
        return Err(Error::InvalidConfig(format!(
            "golden buffer holds {} elements, expected {}",
            golden, logical_count
        )));
    }
    Ok(())
}
