//! Kernel name to access pattern lookup.
//!
//! Every pattern has one row in `PATTERNS` holding its argument layout and the
//! reduction its golden model uses. A pattern without both is recognized by
//! name but refused by [`identify`].

use crate::{AccessPattern, Error, KernelArg, Result};

/// Window each output element of a reduction kernel sums over.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// `input[i ..= i + halo]`
    Sliding,
    /// `input[0 ..= halo]` for every `i`
    Fixed,
}

impl Reduction {
    pub fn window_start(self, index: usize) -> usize {
        match self {
            Reduction::Sliding => index,
            Reduction::Fixed => 0,
        }
    }
}

struct PatternEntry {
    pattern: AccessPattern,
    args: Option<&'static [KernelArg]>,
    reduction: Option<Reduction>,
}

const INPUT_OUTPUT: &[KernelArg] = &[KernelArg::Input, KernelArg::Output];

// Sorted by kernel name for binary search.
static PATTERNS: [PatternEntry; 7] = [
    PatternEntry {
        pattern: AccessPattern::GlobalReadLinear,
        args: Some(INPUT_OUTPUT),
        reduction: Some(Reduction::Sliding),
    },
    PatternEntry {
        pattern: AccessPattern::GlobalReadLinearUncached,
        args: None,
        reduction: None,
    },
    PatternEntry {
        pattern: AccessPattern::GlobalReadRandom,
        args: None,
        reduction: None,
    },
    PatternEntry {
        pattern: AccessPattern::GlobalReadRandom1,
        args: None,
        reduction: None,
    },
    PatternEntry {
        pattern: AccessPattern::GlobalReadSingle,
        args: Some(INPUT_OUTPUT),
        reduction: Some(Reduction::Fixed),
    },
    PatternEntry {
        pattern: AccessPattern::GlobalReadUncoalescing,
        args: None,
        reduction: None,
    },
    PatternEntry {
        pattern: AccessPattern::GlobalWriteLinear,
        args: None,
        reduction: None,
    },
];

fn entry(pattern: AccessPattern) -> Option<&'static PatternEntry> {
    PATTERNS
        .binary_search_by(|e| e.pattern.name().cmp(pattern.name()))
        .ok()
        .map(|pos| &PATTERNS[pos])
}

/// Exact, case-sensitive name lookup over the full enumeration.
pub fn lookup(name: &str) -> Result<AccessPattern> {
    PATTERNS
        .binary_search_by(|e| e.pattern.name().cmp(name))
        .map(|pos| PATTERNS[pos].pattern)
        .map_err(|_| Error::UnknownKernel(name.to_string()))
}

/// Resolve a kernel name to a pattern this benchmark can bind and verify.
pub fn identify(name: &str) -> Result<AccessPattern> {
    let pattern = lookup(name)?;
    if !is_supported(pattern) {
        return Err(Error::UnsupportedPattern(pattern));
    }
    Ok(pattern)
}

pub fn is_supported(pattern: AccessPattern) -> bool {
    entry(pattern).map_or(false, |row| row.args.is_some() && row.reduction.is_some())
}

/// Buffers bound to argument slots `0..n`, in order.
pub fn bindings(pattern: AccessPattern) -> Result<&'static [KernelArg]> {
    entry(pattern)
        .and_then(|row| row.args)
        .ok_or(Error::UnsupportedPattern(pattern))
}

pub fn reduction(pattern: AccessPattern) -> Result<Reduction> {
    entry(pattern)
        .and_then(|row| row.reduction)
        .ok_or(Error::UnsupportedPattern(pattern))
}
