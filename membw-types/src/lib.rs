use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Micro-kernels known to the benchmark, keyed by the kernel's entry-point name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    GlobalReadLinear,
    GlobalReadLinearUncached,
    GlobalReadSingle,
    GlobalWriteLinear,
    GlobalReadRandom,
    GlobalReadRandom1,
    GlobalReadUncoalescing,
}

impl AccessPattern {
    pub const ALL: [AccessPattern; 7] = [
        AccessPattern::GlobalReadLinear,
        AccessPattern::GlobalReadLinearUncached,
        AccessPattern::GlobalReadSingle,
        AccessPattern::GlobalWriteLinear,
        AccessPattern::GlobalReadRandom,
        AccessPattern::GlobalReadRandom1,
        AccessPattern::GlobalReadUncoalescing,
    ];

    /// Canonical kernel name, identical to the entry point in the kernel source.
    pub const fn name(self) -> &'static str {
        match self {
            AccessPattern::GlobalReadLinear => "global_read_linear",
            AccessPattern::GlobalReadLinearUncached => "global_read_linear_uncached",
            AccessPattern::GlobalReadSingle => "global_read_single",
            AccessPattern::GlobalWriteLinear => "global_write_linear",
            AccessPattern::GlobalReadRandom => "global_read_random",
            AccessPattern::GlobalReadRandom1 => "global_read_random1",
            AccessPattern::GlobalReadUncoalescing => "global_read_uncoalescing",
        }
    }
}

impl std::fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Device buffer bound to one kernel argument slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelArg {
    Input,
    Output,
}

/// Sizes and kernel selection shared by every kernel in one benchmark invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Work items per dispatch; also the logical element count.
    pub global_size: u32,
    /// Work items per workgroup.
    pub local_size: u32,
    /// Extra elements past the logical count read by windowed kernels.
    pub halo: u32,
    pub kernel_dir: Option<PathBuf>,
    pub kernels: Vec<String>,
    pub seed: Option<u64>,
    /// wgpu backend bits; 0 selects every backend.
    pub backends_bits: u32,
}

pub const DEFAULT_LOCAL_SIZE: u32 = 256;
pub const DEFAULT_GLOBAL_SIZE: u32 = 1024 * 4 * DEFAULT_LOCAL_SIZE;
pub const DEFAULT_HALO: u32 = 31;

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            global_size: DEFAULT_GLOBAL_SIZE,
            local_size: DEFAULT_LOCAL_SIZE,
            halo: DEFAULT_HALO,
            kernel_dir: None,
            kernels: vec![
                AccessPattern::GlobalReadLinear.name().to_string(),
                AccessPattern::GlobalReadSingle.name().to_string(),
            ],
            seed: None,
            backends_bits: 0,
        }
    }
}

impl BenchConfig {
    /// Host buffer length: logical elements plus halo.
    pub fn buffer_len(&self) -> usize {
        self.global_size as usize + self.halo as usize
    }

    pub fn workgroups(&self) -> u32 {
        if self.local_size == 0 {
            return 0;
        }
        self.global_size / self.local_size
    }
}

/// Per-invocation parameters, fixed for the whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    pub device: usize,
    pub iterations: u32,
    pub verify: bool,
}

/// Device-clock timestamps of one dispatch, in nanoseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingSample {
    pub queued: u64,
    pub submitted: u64,
    pub started: u64,
    pub ended: u64,
}

impl TimingSample {
    pub fn execution_ns(&self) -> u64 {
        self.ended.saturating_sub(self.started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_serde_uses_kernel_names() {
        for pattern in AccessPattern::ALL {
            let json = serde_json::to_string(&pattern).unwrap();
            assert_eq!(json, format!("\"{}\"", pattern.name()));
        }
    }

    #[test]
    fn test_pattern_deserializes_from_kernel_names() {
        let parsed: AccessPattern = serde_json::from_str("\"global_read_random1\"").unwrap();
        assert_eq!(parsed, AccessPattern::GlobalReadRandom1);
        let parsed: AccessPattern =
            serde_json::from_str("\"global_read_linear_uncached\"").unwrap();
        assert_eq!(parsed, AccessPattern::GlobalReadLinearUncached);
        assert!(serde_json::from_str::<AccessPattern>("\"global_read_random_1\"").is_err());
    }

    #[test]
    fn test_default_config_matches_reference_sizes() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.global_size, 1_048_576);
        assert_eq!(cfg.workgroups(), 4096);
        assert_eq!(cfg.buffer_len(), 1_048_576 + 31);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: BenchConfig = serde_json::from_str(r#"{ "global_size": 4096, "halo": 7 }"#).unwrap();
        assert_eq!(cfg.global_size, 4096);
        assert_eq!(cfg.halo, 7);
        assert_eq!(cfg.local_size, DEFAULT_LOCAL_SIZE);
        assert_eq!(cfg.kernels.len(), 2);
    }

    #[test]
    fn test_execution_ns_ignores_queue_stamps() {
        let sample = TimingSample { queued: 10, submitted: 20, started: 100, ended: 350 };
        assert_eq!(sample.execution_ns(), 250);
    }
}
