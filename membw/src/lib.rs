use std::path::PathBuf;

pub use membw_types::{AccessPattern, BenchConfig, KernelArg, RunParams, TimingSample};

pub mod bandwidth;
pub mod config;
pub mod device;
pub mod golden;
pub mod gpu;
pub mod pattern;
mod runner;
pub mod verify;

pub use crate::device::{ComputeDevice, KernelBuild, KernelSession};
pub use crate::runner::{HostBuffers, KernelReport, KernelRunner};
pub use crate::verify::{Mismatch, VerifyReport};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown kernel name: {0}")]
    UnknownKernel(String),
    #[error("Kernel {0} has no argument layout or golden model")]
    UnsupportedPattern(AccessPattern),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid device selection: {index} ({available} device(s) found)")]
    InvalidDevice { index: usize, available: usize },
    #[error("Failed to read kernel source {}: {source}", .path.display())]
    KernelSource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Build of kernel {kernel} failed:\n{log}")]
    Build { kernel: String, log: String },
    #[error("{op} failed: {detail}")]
    Platform { op: &'static str, detail: String },
    #[error("Verification of {kernel} failed\n{report}")]
    Verification { kernel: String, report: VerifyReport },
}

impl Error {
    pub(crate) fn platform(op: &'static str, detail: impl std::fmt::Display) -> Self {
        Error::Platform {
            op,
            detail: detail.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
