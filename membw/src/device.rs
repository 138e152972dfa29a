//! The seam between the kernel runner and a compute runtime.
//!
//! A [`ComputeDevice`] compiles one kernel and allocates its buffers, handing
//! back a [`KernelSession`] that owns the queue, the two device buffers and the
//! compiled kernel until it is dropped. The runner only ever talks to a
//! session, so every device resource is released when the run ends, on the
//! error path included.

use crate::{KernelArg, Result, TimingSample};

/// Everything needed to compile a kernel and size its buffers.
#[derive(Debug, Clone, Copy)]
pub struct KernelBuild<'a> {
    /// Entry point, also the access-pattern name.
    pub name: &'a str,
    pub source: &'a str,
    pub local_size: u32,
    pub halo: u32,
    /// Elements in each of the input and output buffers.
    pub buffer_len: usize,
}

pub trait ComputeDevice {
    type Session: KernelSession;

    fn open_session(&self, build: &KernelBuild<'_>) -> Result<Self::Session>;
}

pub trait KernelSession {
    /// Completion handle of one dispatch.
    type Event;

    fn upload_input(&mut self, input: &[f32]) -> Result<()>;

    /// Bind device buffers to argument slots `0..args.len()`.
    fn bind_arguments(&mut self, args: &[KernelArg]) -> Result<()>;

    /// Block until all previously submitted work has completed.
    fn finish(&mut self) -> Result<()>;

    fn dispatch(&mut self, global_size: u32, local_size: u32) -> Result<Self::Event>;

    fn profiling_info(&mut self, event: Self::Event) -> Result<TimingSample>;

    fn download_output(&mut self, output: &mut [f32]) -> Result<()>;
}
