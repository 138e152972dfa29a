use std::io::Write;

use quanta::Clock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::device::{ComputeDevice, KernelBuild, KernelSession};
use crate::{bandwidth, config, golden, pattern, verify};
use crate::{AccessPattern, BenchConfig, Error, Result, RunParams, TimingSample};

const RANDOM_LIMIT: u32 = 1 << 16;
// f32 represents every integer up to 2^24 exactly.
const EXACT_SUM_LIMIT: u32 = 1 << 24;

// Upper bound (exclusive) for integer-valued inputs such that a full window of
// `halo + 1` of them still sums exactly in f32.
fn random_limit(halo: u32) -> u32 {
    let window = halo.saturating_add(1);
    (EXACT_SUM_LIMIT / window).clamp(1, RANDOM_LIMIT)
}

// Samples reserved up front; longer runs grow the vector as they go.
const SAMPLE_RESERVE: usize = 1024;

/// Input, Output and Golden host arrays, each `logical_count + halo` long.
pub struct HostBuffers {
    pub input: Vec<f32>,
    pub output: Vec<f32>,
    pub golden: Vec<f32>,
    logical_count: usize,
    halo: usize,
}

impl HostBuffers {
    pub fn new(logical_count: usize, halo: usize) -> Self {
        let len = logical_count + halo;
        Self {
            input: vec![0.0; len],
            output: vec![0.0; len],
            golden: vec![0.0; len],
            logical_count,
            halo,
        }
    }

    pub fn for_config(config: &BenchConfig) -> Self {
        Self::new(config.global_size as usize, config.halo as usize)
    }

    pub fn len(&self) -> usize {
        self.logical_count + self.halo
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_size(&self) -> usize {
        self.len() * std::mem::size_of::<f32>()
    }

    fn check_shape(&self, config: &BenchConfig) -> Result<()> {
        let wanted = config.buffer_len();
        if self.len() != wanted
            || self.input.len() != wanted
            || self.output.len() != wanted
            || self.golden.len() != wanted
        {
            return Err(Error::InvalidConfig(format!(
                "host buffers hold {}/{}/{} elements, configuration needs {}",
                self.input.len(),
                self.output.len(),
                self.golden.len(),
                wanted
            )));
        }
        Ok(())
    }
}

/// Outcome of one kernel's timed loop.
#[derive(Debug, Clone, Serialize)]
pub struct KernelReport {
    pub kernel: String,
    pub pattern: AccessPattern,
    pub iterations: u32,
    pub verified: bool,
    /// Bytes read by the timed (non warm-up) iterations.
    pub bytes: f64,
    /// Summed device execution time of the timed iterations.
    pub seconds: f64,
    /// Host wall time of the whole run, setup and verification included.
    pub host_ms: f64,
    pub samples: Vec<TimingSample>,
}

impl KernelReport {
    pub fn bytes_per_second(&self) -> f64 {
        bandwidth::bytes_per_second(self.bytes, self.seconds)
    }

    pub fn megabytes_per_second(&self) -> f64 {
        bandwidth::to_megabytes(self.bytes_per_second())
    }
}

/// Runs kernels one at a time on a device. Each [`run`](Self::run) opens its
/// own session, so no device state survives from one kernel to the next.
pub struct KernelRunner<'a, D: ComputeDevice> {
    device: &'a D,
    config: &'a BenchConfig,
    progress: bool,
}

impl<'a, D: ComputeDevice> KernelRunner<'a, D> {
    pub fn new(device: &'a D, config: &'a BenchConfig) -> Self {
        Self {
            device,
            config,
            progress: true,
        }
    }

    /// Print a `.` per iteration to stdout.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(
        &self,
        name: &str,
        source: &str,
        buffers: &mut HostBuffers,
        params: &RunParams,
    ) -> Result<KernelReport> {
        let pattern = pattern::identify(name)?;
        let args = pattern::bindings(pattern)?;
        config::validate(self.config, params)?;
        buffers.check_shape(self.config)?;

        let _span = info_span!(
            "kernel_run",
            kernel = name,
            iterations = params.iterations,
            verify = params.verify
        )
        .entered();

        let clock = Clock::new();
        let started = clock.now();

        let global_size = self.config.global_size;
        let local_size = self.config.local_size;
        let logical_count = global_size as usize;
        let halo = self.config.halo as usize;

        let mut session = self.device.open_session(&KernelBuild {
            name,
            source,
            local_size,
            halo: self.config.halo,
            buffer_len: buffers.len(),
        })?;
        info!(%pattern, "kernel session opened");

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut seconds = 0.0f64;
        let mut samples = Vec::with_capacity((params.iterations as usize).min(SAMPLE_RESERVE));
        let limit = random_limit(self.config.halo);

        for iteration in 0..params.iterations {
            if self.progress {
                print!(".");
                let _ = std::io::stdout().flush();
            }

            if params.verify {
                for value in buffers.input.iter_mut() {
                    *value = rng.gen_range(0..limit) as f32;
                }
                session.upload_input(&buffers.input)?;
            }

            session.bind_arguments(args)?;

            session.finish()?;
            let event = session.dispatch(global_size, local_size)?;
            let sample = session.profiling_info(event)?;
            debug!(
                iteration,
                queued = sample.queued,
                submitted = sample.submitted,
                exec_ns = sample.execution_ns(),
                "dispatch_complete"
            );

            if iteration != 0 {
                seconds += sample.execution_ns() as f64 * 1e-9;
            }
            samples.push(sample);

            if params.verify {
                session.download_output(&mut buffers.output)?;
                golden::compute_into(&buffers.input, pattern, logical_count, halo, &mut buffers.golden)?;
                let report = verify::verify(&buffers.output, &buffers.golden, logical_count);
                if !report.passed() {
                    for m in &report.mismatches {
                        warn!(index = m.index, output = m.output, golden = m.golden, "mismatch");
                    }
                    return Err(Error::Verification {
                        kernel: name.to_string(),
                        report,
                    });
                }
                debug!(iteration, "verified");
            }
        }

        let bytes = bandwidth::measured_bytes(
            std::mem::size_of::<f32>(),
            halo,
            logical_count,
            params.iterations,
        );
        let host_ms = clock.now().duration_since(started).as_secs_f64() * 1000.0;
        info!(bytes, seconds, host_ms, "kernel run complete");

        Ok(KernelReport {
            kernel: name.to_string(),
            pattern,
            iterations: params.iterations,
            verified: params.verify,
            bytes,
            seconds,
            host_ms,
            samples,
        })
    }
}
