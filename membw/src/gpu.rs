use std::fmt::Write as _;

use pollster::block_on;
use tracing::{debug, info, info_span};
use wgpu::{
    Adapter, AdapterInfo, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry, Buffer,
    BufferDescriptor, BufferUsages, CommandEncoderDescriptor, ComputePassDescriptor,
    ComputePassTimestampWrites, ComputePipeline, ComputePipelineDescriptor, Device,
    DeviceDescriptor, ErrorFilter, Features, Instance, InstanceDescriptor, Maintain, MapMode,
    PipelineCompilationOptions, QuerySet, QuerySetDescriptor, QueryType, Queue,
    ShaderModuleDescriptor, ShaderSource, SubmissionIndex,
};

use crate::device::{ComputeDevice, KernelBuild, KernelSession};
use crate::{Error, KernelArg, Result, TimingSample};

// Query slots: queued, submitted, pass begin, pass end.
const QUEUED: u32 = 0;
const SUBMITTED: u32 = 1;
const STARTED: u32 = 2;
const ENDED: u32 = 3;
const TIMESTAMP_COUNT: u32 = 4;
const TIMESTAMP_BYTES: u64 = TIMESTAMP_COUNT as u64 * 8;

/// Backend set for the configured bits; 0 selects every backend.
pub fn backends_from_bits(bits: u32) -> Result<Backends> {
    if bits == 0 {
        return Ok(Backends::all());
    }
    Backends::from_bits(bits).ok_or_else(|| {
        Error::InvalidConfig(format!(
            "backends_bits {:#x} names unknown backends (known: {:#x})",
            bits,
            Backends::all().bits()
        ))
    })
}

/// Adapters in the order the runtime reports them; the CLI selects by index.
pub fn enumerate_adapters(backends: Backends) -> Vec<Adapter> {
    let instance = Instance::new(InstanceDescriptor {
        backends,
        ..Default::default()
    });
    instance.enumerate_adapters(backends)
}

/// Human-readable capability listing, one `prefix`-indented line per property.
pub fn describe(adapter: &Adapter, prefix: &str) -> String {
    let info = adapter.get_info();
    let limits = adapter.limits();
    let features = adapter.features();
    let mut out = String::new();

    let _ = writeln!(out, "{}Name: {}", prefix, info.name);
    let _ = writeln!(out, "{}Backend: {:?}", prefix, info.backend);
    let _ = writeln!(out, "{}Type: {:?}", prefix, info.device_type);
    let _ = writeln!(out, "{}Vendor ID: {:#06x}", prefix, info.vendor);
    let _ = writeln!(out, "{}Device ID: {:#06x}", prefix, info.device);
    let _ = writeln!(out, "{}Driver: {} {}", prefix, info.driver, info.driver_info);
    let _ = writeln!(
        out,
        "{}Timestamp queries: {}",
        prefix,
        if features.contains(Features::TIMESTAMP_QUERY) {
            "yes"
        } else {
            "no"
        }
    );
    let _ = writeln!(
        out,
        "{}Max storage binding: {} MB",
        prefix,
        limits.max_storage_buffer_binding_size >> 20
    );
    let _ = writeln!(
        out,
        "{}Max workgroup size: {}",
        prefix, limits.max_compute_invocations_per_workgroup
    );
    let _ = write!(
        out,
        "{}Max workgroups per dimension: {}",
        prefix, limits.max_compute_workgroups_per_dimension
    );
    out
}

/// Run `f` inside validation and out-of-memory error scopes, naming `op` on failure.
fn scoped<T>(device: &Device, op: &'static str, f: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(ErrorFilter::Validation);
    device.push_error_scope(ErrorFilter::OutOfMemory);
    let value = f();
    let oom = block_on(device.pop_error_scope());
    let validation = block_on(device.pop_error_scope());
    match oom.or(validation) {
        Some(err) => Err(Error::platform(op, err)),
        None => Ok(value),
    }
}

pub struct WgpuDevice {
    adapter: Adapter,
    info: AdapterInfo,
}

impl WgpuDevice {
    pub fn new(adapter: Adapter) -> Self {
        let info = adapter.get_info();
        Self { adapter, info }
    }

    /// Take adapter `index` out of an enumerated list.
    pub fn select(mut adapters: Vec<Adapter>, index: usize) -> Result<Self> {
        if index >= adapters.len() {
            return Err(Error::InvalidDevice {
                index,
                available: adapters.len(),
            });
        }
        Ok(Self::new(adapters.swap_remove(index)))
    }

    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }
}

impl ComputeDevice for WgpuDevice {
    type Session = WgpuSession;

    fn open_session(&self, build: &KernelBuild<'_>) -> Result<WgpuSession> {
        WgpuSession::new(&self.adapter, build)
    }
}

/// One compiled kernel with its queue and buffers. Dropping it releases them.
pub struct WgpuSession {
    device: Device,
    queue: Queue,
    pipeline: ComputePipeline,
    input: Buffer,
    output: Buffer,
    staging: Buffer,
    query_set: QuerySet,
    resolve: Buffer,
    readback: Buffer,
    bind_group: Option<BindGroup>,
    timestamp_period: f64,
    inside_encoders: bool,
    buffer_bytes: u64,
}

impl WgpuSession {
    fn new(adapter: &Adapter, build: &KernelBuild<'_>) -> Result<Self> {
        let _span = info_span!("gpu_session", kernel = build.name, local_size = build.local_size).entered();

        let available = adapter.features();
        if !available.contains(Features::TIMESTAMP_QUERY) {
            return Err(Error::platform(
                "request_device",
                format!("adapter '{}' has no timestamp query support", adapter.get_info().name),
            ));
        }
        let inside_encoders = available.contains(Features::TIMESTAMP_QUERY_INSIDE_ENCODERS);
        let mut required_features = Features::TIMESTAMP_QUERY;
        if inside_encoders {
            required_features |= Features::TIMESTAMP_QUERY_INSIDE_ENCODERS;
        }

        let (device, queue) = block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("membw"),
                required_features,
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| Error::platform("request_device", e))?;
        info!(inside_encoders, "GPU device created");

        let limits = device.limits();
        let buffer_bytes = (build.buffer_len * std::mem::size_of::<f32>()) as u64;
        if buffer_bytes > limits.max_storage_buffer_binding_size as u64 {
            return Err(Error::InvalidConfig(format!(
                "{} byte buffers exceed the device storage binding limit of {} bytes",
                buffer_bytes, limits.max_storage_buffer_binding_size
            )));
        }
        if build.local_size > limits.max_compute_invocations_per_workgroup
            || build.local_size > limits.max_compute_workgroup_size_x
        {
            return Err(Error::InvalidConfig(format!(
                "local size {} exceeds the device workgroup limit of {}",
                build.local_size,
                limits
                    .max_compute_invocations_per_workgroup
                    .min(limits.max_compute_workgroup_size_x)
            )));
        }

        let source = format!(
            "const LOCAL_SIZE: u32 = {}u;\nconst HALO: u32 = {}u;\n\n{}",
            build.local_size, build.halo, build.source
        );

        device.push_error_scope(ErrorFilter::Validation);
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(build.name),
            source: ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(build.name),
            layout: None,
            module: &module,
            entry_point: build.name,
            compilation_options: PipelineCompilationOptions::default(),
        });
        if let Some(err) = block_on(device.pop_error_scope()) {
            return Err(Error::Build {
                kernel: build.name.to_string(),
                log: err.to_string(),
            });
        }
        info!("GPU kernel built");

        let (input, output, staging) = scoped(&device, "create_buffer", || {
            let input = device.create_buffer(&BufferDescriptor {
                label: Some("Input"),
                size: buffer_bytes,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let output = device.create_buffer(&BufferDescriptor {
                label: Some("Output"),
                size: buffer_bytes,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging = device.create_buffer(&BufferDescriptor {
                label: Some("Staging"),
                size: buffer_bytes,
                usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            (input, output, staging)
        })?;

        let (query_set, resolve, readback) = scoped(&device, "create_query_set", || {
            let query_set = device.create_query_set(&QuerySetDescriptor {
                label: Some("Timestamps"),
                ty: QueryType::Timestamp,
                count: TIMESTAMP_COUNT,
            });
            let resolve = device.create_buffer(&BufferDescriptor {
                label: Some("Timestamp Resolve"),
                size: TIMESTAMP_BYTES,
                usage: BufferUsages::QUERY_RESOLVE | BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let readback = device.create_buffer(&BufferDescriptor {
                label: Some("Timestamp Readback"),
                size: TIMESTAMP_BYTES,
                usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            (query_set, resolve, readback)
        })?;
        debug!(buffer_bytes, "GPU buffers allocated");

        let timestamp_period = queue.get_timestamp_period() as f64;

        Ok(Self {
            device,
            queue,
            pipeline,
            input,
            output,
            staging,
            query_set,
            resolve,
            readback,
            bind_group: None,
            timestamp_period,
            inside_encoders,
            buffer_bytes,
        })
    }

    fn read_mapped(&self, buffer: &Buffer, op: &'static str, dst: &mut [u8]) -> Result<()> {
        let slice = buffer.slice(..dst.len() as u64);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(Maintain::Wait);
        rx.recv()
            .map_err(|e| Error::platform(op, e))?
            .map_err(|e| Error::platform(op, e))?;
        {
            let view = slice.get_mapped_range();
            dst.copy_from_slice(&view);
        }
        buffer.unmap();
        Ok(())
    }

    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        (ticks as f64 * self.timestamp_period).round() as u64
    }

    fn check_len(&self, elements: usize, op: &'static str) -> Result<u64> {
        let bytes = (elements * std::mem::size_of::<f32>()) as u64;
        if bytes > self.buffer_bytes {
            return Err(Error::platform(
                op,
                format!("{} bytes requested, device buffer holds {}", bytes, self.buffer_bytes),
            ));
        }
        Ok(bytes)
    }
}

impl KernelSession for WgpuSession {
    type Event = SubmissionIndex;

    fn upload_input(&mut self, input: &[f32]) -> Result<()> {
        self.check_len(input.len(), "write_buffer(input)")?;
        scoped(&self.device, "write_buffer(input)", || {
            self.queue.write_buffer(&self.input, 0, bytemuck::cast_slice(input));
            self.queue.submit(None);
        })?;
        debug!(elements = input.len(), "input uploaded");
        Ok(())
    }

    fn bind_arguments(&mut self, args: &[KernelArg]) -> Result<()> {
        let bind_group = scoped(&self.device, "set_kernel_args", || {
            let layout = self.pipeline.get_bind_group_layout(0);
            let entries: Vec<BindGroupEntry<'_>> = args
                .iter()
                .enumerate()
                .map(|(slot, arg)| BindGroupEntry {
                    binding: slot as u32,
                    resource: match arg {
                        KernelArg::Input => self.input.as_entire_binding(),
                        KernelArg::Output => self.output.as_entire_binding(),
                    },
                })
                .collect();
            self.device.create_bind_group(&BindGroupDescriptor {
                label: Some("Kernel Arguments"),
                layout: &layout,
                entries: &entries,
            })
        })?;
        self.bind_group = Some(bind_group);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.device.poll(Maintain::Wait);
        Ok(())
    }

    fn dispatch(&mut self, global_size: u32, local_size: u32) -> Result<SubmissionIndex> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| Error::platform("dispatch", "kernel arguments not bound"))?;
        let workgroups = global_size / local_size;
        let max_groups = self.device.limits().max_compute_workgroups_per_dimension;
        if workgroups > max_groups {
            return Err(Error::InvalidConfig(format!(
                "{} workgroups exceed the device limit of {}",
                workgroups, max_groups
            )));
        }

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Kernel Dispatch"),
        });
        if self.inside_encoders {
            encoder.write_timestamp(&self.query_set, QUEUED);
            encoder.write_timestamp(&self.query_set, SUBMITTED);
        }
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Kernel Pass"),
                timestamp_writes: Some(ComputePassTimestampWrites {
                    query_set: &self.query_set,
                    beginning_of_pass_write_index: Some(STARTED),
                    end_of_pass_write_index: Some(ENDED),
                }),
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        let first = if self.inside_encoders { QUEUED } else { STARTED };
        encoder.resolve_query_set(&self.query_set, first..TIMESTAMP_COUNT, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.readback, 0, TIMESTAMP_BYTES);

        let index = scoped(&self.device, "dispatch", || self.queue.submit(Some(encoder.finish())))?;
        debug!(workgroups, local_size, "kernel dispatched");
        Ok(index)
    }

    fn profiling_info(&mut self, event: SubmissionIndex) -> Result<TimingSample> {
        self.device.poll(Maintain::WaitForSubmissionIndex(event));

        let mut raw = [0u8; TIMESTAMP_BYTES as usize];
        self.read_mapped(&self.readback, "read_timestamps", &mut raw)?;
        let ticks: Vec<u64> = raw
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                u64::from_le_bytes(bytes)
            })
            .collect();

        // Without in-encoder stamps the resolve starts at the pass-begin slot.
        let (queued, submitted, started, ended) = if self.inside_encoders {
            (ticks[0], ticks[1], ticks[2], ticks[3])
        } else {
            (ticks[0], ticks[0], ticks[0], ticks[1])
        };

        Ok(TimingSample {
            queued: self.ticks_to_ns(queued),
            submitted: self.ticks_to_ns(submitted),
            started: self.ticks_to_ns(started),
            ended: self.ticks_to_ns(ended),
        })
    }

    fn download_output(&mut self, output: &mut [f32]) -> Result<()> {
        let bytes = self.check_len(output.len(), "read_buffer(output)")?;
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Output Readback"),
        });
        encoder.copy_buffer_to_buffer(&self.output, 0, &self.staging, 0, bytes);
        scoped(&self.device, "read_buffer(output)", || {
            self.queue.submit(Some(encoder.finish()));
        })?;
        self.read_mapped(&self.staging, "read_buffer(output)", bytemuck::cast_slice_mut(output))?;
        debug!(elements = output.len(), "output downloaded");
        Ok(())
    }
}
