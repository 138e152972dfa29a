use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use membw::gpu::{self, WgpuDevice};
use membw::{config, pattern};
use membw::{BenchConfig, HostBuffers, KernelReport, KernelRunner, Result, RunParams};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "membw", version, about = "Accelerator memory bandwidth micro-benchmark")]
struct Cli {
    /// Index of the device to benchmark, as listed at startup
    device: usize,

    /// Timed iterations per kernel; the first is discarded as warm-up
    #[arg(default_value_t = 10)]
    iterations: u32,

    /// Non-zero enables randomized input and golden-model verification
    #[arg(default_value_t = 0)]
    verify: u32,

    /// JSON file with sizes and kernel selection
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kernel to run (repeatable); defaults to the configured list
    #[arg(long = "kernel", value_name = "NAME")]
    kernels: Vec<String>,

    /// Directory holding <kernel>.wgsl sources
    #[arg(long)]
    kernel_dir: Option<PathBuf>,

    #[arg(long)]
    global_size: Option<u32>,

    #[arg(long)]
    local_size: Option<u32>,

    #[arg(long)]
    halo: Option<u32>,

    /// Seed for the verification input generator
    #[arg(long)]
    seed: Option<u64>,

    /// Print the kernel reports as JSON after the bandwidth table
    #[arg(long)]
    json: bool,
}

fn build_config(cli: &Cli) -> Result<BenchConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load(path)?,
        None => BenchConfig::default(),
    };
    if !cli.kernels.is_empty() {
        cfg.kernels = cli.kernels.clone();
    }
    if let Some(dir) = &cli.kernel_dir {
        cfg.kernel_dir = Some(dir.clone());
    }
    if let Some(n) = cli.global_size {
        cfg.global_size = n;
    }
    if let Some(n) = cli.local_size {
        cfg.local_size = n;
    }
    if let Some(n) = cli.halo {
        cfg.halo = n;
    }
    if cli.seed.is_some() {
        cfg.seed = cli.seed;
    }
    Ok(cfg)
}

fn run(cli: Cli) -> Result<()> {
    let cfg = build_config(&cli)?;
    let params = RunParams {
        device: cli.device,
        iterations: cli.iterations,
        verify: cli.verify != 0,
    };

    // Fail on configuration before touching any device.
    for name in &cfg.kernels {
        pattern::identify(name)?;
    }
    config::validate(&cfg, &params)?;
    let backends = gpu::backends_from_bits(cfg.backends_bits)?;

    let adapters = gpu::enumerate_adapters(backends);
    println!("Get devices and display device info");
    println!("\tDevices found: {}", adapters.len());
    for (i, adapter) in adapters.iter().enumerate() {
        println!("\tInfo of device {}:", i);
        println!("{}", gpu::describe(adapter, "\t\t"));
    }

    let device = WgpuDevice::select(adapters, params.device)?;
    println!("\tDevice selected: {} ({})", params.device, device.info().name);
    println!("\tIterations: {}", params.iterations);
    println!("\tVerification: {}", if params.verify { "on" } else { "off" });

    let mut buffers = HostBuffers::for_config(&cfg);
    println!("Initialize host memory buffers");
    println!("\tGlobal Size: {} K", cfg.global_size >> 10);
    println!("\tLocal Size: {}", cfg.local_size);
    println!("\tNumber of Workgroups: {}", cfg.workgroups());
    println!("\tInput Memory Buffer: {} MB", buffers.byte_size() >> 20);
    println!("\tOutput Memory Buffer: {} MB", buffers.byte_size() >> 20);

    let kernel_dir = config::kernel_dir(&cfg);
    let runner = KernelRunner::new(&device, &cfg);
    let mut reports: Vec<KernelReport> = Vec::with_capacity(cfg.kernels.len());

    println!("Run kernels");
    for name in &cfg.kernels {
        let source = config::load_kernel_source(&config::kernel_path(&kernel_dir, name))?;
        let report = runner.run(name, &source, &mut buffers, &params)?;
        println!();
        println!("\t{}: {:.6} MB/s", name, report.megabytes_per_second());
        reports.push(report);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| membw::Error::InvalidConfig(format!("report serialization: {}", e)))?;
        println!("{}", json);
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("warn")),
                ),
        )
        .init();

    let cli = Cli::parse();
    println!("======== BEGIN membw ========");
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
