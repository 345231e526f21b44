// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use ndarray::Array2;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use anisotropic_fim::io;
use anisotropic_fim::scheduler::{FimSolver, ProgressInfo, SweepMode};
use anisotropic_fim::tensors::{ConstantTensors, IdentityTensors, Tensor, Tensors};

#[derive(Parser)]
#[command(
    name = "anisotropic-fim",
    about = "Fast Iterative Method solver for the anisotropic eikonal equation"
)]
struct Cli {
    /// Grid size n1,n2
    #[arg(short = 's', long)]
    size: String,

    /// Source sample i1,i2 (repeatable for multiple sources)
    #[arg(long, num_args = 1)]
    source: Vec<String>,

    /// Tensor field: "identity", "constant:<d11>,<d12>,<d22>",
    /// "oriented:<degrees>,<su>,<sv>", or "file:<path>"
    #[arg(long, default_value = "identity")]
    tensors: String,

    /// Relative convergence tolerance
    #[arg(short = 't', long, default_value = "0.01")]
    tolerance: f32,

    /// Maximum number of sweeps over the active set
    #[arg(long, default_value = "1000")]
    max_sweeps: usize,

    /// Sweep mode
    #[arg(long, value_enum, default_value = "gauss-seidel")]
    mode: Mode,

    /// Number of Rayon worker threads (Jacobi mode)
    #[arg(long)]
    threads: Option<usize>,

    /// Output file path (.npy or .mat)
    #[arg(short = 'o', long, default_value = "times.npy")]
    output: PathBuf,

    /// Print the active set size to stderr after every sweep
    #[arg(long)]
    progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    GaussSeidel,
    Jacobi,
}

fn parse_pair(s: &str, what: &str) -> Result<(usize, usize)> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated integers", what))?;
    if parts.len() != 2 {
        bail!("--{} has {} components, expected 2", what, parts.len());
    }
    Ok((parts[0], parts[1]))
}

fn parse_floats(s: &str, count: usize, mode: &str) -> Result<Vec<f32>> {
    let values: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid {} parameters: '{}'", mode, s))?;
    if values.len() != count {
        bail!("{} expects {} values, got {}", mode, count, values.len());
    }
    Ok(values)
}

fn build_tensors(mode: &str, n1: usize, n2: usize) -> Result<Box<dyn Tensors>> {
    if mode == "identity" {
        return Ok(Box::new(IdentityTensors));
    }

    if let Some(params) = mode.strip_prefix("constant:") {
        let d = parse_floats(params, 3, "constant")?;
        let tensors = ConstantTensors::new(Tensor::new(d[0], d[1], d[2]))?;
        return Ok(Box::new(tensors));
    }

    if let Some(params) = mode.strip_prefix("oriented:") {
        let p = parse_floats(params, 3, "oriented")?;
        let angle = p[0].to_radians();
        let tensor = Tensor::from_orientation(angle, p[1], p[2]);
        tracing::info!(
            d11 = tensor.d11,
            d12 = tensor.d12,
            d22 = tensor.d22,
            det = tensor.determinant(),
            "oriented tensor"
        );
        return Ok(Box::new(ConstantTensors::new(tensor)?));
    }

    if let Some(path_str) = mode.strip_prefix("file:") {
        let field = io::load_tensor_field(Path::new(path_str), n1, n2)?;
        return Ok(Box::new(field));
    }

    bail!(
        "unknown --tensors mode: '{}'. Expected 'identity', 'constant:<d11>,<d12>,<d22>', \
         'oriented:<degrees>,<su>,<sv>', or 'file:<path>'",
        mode
    );
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => bail!("unknown --log-level '{}'", other),
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    if cli.source.is_empty() {
        bail!("at least one --source must be specified");
    }

    let (n1, n2) = parse_pair(&cli.size, "size")?;

    let mut sources = Array2::from_elem((n2, n1), false);
    for src in &cli.source {
        let (i1, i2) = parse_pair(src, "source")?;
        if i1 >= n1 || i2 >= n2 {
            bail!("--source {},{} is outside the {}x{} grid", i1, i2, n1, n2);
        }
        sources[[i2, i1]] = true;
    }

    let tensors = build_tensors(&cli.tensors, n1, n2)?;
    let mode = match cli.mode {
        Mode::GaussSeidel => SweepMode::GaussSeidel,
        Mode::Jacobi => SweepMode::Jacobi,
    };

    let mut solver = FimSolver::with_tensors(n1, n2, tensors)?
        .with_tolerance(cli.tolerance)?
        .with_max_sweeps(cli.max_sweeps)?
        .with_sweep_mode(mode);
    if let Some(threads) = cli.threads {
        solver = solver.with_threads(threads);
    }
    if cli.progress {
        solver = solver.with_progress(Box::new(|info: ProgressInfo| {
            eprintln!(
                "[{:.3}s] sweep={} active={}",
                info.elapsed.as_secs_f64(),
                info.sweep,
                info.active,
            );
        }));
    }

    solver.solve(&sources)?;
    let report = solver.report();
    if !report.converged {
        eprintln!(
            "warning: stopped after {} sweeps with {} samples still active",
            report.sweeps, report.remaining_active
        );
    }

    solver
        .save(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    println!(
        "solved {}x{} grid in {} sweeps -> {}",
        n1,
        n2,
        report.sweeps,
        cli.output.display()
    );

    Ok(())
}
