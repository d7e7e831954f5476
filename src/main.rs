//! BRGEMM kernel benchmark.
//!
//! # Usage
//!
//! ```bash
//! # One shape: M N K LDA LDB LDC ALPHA BETA ALIGN_A ALIGN_C TRANS_A TRANS_B
//! #            PREFETCH PRECISION BATCHMODE BRCOUNT BRUNROLL REPS [TILECFG]
//! xgemm shape 64 64 64 64 64 64 1 0 1 1 0 0 nopf DP nobr 1 0 10
//!
//! # A shape list: FILE ALPHA BETA ALIGN_A ALIGN_C TRANS_A TRANS_B
//! #               PRECISION BATCHMODE BRCOUNT BRUNROLL REPS RUNCHECK [TILECFG]
//! xgemm list shapes.txt 1 1 1 1 0 0 BF16 strdbr 8 0 100 1
//! ```
//!
//! Reports go to stdout, logs to stderr (`RUST_LOG` overrides the `info` default).
//! The exit code is 0 when the worst error stays under the threshold, 1 otherwise
//! or on any fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use xgemm::{
    BatchMode, GemmConfig, Harness, HarnessBuilder, HostDispatcher, Precision, PrefetchMode,
    ProblemShape, RunSummary, ShapeList,
};

/// Correctness and performance harness for batch-reduce GEMM kernels
#[derive(Parser, Debug)]
#[command(name = "xgemm")]
#[command(version)]
struct Cli {
    /// Seed of the operand generator
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Output scale of the SUI8UI8 variant
    #[arg(long, default_value_t = 1.0, global = true)]
    scale: f32,

    /// Print the run summary as JSON instead of text
    #[cfg(feature = "serde")]
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single explicit shape (correctness and performance)
    Shape(ShapeArgs),
    /// Run every shape of a shape-list file
    List(ListArgs),
}

/// 0 means off, anything else on.
fn parse_flag(s: &str) -> std::result::Result<bool, String> {
    s.parse::<i64>()
        .map(|v| v != 0)
        .map_err(|e| format!("expected an integer flag, got {s:?}: {e}"))
}

#[derive(Args, Debug)]
struct GemmArgs {
    /// alpha (must be 1)
    alpha: f64,
    /// beta (0 or 1)
    beta: f64,
    /// 0: unaligned A, otherwise aligned
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    align_a: bool,
    /// 0: unaligned C, otherwise aligned
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    align_c: bool,
    /// 0: A normal, 1: A transposed
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    trans_a: bool,
    /// 0: B normal, 1: B transposed
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    trans_b: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// nobr, addrbr, offsbr or strdbr
    batch: BatchMode,
    /// Batch count (1 - N)
    br_count: i64,
    /// 0/1: unroll the batch loop
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    br_unroll: bool,
    /// Repetitions per shape
    reps: usize,
}

#[derive(Args, Debug)]
struct ShapeArgs {
    m: usize,
    n: usize,
    k: usize,
    lda: usize,
    ldb: usize,
    ldc: usize,
    #[command(flatten)]
    gemm: GemmArgs,
    /// nopf, pfsigonly, BL2viaC, AL2, curAL2, AL2_BL2viaC or curAL2_BL2viaC
    prefetch: PrefetchMode,
    /// SP, DP, I16I32, USI8I32, SUI8I32, SUI8UI8, BF16F32, BF16, BF16F32_FLAT, BF16_FLAT
    precision: Precision,
    #[command(flatten)]
    batch: BatchArgs,
    /// 1: external tile configuration, 0: internal
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    tile_config: Option<bool>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// File with one `M N K LDA LDB LDC` shape per line
    file: PathBuf,
    #[command(flatten)]
    gemm: GemmArgs,
    /// SP, DP, I16I32, USI8I32, SUI8I32, SUI8UI8, BF16F32, BF16, BF16F32_FLAT, BF16_FLAT
    precision: Precision,
    #[command(flatten)]
    batch: BatchArgs,
    /// 0: performance only, otherwise check against the reference
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    run_check: bool,
    /// 1: external tile configuration, 0: internal
    #[arg(value_parser = parse_flag, action = ArgAction::Set)]
    tile_config: Option<bool>,
}

fn gemm_config(
    gemm: &GemmArgs,
    batch: &BatchArgs,
    prefetch: PrefetchMode,
    tile_config: Option<bool>,
    scale: f32,
) -> GemmConfig {
    GemmConfig {
        alpha: gemm.alpha,
        beta: gemm.beta,
        trans_a: gemm.trans_a,
        trans_b: gemm.trans_b,
        aligned_a: gemm.align_a,
        aligned_c: gemm.align_c,
        prefetch,
        batch: batch.batch,
        batch_count: usize::try_from(batch.br_count).unwrap_or(0),
        batch_unroll: batch.br_unroll,
        tile_config: tile_config.unwrap_or(false),
        scale,
    }
}

fn build(
    precision: Precision,
    cfg: GemmConfig,
    reps: usize,
    run_check: bool,
    seed: u64,
) -> Result<Harness> {
    let harness = HarnessBuilder::new(precision)
        .config(cfg)?
        .reps(reps)?
        .run_check(run_check)
        .build_with_seed(HostDispatcher::new(), seed)?;
    Ok(harness)
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    #[cfg(feature = "serde")]
    let json = cli.json;
    #[cfg(not(feature = "serde"))]
    let json = false;

    let summary = match &cli.command {
        Command::Shape(args) => {
            let shape = ProblemShape::new(args.m, args.n, args.k, args.lda, args.ldb, args.ldc);
            let cfg = gemm_config(
                &args.gemm,
                &args.batch,
                args.prefetch,
                args.tile_config,
                cli.scale,
            );
            let mut harness = build(args.precision, cfg, args.batch.reps, true, cli.seed)?;
            let report = harness
                .run_shape(&shape)
                .with_context(|| format!("shape {shape} failed"))?;
            if !json {
                print!("{}", report.verbose());
            }
            harness.finish()
        }
        Command::List(args) => {
            let cfg = gemm_config(
                &args.gemm,
                &args.batch,
                PrefetchMode::None,
                args.tile_config,
                cli.scale,
            );
            let mut harness =
                build(args.precision, cfg, args.batch.reps, args.run_check, cli.seed)?;
            let shapes = ShapeList::open(&args.file)?;
            harness.run_all(shapes, |report| {
                if !json {
                    println!("{}", report.line());
                }
            })?;
            harness.finish()
        }
    };

    emit(&summary, json)?;
    Ok(if summary.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn emit(summary: &RunSummary, json: bool) -> Result<()> {
    #[cfg(feature = "serde")]
    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }
    #[cfg(not(feature = "serde"))]
    let _ = json;

    println!();
    println!();
    println!("{summary}");
    Ok(())
}
