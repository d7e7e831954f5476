//! Correctness and performance harness for batch-reduce GEMM kernels.
//!
//! `xgemm` drives an external GEMM kernel over one or many problem shapes,
//! times it, and checks its output against a reference implementation. A
//! batch-reduce GEMM (BRGEMM) sums the products of `batch_count` A/B pairs into
//! a single C tile: `C = beta * C + sum_r A_r * op(B_r)`.
//!
//! # Design goals
//!
//! - The kernel under test is opaque: the harness only talks to it through the
//!   [`Dispatcher`] / [`GemmKernel`] seam ([`kernel`]). [`HostDispatcher`] is a
//!   portable backend behind that seam.
//! - One generic reference loop ([`reference`]) serves every precision, driven by
//!   a [`variant::Variant`] type per precision.
//! - Buffers are scoped to a single shape and released on every exit path.
//!
//! # Panics vs `Result`
//!
//! - Configuration, shape, shape-list and dispatch problems are [`Error`]s and
//!   abort the run.
//! - A kernel result that deviates from the reference is not an error; it is
//!   recorded in the [`ErrorAccumulator`] and decides the final verdict.
//! - The low-level reference loops ([`reference::reference`],
//!   [`reference::reduce_batches`]) panic on undersized slices via `assert!`.
//!
//! # Data layout
//!
//! All matrices are column-major with explicit leading dimensions; A and B carry
//! a batch dimension, C does not. See [`shape`] for the exact indexing.
//!
//! # Quick start
//!
//! ```rust
//! use xgemm::{GemmConfig, HarnessBuilder, HostDispatcher, Precision, ProblemShape};
//!
//! # fn main() -> xgemm::Result<()> {
//! let mut harness = HarnessBuilder::new(Precision::F64)
//!     .config(GemmConfig::default())?
//!     .build_with_seed(HostDispatcher::new(), 0)?;
//!
//! let report = harness.run_shape(&ProblemShape::square(64))?;
//! println!("{}", report.verbose());
//!
//! let summary = harness.finish();
//! assert!(summary.passed);
//! # Ok(())
//! # }
//! ```

pub mod bf16;
pub mod buffer;
pub mod builder;
pub mod config;
pub mod error;
pub mod harness;
pub mod host;
pub mod invoke;
pub mod kernel;
pub(crate) mod matmul;
pub mod metrics;
pub mod operand;
pub mod precision;
pub mod reference;
pub mod report;
pub mod rng;
pub mod shape;
pub mod shapes;
pub mod variant;

pub use builder::HarnessBuilder;
pub use config::{BatchMode, GemmConfig, PrefetchMode, TargetProfile};
pub use error::{Error, Result};
pub use harness::Harness;
pub use host::HostDispatcher;
pub use kernel::{
    Dispatcher, GemmKernel, KernelCall, KernelDescriptor, KernelInfo, PrefetchHint, TileConfig,
};
pub use metrics::{ErrorAccumulator, MatDiff};
pub use precision::Precision;
pub use report::{RunSummary, ShapeReport};
pub use shape::ProblemShape;
pub use shapes::ShapeList;
