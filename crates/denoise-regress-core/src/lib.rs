//! Denoise Regress Core - regression matrix and baseline management
//!
//! This crate expands declared feature sets into denoiser test cases, manages
//! the versioned baseline tree those cases are checked against, and runs the
//! resulting commands one at a time, stopping at the first failure.

pub mod baseline;
pub mod config;
pub mod error;
pub mod features;
pub mod layout;
pub mod matrix;
pub mod model;
pub mod orchestrator;
pub mod runner;
pub mod scan;

pub use baseline::{BaselineManager, RawInput};
pub use config::{HarnessConfig, Suite, BASELINE_VERSION};
pub use error::{RegressError, Result};
pub use features::{resolve_extension, resolve_option, FeatureSet};
pub use matrix::{Cases, FeatureInput, MatrixAxes, MatrixGenerator, TestCase};
pub use model::{Arch, Filter, Mode, Precision, Quality};
pub use orchestrator::{Orchestrator, Summary};
pub use runner::{CommandLine, StepKind, TestRunner};
pub use scan::{BaselineFs, DiskFs, FileSetFs};
