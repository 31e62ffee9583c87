//! Baseline generation
//!
//! A dataset's baseline directory is written exactly once: creation fails if
//! it already exists, so an existing baseline is never overwritten. The raw
//! inputs are then converted into per-feature float maps and the inference
//! tool writes one reference per declared feature set.

use crate::config::HarnessConfig;
use crate::error::{RegressError, Result};
use crate::features::FeatureSet;
use crate::layout;
use crate::model::{Arch, Filter};
use crate::runner::{CommandLine, StepKind, TestRunner};
use crate::scan::{strip_name, BaselineFs};
use std::path::PathBuf;
use tracing::{info, warn};

pub const CONVERT_SCRIPT: &str = "convert_image.py";
pub const INFER_SCRIPT: &str = "infer.py";

/// A raw dataset image carrying one feature channel, e.g. `<data>/rt_regress/img01.hdr.exr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    pub path: PathBuf,
    pub image: String,
    pub feature: String,
}

pub struct BaselineManager<'a, F: BaselineFs + ?Sized> {
    config: &'a HarnessConfig,
    fs: &'a F,
    runner: &'a TestRunner,
}

impl<'a, F: BaselineFs + ?Sized> BaselineManager<'a, F> {
    pub fn new(config: &'a HarnessConfig, fs: &'a F, runner: &'a TestRunner) -> Self {
        Self { config, fs, runner }
    }

    pub fn baseline_dir(&self, dataset: &str) -> PathBuf {
        layout::dataset_dir(&self.config.baseline_dir, dataset)
    }

    /// Create the dataset's baseline directory, refusing to reuse an existing one.
    pub fn create_baseline_root(&self, dataset: &str) -> Result<PathBuf> {
        let dir = self.baseline_dir(dataset);
        if dir.exists() {
            return Err(RegressError::ConfigConflict(dir));
        }
        std::fs::create_dir_all(&dir)?;
        info!("Created baseline directory {}", dir.display());
        Ok(dir)
    }

    /// Raw images of `dataset`, sorted by path.
    pub fn raw_inputs(&self, dataset: &str) -> Result<Vec<RawInput>> {
        let data_dir = layout::dataset_dir(&self.config.data_dir, dataset);
        let suffix = format!(".{}", self.config.raw_extension);

        let mut inputs = Vec::new();
        for path in self.fs.find_with_suffix(&data_dir, &suffix)? {
            let parsed = strip_name(&data_dir, &path, &suffix)
                .and_then(|stem| split_feature(&stem));
            match parsed {
                Some((image, feature)) => inputs.push(RawInput {
                    path,
                    image,
                    feature,
                }),
                None => warn!("Ignoring raw input without a feature tag: {}", path.display()),
            }
        }
        Ok(inputs)
    }

    /// Convert every raw input of `dataset` into `<image>.input.<feature>.pfm`.
    ///
    /// Returns the number of converted files. Stops at the first failing conversion.
    pub fn convert_inputs(&self, filter: Filter, dataset: &str) -> Result<usize> {
        let baseline_dir = self.baseline_dir(dataset);
        let inputs = self.raw_inputs(dataset)?;

        for input in &inputs {
            self.runner
                .announce(StepKind::Convert, &convert_step_name(filter, input));
            let output = layout::input_path(&baseline_dir, &input.image, &input.feature);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let cmd = self.tool(CONVERT_SCRIPT).arg(&input.path).arg(&output);
            self.runner.execute(cmd, Arch::Native)?;
        }
        Ok(inputs.len())
    }

    /// Run inference once for `set`, producing its reference images.
    pub fn generate_baseline(&self, filter: Filter, dataset: &str, set: &FeatureSet) -> Result<()> {
        self.runner
            .announce(StepKind::Infer, &infer_step_name(filter, set));
        self.runner.execute(self.infer_command(filter, dataset, set), Arch::Native)
    }

    /// Steps baseline generation would run for `dataset`, labelled as they are
    /// announced. Nothing is created or executed.
    pub fn plan(&self, filter: Filter, dataset: &str, sets: &[FeatureSet]) -> Result<Vec<String>> {
        let dir = self.baseline_dir(dataset);
        if dir.exists() {
            return Err(RegressError::ConfigConflict(dir));
        }

        let mut steps: Vec<String> = self
            .raw_inputs(dataset)?
            .iter()
            .map(|input| format!("{}: {}", StepKind::Convert.label(), convert_step_name(filter, input)))
            .collect();
        steps.extend(
            sets.iter()
                .map(|set| format!("{}: {}", StepKind::Infer.label(), infer_step_name(filter, set))),
        );
        Ok(steps)
    }

    pub fn infer_command(&self, filter: Filter, dataset: &str, set: &FeatureSet) -> CommandLine {
        self.tool(INFER_SCRIPT)
            .arg("-D")
            .arg(&self.config.data_dir)
            .arg("-R")
            .arg(&self.config.results_dir)
            .arg("-O")
            .arg(&self.config.baseline_dir)
            .args(["-i", dataset, "-r", set.result_name(filter).as_str(), "-F", "pfm"])
    }

    fn tool(&self, script: &str) -> CommandLine {
        let script = self.config.tools_dir.join(script);
        match &self.config.interpreter {
            Some(interpreter) => CommandLine::new(interpreter).arg(script),
            None => CommandLine::new(script),
        }
    }
}

fn convert_step_name(filter: Filter, input: &RawInput) -> String {
    format!("{}.{}.{}", filter, input.image, input.feature)
}

fn infer_step_name(filter: Filter, set: &FeatureSet) -> String {
    format!("{}.{}", filter, set.features_str())
}

/// Split `<image>.<feature>` at the last dot.
fn split_feature(stem: &str) -> Option<(String, String)> {
    let (image, feature) = stem.rsplit_once('.')?;
    if image.is_empty() || feature.is_empty() || feature.contains('/') {
        return None;
    }
    Some((image.to_string(), feature.to_string()))
}
