//! Top-level sequencing of a harness invocation
//!
//! Run mode first executes the smoke checks (`oidnTest`, then `oidnBenchmark`
//! unless minimal), then every selected suite's matrix. Baseline mode creates,
//! converts and infers each selected suite's dataset. Regression suites are
//! skipped entirely in minimal mode. The first failure ends the invocation.

use crate::baseline::BaselineManager;
use crate::config::{HarnessConfig, Suite};
use crate::error::Result;
use crate::matrix::MatrixGenerator;
use crate::model::Mode;
use crate::runner::{CommandLine, StepKind, TestRunner};
use crate::scan::BaselineFs;
use tracing::info;

pub const TEST_BINARY: &str = "oidnTest";
pub const BENCHMARK_BINARY: &str = "oidnBenchmark";

/// Counts reported after a successful invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Commands executed and passed, smoke checks included
    pub executed: usize,
    /// Matrix cases dropped because a feature input was missing
    pub skipped: usize,
}

pub struct Orchestrator<'a, F: BaselineFs + ?Sized> {
    config: &'a HarnessConfig,
    fs: &'a F,
    runner: TestRunner,
}

impl<'a, F: BaselineFs + ?Sized> Orchestrator<'a, F> {
    pub fn new(config: &'a HarnessConfig, fs: &'a F) -> Self {
        Self {
            config,
            fs,
            runner: TestRunner::new(config.log.clone(), config.emulator.clone()),
        }
    }

    pub fn run(&self) -> Result<Summary> {
        self.config.validate()?;

        let mut summary = Summary::default();
        if self.config.mode == Mode::Run {
            summary.executed += self.smoke_checks()?;
        }

        if !self.config.minimal {
            for suite in self.config.selected_suites() {
                info!("Suite {} on {}", suite.filter, suite.dataset);
                match self.config.mode {
                    Mode::Baseline => summary.executed += self.generate(suite)?,
                    Mode::Run => {
                        let (executed, skipped) = self.regress(suite)?;
                        summary.executed += executed;
                        summary.skipped += skipped;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// What an invocation would do, without running anything.
    ///
    /// Run mode lists the matrix case names. Baseline mode lists the
    /// conversion and inference steps.
    pub fn plan(&self) -> Result<Vec<String>> {
        self.config.validate()?;

        let mut names = Vec::new();
        if self.config.minimal {
            return Ok(names);
        }
        if self.config.mode == Mode::Baseline {
            let manager = BaselineManager::new(self.config, self.fs, &self.runner);
            for suite in self.config.selected_suites() {
                names.extend(manager.plan(suite.filter, &suite.dataset, &suite.feature_sets)?);
            }
            return Ok(names);
        }

        let generator = MatrixGenerator::new(self.fs, self.config);
        for suite in self.config.selected_suites() {
            for set in &suite.feature_sets {
                for case in generator.expand(suite.filter, &suite.dataset, set)? {
                    names.push(case?.name());
                }
            }
        }
        Ok(names)
    }

    fn smoke_checks(&self) -> Result<usize> {
        self.runner.announce(StepKind::Test, TEST_BINARY);
        self.runner
            .execute(self.binary(TEST_BINARY), self.config.arch)?;

        if self.config.minimal {
            return Ok(1);
        }
        self.runner.announce(StepKind::Test, BENCHMARK_BINARY);
        self.runner.execute(
            CommandLine::new(self.binary_path(BENCHMARK_BINARY))
                .args(["-v", "1"])
                .args(self.device_args()),
            self.config.arch,
        )?;
        Ok(2)
    }

    fn generate(&self, suite: &Suite) -> Result<usize> {
        let manager = BaselineManager::new(self.config, self.fs, &self.runner);
        manager.create_baseline_root(&suite.dataset)?;
        let mut executed = manager.convert_inputs(suite.filter, &suite.dataset)?;

        for set in &suite.feature_sets {
            manager.generate_baseline(suite.filter, &suite.dataset, set)?;
            executed += 1;
        }
        Ok(executed)
    }

    fn regress(&self, suite: &Suite) -> Result<(usize, usize)> {
        let generator = MatrixGenerator::new(self.fs, self.config);
        let device = self.config.device.as_deref();

        let (mut executed, mut skipped) = (0, 0);
        for set in &suite.feature_sets {
            let mut cases = generator.expand(suite.filter, &suite.dataset, set)?;
            for case in cases.by_ref() {
                let case = case?;
                self.runner.announce(StepKind::Test, &case.name());
                self.runner
                    .execute(case.command(&self.config.bin_dir, device), self.config.arch)?;
                executed += 1;
            }
            skipped += cases.skipped();
        }
        Ok((executed, skipped))
    }

    fn binary(&self, name: &str) -> CommandLine {
        CommandLine::new(self.binary_path(name)).args(self.device_args())
    }

    fn binary_path(&self, name: &str) -> std::path::PathBuf {
        self.config
            .bin_dir
            .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
    }

    fn device_args(&self) -> Vec<String> {
        match &self.config.device {
            Some(device) => vec!["--device".to_string(), device.clone()],
            None => Vec::new(),
        }
    }
}
