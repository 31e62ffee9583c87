//! Synchronous execution of harness commands
//!
//! Every external tool (test binaries, the denoiser, conversion and inference
//! scripts) goes through [`TestRunner::execute`]. A command passes when it exits
//! with status zero; anything else is reported as
//! [`RegressError::ProcessFailure`] and the caller stops the run.

use crate::error::{RegressError, Result};
use crate::model::Arch;
use colored::Colorize;
use std::ffi::OsString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A program and its arguments, kept as data until executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Prefix the command with the emulator, restricting it to `arch`.
    pub fn emulated(self, emulator: &Path, arch: Arch) -> Self {
        if arch.is_native() {
            return self;
        }
        let mut args = vec![
            OsString::from(format!("-{}", arch.as_str())),
            OsString::from("--"),
            self.program,
        ];
        args.extend(self.args);
        Self {
            program: emulator.as_os_str().to_owned(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_word(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_word(f, arg)?;
        }
        Ok(())
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &OsString) -> fmt::Result {
    let word = word.to_string_lossy();
    if word.is_empty() || word.contains(char::is_whitespace) {
        write!(f, "\"{word}\"")
    } else {
        f.write_str(&word)
    }
}

/// What is being run, shown in front of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Test,
    Convert,
    Infer,
}

impl StepKind {
    pub fn label(self) -> &'static str {
        match self {
            StepKind::Test => "Test",
            StepKind::Convert => "Convert",
            StepKind::Infer => "Infer",
        }
    }
}

/// Runs commands one at a time, optionally redirecting their output to a log.
#[derive(Debug, Clone)]
pub struct TestRunner {
    log: Option<PathBuf>,
    emulator: PathBuf,
}

impl TestRunner {
    pub fn new(log: Option<PathBuf>, emulator: PathBuf) -> Self {
        Self { log, emulator }
    }

    pub fn log(&self) -> Option<&Path> {
        self.log.as_deref()
    }

    /// Print the step header; in log mode the result marker follows on the same line.
    pub fn announce(&self, kind: StepKind, name: &str) {
        if self.log.is_some() {
            print!("{}: {} ...", kind.label(), name);
            let _ = std::io::stdout().flush();
        } else {
            println!("{}: {} ...", kind.label(), name);
        }
    }

    /// Run `command` to completion, under emulation unless `arch` is native.
    pub fn execute(&self, command: CommandLine, arch: Arch) -> Result<()> {
        let command = command.emulated(&self.emulator, arch);
        let text = command.to_string();
        debug!("Executing: {}", text);

        let mut cmd = command.to_command();
        match &self.log {
            Some(log) => {
                let mut file = open_log(log)?;
                writeln!(file)?;
                writeln!(file, "{text}")?;
                cmd.stdout(Stdio::from(open_log(log)?))
                    .stderr(Stdio::from(open_log(log)?));
            }
            None => println!("Command: {text}"),
        }

        let status = cmd.status().map_err(|source| {
            self.report(false);
            RegressError::Spawn {
                command: text.clone(),
                source,
            }
        })?;

        if status.success() {
            self.report(true);
            Ok(())
        } else {
            self.report(false);
            debug!("Command exited with {}", status);
            Err(RegressError::ProcessFailure {
                command: text,
                log: self.log.clone(),
            })
        }
    }

    fn report(&self, passed: bool) {
        let marker = if passed {
            "PASSED".green()
        } else {
            "FAILED".red()
        };
        if self.log.is_some() {
            println!(" {marker}");
        } else {
            println!("{marker}\n");
        }
    }
}

fn open_log(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
