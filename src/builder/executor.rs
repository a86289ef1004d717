//! Bounded execution of a package's native build.
//!
//! The native build runs as `clean → compile → stage`:
//!
//! ```text
//! Idle → Cleaning → Compiling → Staging → Done
//!                       │           │
//!                       └───────────┴──→ Failed
//! ```
//!
//! Cleaning is best-effort and never blocks compilation. A compile or stage
//! failure (nonzero exit, timeout, or spawn error) stops the run and carries
//! everything captured so far. Output is captured, never streamed.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::builder::stage::ArtifactStager;
use crate::core::InstallLayout;
use crate::util::config::Config;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::process::{CapturedOutput, ProcessBuilder};

/// Lines of captured output shown in a failure diagnostic.
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Runs external commands.
pub trait ProcessRunner {
    /// Run `program args…` in `cwd`, killing it after `timeout`.
    fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CapturedOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CapturedOutput> {
        ProcessBuilder::new(program)
            .args(args)
            .cwd(cwd)
            .exec_with_timeout(timeout)
    }
}

/// A step of the native build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Clean,
    Compile,
    Stage,
}

/// How a step's failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure stops the build
    Required,
    /// Failure is logged and ignored
    BestEffort,
}

impl BuildStep {
    pub fn policy(&self) -> StepPolicy {
        match self {
            BuildStep::Clean => StepPolicy::BestEffort,
            BuildStep::Compile | BuildStep::Stage => StepPolicy::Required,
        }
    }

    fn state(&self) -> BuildState {
        match self {
            BuildStep::Clean => BuildState::Cleaning,
            BuildStep::Compile => BuildState::Compiling,
            BuildStep::Stage => BuildState::Staging,
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::Clean => write!(f, "clean"),
            BuildStep::Compile => write!(f, "compile"),
            BuildStep::Stage => write!(f, "stage"),
        }
    }
}

/// Executor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Cleaning,
    Compiling,
    Staging,
    Done,
    Failed,
}

/// Captured result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: BuildStep,
    /// Command line, for logs
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when killed or never started
    pub status: Option<i32>,
    pub timed_out: bool,
}

impl StepOutput {
    fn from_captured(step: BuildStep, command: String, out: CapturedOutput) -> Self {
        StepOutput {
            step,
            command,
            stdout: out.stdout,
            stderr: out.stderr,
            status: out.status,
            timed_out: out.timed_out,
        }
    }

    fn not_started(step: BuildStep, command: String, error: &anyhow::Error) -> Self {
        StepOutput {
            step,
            command,
            stdout: String::new(),
            stderr: format!("{:#}\n", error),
            status: None,
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    /// Why the step failed, in a few words.
    pub fn failure_reason(&self, timeout: Duration) -> String {
        if self.timed_out {
            format!("timed out after {:?}", timeout)
        } else {
            match self.status {
                Some(code) => format!("exited with status {}", code),
                None => "could not be run".to_string(),
            }
        }
    }

    fn write_log(&self, out: &mut String) {
        out.push_str(&format!("==> {}: {}\n", self.step, self.command));
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
    }
}

/// Outputs of every step that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub steps: Vec<StepOutput>,
}

impl BuildReport {
    /// Output of a given step, if it ran.
    pub fn step(&self, step: BuildStep) -> Option<&StepOutput> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// All captured output, step by step.
    pub fn combined_output(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            step.write_log(&mut out);
        }
        out
    }
}

/// Failure of the native build.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("{step} step {reason}")]
    BuildExecution {
        step: BuildStep,
        reason: String,
        /// Combined captured output of every step that ran
        output: String,
    },
}

impl ExecError {
    /// Convert to a user-friendly diagnostic with the tail of the build log.
    pub fn to_diagnostic(&self, package: &str) -> Diagnostic {
        match self {
            ExecError::BuildExecution {
                step,
                reason,
                output,
            } => Diagnostic::error(format!("failed to build `{}`", package))
                .with_context(format!("{} step {}", step, reason))
                .with_output(tail(output, DIAGNOSTIC_TAIL_LINES))
                .with_suggestion(suggestions::BUILD_FAILED),
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// How to invoke the package's native make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeInvocation {
    pub program: String,
    pub clean_target: String,
    pub build_target: String,
    pub jobs: Option<usize>,
}

impl Default for MakeInvocation {
    fn default() -> Self {
        MakeInvocation {
            program: "make".to_string(),
            clean_target: "clean".to_string(),
            build_target: "alllib".to_string(),
            jobs: None,
        }
    }
}

impl MakeInvocation {
    /// Build from the `[build]` section.
    pub fn from_config(config: &Config) -> Self {
        let defaults = MakeInvocation::default();
        MakeInvocation {
            program: config.make_program().to_string(),
            clean_target: config
                .build
                .clean_target
                .clone()
                .unwrap_or(defaults.clean_target),
            build_target: config
                .build
                .build_target
                .clone()
                .unwrap_or(defaults.build_target),
            jobs: config.build.jobs,
        }
    }

    fn args(&self, step: BuildStep) -> Vec<String> {
        match step {
            BuildStep::Clean => vec![self.clean_target.clone()],
            _ => {
                let mut args = Vec::new();
                if let Some(jobs) = self.jobs {
                    args.push(format!("-j{}", jobs));
                }
                args.push(self.build_target.clone());
                args
            }
        }
    }
}

/// Drives clean → compile → stage for one package.
pub struct BuildExecutor<'a> {
    runner: &'a dyn ProcessRunner,
    stager: &'a dyn ArtifactStager,
    make: MakeInvocation,
    timeout: Duration,
    state: BuildState,
    history: Vec<BuildState>,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        stager: &'a dyn ArtifactStager,
        make: MakeInvocation,
        timeout: Duration,
    ) -> Self {
        BuildExecutor {
            runner,
            stager,
            make,
            timeout,
            state: BuildState::Idle,
            history: vec![BuildState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[BuildState] {
        &self.history
    }

    fn transition(&mut self, next: BuildState) {
        tracing::debug!("build state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Run the native build in `work_dir` and stage into `layout`.
    pub fn execute(
        &mut self,
        work_dir: &Path,
        layout: &InstallLayout,
    ) -> Result<BuildReport, ExecError> {
        let mut report = BuildReport::default();

        for step in [BuildStep::Clean, BuildStep::Compile] {
            self.transition(step.state());
            let output = self.run_make(work_dir, step);
            let ok = output.success();
            report.steps.push(output);

            if ok {
                continue;
            }
            match step.policy() {
                StepPolicy::BestEffort => {
                    tracing::warn!(
                        "{} step failed in {}, continuing",
                        step,
                        work_dir.display()
                    );
                }
                StepPolicy::Required => return Err(self.fail(step, report)),
            }
        }

        self.transition(BuildState::Staging);
        match self.stager.stage(work_dir, layout) {
            Ok(staged) => {
                let listing: String = staged
                    .iter()
                    .map(|p| format!("{}\n", p.display()))
                    .collect();
                report.steps.push(StepOutput {
                    step: BuildStep::Stage,
                    command: format!("stage into {}", layout.prefix().display()),
                    stdout: listing,
                    stderr: String::new(),
                    status: Some(0),
                    timed_out: false,
                });
            }
            Err(e) => {
                report.steps.push(StepOutput::not_started(
                    BuildStep::Stage,
                    format!("stage into {}", layout.prefix().display()),
                    &e,
                ));
                return Err(self.fail(BuildStep::Stage, report));
            }
        }

        self.transition(BuildState::Done);
        Ok(report)
    }

    fn run_make(&self, work_dir: &Path, step: BuildStep) -> StepOutput {
        let args = self.make.args(step);
        let command = std::iter::once(self.make.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!("running `{}` in {}", command, work_dir.display());
        match self
            .runner
            .run(work_dir, &self.make.program, &args, self.timeout)
        {
            Ok(out) => StepOutput::from_captured(step, command, out),
            Err(e) => StepOutput::not_started(step, command, &e),
        }
    }

    fn fail(&mut self, step: BuildStep, report: BuildReport) -> ExecError {
        self.transition(BuildState::Failed);
        let reason = report
            .step(step)
            .map(|s| s.failure_reason(self.timeout))
            .unwrap_or_else(|| "failed".to_string());

        ExecError::BuildExecution {
            step,
            reason,
            output: report.combined_output(),
        }
    }
}
