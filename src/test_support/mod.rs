//! Test utilities and mocks for Berth unit tests.
//!
//! This module provides mock implementations of the collaborators that talk
//! to the outside world: the toolchain, the process runner and the artifact
//! stager.
//!
//! # Example
//!
//! ```rust,ignore
//! use berth::test_support::{MockRunner, MockProcessOutput};
//!
//! #[test]
//! fn test_example() {
//!     let runner = MockRunner::new();
//!     runner.expect("make alllib", MockProcessOutput::failure(2, "f951: error"));
//!
//!     // Hand `&runner` to a BuildExecutor...
//! }
//! ```

pub mod fixtures;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::builder::executor::ProcessRunner;
use crate::builder::stage::ArtifactStager;
use crate::builder::toolchain::{ToolchainFacts, ToolchainQuery};
use crate::core::InstallLayout;
use crate::util::process::CapturedOutput;

// Re-export fixtures for convenience
pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the process hit its time bound.
    pub timed_out: bool,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Create an output with both stdout and stderr.
    pub fn with_output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Create the output of a process killed at its deadline.
    pub fn timed_out(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: -1,
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    fn captured(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            status: (!self.timed_out).then_some(self.status),
            timed_out: self.timed_out,
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching commands in MockRunner.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match using a regex pattern.
    Regex(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
        }
    }
}

/// What a matched command does.
#[derive(Debug, Clone)]
enum Response {
    Output(MockProcessOutput),
    SpawnError(String),
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
struct CommandExpectation {
    pattern: CommandPattern,
    response: Response,
    /// Number of times this expectation can be used (None = unlimited).
    times: Option<usize>,
    used: usize,
}

impl CommandExpectation {
    fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<String>,
    default_output: Option<MockProcessOutput>,
}

/// Mock process runner.
///
/// Records every command line and answers from the registered
/// expectations, first match wins.
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<RunnerState>,
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: CommandPattern, response: Response, times: Option<usize>) {
        let mut state = self.state.lock().unwrap();
        state.expectations.push(CommandExpectation {
            pattern,
            response,
            times,
            used: 0,
        });
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&self, cmd: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandPattern::Exact(cmd.to_string()), Response::Output(output), None);
        self
    }

    /// Add an expectation that answers only `n` times.
    pub fn expect_times(&self, pattern: CommandPattern, output: MockProcessOutput, n: usize) -> &Self {
        self.push(pattern, Response::Output(output), Some(n));
        self
    }

    /// Make a command fail to start.
    pub fn fail_on(&self, cmd: &str, message: &str) -> &Self {
        self.push(
            CommandPattern::Exact(cmd.to_string()),
            Response::SpawnError(message.to_string()),
            None,
        );
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: MockProcessOutput) -> &Self {
        self.state.lock().unwrap().default_output = Some(output);
        self
    }

    /// Get all commands that were called.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl ProcessRunner for MockRunner {
    fn run(
        &self,
        _cwd: &Path,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CapturedOutput> {
        let full_cmd = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };

        let mut state = self.state.lock().unwrap();
        state.calls.push(full_cmd.clone());

        for exp in &mut state.expectations {
            if exp.pattern.matches(&full_cmd) && exp.available() {
                exp.used += 1;
                return match exp.response {
                    Response::Output(ref out) => Ok(out.captured()),
                    Response::SpawnError(ref message) => bail!("{}", message),
                };
            }
        }

        if let Some(ref default) = state.default_output {
            return Ok(default.captured());
        }

        bail!("unexpected command: {}", full_cmd)
    }
}

/// Toolchain query answering with fixed facts.
#[derive(Debug)]
pub struct StaticToolchain {
    facts: ToolchainFacts,
    queries: Cell<usize>,
}

impl StaticToolchain {
    pub fn new(facts: ToolchainFacts) -> Self {
        StaticToolchain {
            facts,
            queries: Cell::new(0),
        }
    }

    /// Number of times the toolchain was queried.
    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl ToolchainQuery for StaticToolchain {
    fn query(&self) -> Result<ToolchainFacts> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.facts.clone())
    }
}

#[derive(Debug, Clone)]
enum StageBehavior {
    Nothing,
    Fail(String),
    InstallMumps,
}

/// Stager that never looks at the work directory.
#[derive(Debug)]
pub struct MockStager {
    behavior: StageBehavior,
    calls: Cell<usize>,
}

impl MockStager {
    fn with(behavior: StageBehavior) -> Self {
        MockStager {
            behavior,
            calls: Cell::new(0),
        }
    }

    /// Succeeds without installing anything.
    pub fn ok() -> Self {
        Self::with(StageBehavior::Nothing)
    }

    /// Fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with(StageBehavior::Fail(message.to_string()))
    }

    /// Writes a complete MUMPS install into the layout.
    pub fn installing_mumps() -> Self {
        Self::with(StageBehavior::InstallMumps)
    }

    /// Number of times staging ran.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ArtifactStager for MockStager {
    fn stage(&self, _work_dir: &Path, layout: &InstallLayout) -> Result<Vec<PathBuf>> {
        self.calls.set(self.calls.get() + 1);
        match self.behavior {
            StageBehavior::Nothing => Ok(Vec::new()),
            StageBehavior::Fail(ref message) => bail!("{}", message),
            StageBehavior::InstallMumps => Ok(install_mumps_artifacts(layout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(runner: &MockRunner, program: &str, args: &[&str]) -> Result<CapturedOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        runner.run(Path::new("."), program, &args, Duration::from_secs(1))
    }

    #[test]
    fn test_mock_runner_basic() {
        let runner = MockRunner::new();
        runner.expect("make clean", MockProcessOutput::success("cleaned"));
        runner.expect_times(
            CommandPattern::Regex(r"^make (-j\d+ )?alllib$".to_string()),
            MockProcessOutput::failure(2, "boom"),
            1,
        );

        let out = run(&runner, "make", &["clean"]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "cleaned");

        let out = run(&runner, "make", &["-j4", "alllib"]).unwrap();
        assert_eq!(out.status, Some(2));

        // The single-use expectation is spent.
        assert!(run(&runner, "make", &["alllib"]).is_err());
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_mock_runner_timeout_and_spawn_error() {
        let runner = MockRunner::new();
        runner.expect("make alllib", MockProcessOutput::timed_out("partial"));
        runner.fail_on("gmake alllib", "not found");

        let out = run(&runner, "make", &["alllib"]).unwrap();
        assert!(out.timed_out);
        assert_eq!(out.status, None);

        assert!(run(&runner, "gmake", &["alllib"]).is_err());
    }

    #[test]
    fn test_mock_stager_counts_calls() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = InstallLayout::new(tmp.path());
        let stager = MockStager::installing_mumps();

        let staged = stager.stage(tmp.path(), &layout).unwrap();
        assert_eq!(stager.calls(), 1);
        assert!(staged.iter().all(|p| p.exists()));
    }
}
