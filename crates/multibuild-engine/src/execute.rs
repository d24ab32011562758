//! Sequential, fail-fast execution of the build sequence.

use std::fmt;

use serde::Serialize;

use multibuild_config::{BuildConfig, CommandTemplate};
use multibuild_unit::BuildUnitId;
use multibuild_util::process::{CommandRunner, OutputLine, RunStatus, ShellRunner};

use crate::error::EngineError;

/// Exit code recorded when a unit produced no exit code of its own.
pub const NO_EXIT_CODE: i32 = -1;

/// The result of building one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub unit: BuildUnitId,
    /// The command's exit code, or [`NO_EXIT_CODE`] if it timed out, died by
    /// signal, or never started.
    pub exit_code: i32,
    pub succeeded: bool,
}

/// Why a unit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum HaltCause {
    ExitCode(i32),
    Signal,
    TimedOut,
    Spawn(String),
}

impl fmt::Display for HaltCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode(code) => write!(f, "exited with code {code}"),
            Self::Signal => f.write_str("was terminated by a signal"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Spawn(message) => write!(f, "could not be started: {message}"),
        }
    }
}

/// The unit that stopped the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Halt {
    pub unit: BuildUnitId,
    pub cause: HaltCause,
}

/// Everything recorded by one [`BuildExecutor::execute`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    outcomes: Vec<BuildOutcome>,
    halt: Option<Halt>,
}

impl ExecutionReport {
    /// Outcomes in execution order. Units after a failure have none.
    pub fn outcomes(&self) -> &[BuildOutcome] {
        &self.outcomes
    }

    pub fn halt(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }

    pub fn all_succeeded(&self) -> bool {
        self.halt.is_none() && self.outcomes.iter().all(|o| o.succeeded)
    }

    pub fn failed_unit(&self) -> Option<&BuildUnitId> {
        self.halt.as_ref().map(|h| &h.unit)
    }
}

/// Receives progress while a sequence runs.
pub trait BuildObserver {
    /// `index` is zero-based; `command` is the rendered template.
    fn unit_started(&mut self, _index: usize, _total: usize, _unit: &BuildUnitId, _command: &str) {}

    fn output(&mut self, _unit: &BuildUnitId, _line: &OutputLine) {}

    fn unit_finished(&mut self, _outcome: &BuildOutcome) {}
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl BuildObserver for SilentObserver {}

/// Runs the build command for each unit in order, stopping at the first failure.
pub struct BuildExecutor<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    template: &'a CommandTemplate,
}

impl<'a, R: CommandRunner + ?Sized> BuildExecutor<'a, R> {
    pub fn new(runner: &'a R, template: &'a CommandTemplate) -> Self {
        Self { runner, template }
    }

    /// Build every unit in `sequence`, in order.
    ///
    /// A failing unit is not an `Err`: it ends the run and is recorded in the
    /// report's halt.
    ///
    /// # Errors
    /// Returns [`EngineError::NothingToBuild`] if `sequence` is empty.
    pub fn execute(
        &self,
        sequence: &[BuildUnitId],
        observer: &mut dyn BuildObserver,
    ) -> Result<ExecutionReport, EngineError> {
        if sequence.is_empty() {
            return Err(EngineError::NothingToBuild);
        }

        let total = sequence.len();
        let mut report = ExecutionReport::default();

        for (index, unit) in sequence.iter().enumerate() {
            let command = self.template.render(unit);
            tracing::info!(%unit, "building unit {}/{total}", index + 1);
            observer.unit_started(index, total, unit, &command);

            let result = self
                .runner
                .run(&command, &mut |line| observer.output(unit, &line));

            let (outcome, cause) = match result {
                Ok(status) => judge(unit, status),
                Err(e) => (failed(unit, NO_EXIT_CODE), Some(HaltCause::Spawn(e.to_string()))),
            };

            observer.unit_finished(&outcome);
            report.outcomes.push(outcome);

            if let Some(cause) = cause {
                tracing::warn!(%unit, "build failed: {cause}");
                report.halt = Some(Halt {
                    unit: unit.clone(),
                    cause,
                });
                break;
            }
        }

        Ok(report)
    }
}

/// A shell runner working in the configured directory with its timeout.
pub fn shell_runner(config: &BuildConfig) -> ShellRunner {
    ShellRunner::new()
        .working_dir(&config.working_directory)
        .timeout(config.timeout)
}

fn judge(unit: &BuildUnitId, status: RunStatus) -> (BuildOutcome, Option<HaltCause>) {
    if status.timed_out {
        return (failed(unit, NO_EXIT_CODE), Some(HaltCause::TimedOut));
    }
    match status.exit_code {
        Some(0) => (
            BuildOutcome {
                unit: unit.clone(),
                exit_code: 0,
                succeeded: true,
            },
            None,
        ),
        Some(code) => (failed(unit, code), Some(HaltCause::ExitCode(code))),
        None => (failed(unit, NO_EXIT_CODE), Some(HaltCause::Signal)),
    }
}

fn failed(unit: &BuildUnitId, exit_code: i32) -> BuildOutcome {
    BuildOutcome {
        unit: unit.clone(),
        exit_code,
        succeeded: false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use multibuild_util::error::UtilError;

    use super::*;

    enum Scripted {
        Exit(i32),
        Signal,
        Timeout,
        SpawnFails,
    }

    /// Records commands and answers from a script keyed by command string.
    #[derive(Default)]
    struct FakeRunner {
        script: HashMap<String, Scripted>,
        ran: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn with(mut self, command: &str, result: Scripted) -> Self {
            self.script.insert(command.to_owned(), result);
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            command: &str,
            observer: &mut dyn FnMut(OutputLine),
        ) -> Result<RunStatus, UtilError> {
            self.ran.borrow_mut().push(command.to_owned());
            observer(OutputLine::Stdout(format!("building {command}")));
            match self.script.get(command).unwrap_or(&Scripted::Exit(0)) {
                Scripted::Exit(code) => Ok(RunStatus::exited(*code)),
                Scripted::Signal => Ok(RunStatus {
                    exit_code: None,
                    timed_out: false,
                }),
                Scripted::Timeout => Ok(RunStatus {
                    exit_code: None,
                    timed_out: true,
                }),
                Scripted::SpawnFails => Err(UtilError::CommandExec {
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no shell"),
                }),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl BuildObserver for Recorder {
        fn unit_started(&mut self, index: usize, total: usize, unit: &BuildUnitId, command: &str) {
            self.events
                .push(format!("start {}/{total} {unit} `{command}`", index + 1));
        }

        fn output(&mut self, unit: &BuildUnitId, line: &OutputLine) {
            if let OutputLine::Stdout(text) = line {
                self.events.push(format!("out {unit}: {text}"));
            }
        }

        fn unit_finished(&mut self, outcome: &BuildOutcome) {
            self.events
                .push(format!("done {} {}", outcome.unit, outcome.exit_code));
        }
    }

    fn template() -> CommandTemplate {
        CommandTemplate::parse("build {unit}").unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<BuildUnitId> {
        raw.iter().map(|s| BuildUnitId::new(s)).collect()
    }

    #[test]
    fn runs_every_unit_in_order() {
        let runner = FakeRunner::default();
        let template = template();
        let report = BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a", "b", "c"]), &mut SilentObserver)
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.failed_unit(), None);
        assert_eq!(report.outcomes().len(), 3);
        assert_eq!(*runner.ran.borrow(), vec!["build a", "build b", "build c"]);
    }

    #[test]
    fn stops_at_first_failure() {
        let runner = FakeRunner::default().with("build b", Scripted::Exit(2));
        let template = template();
        let report = BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a", "b", "c"]), &mut SilentObserver)
            .unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_unit(), Some(&BuildUnitId::new("b")));
        assert_eq!(*runner.ran.borrow(), vec!["build a", "build b"]);
        assert_eq!(
            report.outcomes().last(),
            Some(&BuildOutcome {
                unit: BuildUnitId::new("b"),
                exit_code: 2,
                succeeded: false,
            })
        );
        assert_eq!(
            report.halt().map(|h| &h.cause),
            Some(&HaltCause::ExitCode(2))
        );
    }

    #[test]
    fn timeout_halts_with_no_exit_code() {
        let runner = FakeRunner::default().with("build a", Scripted::Timeout);
        let template = template();
        let report = BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a", "b"]), &mut SilentObserver)
            .unwrap();

        assert_eq!(report.outcomes().len(), 1);
        assert_eq!(report.outcomes().first().map(|o| o.exit_code), Some(NO_EXIT_CODE));
        assert_eq!(report.halt().map(|h| &h.cause), Some(&HaltCause::TimedOut));
    }

    #[test]
    fn signal_halts_with_no_exit_code() {
        let runner = FakeRunner::default().with("build a", Scripted::Signal);
        let template = template();
        let report = BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a"]), &mut SilentObserver)
            .unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.outcomes().first().map(|o| o.exit_code), Some(NO_EXIT_CODE));
        assert_eq!(report.halt().map(|h| &h.cause), Some(&HaltCause::Signal));
    }

    #[test]
    fn spawn_failure_is_a_failed_outcome() {
        let runner = FakeRunner::default().with("build a", Scripted::SpawnFails);
        let template = template();
        let report = BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a", "b"]), &mut SilentObserver)
            .unwrap();

        assert_eq!(report.outcomes().len(), 1);
        assert!(report.outcomes().iter().all(|o| !o.succeeded));
        assert!(matches!(
            report.halt().map(|h| &h.cause),
            Some(HaltCause::Spawn(_))
        ));
        assert_eq!(*runner.ran.borrow(), vec!["build a"]);
    }

    #[test]
    fn empty_sequence_is_an_error() {
        let runner = FakeRunner::default();
        let template = template();
        let err = BuildExecutor::new(&runner, &template)
            .execute(&[], &mut SilentObserver)
            .unwrap_err();
        assert!(matches!(err, EngineError::NothingToBuild));
        assert!(runner.ran.borrow().is_empty());
    }

    #[test]
    fn observer_sees_start_output_and_finish() {
        let runner = FakeRunner::default();
        let template = template();
        let mut recorder = Recorder::default();
        BuildExecutor::new(&runner, &template)
            .execute(&ids(&["a", "b"]), &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "start 1/2 a `build a`",
                "out a: building build a",
                "done a 0",
                "start 2/2 b `build b`",
                "out b: building build b",
                "done b 0",
            ]
        );
    }

    #[test]
    fn halt_cause_messages() {
        assert_eq!(HaltCause::ExitCode(1).to_string(), "exited with code 1");
        assert_eq!(HaltCause::TimedOut.to_string(), "timed out");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_from_config_runs_in_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("App.sln"), b"").unwrap();
        let mut file = multibuild_config::ConfigFile::starter();
        file.build.command = "test -f {unit}".to_owned();
        let config = file.resolve(tmp.path()).unwrap();

        let runner = shell_runner(&config);
        let report = BuildExecutor::new(&runner, &config.command)
            .execute(&ids(&["App.sln"]), &mut SilentObserver)
            .unwrap();
        assert!(report.all_succeeded());
    }
}
