//! Sequential stage driver.
//!
//! Stages run strictly in order, one process at a time, and the first failure
//! ends the run. How that failure surfaces depends on the stage's
//! [`OnFailure`] policy: setup stages hand back the error, demonstration
//! stages log a diagnostic and yield [`PipelineOutcome::Failed`]. A tool that
//! cannot be spawned at all is always handed back, whatever the policy.
use crate::kek::{generate_kek, write_kek, KEK_LEN};
use crate::stage::{ArtifactRef, Invocation, OnFailure, Stage, StageAction, StageId};
use crate::util::resolve_program;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::process::Command;

/// Termination of a stage. `code` is `None` when a process was killed by a
/// signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct StageExit {
    pub(crate) code: Option<i32>,
}

impl StageExit {
    pub(crate) fn success() -> Self {
        Self { code: Some(0) }
    }

    pub(crate) fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Runs a stage's external process to completion.
pub(crate) trait StageRunner {
    fn run(&mut self, stage: &Stage, invocation: &Invocation) -> Result<StageExit>;
}

/// Spawns real child processes with inherited stdio.
pub(crate) struct ProcessRunner;

impl StageRunner for ProcessRunner {
    fn run(&mut self, _stage: &Stage, invocation: &Invocation) -> Result<StageExit> {
        let program = resolve_program(&invocation.program, &invocation.cwd);
        let status = Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .status()
            .with_context(|| format!("run {}", program.display()))?;
        Ok(StageExit {
            code: status.code(),
        })
    }
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub(crate) enum PipelineState {
    NotStarted,
    Running(StageId),
    Succeeded,
    FailedAt(StageId),
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StageStatus {
    Succeeded,
    Failed,
}

/// What happened to one stage that was attempted.
#[derive(Serialize, Debug, Clone)]
pub(crate) struct StageRecord {
    pub(crate) stage: StageId,
    pub(crate) status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PipelineOutcome {
    Succeeded,
    Failed {
        stage: StageId,
        code: u8,
        message: &'static str,
    },
}

pub(crate) struct Pipeline<R> {
    stages: Vec<Stage>,
    runner: R,
    state: PipelineState,
    records: Vec<StageRecord>,
}

impl<R: StageRunner> Pipeline<R> {
    pub(crate) fn new(stages: Vec<Stage>, runner: R) -> Self {
        Self {
            stages,
            runner,
            state: PipelineState::NotStarted,
            records: Vec::new(),
        }
    }

    pub(crate) fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    pub(crate) fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Run every stage in order. `Err` means a propagating stage failed;
    /// `Ok(Failed)` means a reporting stage failed and its diagnostic was
    /// already logged.
    pub(crate) fn run(&mut self) -> Result<PipelineOutcome> {
        if self.state != PipelineState::NotStarted {
            return Err(anyhow!("pipeline already ran ({:?})", self.state));
        }
        let Self {
            stages,
            runner,
            state,
            records,
        } = self;

        for stage in stages.iter() {
            *state = PipelineState::Running(stage.id);
            let failure = match execute_stage(stage, runner) {
                Ok(StageResult::Completed(exit)) if exit.is_success() => {
                    records.push(StageRecord {
                        stage: stage.id,
                        status: StageStatus::Succeeded,
                        exit_code: exit.code,
                    });
                    continue;
                }
                Ok(StageResult::Completed(exit)) => {
                    records.push(StageRecord {
                        stage: stage.id,
                        status: StageStatus::Failed,
                        exit_code: exit.code,
                    });
                    let command = stage.command_line().unwrap_or_default();
                    let cwd = match &stage.action {
                        StageAction::Process(invocation) => invocation.cwd.display().to_string(),
                        StageAction::GenerateKek { .. } => String::new(),
                    };
                    anyhow!("{} failed: `{command}` (in {cwd}) returned {exit}", stage.id)
                }
                Ok(StageResult::MissingInput(input)) => {
                    records.push(StageRecord {
                        stage: stage.id,
                        status: StageStatus::Failed,
                        exit_code: None,
                    });
                    anyhow!(
                        "{} failed: missing {} at {}",
                        stage.id,
                        input.artifact,
                        input.path.display()
                    )
                }
                // Spawn and I/O errors abort the run whatever the stage policy.
                Err(err) => {
                    records.push(StageRecord {
                        stage: stage.id,
                        status: StageStatus::Failed,
                        exit_code: None,
                    });
                    *state = PipelineState::FailedAt(stage.id);
                    return Err(err.context(format!("{} failed", stage.id)));
                }
            };

            *state = PipelineState::FailedAt(stage.id);
            return match stage.on_failure {
                OnFailure::Propagate => Err(failure),
                OnFailure::ReportAndExit { code, message } => {
                    let detail = format!("{failure:#}");
                    tracing::error!(stage = %stage.id, error = %detail, "{message}");
                    Ok(PipelineOutcome::Failed {
                        stage: stage.id,
                        code,
                        message,
                    })
                }
            };
        }

        *state = PipelineState::Succeeded;
        tracing::info!(stages = records.len(), "demo pipeline complete");
        Ok(PipelineOutcome::Succeeded)
    }
}

/// A stage that ran to termination, or one whose inputs were not on disk.
enum StageResult {
    Completed(StageExit),
    MissingInput(ArtifactRef),
}

fn execute_stage<R: StageRunner>(stage: &Stage, runner: &mut R) -> Result<StageResult> {
    tracing::info!(stage = %stage.id, "{}", stage.id.description());

    if let Some(input) = stage.consumes.iter().find(|input| !input.path.is_file()) {
        return Ok(StageResult::MissingInput(input.clone()));
    }

    let exit = match &stage.action {
        StageAction::Process(invocation) => {
            tracing::info!(
                stage = %stage.id,
                cwd = %invocation.cwd.display(),
                "{}",
                invocation.command_line()
            );
            runner.run(stage, invocation)?
        }
        StageAction::GenerateKek { path } => {
            let kek = generate_kek()?;
            let fingerprint = write_kek(path, &kek)?;
            tracing::info!(
                stage = %stage.id,
                path = %path.display(),
                kek_sha256 = %fingerprint,
                "wrote {KEK_LEN}-byte KEK"
            );
            StageExit::success()
        }
    };

    if exit.is_success() {
        for output in &stage.produces {
            if !output.path.is_file() {
                tracing::warn!(
                    stage = %stage.id,
                    path = %output.path.display(),
                    "stage succeeded without producing {}",
                    output.artifact
                );
            }
        }
    }
    Ok(StageResult::Completed(exit))
}
