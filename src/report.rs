//! Machine-readable run summary for `--json`.
use crate::paths::{Artifact, DemoPaths};
use crate::pipeline::{PipelineState, StageRecord, StageStatus};
use crate::stage::{Stage, StageId};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub(crate) struct RunSummary {
    pub(crate) result: PipelineState,
    pub(crate) stages: Vec<StageSummary>,
    pub(crate) artifacts: Vec<ArtifactSummary>,
}

#[derive(Serialize, Debug)]
pub(crate) struct StageSummary {
    pub(crate) number: u8,
    pub(crate) stage: StageId,
    pub(crate) status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) command: Option<String>,
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SummaryStatus {
    Succeeded,
    Failed,
    NotRun,
}

#[derive(Serialize, Debug)]
pub(crate) struct ArtifactSummary {
    pub(crate) artifact: Artifact,
    pub(crate) path: String,
    pub(crate) present: bool,
}

pub(crate) fn build_summary(
    state: PipelineState,
    stages: &[Stage],
    records: &[StageRecord],
    paths: &DemoPaths,
) -> RunSummary {
    let stages = stages
        .iter()
        .map(|stage| {
            let record = records.iter().find(|record| record.stage == stage.id);
            let status = match record.map(|record| record.status) {
                Some(StageStatus::Succeeded) => SummaryStatus::Succeeded,
                Some(StageStatus::Failed) => SummaryStatus::Failed,
                None => SummaryStatus::NotRun,
            };
            StageSummary {
                number: stage.id.number(),
                stage: stage.id,
                status,
                exit_code: record.and_then(|record| record.exit_code),
                command: stage.command_line(),
            }
        })
        .collect();

    let artifacts = Artifact::ALL
        .iter()
        .map(|&artifact| {
            let path = paths.artifact(artifact);
            ArtifactSummary {
                artifact,
                present: path.is_file(),
                path: path.display().to_string(),
            }
        })
        .collect();

    RunSummary {
        result: state,
        stages,
        artifacts,
    }
}
