//! Stage descriptors for the demo pipeline.
//!
//! Each stage declares what it runs, where it runs, which artifacts it reads
//! and writes, and how a failure is surfaced. The driver loop in
//! [`crate::pipeline`] treats all stages alike.
use crate::config::DemoConfig;
use crate::paths::{Artifact, DemoPaths};
use crate::util::format_command_line;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Exit status for the demonstration stages, `-1` as seen by the shell.
pub(crate) const DEMO_FAILURE_EXIT_CODE: u8 = 255;

pub(crate) const ENCRYPT_FAILED_MESSAGE: &str = "demo encryption failed";
pub(crate) const SEARCH_FAILED_MESSAGE: &str = "demo decryption and search failed";

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StageId {
    GenerateKeys,
    SealCa,
    RegisterCa,
    GenerateKek,
    EncryptData,
    SearchData,
}

impl StageId {
    pub(crate) fn number(self) -> u8 {
        match self {
            StageId::GenerateKeys => 1,
            StageId::SealCa => 2,
            StageId::RegisterCa => 3,
            StageId::GenerateKek => 4,
            StageId::EncryptData => 5,
            StageId::SearchData => 6,
        }
    }

    /// Operator-facing progress line.
    pub(crate) fn description(self) -> &'static str {
        match self {
            StageId::GenerateKeys => "Generating asymmetric keys ...",
            StageId::SealCa => "Sealing CA cert ...",
            StageId::RegisterCa => "Registering CA cert ...",
            StageId::GenerateKek => "Generating random symmetric KEK ...",
            StageId::EncryptData => "Encrypting the data file using the demo client ...",
            StageId::SearchData => {
                "Decrypting and searching the data file using the demo client ..."
            }
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageId::GenerateKeys => "generate keys",
            StageId::SealCa => "seal CA cert",
            StageId::RegisterCa => "register CA cert",
            StageId::GenerateKek => "generate KEK",
            StageId::EncryptData => "encrypt data",
            StageId::SearchData => "decrypt and search data",
        };
        write!(f, "stage {} ({name})", self.number())
    }
}

/// A single external process: program, argv, and the directory relative
/// paths resolve against.
#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: PathBuf,
}

impl Invocation {
    pub(crate) fn command_line(&self) -> String {
        format_command_line(&self.program, &self.args)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum StageAction {
    Process(Invocation),
    GenerateKek { path: PathBuf },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum OnFailure {
    /// Abort the run with the underlying error.
    Propagate,
    /// Log `message` and exit with `code`.
    ReportAndExit { code: u8, message: &'static str },
}

#[derive(Debug, Clone)]
pub(crate) struct ArtifactRef {
    pub(crate) artifact: Artifact,
    pub(crate) path: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct Stage {
    pub(crate) id: StageId,
    pub(crate) action: StageAction,
    pub(crate) consumes: Vec<ArtifactRef>,
    pub(crate) produces: Vec<ArtifactRef>,
    pub(crate) on_failure: OnFailure,
}

impl Stage {
    pub(crate) fn command_line(&self) -> Option<String> {
        match &self.action {
            StageAction::Process(invocation) => Some(invocation.command_line()),
            StageAction::GenerateKek { .. } => None,
        }
    }
}

/// Build the six stages in execution order.
pub(crate) fn build_stages(config: &DemoConfig) -> Vec<Stage> {
    let paths = &config.paths;
    let tools = &config.tools;
    let refs = |artifacts: &[Artifact]| artifact_refs(paths, artifacts);

    vec![
        Stage {
            id: StageId::GenerateKeys,
            action: StageAction::Process(Invocation {
                program: tools.keygen.clone(),
                args: Vec::new(),
                cwd: paths.out_dir(),
            }),
            consumes: Vec::new(),
            produces: refs(&[Artifact::CaCert, Artifact::WorkerKey, Artifact::WorkerCert]),
            on_failure: OnFailure::Propagate,
        },
        Stage {
            id: StageId::SealCa,
            action: StageAction::Process(Invocation {
                program: tools.pelz.clone(),
                args: vec![
                    "seal".to_string(),
                    path_arg(&paths.ca_cert_path()),
                    "-o".to_string(),
                    path_arg(&paths.sealed_ca_cert_path()),
                ],
                cwd: paths.parent_dir().to_path_buf(),
            }),
            consumes: refs(&[Artifact::CaCert]),
            produces: refs(&[Artifact::SealedCaCert]),
            on_failure: OnFailure::Propagate,
        },
        Stage {
            id: StageId::RegisterCa,
            action: StageAction::Process(Invocation {
                program: tools.pelz.clone(),
                args: vec![
                    "ca".to_string(),
                    "load".to_string(),
                    path_arg(&paths.sealed_ca_cert_path()),
                ],
                cwd: paths.parent_dir().to_path_buf(),
            }),
            consumes: refs(&[Artifact::SealedCaCert]),
            produces: Vec::new(),
            on_failure: OnFailure::Propagate,
        },
        Stage {
            id: StageId::GenerateKek,
            action: StageAction::GenerateKek {
                path: paths.kek_path(),
            },
            consumes: Vec::new(),
            produces: refs(&[Artifact::Kek]),
            on_failure: OnFailure::Propagate,
        },
        Stage {
            id: StageId::EncryptData,
            action: StageAction::Process(Invocation {
                program: tools.worker.clone(),
                args: vec![
                    "encrypt".to_string(),
                    format!("file:{}", path_arg(&paths.kek_path())),
                    "-i".to_string(),
                    path_arg(&paths.plaintext_path()),
                    "-o".to_string(),
                    path_arg(&paths.ciphertext_path()),
                    "-r".to_string(),
                    path_arg(&paths.worker_key_path()),
                    "-u".to_string(),
                    path_arg(&paths.worker_cert_path()),
                ],
                cwd: paths.root().to_path_buf(),
            }),
            consumes: refs(&[
                Artifact::Kek,
                Artifact::Plaintext,
                Artifact::WorkerKey,
                Artifact::WorkerCert,
            ]),
            produces: refs(&[Artifact::Ciphertext]),
            on_failure: OnFailure::ReportAndExit {
                code: DEMO_FAILURE_EXIT_CODE,
                message: ENCRYPT_FAILED_MESSAGE,
            },
        },
        Stage {
            id: StageId::SearchData,
            action: StageAction::Process(Invocation {
                program: tools.worker.clone(),
                args: vec![
                    "search".to_string(),
                    config.search_term.clone(),
                    "-i".to_string(),
                    path_arg(&paths.ciphertext_path()),
                    "-r".to_string(),
                    path_arg(&paths.worker_key_path()),
                    "-u".to_string(),
                    path_arg(&paths.worker_cert_path()),
                ],
                cwd: paths.root().to_path_buf(),
            }),
            // The worker unwraps the data key with the KEK referenced in the
            // ciphertext, so the KEK file must still be present.
            consumes: refs(&[
                Artifact::Kek,
                Artifact::Ciphertext,
                Artifact::WorkerKey,
                Artifact::WorkerCert,
            ]),
            produces: Vec::new(),
            on_failure: OnFailure::ReportAndExit {
                code: DEMO_FAILURE_EXIT_CODE,
                message: SEARCH_FAILED_MESSAGE,
            },
        },
    ]
}

fn artifact_refs(paths: &DemoPaths, artifacts: &[Artifact]) -> Vec<ArtifactRef> {
    artifacts
        .iter()
        .map(|&artifact| ArtifactRef {
            artifact,
            path: paths.artifact(artifact),
        })
        .collect()
}

// DemoPaths::resolve guarantees UTF-8, so display() is lossless here.
fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolCommands;
    use std::fs;

    fn test_config(temp: &tempfile::TempDir) -> DemoConfig {
        let demo = temp.path().join("attestation_demo");
        fs::create_dir(&demo).expect("create demo");
        DemoConfig {
            paths: DemoPaths::resolve(&demo).expect("resolve"),
            tools: ToolCommands {
                keygen: "../make_certs.sh".to_string(),
                pelz: "bin/pelz".to_string(),
                worker: "bin/demo_worker".to_string(),
            },
            search_term: "people".to_string(),
        }
    }

    #[test]
    fn stages_are_numbered_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stages = build_stages(&test_config(&temp));
        let numbers: Vec<u8> = stages.iter().map(|stage| stage.id.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn every_consumed_artifact_is_produced_earlier_or_preexisting() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stages = build_stages(&test_config(&temp));
        let mut available = vec![Artifact::Plaintext];
        for stage in &stages {
            for input in &stage.consumes {
                assert!(
                    available.contains(&input.artifact),
                    "{} consumes {} before it is produced",
                    stage.id,
                    input.artifact
                );
            }
            available.extend(stage.produces.iter().map(|output| output.artifact));
        }
        for artifact in Artifact::ALL {
            assert!(available.contains(&artifact), "{artifact} never produced");
        }
    }

    #[test]
    fn invocations_follow_tool_contracts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = test_config(&temp);
        let paths = &config.paths;
        let stages = build_stages(&config);

        let invocation = |idx: usize| match &stages[idx].action {
            StageAction::Process(invocation) => invocation.clone(),
            StageAction::GenerateKek { .. } => panic!("stage {idx} is not a process"),
        };

        let keygen = invocation(0);
        assert_eq!(keygen.program, "../make_certs.sh");
        assert!(keygen.args.is_empty());
        assert_eq!(keygen.cwd, paths.out_dir());

        let seal = invocation(1);
        assert_eq!(seal.args[0], "seal");
        assert_eq!(seal.args[2], "-o");
        assert_eq!(seal.args[3], path_arg(&paths.sealed_ca_cert_path()));
        assert_eq!(seal.cwd, paths.parent_dir());

        let register = invocation(2);
        assert_eq!(register.args[..2], ["ca", "load"]);
        assert_eq!(register.cwd, paths.parent_dir());

        assert!(matches!(
            &stages[3].action,
            StageAction::GenerateKek { path } if *path == paths.kek_path()
        ));

        let encrypt = invocation(4);
        assert_eq!(encrypt.args[0], "encrypt");
        assert_eq!(encrypt.args[1], format!("file:{}", path_arg(&paths.kek_path())));
        assert_eq!(
            encrypt.args[2..],
            [
                "-i".to_string(),
                path_arg(&paths.plaintext_path()),
                "-o".to_string(),
                path_arg(&paths.ciphertext_path()),
                "-r".to_string(),
                path_arg(&paths.worker_key_path()),
                "-u".to_string(),
                path_arg(&paths.worker_cert_path()),
            ]
        );
        assert_eq!(encrypt.cwd, paths.root());

        let search = invocation(5);
        assert_eq!(search.args[..2], ["search", "people"]);
        assert_eq!(search.args[3], path_arg(&paths.ciphertext_path()));
        assert_eq!(search.cwd, paths.root());
    }

    #[test]
    fn only_demo_stages_report_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stages = build_stages(&test_config(&temp));
        for stage in &stages[..4] {
            assert_eq!(stage.on_failure, OnFailure::Propagate, "{}", stage.id);
        }
        assert_eq!(
            stages[4].on_failure,
            OnFailure::ReportAndExit {
                code: DEMO_FAILURE_EXIT_CODE,
                message: ENCRYPT_FAILED_MESSAGE
            }
        );
        assert_eq!(
            stages[5].on_failure,
            OnFailure::ReportAndExit {
                code: DEMO_FAILURE_EXIT_CODE,
                message: SEARCH_FAILED_MESSAGE
            }
        );
    }

    #[test]
    fn display_names_stage_number() {
        assert_eq!(StageId::SealCa.to_string(), "stage 2 (seal CA cert)");
        assert_eq!(
            StageId::SearchData.to_string(),
            "stage 6 (decrypt and search data)"
        );
    }
}
