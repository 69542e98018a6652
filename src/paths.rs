//! Typed paths into the demo layout.
//!
//! Every artifact location is derived once from the demo root so stages never
//! rebuild paths on their own.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub(crate) const OUT_DIR_NAME: &str = "test_data";

/// Files the pipeline reads or writes.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Artifact {
    CaCert,
    SealedCaCert,
    WorkerKey,
    WorkerCert,
    Kek,
    Plaintext,
    Ciphertext,
}

impl Artifact {
    pub(crate) const ALL: [Artifact; 7] = [
        Artifact::CaCert,
        Artifact::SealedCaCert,
        Artifact::WorkerKey,
        Artifact::WorkerCert,
        Artifact::Kek,
        Artifact::Plaintext,
        Artifact::Ciphertext,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Artifact::CaCert => "CA certificate",
            Artifact::SealedCaCert => "sealed CA certificate",
            Artifact::WorkerKey => "worker private key",
            Artifact::WorkerCert => "worker certificate",
            Artifact::Kek => "key encryption key",
            Artifact::Plaintext => "input data",
            Artifact::Ciphertext => "encrypted data",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convenience wrapper for locating demo artifacts.
#[derive(Debug, Clone)]
pub(crate) struct DemoPaths {
    root: PathBuf,
}

impl DemoPaths {
    /// Canonicalize the demo root. The root must exist, be valid UTF-8 (paths
    /// are passed to tools as arguments) and have a parent directory.
    pub(crate) fn resolve(demo_dir: &Path) -> Result<Self> {
        let root = demo_dir
            .canonicalize()
            .with_context(|| format!("resolve demo dir {}", demo_dir.display()))?;
        if root.to_str().is_none() {
            return Err(anyhow!("demo dir {} is not valid UTF-8", root.display()));
        }
        if root.parent().is_none() {
            return Err(anyhow!("demo dir {} has no parent directory", root.display()));
        }
        Ok(Self { root })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Return the parent of the demo root, where `bin/pelz` lives.
    pub(crate) fn parent_dir(&self) -> &Path {
        self.root.parent().unwrap_or(&self.root)
    }

    /// Return the `test_data/` output directory.
    pub(crate) fn out_dir(&self) -> PathBuf {
        self.root.join(OUT_DIR_NAME)
    }

    pub(crate) fn ca_cert_path(&self) -> PathBuf {
        self.out_dir().join("ca_pub.der")
    }

    pub(crate) fn sealed_ca_cert_path(&self) -> PathBuf {
        self.out_dir().join("ca_pub.der.nkl")
    }

    pub(crate) fn worker_key_path(&self) -> PathBuf {
        self.out_dir().join("worker_priv.der")
    }

    pub(crate) fn worker_cert_path(&self) -> PathBuf {
        self.out_dir().join("worker_pub.der")
    }

    pub(crate) fn kek_path(&self) -> PathBuf {
        self.out_dir().join("attdemo_kek.txt")
    }

    /// Return the pre-existing plaintext `input_data.txt`.
    pub(crate) fn plaintext_path(&self) -> PathBuf {
        self.root.join("input_data.txt")
    }

    pub(crate) fn ciphertext_path(&self) -> PathBuf {
        self.out_dir().join("attdemo_data_enc.txt")
    }

    pub(crate) fn artifact(&self, artifact: Artifact) -> PathBuf {
        match artifact {
            Artifact::CaCert => self.ca_cert_path(),
            Artifact::SealedCaCert => self.sealed_ca_cert_path(),
            Artifact::WorkerKey => self.worker_key_path(),
            Artifact::WorkerCert => self.worker_cert_path(),
            Artifact::Kek => self.kek_path(),
            Artifact::Plaintext => self.plaintext_path(),
            Artifact::Ciphertext => self.ciphertext_path(),
        }
    }
}
