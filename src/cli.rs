//! CLI argument parsing for the demo pipeline.
//!
//! Every flag is optional: a bare `attdemo` runs the demo rooted at the
//! directory holding the executable, using the stock tool locations.
use clap::Parser;
use std::path::PathBuf;

/// Key-generation script, relative to `test_data/`.
pub const DEFAULT_KEYGEN: &str = "../make_certs.sh";

/// pelz CLI, relative to the parent of the demo root.
pub const DEFAULT_PELZ: &str = "bin/pelz";

/// Demo worker client, relative to the demo root.
pub const DEFAULT_WORKER: &str = "bin/demo_worker";

/// Term searched for inside the decrypted data.
pub const DEFAULT_SEARCH_TERM: &str = "people";

#[derive(Parser, Debug)]
#[command(
    name = "attdemo",
    version,
    about = "Provision demo trust artifacts, then encrypt and search data in the enclave",
    after_help = "Stages:\n  1. generate asymmetric keys      (keygen, cwd test_data/)\n  2. seal the CA cert              (pelz seal, cwd ..)\n  3. register the sealed CA cert   (pelz ca load, cwd ..)\n  4. generate a random 32-byte KEK (in-process)\n  5. encrypt input_data.txt        (worker encrypt, cwd demo dir)\n  6. decrypt and search            (worker search, cwd demo dir)\n\nExamples:\n  attdemo\n  attdemo --demo-dir /opt/pelz/attestation_demo --json"
)]
pub struct RootArgs {
    /// Demo root holding input_data.txt and bin/ (defaults to the executable's directory)
    #[arg(long, value_name = "DIR")]
    pub demo_dir: Option<PathBuf>,

    /// Key-generation program, resolved from test_data/
    #[arg(long, value_name = "PROG", default_value = DEFAULT_KEYGEN)]
    pub keygen: String,

    /// pelz program, resolved from the parent of the demo root
    #[arg(long, value_name = "PROG", default_value = DEFAULT_PELZ)]
    pub pelz: String,

    /// Worker client program, resolved from the demo root
    #[arg(long, value_name = "PROG", default_value = DEFAULT_WORKER)]
    pub worker: String,

    /// Term to search for in the decrypted data
    #[arg(long, value_name = "TERM", default_value = DEFAULT_SEARCH_TERM)]
    pub search_term: String,

    /// Print a machine-readable JSON run summary on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    pub verbose: bool,
}
