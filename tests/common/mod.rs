//! Shared test infrastructure for integration tests.
//!
//! A fixture lays out a throwaway demo tree with shell-script stand-ins for
//! the external tools:
//!
//! ```text
//! <root>/bin/pelz                      seal = copy, ca load = check file
//! <root>/attestation_demo/make_certs.sh
//! <root>/attestation_demo/bin/demo_worker
//! <root>/attestation_demo/input_data.txt
//! ```
//!
//! Every tool appends its name and subcommand to `<root>/calls.log`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

/// Scripts are written then executed; running fixtures one at a time keeps a
/// concurrently forked test from holding a script open for writing (ETXTBSY).
static SERIAL: Mutex<()> = Mutex::new(());

pub const KEYGEN_OK: &str = r#"#!/bin/sh
echo keygen >> ../../calls.log
printf 'ca-cert' > ca_pub.der
printf 'worker-key' > worker_priv.der
printf 'worker-cert' > worker_pub.der
"#;

pub const PELZ_OK: &str = r#"#!/bin/sh
echo "pelz $1" >> calls.log
case "$1" in
  seal) cp "$2" "$4" ;;
  ca) test "$2" = load && test -s "$3" ;;
  *) exit 64 ;;
esac
"#;

/// Encrypt checks the KEK is 32 bytes then copies; search greps the copy.
pub const WORKER_OK: &str = r#"#!/bin/sh
echo "worker $1" >> ../calls.log
case "$1" in
  encrypt)
    kek="${2#file:}"
    test "$(wc -c < "$kek" | tr -d ' ')" = 32 || exit 3
    cp "$4" "$6"
    ;;
  search) grep -q "$2" "$4" ;;
  *) exit 64 ;;
esac
"#;

pub const INPUT_DATA: &str = "We the people of the enclave\n";

pub struct DemoFixture {
    _guard: MutexGuard<'static, ()>,
    pub root: TempDir,
    pub demo_dir: PathBuf,
}

impl DemoFixture {
    /// Build a fixture with working tools.
    pub fn working() -> Self {
        Self::with_tools(KEYGEN_OK, PELZ_OK, WORKER_OK)
    }

    pub fn with_tools(keygen: &str, pelz: &str, worker: &str) -> Self {
        let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let root = tempfile::tempdir().expect("tempdir");
        let demo_dir = root.path().join("attestation_demo");
        fs::create_dir_all(demo_dir.join("bin")).expect("create demo bin");
        fs::create_dir_all(root.path().join("bin")).expect("create root bin");

        write_script(&demo_dir.join("make_certs.sh"), keygen);
        write_script(&root.path().join("bin").join("pelz"), pelz);
        write_script(&demo_dir.join("bin").join("demo_worker"), worker);
        fs::write(demo_dir.join("input_data.txt"), INPUT_DATA).expect("write input");

        Self {
            _guard: guard,
            root,
            demo_dir,
        }
    }

    /// Run `attdemo --demo-dir <demo> <extra...>`.
    pub fn run(&self, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_attdemo"))
            .arg("--demo-dir")
            .arg(&self.demo_dir)
            .args(extra)
            .env("RUST_LOG", "info")
            .output()
            .expect("spawn attdemo")
    }

    pub fn out_file(&self, name: &str) -> PathBuf {
        self.demo_dir.join("test_data").join(name)
    }

    /// Tool invocations recorded so far, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.root.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
