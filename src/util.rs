use sha2::Digest;
use std::path::{Path, PathBuf};

/// Render `program args...` the way an operator would type it.
pub fn format_command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let words = std::iter::once(program).chain(args.iter().map(|arg| arg.as_ref()));
    shell_words::join(words)
}

/// Resolve a relative program path containing a separator against the
/// working directory it will run in. Bare names are left for `PATH` lookup.
pub fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path)
    } else {
        path.to_path_buf()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
