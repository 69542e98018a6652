use crate::cli::RootArgs;
use crate::paths::DemoPaths;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// External programs driven by the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct ToolCommands {
    pub(crate) keygen: String,
    pub(crate) pelz: String,
    pub(crate) worker: String,
}

/// Everything a run needs, bound once at startup.
#[derive(Debug, Clone)]
pub(crate) struct DemoConfig {
    pub(crate) paths: DemoPaths,
    pub(crate) tools: ToolCommands,
    pub(crate) search_term: String,
}

impl DemoConfig {
    pub(crate) fn from_args(args: &RootArgs) -> Result<Self> {
        let demo_dir = match &args.demo_dir {
            Some(dir) => dir.clone(),
            None => default_demo_dir()?,
        };
        if args.search_term.trim().is_empty() {
            return Err(anyhow!("search term must not be empty"));
        }
        Ok(Self {
            paths: DemoPaths::resolve(&demo_dir)?,
            tools: ToolCommands {
                keygen: args.keygen.clone(),
                pelz: args.pelz.clone(),
                worker: args.worker.clone(),
            },
            search_term: args.search_term.clone(),
        })
    }
}

/// The demo ships next to its executable, so that directory is the default root.
fn default_demo_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("locate current executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))
}
