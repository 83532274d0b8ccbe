//! llama.cpp (`llama-server`) backend.

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use lmlaunch_core::{
    BackendKind, BuildInfo, GgufReaderPort, LaunchError, LlamaCppSettings, ModelEntry, ModelInfo,
};
use regex::Regex;

use super::command::{LaunchCommand, LaunchCommandBuilder};
use super::overrides::resolve_options;
use crate::env::{child_env, child_path};
use crate::metadata::{MetadataError, read_gguf_info};

static BUILD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"build: ([^ ]+) (\([^)]+\))").expect("build line pattern is valid")
});

/// Lines llama-server prints once it accepts requests.
const READY_MARKERS: [&str; 2] = ["starting the main loop", "server is listening on"];

#[derive(Clone)]
pub struct LlamaCppBackend {
    settings: LlamaCppSettings,
    extra_paths: Vec<String>,
    gguf: Arc<dyn GgufReaderPort>,
}

impl LlamaCppBackend {
    pub fn new(
        settings: LlamaCppSettings,
        extra_paths: Vec<String>,
        gguf: Arc<dyn GgufReaderPort>,
    ) -> Self {
        Self {
            settings,
            extra_paths,
            gguf,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &LlamaCppSettings {
        &self.settings
    }

    /// Locate the executable in the extra paths, then `PATH`.
    pub fn resolve_executable(&self) -> Result<PathBuf, LaunchError> {
        let name = self.settings.executable.trim();
        let not_found = |reason: String| LaunchError::ExecutableNotFound {
            name: name.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(not_found("no executable configured".to_string()));
        }

        let search = child_path(&self.extra_paths).or_else(|| env::var_os("PATH"));
        let cwd = env::current_dir().map_err(|e| not_found(e.to_string()))?;
        which::which_in(name, search, cwd).map_err(|e| not_found(e.to_string()))
    }

    pub fn build_command(&self, entry: &ModelEntry) -> Result<LaunchCommand, LaunchError> {
        let model_path = entry.full_path();
        if !model_path.is_file() {
            return Err(LaunchError::ModelNotFound(model_path));
        }
        let program = self.resolve_executable()?;
        let (permodel, global) = resolve_options(
            &self.settings.cmdline_permodel,
            &self.settings.cmdline,
            &entry.path,
        )?;

        Ok(LaunchCommandBuilder::new(program)
            .arg_with_value("-m", model_path.to_string_lossy())
            .arg_with_value("--alias", entry.stem())
            .permodel_options(permodel)
            .global_options(global)
            .port(self.settings.port)
            .host(self.settings.host.as_deref())
            .envs(child_env(&self.extra_paths))
            .build())
    }

    pub fn is_ready_line(line: &str) -> bool {
        READY_MARKERS.iter().any(|marker| line.contains(marker))
    }

    /// `build: 4520 (a1b2c3d4) with cc ...` from the startup log.
    #[must_use]
    pub fn build_info(log: &str) -> BuildInfo {
        let mut info = BuildInfo::unknown(BackendKind::LlamaCpp);
        if let Some(caps) = BUILD_LINE.captures(log) {
            info.version = Some(caps[1].to_string());
            info.commit = Some(caps[2].trim_matches(|c| c == '(' || c == ')').to_string());
        }
        info
    }

    pub fn read_model_metadata(&self, entry: &ModelEntry) -> Result<ModelInfo, MetadataError> {
        read_gguf_info(&entry.full_path(), self.gguf.as_ref())
    }
}
