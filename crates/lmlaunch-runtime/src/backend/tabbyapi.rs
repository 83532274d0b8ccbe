//! TabbyAPI backend: `start.py` run by the interpreter of its own venv.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use lmlaunch_core::{BackendKind, BuildInfo, LaunchError, ModelEntry, ModelInfo, TabbyApiSettings};
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use super::command::{LaunchCommand, LaunchCommandBuilder};
use super::overrides::resolve_options;
use crate::env::child_env;
use crate::metadata::{MetadataError, read_hf_info};

static VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+) version: (\S+)").expect("version pattern is valid"));

const READY_MARKER: &str = "Uvicorn running on";

/// Interpreter locations inside the install dir, Windows layout first.
const INTERPRETERS: [&[&str]; 2] = [&["venv", "Scripts", "python.exe"], &["venv", "bin", "python"]];

#[derive(Debug, Clone)]
pub struct TabbyApiBackend {
    settings: TabbyApiSettings,
    extra_paths: Vec<String>,
}

impl TabbyApiBackend {
    pub const fn new(settings: TabbyApiSettings, extra_paths: Vec<String>) -> Self {
        Self {
            settings,
            extra_paths,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &TabbyApiSettings {
        &self.settings
    }

    pub fn install_dir(&self) -> Result<PathBuf, LaunchError> {
        self.settings
            .install_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .ok_or(LaunchError::NotConfigured("TabbyAPI"))
    }

    pub fn interpreter(install_dir: &Path) -> Result<PathBuf, LaunchError> {
        INTERPRETERS
            .iter()
            .map(|parts| parts.iter().fold(install_dir.to_path_buf(), |p, part| p.join(part)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LaunchError::InterpreterNotFound(install_dir.to_path_buf()))
    }

    pub fn build_command(&self, entry: &ModelEntry) -> Result<LaunchCommand, LaunchError> {
        let install_dir = self.install_dir()?;
        let model_path = entry.full_path();
        if !model_path.is_dir() {
            return Err(LaunchError::ModelNotFound(model_path));
        }
        let python = Self::interpreter(&install_dir)?;
        let (permodel, global) = resolve_options(
            &self.settings.cmdline_permodel,
            &self.settings.cmdline,
            &entry.path,
        )?;

        Ok(LaunchCommandBuilder::new(python)
            .arg(install_dir.join("start.py").to_string_lossy())
            .arg_with_value("--model-name", model_path.to_string_lossy())
            .arg_with_value("--dummy-model-names", entry.stem())
            .permodel_options(permodel)
            .global_options(global)
            .port(self.settings.port)
            .host(self.settings.host.as_deref())
            .working_dir(install_dir)
            .envs(child_env(&self.extra_paths))
            .build())
    }

    pub fn is_ready_line(line: &str) -> bool {
        line.contains(READY_MARKER)
    }

    /// Checkout hash of the install dir plus the first `<lib> version: <v>`
    /// line of the startup log.
    pub async fn build_info(&self, log: &str) -> BuildInfo {
        let mut info = BuildInfo::unknown(BackendKind::TabbyApi);
        if let Ok(dir) = self.install_dir() {
            info.commit = git_short_hash(&dir).await;
        }
        if let Some(caps) = VERSION_LINE.captures(log) {
            info.detail = Some(format!("{}: {}", &caps[1], &caps[2]));
        }
        info
    }

    pub fn read_model_metadata(entry: &ModelEntry) -> Result<ModelInfo, MetadataError> {
        read_hf_info(&entry.full_path())
    }
}

async fn git_short_hash(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(dir)
        .kill_on_drop(true)
        .output()
        .await
        .inspect_err(|e| debug!(error = %e, "git not available"))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn install(dir: &Path) {
        fs::create_dir_all(dir.join("venv/bin")).unwrap();
        fs::write(dir.join("venv/bin/python"), b"").unwrap();
        fs::write(dir.join("start.py"), b"").unwrap();
    }

    fn settings(install_dir: &Path) -> TabbyApiSettings {
        TabbyApiSettings {
            install_dir: Some(install_dir.to_string_lossy().into_owned()),
            cmdline_permodel: "llama: --max-seq-len 8192".to_string(),
            ..TabbyApiSettings::default()
        }
    }

    #[test]
    fn command_line_layout() {
        let tabby = tempfile::tempdir().unwrap();
        install(tabby.path());
        let models = tempfile::tempdir().unwrap();
        fs::create_dir(models.path().join("Llama-3-8B-exl2")).unwrap();
        let entry = ModelEntry::new("Llama-3-8B-exl2", models.path(), BackendKind::TabbyApi);

        let cmd = TabbyApiBackend::new(settings(tabby.path()), Vec::new())
            .build_command(&entry)
            .unwrap();

        assert_eq!(cmd.program, tabby.path().join("venv/bin/python"));
        assert_eq!(cmd.working_dir.as_deref(), Some(tabby.path()));
        let model = models.path().join("Llama-3-8B-exl2").to_string_lossy().into_owned();
        let start = tabby.path().join("start.py").to_string_lossy().into_owned();
        assert_eq!(
            cmd.args,
            vec![
                start.as_str(),
                "--model-name",
                model.as_str(),
                "--dummy-model-names",
                "Llama-3-8B-exl2",
                "--max-seq-len",
                "8192",
                "--port",
                "5000",
                "--host",
                "0.0.0.0",
            ]
        );
    }

    #[test]
    fn missing_venv() {
        let tabby = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();
        fs::create_dir(models.path().join("m")).unwrap();
        let entry = ModelEntry::new("m", models.path(), BackendKind::TabbyApi);

        let err = TabbyApiBackend::new(settings(tabby.path()), Vec::new())
            .build_command(&entry)
            .unwrap_err();
        assert!(matches!(err, LaunchError::InterpreterNotFound(_)));
        assert!(err.to_string().starts_with("Couldn't find python venv in"));
    }

    #[test]
    fn unconfigured_install_dir() {
        let backend = TabbyApiBackend::new(TabbyApiSettings::default(), Vec::new());
        assert!(matches!(backend.install_dir(), Err(LaunchError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn version_line() {
        let backend = TabbyApiBackend::new(TabbyApiSettings::default(), Vec::new());
        let info = backend
            .build_info("INFO:     ExllamaV2 version: 0.2.8\nINFO:     Loading model")
            .await;
        assert_eq!(info.detail.as_deref(), Some("ExllamaV2: 0.2.8"));
        assert_eq!(info.commit, None);
    }

    #[test]
    fn ready_line() {
        assert!(TabbyApiBackend::is_ready_line(
            "INFO:     Uvicorn running on http://0.0.0.0:5000 (Press CTRL+C to quit)"
        ));
        assert!(!TabbyApiBackend::is_ready_line("INFO:     Started server process"));
    }
}
