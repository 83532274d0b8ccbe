//! Environment handed to backend processes.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Wide enough that engines never wrap their log lines.
pub const COLUMNS: &str = "9999";

/// `PATH` with `extra_paths` in front of the inherited entries, or `None`
/// when there is nothing to prepend.
#[must_use]
pub fn child_path(extra_paths: &[String]) -> Option<OsString> {
    let extra: Vec<PathBuf> = extra_paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect();
    if extra.is_empty() {
        return None;
    }

    let inherited = env::var_os("PATH");
    let inherited = inherited.iter().flat_map(env::split_paths);
    env::join_paths(extra.into_iter().chain(inherited)).ok()
}

/// Variables set on top of the parent environment.
#[must_use]
pub fn child_env(extra_paths: &[String]) -> Vec<(String, OsString)> {
    let mut vars = vec![("COLUMNS".to_string(), OsString::from(COLUMNS))];
    if let Some(path) = child_path(extra_paths) {
        vars.push(("PATH".to_string(), path));
    }
    vars
}
