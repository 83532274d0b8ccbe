//! Backend command lines.
//!
//! [`LaunchCommandBuilder`] assembles argv in a fixed order so options can
//! be reasoned about without looking at the engine:
//!
//! 1. engine-specific fixed arguments (model path, alias)
//! 2. per-model options
//! 3. global options
//! 4. `--port` / `--host`, last so they win over anything above

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// A fully resolved command for one backend run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, OsString)>,
}

impl LaunchCommand {
    /// Shell-quoted command line, for display only.
    #[must_use]
    pub fn display(&self) -> String {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words.clone()).unwrap_or_else(|_| words.collect::<Vec<_>>().join(" "))
    }

    /// A tokio command with piped output, null stdin and kill-on-drop.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Builder for [`LaunchCommand`].
#[derive(Debug, Clone, Default)]
pub struct LaunchCommandBuilder {
    program: PathBuf,
    fixed: Vec<String>,
    permodel: Vec<String>,
    global: Vec<String>,
    port: Option<u16>,
    host: Option<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, OsString)>,
}

impl LaunchCommandBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append a fixed argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.fixed.push(arg.into());
        self
    }

    /// Append a flag followed by its value.
    #[must_use]
    pub fn arg_with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arg(key).arg(value)
    }

    #[must_use]
    pub fn permodel_options(mut self, options: Vec<String>) -> Self {
        self.permodel = options;
        self
    }

    #[must_use]
    pub fn global_options(mut self, options: Vec<String>) -> Self {
        self.global = options;
        self
    }

    #[must_use]
    pub const fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Empty hosts are treated as unset.
    #[must_use]
    pub fn host(mut self, host: Option<&str>) -> Self {
        self.host = host.map(str::trim).filter(|h| !h.is_empty()).map(str::to_string);
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, OsString)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn build(self) -> LaunchCommand {
        let mut args = self.fixed;
        args.extend(self.permodel);
        args.extend(self.global);
        if let Some(port) = self.port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        if let Some(host) = self.host {
            args.push("--host".to_string());
            args.push(host);
        }

        LaunchCommand {
            program: self.program,
            args,
            working_dir: self.working_dir,
            env: self.env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn argument_order() {
        let cmd = LaunchCommandBuilder::new("/usr/bin/llama-server")
            .arg_with_value("-m", "/models/a.gguf")
            .permodel_options(strings(&["-c", "8192"]))
            .global_options(strings(&["--flash-attn", "--port", "1"]))
            .port(Some(8080))
            .host(Some("0.0.0.0"))
            .build();

        assert_eq!(
            cmd.args,
            strings(&[
                "-m",
                "/models/a.gguf",
                "-c",
                "8192",
                "--flash-attn",
                "--port",
                "1",
                "--port",
                "8080",
                "--host",
                "0.0.0.0",
            ])
        );
    }

    #[test]
    fn unset_port_and_blank_host_are_omitted() {
        let cmd = LaunchCommandBuilder::new("server")
            .arg("x")
            .port(None)
            .host(Some("  "))
            .build();
        assert_eq!(cmd.args, strings(&["x"]));
    }

    #[test]
    fn display_quotes_words_with_spaces() {
        let cmd = LaunchCommandBuilder::new("llama-server")
            .arg_with_value("-m", "/my models/a.gguf")
            .build();
        assert_eq!(cmd.display(), "llama-server -m '/my models/a.gguf'");
    }
}
