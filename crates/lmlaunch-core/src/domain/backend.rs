//! Backend engine descriptors and build information.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The inference server engines a launcher can supervise.
///
/// The set is closed: every operation that differs per engine dispatches
/// with an exhaustive `match`, so adding a variant is a compile error until
/// each call site handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// `llama-server` from llama.cpp, a native executable serving GGUF files.
    #[serde(rename = "llama.cpp")]
    LlamaCpp,
    /// TabbyAPI, a Python server run from its own virtual environment.
    #[serde(rename = "tabbyapi")]
    TabbyApi,
}

impl BackendKind {
    /// Every known engine, in catalog order.
    pub const ALL: [Self; 2] = [Self::LlamaCpp, Self::TabbyApi];

    /// Short tag shown in model labels, e.g. `"llama.cpp"`.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::LlamaCpp => "llama.cpp",
            Self::TabbyApi => "tabbyapi",
        }
    }

    /// Parse a tag back into an engine kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Version details an engine reports about itself during startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub engine: BackendKind,
    pub version: Option<String>,
    pub commit: Option<String>,
    /// Free-form extra line, e.g. library versions reported by the engine.
    pub detail: Option<String>,
}

impl BuildInfo {
    /// Build info with nothing discovered beyond the engine itself.
    #[must_use]
    pub const fn unknown(engine: BackendKind) -> Self {
        Self {
            engine,
            version: None,
            commit: None,
            detail: None,
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.engine)?;
        if let Some(version) = &self.version {
            write!(f, " {version}")?;
        }
        if let Some(commit) = &self.commit {
            write!(f, " ({commit})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        Ok(())
    }
}
