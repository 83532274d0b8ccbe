//! Domain types shared by every layer.

pub mod backend;
pub mod gguf;
pub mod model;
pub mod state;

pub use backend::{BackendKind, BuildInfo};
pub use gguf::{GgufHeader, GgufTensorInfo, GgufValue, RawMetadata};
pub use model::{
    ChatMessage, ModelEntry, ModelInfo, TemplateVars, TensorRow, UNKNOWN_ARCHITECTURE,
    format_params, format_size,
};
pub use state::SupervisorState;
