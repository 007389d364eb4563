pub mod settings;

pub use settings::{
    ChatConfig, LlmConfig, LogFormat, LoggingConfig, ServerConfig, Settings, StorageBackendKind,
    StorageConfig, WorkflowConfig,
};
