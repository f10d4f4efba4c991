//! CLI command handlers.

pub mod chat;
pub mod config;
pub mod info;
pub mod settings;

pub use chat::{ChatSendInput, run_chat_send};
pub use config::{run_config_check, run_config_schema, run_config_show};
pub use info::run_info;
pub use settings::{run_settings_check, run_settings_show};
