//! JSON Schema exports for settings and request DTOs.

use crate::requests::ChatSendRequestDto;
use crate::settings::ClientSettings;
use schemars::{Schema, schema_for};

/// JSON Schema for `ClientSettings`.
#[must_use]
pub fn client_settings_schema() -> Schema {
    schema_for!(ClientSettings)
}

/// JSON Schema for `ChatSendRequestDto`.
#[must_use]
pub fn chat_send_request_schema() -> Schema {
    schema_for!(ChatSendRequestDto)
}
