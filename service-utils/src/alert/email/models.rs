//! Email payloads.

use serde::{Deserialize, Serialize};

/// Email as composed by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailDetails {
    /// Sender address
    pub from: String,
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// HTML content
    pub content: String,
    /// Files to attach
    pub attachments: Vec<EmailAttachment>,
}

/// File attached to an email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAttachment {
    /// Name shown to the recipient
    pub file_name: String,
    /// Raw file content
    pub content: Vec<u8>,
}

/// Request accepted by the email gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    /// Sender address
    pub from: String,
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Encoded content
    pub message_body: MessageBody,
    /// Encoded attachments, `null` when there are none
    pub attachments: Option<Vec<Attachment>>,
    /// Wrap the content in the gateway's base template
    pub include_base_template: bool,
}

/// Encoded message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Content type of the decoded content
    pub mime_type: String,
    /// Standard base64 of the content
    pub base64_encoded_content: String,
}

/// Encoded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Name shown to the recipient
    pub file_name: String,
    /// Standard base64 of the file content
    pub base64_encoded_data: String,
}
