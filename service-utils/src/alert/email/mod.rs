//! Email delivery through the email gateway.

pub mod models;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::instrument;

use crate::constants::ERR_INTERNAL_SERVER_ERROR;
use crate::context::TrustContext;
use crate::error::ApiError;
use crate::http::HttpRequestBuilder;
use crate::logging::get_logger;

pub use models::{Attachment, EmailAttachment, EmailDetails, EmailRequest, MessageBody};

const HTML_MIME_TYPE: &str = "text/html";
const SEND_FAILED_MESSAGE: &str = "Error while sending Email";

/// Sends emails.
#[async_trait]
pub trait EmailUtil: Send + Sync {
    /// Send `details` outside of any request.
    async fn send(&self, details: &EmailDetails, include_base_template: bool) -> Result<(), ApiError>;

    /// Send `details` on behalf of the request behind `ctx`.
    async fn send_with_context(
        &self,
        ctx: &dyn TrustContext,
        details: &EmailDetails,
        include_base_template: bool,
    ) -> Result<(), ApiError>;
}

/// [`EmailUtil`] posting to the email gateway.
#[derive(Debug, Clone)]
pub struct EmailClient {
    builder: HttpRequestBuilder,
    gateway_url: String,
}

impl EmailClient {
    /// Create a client posting to `gateway_url`.
    #[must_use]
    pub fn new(builder: HttpRequestBuilder, gateway_url: impl Into<String>) -> Self {
        Self {
            builder,
            gateway_url: gateway_url.into(),
        }
    }

    async fn deliver(&self, ctx: Option<&dyn TrustContext>, request: EmailRequest) -> Result<(), ApiError> {
        let mut pending = self.builder.new_request().with_json_body(&request);
        if let Some(ctx) = ctx {
            pending = pending.with_context(ctx);
        }
        pending.post(&self.gateway_url).await.map_err(|err| {
            get_logger(ctx).with_error(&err).error(SEND_FAILED_MESSAGE);
            ApiError::new(ERR_INTERNAL_SERVER_ERROR, SEND_FAILED_MESSAGE)
        })
    }
}

#[async_trait]
impl EmailUtil for EmailClient {
    #[instrument(skip_all, fields(subject = %details.subject))]
    async fn send(&self, details: &EmailDetails, include_base_template: bool) -> Result<(), ApiError> {
        self.deliver(None, to_email_request(details, include_base_template))
            .await
    }

    #[instrument(skip_all, fields(subject = %details.subject))]
    async fn send_with_context(
        &self,
        ctx: &dyn TrustContext,
        details: &EmailDetails,
        include_base_template: bool,
    ) -> Result<(), ApiError> {
        self.deliver(Some(ctx), to_email_request(details, include_base_template))
            .await
    }
}

/// Encode `details` for the gateway.
#[must_use]
pub fn to_email_request(details: &EmailDetails, include_base_template: bool) -> EmailRequest {
    let attachments = (!details.attachments.is_empty()).then(|| {
        details
            .attachments
            .iter()
            .map(|attachment| Attachment {
                file_name: attachment.file_name.clone(),
                base64_encoded_data: STANDARD.encode(&attachment.content),
            })
            .collect()
    });

    EmailRequest {
        from: details.from.clone(),
        to: details.to.clone(),
        subject: details.subject.clone(),
        message_body: MessageBody {
            mime_type: HTML_MIME_TYPE.to_string(),
            base64_encoded_content: STANDARD.encode(details.content.as_bytes()),
        },
        attachments,
        include_base_template,
    }
}
