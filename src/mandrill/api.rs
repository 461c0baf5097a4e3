use std::collections::HashMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::email::{RecipientMergeVars, RecipientMetadata, TemplateVar};
use crate::error::Error;

pub const MANDRILL_BASE_API: &str = "https://mandrillapp.com/api/1.0/";

// Request timeout, in seconds
pub(crate) const MANDRILL_REQUEST_TIMEOUT: u64 = 30;

pub enum Endpoint {
    MessagesSend,
    MessagesSendTemplate,
}

#[inline]
pub fn build_endpoint_url(endpoint: Endpoint) -> String {
    match endpoint {
        Endpoint::MessagesSend => format!("{}{}", MANDRILL_BASE_API, "messages/send"),
        Endpoint::MessagesSendTemplate => {
            format!("{}{}", MANDRILL_BASE_API, "messages/send-template")
        }
    }
}

/// Map a failed API call to a transport error.
///
/// Mandrill reports failures as a JSON error body alongside a
/// non-2xx status; fall back to the raw status and body if the
/// payload is not in that shape.
pub fn map_error(status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(err) => Error::Api {
            code: err.code,
            name: err.name,
            message: err.message,
        },
        Err(_) => Error::Http(format!(
            "{}: {}",
            status,
            String::from_utf8_lossy(body)
        )),
    }
}

/// Error payload returned by the API on failed calls
#[derive(Deserialize, Debug)]
pub struct ApiErrorBody {
    pub status: String,
    pub code: i64,
    pub name: String,
    pub message: String,
}

/// Which recipient list an entry originated from. The API folds
/// to/cc/bcc into one list and discriminates on this tag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    To,
    Cc,
    Bcc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiRecipient {
    pub email: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: RecipientType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiAttachment {
    /// MIME type of the attachment
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    /// Base64-encoded attachment bytes
    pub content: String,
}

/// The provider-side message object shared by both send operations.
///
/// Optional fields are skipped entirely when unset so the provider
/// applies its own defaults, matching how absent fields behave in
/// its reference clients.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ApiMessage {
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub to: Vec<ApiRecipient>,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<ApiAttachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_opens: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_clicks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_html: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_css: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_strip_qs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_recipients: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_content_link: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_path_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_merge_vars: Option<Vec<TemplateVar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_vars: Option<Vec<RecipientMergeVars>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_metadata: Option<Vec<RecipientMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_analytics_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_analytics_campaign: Option<String>,
}

/// Envelope for the direct-send operation
#[derive(Clone, Debug, Serialize)]
pub struct SendRequest {
    pub message: ApiMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_pool: Option<String>,
    // `async` is a keyword, hence the rename
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub send_async: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
}

/// Envelope for the template-send operation
#[derive(Clone, Debug, Serialize)]
pub struct SendTemplateRequest {
    pub template_name: String,
    pub template_content: Vec<TemplateVar>,
    pub message: ApiMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_pool: Option<String>,
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub send_async: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
}

/// Wraps a request payload with the account API key, which the API
/// expects inline in the request body.
#[derive(Serialize)]
pub(crate) struct Keyed<'a, T: Serialize> {
    pub key: &'a str,
    #[serde(flatten)]
    pub request: &'a T,
}

/// Per-recipient delivery status
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Queued,
    Scheduled,
    Rejected,
    Invalid,
}

/// One per-recipient result record from either send operation
#[derive(Clone, Debug, Deserialize)]
pub struct SendResult {
    pub email: String,
    pub status: SendStatus,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reject_reason: Option<String>,
}
