//! Generic outbound email model.
//! The idea is to keep one normalized message shape on the transport
//! side and map it into service-specific wire types when talking to
//! the provider API.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A validated email address with an optional display name.
///
/// All addresses enter the transport through this type, so the
/// mapping logic never has to branch on raw strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mailbox {
    pub address: String,
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: None,
        }
    }

    pub fn with_name(address: &str, name: &str) -> Self {
        Self {
            address: address.to_string(),
            name: Some(name.to_string()),
        }
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    /// Accepts both `user@host` and `Display Name <user@host>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (name, address) = if s.ends_with('>') {
            match s.find('<') {
                Some(idx) => {
                    let name = s[..idx].trim();
                    let address = s[idx + 1..s.len() - 1].trim();
                    let name = if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    };
                    (name, address)
                }
                None => return Err(Error::Address(format!("Unbalanced brackets: {}", s))),
            }
        } else {
            (None, s)
        };

        if address.is_empty() || !address.contains('@') {
            return Err(Error::Address(format!("Not an email address: {}", s)));
        }

        Ok(Self {
            address: address.to_string(),
            name,
        })
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Message priority, mapped to the provider's `important` flag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// Represents a single email attachment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment filename
    pub name: String,

    /// MIME type of attachment (e.g., text/plain)
    pub content_type: String,

    /// Raw attachment bytes; base64-encoded during mapping
    pub data: Vec<u8>,
}

/// A single name/content substitution value, used both for template
/// content blocks and for merge variables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateVar {
    pub name: String,
    pub content: String,
}

/// Merge variables scoped to a single recipient.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecipientMergeVars {
    pub rcpt: String,
    pub vars: Vec<TemplateVar>,
}

/// Metadata scoped to a single recipient.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecipientMetadata {
    pub rcpt: String,
    pub values: HashMap<String, serde_json::Value>,
}

/// Reference to a template pre-registered with the provider.
///
/// Presence of this value on a message selects the template-send API
/// operation instead of the direct-send one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: Vec<TemplateVar>,
}

/// Provider-specific send options, all optional.
///
/// Every field here is passed through to the API verbatim when set
/// and omitted from the request when not. The single exception is
/// `merge`, which is enabled automatically when merge variables are
/// present (see the transport's field mapping).
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub track_opens: Option<bool>,
    pub track_clicks: Option<bool>,
    pub auto_text: Option<bool>,
    pub auto_html: Option<bool>,
    pub inline_css: Option<bool>,
    pub url_strip_qs: Option<bool>,
    pub preserve_recipients: Option<bool>,
    pub view_content_link: Option<bool>,
    pub tracking_domain: Option<String>,
    pub signing_domain: Option<String>,
    pub return_path_domain: Option<String>,
    pub merge: Option<bool>,
    pub merge_language: Option<String>,
    pub global_merge_vars: Option<Vec<TemplateVar>>,
    pub merge_vars: Option<Vec<RecipientMergeVars>>,
    pub tags: Option<Vec<String>>,
    pub subaccount: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub recipient_metadata: Option<Vec<RecipientMetadata>>,
    pub google_analytics_domains: Option<Vec<String>>,
    pub google_analytics_campaign: Option<String>,

    /// Dedicated IP pool to send from
    pub ip_pool: Option<String>,

    /// Ask the provider to queue the send instead of blocking on it
    pub send_async: Option<bool>,

    /// Schedule the send for a future point in time (UTC)
    pub send_at: Option<DateTime<Utc>>,
}

/// A normalized outbound email, ready to be handed to a transport.
#[derive(Clone, Debug)]
pub struct Email {
    /// Unique ID for this message, used for log correlation
    pub uuid: Uuid,

    pub from: Option<Mailbox>,
    pub reply_to: Option<Mailbox>,

    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,

    pub subject: Option<String>,

    /// Plaintext body
    pub text: Option<String>,

    /// HTML body, if any
    pub html: Option<String>,

    /// Custom headers to attach to the message
    pub headers: HashMap<String, String>,

    pub priority: Option<Priority>,

    /// List of attachments, if any
    pub attachments: Vec<Attachment>,

    /// Template reference; selects the template-send path when set
    pub template: Option<Template>,

    pub options: SendOptions,
}

impl Email {
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            from: None,
            reply_to: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: None,
            text: None,
            html: None,
            headers: HashMap::new(),
            priority: None,
            attachments: Vec::new(),
            template: None,
            options: SendOptions::default(),
        }
    }

    pub fn with_from(mut self, from: Mailbox) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_reply_to(mut self, reply_to: Mailbox) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    pub fn with_to(mut self, to: Vec<Mailbox>) -> Self {
        self.to = to;
        self
    }

    pub fn with_cc(mut self, cc: Vec<Mailbox>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<Mailbox>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = Some(html.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }
}

impl Default for Email {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_parses_bare_address() {
        let mbox: Mailbox = "user@example.com".parse().unwrap();
        assert_eq!(mbox.address, "user@example.com");
        assert_eq!(mbox.name, None);
    }

    #[test]
    fn mailbox_parses_display_name_form() {
        let mbox: Mailbox = "Jane Doe <jane@example.com>".parse().unwrap();
        assert_eq!(mbox.address, "jane@example.com");
        assert_eq!(mbox.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn mailbox_rejects_non_address() {
        let result = "not-an-address".parse::<Mailbox>();
        assert!(matches!(result, Err(Error::Address(_))));
    }

    #[test]
    fn mailbox_display_round_trips() {
        let mbox = Mailbox::with_name("jane@example.com", "Jane Doe");
        let parsed: Mailbox = mbox.to_string().parse().unwrap();
        assert_eq!(parsed, mbox);
    }

    #[test]
    fn new_email_has_empty_defaults() {
        let email = Email::new();
        assert!(email.to.is_empty());
        assert!(email.headers.is_empty());
        assert!(email.template.is_none());
    }
}
