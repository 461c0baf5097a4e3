//! The transport adapter: maps a normalized [`Email`] into the
//! provider's request schema, picks the direct-send or template-send
//! operation, and normalizes the per-recipient results back into a
//! single `Result`.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::email::{Email, Priority};
use crate::error::Error;
use crate::mandrill::api::{
    ApiAttachment, ApiMessage, ApiRecipient, RecipientType, SendRequest, SendResult, SendStatus,
    SendTemplateRequest,
};
use crate::mandrill::{Client, Messages};

pub type TransportFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Pluggable send contract, so callers can swap delivery backends
/// without touching composition code.
pub trait Transport {
    /// Success value produced by a completed send
    type Ok;
    type Error;

    fn send<'a>(&'a self, email: &'a Email) -> TransportFuture<'a, Self::Ok, Self::Error>;
}

/// Transport construction parameters.
///
/// `sender_mail`/`sender_name`, when set, override the sender carried
/// on each message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TransportOptions {
    pub api_key: String,
    pub sender_mail: Option<String>,
    pub sender_name: Option<String>,
}

/// Sender/recipient set of a message as handed to the provider
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub from: Option<String>,
    pub to: Vec<String>,
}

/// Returned to the caller on a successful send
#[derive(Clone, Debug)]
pub struct SendInfo {
    pub envelope: Envelope,
    /// Provider-assigned id of the accepted message
    pub message_id: String,
}

/// Sends mail through the Mailchimp Transactional HTTP API.
///
/// The API client is owned by the transport instance; concurrent
/// `send` calls share it read-only and complete independently.
pub struct MandrillTransport<C = Client> {
    options: TransportOptions,
    client: C,
}

impl MandrillTransport<Client> {
    /// Fails synchronously when no API key is configured, before any
    /// network call is attempted.
    pub fn new(options: TransportOptions) -> Result<Self, Error> {
        let client = Client::from_key(&options.api_key);
        Self::with_client(options, client)
    }
}

impl<C: Messages> MandrillTransport<C> {
    pub fn with_client(options: TransportOptions, client: C) -> Result<Self, Error> {
        if options.api_key.is_empty() {
            return Err(Error::Config(
                "Mailchimp Transactional API key is required".to_string(),
            ));
        }

        Ok(Self { options, client })
    }

    /// Map the normalized message into the provider's message object.
    fn build_message(&self, email: &Email) -> ApiMessage {
        // Transport-level sender config wins over the message's own
        let from_email = self
            .options
            .sender_mail
            .clone()
            .or_else(|| email.from.as_ref().map(|f| f.address.clone()))
            .unwrap_or_default();
        let from_name = self
            .options
            .sender_name
            .clone()
            .or_else(|| email.from.as_ref().and_then(|f| f.name.clone()))
            .unwrap_or_default();

        // to/cc/bcc fold into one list, discriminated by `type`
        let mut to: Vec<ApiRecipient> = email
            .to
            .iter()
            .map(|m| recipient(m, RecipientType::To))
            .collect();
        to.extend(email.cc.iter().map(|m| recipient(m, RecipientType::Cc)));
        to.extend(email.bcc.iter().map(|m| recipient(m, RecipientType::Bcc)));

        let mut headers = email.headers.clone();
        if let Some(reply_to) = &email.reply_to {
            headers
                .entry("Reply-To".to_string())
                .or_insert_with(|| reply_to.to_string());
        }

        let attachments = if email.attachments.is_empty() {
            None
        } else {
            Some(
                email
                    .attachments
                    .iter()
                    .map(|a| ApiAttachment {
                        type_: a.content_type.clone(),
                        name: a.name.clone(),
                        content: base64::encode(&a.data),
                    })
                    .collect(),
            )
        };

        let opts = &email.options;

        // Merge is implied by the presence of merge variables
        let has_merge_vars = opts.merge_vars.is_some() || opts.global_merge_vars.is_some();
        let merge = opts.merge.or(if has_merge_vars { Some(true) } else { None });
        let merge_language = if merge == Some(true) {
            Some(
                opts.merge_language
                    .clone()
                    .unwrap_or_else(|| "mailchimp".to_string()),
            )
        } else {
            opts.merge_language.clone()
        };

        ApiMessage {
            from_email,
            from_name,
            subject: email.subject.clone().unwrap_or_default(),
            text: email.text.clone(),
            html: email.html.clone(),
            to,
            headers,
            important: email.priority.map(|p| p == Priority::High),
            attachments,
            track_opens: opts.track_opens,
            track_clicks: opts.track_clicks,
            auto_text: opts.auto_text,
            auto_html: opts.auto_html,
            inline_css: opts.inline_css,
            url_strip_qs: opts.url_strip_qs,
            preserve_recipients: opts.preserve_recipients,
            view_content_link: opts.view_content_link,
            tracking_domain: opts.tracking_domain.clone(),
            signing_domain: opts.signing_domain.clone(),
            return_path_domain: opts.return_path_domain.clone(),
            merge,
            merge_language,
            global_merge_vars: opts.global_merge_vars.clone(),
            merge_vars: opts.merge_vars.clone(),
            tags: opts.tags.clone(),
            subaccount: opts.subaccount.clone(),
            metadata: opts.metadata.clone(),
            recipient_metadata: opts.recipient_metadata.clone(),
            google_analytics_domains: opts.google_analytics_domains.clone(),
            google_analytics_campaign: opts.google_analytics_campaign.clone(),
        }
    }

    fn envelope(&self, email: &Email) -> Envelope {
        let from = self
            .options
            .sender_mail
            .clone()
            .or_else(|| email.from.as_ref().map(|f| f.address.clone()));

        let to = email
            .to
            .iter()
            .chain(email.cc.iter())
            .chain(email.bcc.iter())
            .map(|m| m.address.clone())
            .collect();

        Envelope { from, to }
    }

    /// Issue exactly one API call: template-send when the message
    /// carries a template reference, direct-send otherwise.
    async fn dispatch(&self, email: &Email) -> Result<Vec<SendResult>, Error> {
        let message = self.build_message(email);
        let opts = &email.options;
        let send_at = opts
            .send_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());

        if let Some(template) = &email.template {
            log::debug!(
                "{}: sending to {} recipient(s) with template {}",
                email.uuid,
                message.to.len(),
                template.name
            );

            let request = SendTemplateRequest {
                template_name: template.name.clone(),
                template_content: template.content.clone(),
                message,
                ip_pool: opts.ip_pool.clone(),
                send_async: opts.send_async,
                send_at,
            };

            self.client.send_template(&request).await
        } else {
            log::debug!(
                "{}: sending to {} recipient(s)",
                email.uuid,
                message.to.len()
            );

            let request = SendRequest {
                message,
                ip_pool: opts.ip_pool.clone(),
                send_async: opts.send_async,
                send_at,
            };

            self.client.send(&request).await
        }
    }

    /// Collapse the per-recipient result list into a single outcome.
    ///
    /// Every entry is checked, not just the first; the earliest
    /// rejected or invalid recipient fails the send.
    fn normalize_response(
        &self,
        email: &Email,
        results: Vec<SendResult>,
    ) -> Result<SendInfo, Error> {
        for result in &results {
            match result.status {
                SendStatus::Rejected | SendStatus::Invalid => {
                    let reason = result
                        .reject_reason
                        .clone()
                        .unwrap_or_else(|| "recipient rejected by provider".to_string());

                    log::error!(
                        "{}: delivery rejected for {}: {}",
                        email.uuid,
                        result.email,
                        reason
                    );

                    return Err(Error::Rejected {
                        email: result.email.clone(),
                        reason,
                    });
                }
                _ => (),
            }
        }

        let message_id = results
            .first()
            .and_then(|r| r.id.clone())
            .unwrap_or_default();

        log::debug!("{}: accepted by provider as {}", email.uuid, message_id);

        Ok(SendInfo {
            envelope: self.envelope(email),
            message_id,
        })
    }
}

impl<C: Messages> Transport for MandrillTransport<C> {
    type Ok = SendInfo;
    type Error = Error;

    fn send<'a>(&'a self, email: &'a Email) -> TransportFuture<'a, SendInfo, Error> {
        Box::pin(async move {
            let results = self.dispatch(email).await.map_err(|e| {
                log::error!("{}: send failed: {}", email.uuid, e);
                e
            })?;

            self.normalize_response(email, results)
        })
    }
}

fn recipient(mailbox: &crate::email::Mailbox, type_: RecipientType) -> ApiRecipient {
    ApiRecipient {
        email: mailbox.address.clone(),
        name: mailbox.name.clone().unwrap_or_default(),
        type_,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::email::{Attachment, Mailbox, SendOptions, Template, TemplateVar};
    use crate::mandrill::ApiFuture;

    /// Records every request instead of hitting the network.
    struct MockApi {
        sends: Mutex<Vec<SendRequest>>,
        templates: Mutex<Vec<SendTemplateRequest>>,
        results: Vec<SendResult>,
    }

    impl MockApi {
        fn returning(results: Vec<SendResult>) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                templates: Mutex::new(Vec::new()),
                results,
            }
        }

        fn sent_ok(id: &str) -> Self {
            Self::returning(vec![SendResult {
                email: "rcpt@example.com".to_string(),
                status: SendStatus::Sent,
                id: Some(id.to_string()),
                reject_reason: None,
            }])
        }
    }

    impl Messages for MockApi {
        fn send<'a>(&'a self, request: &'a SendRequest) -> ApiFuture<'a, Vec<SendResult>> {
            self.sends.lock().unwrap().push(request.clone());
            let results = self.results.clone();
            Box::pin(async move { Ok(results) })
        }

        fn send_template<'a>(
            &'a self,
            request: &'a SendTemplateRequest,
        ) -> ApiFuture<'a, Vec<SendResult>> {
            self.templates.lock().unwrap().push(request.clone());
            let results = self.results.clone();
            Box::pin(async move { Ok(results) })
        }
    }

    fn options() -> TransportOptions {
        TransportOptions {
            api_key: "test-key".to_string(),
            sender_mail: None,
            sender_name: None,
        }
    }

    fn transport(mock: MockApi) -> MandrillTransport<MockApi> {
        let _ = env_logger::builder().is_test(true).try_init();
        MandrillTransport::with_client(options(), mock).unwrap()
    }

    fn base_email() -> Email {
        Email::new()
            .with_from(Mailbox::with_name("sender@example.com", "Sender"))
            .with_to(vec![Mailbox::new("rcpt@example.com")])
            .with_subject("Hello")
            .with_text("Hi there")
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let result = MandrillTransport::new(TransportOptions::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn message_without_template_uses_direct_send() {
        let transport = transport(MockApi::sent_ok("abc123"));

        transport.send(&base_email()).await.unwrap();

        assert_eq!(transport.client.sends.lock().unwrap().len(), 1);
        assert_eq!(transport.client.templates.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn message_with_template_uses_template_send() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let email = base_email().with_template(Template {
            name: "welcome".to_string(),
            content: vec![TemplateVar {
                name: "body".to_string(),
                content: "Hi".to_string(),
            }],
        });

        transport.send(&email).await.unwrap();

        assert_eq!(transport.client.sends.lock().unwrap().len(), 0);

        let templates = transport.client.templates.lock().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].template_name, "welcome");
        assert_eq!(templates[0].template_content.len(), 1);
    }

    #[tokio::test]
    async fn recipients_fold_into_one_typed_list() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let email = base_email()
            .with_to(vec![
                Mailbox::new("to1@example.com"),
                Mailbox::new("to2@example.com"),
            ])
            .with_cc(vec![Mailbox::new("cc@example.com")])
            .with_bcc(vec![Mailbox::new("bcc@example.com")]);

        transport.send(&email).await.unwrap();

        let sends = transport.client.sends.lock().unwrap();
        let to = &sends[0].message.to;

        assert_eq!(to.len(), 4);
        let types: Vec<_> = to.iter().map(|r| r.type_).collect();
        assert_eq!(
            types,
            vec![
                RecipientType::To,
                RecipientType::To,
                RecipientType::Cc,
                RecipientType::Bcc,
            ]
        );
        assert_eq!(to[2].email, "cc@example.com");
        assert_eq!(to[3].email, "bcc@example.com");
    }

    #[test]
    fn sender_defaults_to_message_from() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let message = transport.build_message(&base_email());

        assert_eq!(message.from_email, "sender@example.com");
        assert_eq!(message.from_name, "Sender");
    }

    #[test]
    fn configured_sender_overrides_message_from() {
        let opts = TransportOptions {
            api_key: "test-key".to_string(),
            sender_mail: Some("noreply@example.com".to_string()),
            sender_name: Some("No Reply".to_string()),
        };
        let transport =
            MandrillTransport::with_client(opts, MockApi::sent_ok("abc123")).unwrap();

        let message = transport.build_message(&base_email());

        assert_eq!(message.from_email, "noreply@example.com");
        assert_eq!(message.from_name, "No Reply");
    }

    #[test]
    fn empty_message_maps_to_defaults() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let message = transport.build_message(&Email::new());

        assert_eq!(message.subject, "");
        assert_eq!(message.from_email, "");
        assert!(message.to.is_empty());
        assert!(message.headers.is_empty());
        assert!(message.attachments.is_none());
        assert!(message.text.is_none());
    }

    #[test]
    fn attachments_are_base64_encoded() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let email = base_email().with_attachment(Attachment {
            name: "hello.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"Hello there!".to_vec(),
        });

        let message = transport.build_message(&email);
        let attachments = message.attachments.unwrap();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].type_, "text/plain");
        assert_eq!(attachments[0].content, base64::encode(b"Hello there!"));
    }

    #[test]
    fn merge_is_implied_by_merge_vars() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let mut email = base_email();
        email.options.global_merge_vars = Some(vec![TemplateVar {
            name: "FNAME".to_string(),
            content: "Jane".to_string(),
        }]);

        let message = transport.build_message(&email);

        assert_eq!(message.merge, Some(true));
        assert_eq!(message.merge_language.as_deref(), Some("mailchimp"));
    }

    #[test]
    fn merge_stays_unset_without_merge_vars() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let message = transport.build_message(&base_email());

        assert_eq!(message.merge, None);
        assert_eq!(message.merge_language, None);
    }

    #[test]
    fn reply_to_folds_into_headers() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let email = base_email().with_reply_to(Mailbox::new("replies@example.com"));

        let message = transport.build_message(&email);

        assert_eq!(
            message.headers.get("Reply-To").map(String::as_str),
            Some("replies@example.com")
        );
    }

    #[test]
    fn explicit_reply_to_header_is_kept() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let email = base_email()
            .with_header("Reply-To", "explicit@example.com")
            .with_reply_to(Mailbox::new("replies@example.com"));

        let message = transport.build_message(&email);

        assert_eq!(
            message.headers.get("Reply-To").map(String::as_str),
            Some("explicit@example.com")
        );
    }

    #[tokio::test]
    async fn scheduling_fields_ride_the_envelope() {
        let transport = transport(MockApi::sent_ok("abc123"));
        let mut email = base_email();
        email.options = SendOptions {
            ip_pool: Some("Main Pool".to_string()),
            send_async: Some(true),
            send_at: Some(chrono::Utc.ymd(2020, 1, 2).and_hms(3, 4, 5)),
            ..SendOptions::default()
        };

        transport.send(&email).await.unwrap();

        let sends = transport.client.sends.lock().unwrap();
        assert_eq!(sends[0].ip_pool.as_deref(), Some("Main Pool"));
        assert_eq!(sends[0].send_async, Some(true));
        assert_eq!(sends[0].send_at.as_deref(), Some("2020-01-02 03:04:05"));
    }

    #[tokio::test]
    async fn successful_send_yields_provider_id_and_envelope() {
        let transport = transport(MockApi::sent_ok("abc123"));

        let info = transport.send(&base_email()).await.unwrap();

        assert_eq!(info.message_id, "abc123");
        assert_eq!(info.envelope.from.as_deref(), Some("sender@example.com"));
        assert_eq!(info.envelope.to, vec!["rcpt@example.com".to_string()]);
    }

    #[tokio::test]
    async fn rejected_recipient_surfaces_reason() {
        let mock = MockApi::returning(vec![SendResult {
            email: "rcpt@example.com".to_string(),
            status: SendStatus::Rejected,
            id: None,
            reject_reason: Some("invalid-sender".to_string()),
        }]);
        let transport = transport(mock);

        let err = transport.send(&base_email()).await.unwrap_err();

        assert!(err.to_string().contains("invalid-sender"));
    }

    #[tokio::test]
    async fn rejection_without_reason_gets_a_generic_message() {
        let mock = MockApi::returning(vec![SendResult {
            email: "rcpt@example.com".to_string(),
            status: SendStatus::Invalid,
            id: None,
            reject_reason: None,
        }]);
        let transport = transport(mock);

        let err = transport.send(&base_email()).await.unwrap_err();

        match err {
            Error::Rejected { email, reason } => {
                assert_eq!(email, "rcpt@example.com");
                assert!(!reason.is_empty());
            }
            other => panic!("Expected Rejected error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn any_rejected_entry_fails_the_send() {
        // Not just the first entry; a later rejection counts too
        let mock = MockApi::returning(vec![
            SendResult {
                email: "ok@example.com".to_string(),
                status: SendStatus::Sent,
                id: Some("abc123".to_string()),
                reject_reason: None,
            },
            SendResult {
                email: "bad@example.com".to_string(),
                status: SendStatus::Rejected,
                id: None,
                reject_reason: Some("hard-bounce".to_string()),
            },
        ]);
        let transport = transport(mock);

        let err = transport.send(&base_email()).await.unwrap_err();

        match err {
            Error::Rejected { email, reason } => {
                assert_eq!(email, "bad@example.com");
                assert_eq!(reason, "hard-bounce");
            }
            other => panic!("Expected Rejected error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn queued_and_scheduled_count_as_success() {
        let mock = MockApi::returning(vec![SendResult {
            email: "rcpt@example.com".to_string(),
            status: SendStatus::Queued,
            id: Some("q1".to_string()),
            reject_reason: None,
        }]);
        let transport = transport(mock);

        let info = transport.send(&base_email()).await.unwrap();
        assert_eq!(info.message_id, "q1");
    }
}
