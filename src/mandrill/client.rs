use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::api;
use crate::error::Error;

// Definition of future types for async use
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// The two message operations the transport needs from the API.
///
/// Kept as a trait so the transport can be exercised against a
/// recording stand-in instead of the live endpoint.
pub trait Messages: Send + Sync {
    fn send<'a>(&'a self, request: &'a api::SendRequest) -> ApiFuture<'a, Vec<api::SendResult>>;

    fn send_template<'a>(
        &'a self,
        request: &'a api::SendTemplateRequest,
    ) -> ApiFuture<'a, Vec<api::SendResult>>;
}

/// Mailchimp Transactional API client
pub struct Client {
    key: String,
    http: reqwest::Client,
}

impl Client {
    pub fn from_key(key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api::MANDRILL_REQUEST_TIMEOUT))
            .build()
            .unwrap();
        Self {
            key: key.to_string(),
            http,
        }
    }

    #[inline]
    async fn request<T: Serialize>(
        &self,
        endpoint: api::Endpoint,
        request: &T,
    ) -> Result<Bytes, Error> {
        let url = api::build_endpoint_url(endpoint);

        // The API key travels inline in the JSON body
        let body = serde_json::to_string(&api::Keyed {
            key: &self.key,
            request,
        })?;

        let resp = self
            .http
            .post(url::Url::parse(&url)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(api::map_error(status, &bytes));
        }

        Ok(bytes)
    }
}

impl Messages for Client {
    fn send<'a>(&'a self, request: &'a api::SendRequest) -> ApiFuture<'a, Vec<api::SendResult>> {
        Box::pin(async move {
            let resp = self.request(api::Endpoint::MessagesSend, request).await?;
            serde_json::from_slice(&resp).map_err(|e| e.into())
        })
    }

    fn send_template<'a>(
        &'a self,
        request: &'a api::SendTemplateRequest,
    ) -> ApiFuture<'a, Vec<api::SendResult>> {
        Box::pin(async move {
            let resp = self
                .request(api::Endpoint::MessagesSendTemplate, request)
                .await?;
            serde_json::from_slice(&resp).map_err(|e| e.into())
        })
    }
}
