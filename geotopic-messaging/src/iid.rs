use reqwest::{Client, Request};
use serde::Serialize;

use geotopic_logic::{TopicMessaging, prelude::*};

use crate::endpoint::{self, IID_BASE_URL};

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    to: String,
    registration_tokens: [&'a str; 1],
}

/// [TopicMessaging] backed by the Instance ID topic relation API
pub struct IidTopicClient {
    client: Client,
    base_url: String,
    registration_token: String,
    access_token: String,
}

impl IidTopicClient {
    pub fn new(registration_token: String, access_token: String) -> Result<Self> {
        Self::with_base_url(IID_BASE_URL, registration_token, access_token)
    }

    pub fn with_base_url(
        base_url: &str,
        registration_token: String,
        access_token: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            registration_token,
            access_token,
        })
    }

    fn subscribe_request(&self, topic: &str) -> Result<Request> {
        endpoint::validate_topic(topic)?;
        let url = endpoint::subscribe_url(&self.base_url, &self.registration_token, topic);
        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .header("access_token_auth", "true")
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .build()
            .context("Failed to build subscribe request")
    }

    fn unsubscribe_request(&self, topic: &str) -> Result<Request> {
        endpoint::validate_topic(topic)?;
        let body = BatchRequest {
            to: format!("/topics/{topic}"),
            registration_tokens: [self.registration_token.as_str()],
        };
        self.client
            .post(endpoint::batch_remove_url(&self.base_url))
            .bearer_auth(&self.access_token)
            .header("access_token_auth", "true")
            .json(&body)
            .build()
            .context("Failed to build unsubscribe request")
    }

    async fn execute(&self, req: Request) -> Result {
        self.client
            .execute(req)
            .await
            .context("Could not send request")?
            .error_for_status()
            .context("Server returned error")?;
        Ok(())
    }
}

impl TopicMessaging for IidTopicClient {
    async fn subscribe(&self, topic: &str) -> Result {
        let req = self.subscribe_request(topic)?;
        self.execute(req)
            .await
            .with_context(|| format!("While subscribing to {topic}"))
    }

    async fn unsubscribe(&self, topic: &str) -> Result {
        let req = self.unsubscribe_request(topic)?;
        self.execute(req)
            .await
            .with_context(|| format!("While unsubscribing from {topic}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_client() -> IidTopicClient {
        IidTopicClient::with_base_url("https://iid.test/", "device-token".into(), "secret".into())
            .expect("Failed to build client")
    }

    #[test]
    fn test_subscribe_request() {
        let req = mk_client().subscribe_request("wydm").unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://iid.test/iid/v1/device-token/rel/topics/wydm"
        );
        assert_eq!(req.headers()["authorization"], "Bearer secret");
        assert_eq!(req.headers()["access_token_auth"], "true");
    }

    #[test]
    fn test_unsubscribe_request() {
        let req = mk_client().unsubscribe_request("wydm").unwrap();
        assert_eq!(req.url().as_str(), "https://iid.test/iid/v1:batchRemove");
        assert_eq!(req.headers()["authorization"], "Bearer secret");

        let body = req
            .body()
            .and_then(|b| b.as_bytes())
            .expect("Request has no body");
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "to": "/topics/wydm",
                "registration_tokens": ["device-token"],
            })
        );
    }

    #[test]
    fn test_invalid_topic_rejected_before_request() {
        let client = mk_client();
        assert!(client.subscribe_request("bad topic").is_err());
        assert!(client.unsubscribe_request("").is_err());
    }
}
