use anyhow::{bail, ensure};

use geotopic_logic::prelude::*;

const fn iid_host() -> &'static str {
    if let Some(host) = option_env!("GEOTOPIC_IID_HOST") {
        host
    } else {
        "iid.googleapis.com"
    }
}

const fn iid_port() -> u16 {
    if let Some(port) = option_env!("GEOTOPIC_IID_PORT") {
        const_str::parse!(port, u16)
    } else {
        443
    }
}

const fn iid_secure() -> bool {
    if let Some(secure) = option_env!("GEOTOPIC_IID_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        true
    }
}

const fn iid_http_proto() -> &'static str {
    if iid_secure() { "https" } else { "http" }
}

const IID_HOST: &str = iid_host();
const IID_PORT: u16 = iid_port();
const IID_HTTP_PROTO: &str = iid_http_proto();

const IID_SOCKET: &str = const_str::concat!(IID_HOST, ":", IID_PORT);

pub(crate) const IID_BASE_URL: &str = const_str::concat!(IID_HTTP_PROTO, "://", IID_SOCKET);

const MAX_TOPIC_LEN: usize = 900;

/// Topic names are limited to `[a-zA-Z0-9-_.~%]{1,900}`
pub fn validate_topic(topic: &str) -> Result {
    ensure!(!topic.is_empty(), "Topic name can't be empty");
    ensure!(
        topic.len() <= MAX_TOPIC_LEN,
        "Topic name is longer than {MAX_TOPIC_LEN} characters"
    );
    if let Some(bad) = topic
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%')))
    {
        bail!("Topic name {topic} contains invalid character {bad:?}");
    }
    Ok(())
}

pub fn subscribe_url(base: &str, registration_token: &str, topic: &str) -> String {
    format!("{base}/iid/v1/{registration_token}/rel/topics/{topic}")
}

pub fn batch_remove_url(base: &str) -> String {
    format!("{base}/iid/v1:batchRemove")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        if option_env!("GEOTOPIC_IID_HOST").is_none()
            && option_env!("GEOTOPIC_IID_PORT").is_none()
            && option_env!("GEOTOPIC_IID_SECURE").is_none()
        {
            assert_eq!(IID_BASE_URL, "https://iid.googleapis.com:443");
        }
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            subscribe_url("https://example.com", "tok", "wydm"),
            "https://example.com/iid/v1/tok/rel/topics/wydm"
        );
        assert_eq!(
            batch_remove_url("https://example.com"),
            "https://example.com/iid/v1:batchRemove"
        );
    }

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic("wydm").is_ok());
        assert!(validate_topic("news-2024_v1.0~%20").is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("has space").is_err());
        assert!(validate_topic("slash/topic").is_err());
        assert!(validate_topic(&"a".repeat(900)).is_ok());
        assert!(validate_topic(&"a".repeat(901)).is_err());
    }
}
