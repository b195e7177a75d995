use log::info;

use geotopic_logic::{TopicMessaging, prelude::*};

use crate::endpoint::validate_topic;

/// Only logs what would be sent, for running without credentials
pub struct DryRunMessaging;

impl TopicMessaging for DryRunMessaging {
    async fn subscribe(&self, topic: &str) -> Result {
        validate_topic(topic)?;
        info!("(dry run) subscribe {topic}");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result {
        validate_topic(topic)?;
        info!("(dry run) unsubscribe {topic}");
        Ok(())
    }
}
