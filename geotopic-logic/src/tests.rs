use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use anyhow::bail;
use tokio::task::yield_now;

use crate::{LocationSample, LocationService, TopicMessaging, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessagingCall {
    Subscribe(String),
    Unsubscribe(String),
}

/// Records every call, calls for topics in `failing` return an error
#[derive(Default)]
pub struct MockMessaging {
    calls: Mutex<Vec<MessagingCall>>,
    failing: Mutex<HashSet<String>>,
}

impl MockMessaging {
    pub fn fail_topic(&self, topic: &str) {
        self.failing.lock().unwrap().insert(topic.to_string());
    }

    pub fn take_calls(&self) -> Vec<MessagingCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub async fn wait_for_calls(&self, amount: usize) {
        while self.call_count() < amount {
            yield_now().await;
        }
    }

    fn record(&self, call: MessagingCall, topic: &str) -> Result {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(topic) {
            bail!("Mock failure for {topic}");
        }
        Ok(())
    }
}

impl TopicMessaging for MockMessaging {
    async fn subscribe(&self, topic: &str) -> Result {
        self.record(MessagingCall::Subscribe(topic.to_string()), topic)
    }

    async fn unsubscribe(&self, topic: &str) -> Result {
        self.record(MessagingCall::Unsubscribe(topic.to_string()), topic)
    }
}

/// Hands out queued samples one poll at a time, [None] once the queue runs dry
#[derive(Default)]
pub struct MockLocation(Mutex<VecDeque<LocationSample>>);

impl MockLocation {
    pub fn queue(&self, sample: LocationSample) {
        self.0.lock().unwrap().push_back(sample);
    }
}

impl LocationService for MockLocation {
    fn get_loc(&self) -> Option<LocationSample> {
        self.0.lock().unwrap().pop_front()
    }
}

/// Let spawned tasks run until they're blocked
pub async fn settle() {
    for _ in 0..10 {
        yield_now().await;
    }
}
