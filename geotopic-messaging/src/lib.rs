mod dry_run;
mod endpoint;
mod iid;

pub use dry_run::DryRunMessaging;
pub use endpoint::validate_topic;
pub use iid::IidTopicClient;
