//! Correlation data carried from an inbound request down to the engines.

use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }

    /// A fresh id for work that does not start from a Slack delivery, such as
    /// one CLI invocation.
    pub fn generate(prefix: &str) -> Self {
        Self::new(format!("{prefix}-{}", Uuid::new_v4()))
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown-correlation-id")
    }
}
