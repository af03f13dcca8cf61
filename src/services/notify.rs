//! Outbound notification seam
//!
//! Templated email (or any other channel) lives upstream; the lifecycle
//! fires `notify(event, payload)` and never waits on delivery. Failures
//! are logged and swallowed by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::CollaboratorError;

/// Notification event kinds emitted by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Created,
    StatusChanged,
    NewComment,
    Shared,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::StatusChanged => write!(f, "statusChanged"),
            EventKind::NewComment => write!(f, "newComment"),
            EventKind::Shared => write!(f, "shared"),
        }
    }
}

/// Fire-and-forget notification seam
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError>;
}

/// Notifier that records events to the log only
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        event: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        info!(event = %event, %payload, "notification dispatched");
        Ok(())
    }
}
