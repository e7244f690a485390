// ============================
// crates/backend-lib/src/events.rs
// ============================
//! Outbound account event notifications.
//!
//! Publishing is best effort: events are sent from a detached task and a
//! failure is only logged.
use std::sync::Arc;

use async_trait::async_trait;
use authdb_common::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Account lifecycle events. Never carries credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccountEvent {
    Login {
        user_id: AccountId,
        email: String,
        timestamp: DateTime<Utc>,
    },
    Signup {
        user_id: AccountId,
        email: String,
        timestamp: DateTime<Utc>,
    },
    DeleteAccount {
        user_id: AccountId,
        timestamp: DateTime<Utc>,
    },
    UpdateLogin {
        user_id: AccountId,
        new_login: String,
        timestamp: DateTime<Utc>,
    },
    UpdateEmail {
        user_id: AccountId,
        new_email: String,
        timestamp: DateTime<Utc>,
    },
    UpdatePassword {
        user_id: AccountId,
        timestamp: DateTime<Utc>,
    },
}

/// Destination for account events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: AccountEvent) -> anyhow::Result<()>;
}

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: AccountEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(target: "authdb::events", %payload, "account event");
        Ok(())
    }
}

/// Forwards events into a channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<AccountEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AccountEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn publish(&self, event: AccountEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

/// Publish without waiting for the sink
pub fn notify(sink: &Arc<dyn EventSink>, event: AccountEvent) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        if let Err(e) = sink.publish(event).await {
            tracing::warn!(error = %e, "failed to publish account event");
        }
    });
}
