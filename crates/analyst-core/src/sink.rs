//! Invocation sinks.
//!
//! Downstream consumers (analytics graph, embedding store) observe every
//! executed tool call. Dispatch is fire-and-forget: each sink runs on its
//! own task under a timeout, and its outcome never reaches the turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::session::SessionId;
use crate::tool::{ToolArguments, ToolResult};

/// One executed call as reported to sinks and to the caller
#[derive(Clone, Debug, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    /// Alias-expanded arguments the provider saw
    pub arguments: ToolArguments,
    pub result: ToolResult,
    /// Served from the result cache
    pub cached: bool,
}

/// Event handed to sinks
#[derive(Clone, Debug, Serialize)]
pub struct InvocationEvent {
    pub session_id: SessionId,
    pub user_id: Option<String>,
    pub invocation: ToolInvocation,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait InvocationSink: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    async fn record(&self, event: &InvocationEvent) -> Result<()>;
}

/// Sink that only logs; the default when no storage is wired
pub struct LogSink;

#[async_trait]
impl InvocationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn record(&self, event: &InvocationEvent) -> Result<()> {
        tracing::info!(
            session = %event.session_id,
            tool = %event.invocation.tool,
            cached = event.invocation.cached,
            success = event.invocation.result.success,
            "Tool invocation"
        );
        Ok(())
    }
}

/// Spawn one task per sink. Returns immediately.
pub fn dispatch(sinks: &[Arc<dyn InvocationSink>], event: &InvocationEvent, budget: Duration) {
    for sink in sinks {
        let sink = Arc::clone(sink);
        let event = event.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(budget, sink.record(&event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        sink = %sink.name(),
                        tool = %event.invocation.tool,
                        error = %e,
                        "Invocation sink failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        sink = %sink.name(),
                        tool = %event.invocation.tool,
                        "Invocation sink timed out"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalystError;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl InvocationSink for ChannelSink {
        fn name(&self) -> &str {
            "channel"
        }

        async fn record(&self, event: &InvocationEvent) -> Result<()> {
            self.0
                .send(event.invocation.tool.clone())
                .map_err(|e| AnalystError::Other(e.to_string()))
        }
    }

    struct FailingSink;

    #[async_trait]
    impl InvocationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn record(&self, _event: &InvocationEvent) -> Result<()> {
            Err(AnalystError::Store("graph offline".into()))
        }
    }

    fn event() -> InvocationEvent {
        InvocationEvent {
            session_id: SessionId::from_string("s"),
            user_id: None,
            invocation: ToolInvocation {
                tool: "get_gas_price".into(),
                arguments: ToolArguments::new(),
                result: ToolResult::success("get_gas_price", "12 gwei"),
                cached: false,
            },
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_every_sink_sees_the_event_despite_failures() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sinks: Vec<Arc<dyn InvocationSink>> = vec![
            Arc::new(FailingSink),
            Arc::new(ChannelSink(tx)),
            Arc::new(LogSink),
        ];

        dispatch(&sinks, &event(), Duration::from_secs(1));
        assert_eq!(rx.recv().await.as_deref(), Some("get_gas_price"));
    }
}
