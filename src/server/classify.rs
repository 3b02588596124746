use std::future::Future;

use async_trait::async_trait;
use rmcp::model::{LoggingLevel, LoggingMessageNotificationParam};
use rmcp::{Peer, RoleServer};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{AdoError, ErrorCategory, ErrorResult};

/// Where tool progress is reported to the connected MCP client.
#[async_trait]
pub trait ClientLog: Send + Sync {
    async fn log(&self, level: LoggingLevel, message: String);
}

/// Sends `notifications/message` to one peer, dropping anything below `min_level`.
pub struct ClientLogger {
    peer: Peer<RoleServer>,
    min_level: LoggingLevel,
}

impl ClientLogger {
    pub fn new(peer: Peer<RoleServer>, min_level: LoggingLevel) -> Self {
        Self { peer, min_level }
    }
}

pub fn severity(level: LoggingLevel) -> u8 {
    match level {
        LoggingLevel::Debug => 0,
        LoggingLevel::Info => 1,
        LoggingLevel::Notice => 2,
        LoggingLevel::Warning => 3,
        LoggingLevel::Error => 4,
        LoggingLevel::Critical => 5,
        LoggingLevel::Alert => 6,
        LoggingLevel::Emergency => 7,
    }
}

#[async_trait]
impl ClientLog for ClientLogger {
    async fn log(&self, level: LoggingLevel, message: String) {
        if severity(level) < severity(self.min_level) {
            return;
        }
        let notification = LoggingMessageNotificationParam {
            level,
            logger: Some(env!("CARGO_PKG_NAME").to_string()),
            data: Value::String(message),
        };
        // a client that went away must not fail the tool call
        if let Err(e) = self.peer.notify_logging_message(notification).await {
            debug!(error = %e, "Failed to send log message to client");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(ErrorResult),
}

impl Outcome {
    pub fn into_value(self) -> Value {
        match self {
            Outcome::Success(value) => value,
            Outcome::Failure(result) => serde_json::to_value(result).unwrap_or_default(),
        }
    }
}

/// Run one tool body and turn any failure into a structured [`ErrorResult`].
/// Start, success and failure are also reported to the client through `client`.
pub async fn classify<T, F>(tool: &str, client: &dyn ClientLog, op: F) -> Outcome
where
    T: Serialize,
    F: Future<Output = Result<T, AdoError>>,
{
    info!(tool, "Executing tool");
    client
        .log(LoggingLevel::Info, format!("Executing tool: {tool}"))
        .await;

    let failure = match op.await {
        Ok(payload) => match serde_json::to_value(payload) {
            Ok(value) => {
                info!(tool, "Tool executed successfully");
                client
                    .log(LoggingLevel::Info, format!("Tool {tool} executed successfully."))
                    .await;
                return Outcome::Success(value);
            }
            Err(e) => {
                error!(tool, error = ?e, "Failed to serialize tool result");
                client
                    .log(LoggingLevel::Error, format!("An unexpected error occurred in {tool}: {e}"))
                    .await;
                return Outcome::Failure(ErrorResult::server());
            }
        },
        Err(err) => err,
    };

    let result = ErrorResult::classify(&failure);
    let notice = match result.error {
        ErrorCategory::Validation => {
            error!(tool, error = %failure, "Input validation error");
            format!("Input validation error for {tool}: {failure}")
        }
        ErrorCategory::Connection => {
            error!(tool, error = %failure, "Azure DevOps connection error");
            format!("Azure DevOps connection error during {tool}: {failure}")
        }
        ErrorCategory::InvalidReason | ErrorCategory::AzureDevOps => {
            let service = failure.service();
            error!(
                tool,
                status = service.map(|s| s.status),
                type_key = service.and_then(|s| s.type_key.as_deref()),
                error = %failure,
                "Azure DevOps service error"
            );
            format!("Azure DevOps error during {tool}: {failure}")
        }
        ErrorCategory::Server => {
            error!(tool, error = ?failure, "Unexpected error");
            format!("An unexpected error occurred in {tool}: {failure}")
        }
    };
    client.log(LoggingLevel::Error, notice).await;
    Outcome::Failure(result)
}

/// Client log that keeps every message, for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingLog {
    pub messages: std::sync::Mutex<Vec<(LoggingLevel, String)>>,
}

#[cfg(test)]
impl RecordingLog {
    pub fn messages(&self) -> Vec<(LoggingLevel, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ClientLog for RecordingLog {
    async fn log(&self, level: LoggingLevel, message: String) {
        self.messages.lock().unwrap().push((level, message));
    }
}
