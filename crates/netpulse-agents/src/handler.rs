//! Handler capability
//!
//! Every domain handler exposes the same surface: a name, `process(task)`
//! advancing the task envelope through running → completed/failed, and
//! `chat(message)` returning free text. Handlers keep a bounded recent
//! history of both.

use async_trait::async_trait;
use serde_json::Value;

use netpulse_model::{AgentMessage, AgentTask};

/// Recent-history bound for handler message/task logs.
pub const RECENT_LIMIT: usize = 50;

/// Bounded message and task history owned by each handler.
#[derive(Default)]
pub struct HandlerLog {
    messages: Vec<AgentMessage>,
    tasks: Vec<AgentTask>,
}

impl HandlerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_message(&mut self, role: &str, content: &str, handler: &str) {
        let mut msg = AgentMessage::new(role, content);
        msg.handler = Some(handler.to_string());
        self.messages.push(msg);
        if self.messages.len() > RECENT_LIMIT {
            let excess = self.messages.len() - RECENT_LIMIT;
            self.messages.drain(..excess);
        }
    }

    pub fn record_task(&mut self, task: &AgentTask) {
        self.tasks.push(task.clone());
        if self.tasks.len() > RECENT_LIMIT {
            let excess = self.tasks.len() - RECENT_LIMIT;
            self.tasks.drain(..excess);
        }
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Common capability of all domain handlers.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn log(&self) -> &HandlerLog;

    /// Process a task envelope: advance its status and fill `output` or
    /// `error`. An unimplemented task kind marks the task failed; it never
    /// panics or surfaces a transport error.
    async fn process(&mut self, task: AgentTask) -> AgentTask;

    /// Handle a free-text message, appending it to the handler's history.
    async fn chat(&mut self, message: &str, context: Option<&Value>) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let mut log = HandlerLog::new();
        for i in 0..RECENT_LIMIT + 20 {
            log.log_message("user", &format!("msg {i}"), "test");
        }
        assert_eq!(log.message_count(), RECENT_LIMIT);
        assert_eq!(log.messages().first().map(|m| m.content.as_str()), Some("msg 20"));
    }

    #[test]
    fn test_task_log_is_bounded() {
        let mut log = HandlerLog::new();
        for _ in 0..RECENT_LIMIT + 5 {
            log.record_task(&AgentTask::new("x", "y", Value::Null));
        }
        assert_eq!(log.task_count(), RECENT_LIMIT);
    }
}
