use std::future::Future;

use tokio::sync::watch;

use pony_api::ApiError;

/// Where a write command stands. Any state can move back to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error(ApiError),
}

impl CommandStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, CommandStatus::Pending)
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            CommandStatus::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Tracks one command's `idle -> pending -> success | error` cycle and
/// publishes it so a view can render progress and errors.
pub struct Mutation {
    tx: watch::Sender<CommandStatus>,
}

impl Default for Mutation {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CommandStatus::Idle);
        Self { tx }
    }

    pub fn status(&self) -> CommandStatus {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CommandStatus> {
        self.tx.subscribe()
    }

    /// Drive `command`, recording its outcome.
    pub async fn run<T, F>(&self, command: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.tx.send_replace(CommandStatus::Pending);
        let result = command.await;
        self.tx.send_replace(match &result {
            Ok(_) => CommandStatus::Success,
            Err(e) => CommandStatus::Error(e.clone()),
        });
        result
    }

    pub fn reset(&self) {
        self.tx.send_replace(CommandStatus::Idle);
    }
}
