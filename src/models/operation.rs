// Server-side operation states reported while polling a submitted statement.

use std::fmt;

/// Hive `TOperationState` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Initialized,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
    Unknown,
    Pending,
    TimedOut,
    /// A code this client does not know about
    Unrecognized(i32),
}

impl OperationState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OperationState::Initialized,
            1 => OperationState::Running,
            2 => OperationState::Finished,
            3 => OperationState::Canceled,
            4 => OperationState::Closed,
            5 => OperationState::Error,
            6 => OperationState::Unknown,
            7 => OperationState::Pending,
            8 => OperationState::TimedOut,
            other => OperationState::Unrecognized(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            OperationState::Initialized => 0,
            OperationState::Running => 1,
            OperationState::Finished => 2,
            OperationState::Canceled => 3,
            OperationState::Closed => 4,
            OperationState::Error => 5,
            OperationState::Unknown => 6,
            OperationState::Pending => 7,
            OperationState::TimedOut => 8,
            OperationState::Unrecognized(code) => *code,
        }
    }

    /// The statement has not reached a terminal state yet
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OperationState::Initialized | OperationState::Running | OperationState::Pending
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationState::Finished)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names as the thrift IDL spells them, including UKNOWN
        let name = match self {
            OperationState::Initialized => "INITIALIZED_STATE",
            OperationState::Running => "RUNNING_STATE",
            OperationState::Finished => "FINISHED_STATE",
            OperationState::Canceled => "CANCELED_STATE",
            OperationState::Closed => "CLOSED_STATE",
            OperationState::Error => "ERROR_STATE",
            OperationState::Unknown => "UKNOWN_STATE",
            OperationState::Pending => "PENDING_STATE",
            OperationState::TimedOut => "TIMEDOUT_STATE",
            OperationState::Unrecognized(code) => return write!(f, "Unknown<{}>", code),
        };
        f.write_str(name)
    }
}

/// Response to one `GetOperationStatus` poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollStatus {
    pub operation_state: OperationState,
    pub error_message: Option<String>,
    pub sql_state: Option<String>,
    pub progress: Option<f64>,
}

impl PollStatus {
    pub fn new(operation_state: OperationState) -> Self {
        Self {
            operation_state,
            error_message: None,
            sql_state: None,
            progress: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Error message, ignoring empty strings the server sometimes sends
    pub fn error(&self) -> Option<&str> {
        self.error_message.as_deref().filter(|msg| !msg.is_empty())
    }
}
