use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    /// Transport failure or non-success status. Displays the fixed per-operation message.
    #[error("{}", .operation.failure_message())]
    Request {
        operation: Operation,
        status: Option<u16>,
    },

    #[error("{}: response body was not JSON: {source}", .operation.failure_message())]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Batch file {path} rejected: {reason}")]
    BatchFile { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type PulseResult<T> = Result<T, PulseError>;

/// One backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DashboardStats,
    Students,
    StudentDetails,
    Predict,
    Simulate,
    Analytics,
    Upload,
    ShapAnalysis,
    SendAlert,
    ModelPerformance,
}

impl Operation {
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::DashboardStats => "Failed to fetch dashboard stats",
            Operation::Students => "Failed to fetch students",
            Operation::StudentDetails => "Failed to fetch student details",
            Operation::Predict => "Failed to predict",
            Operation::Simulate => "Failed to simulate",
            Operation::Analytics => "Failed to fetch analytics",
            Operation::Upload => "Failed to upload file",
            Operation::ShapAnalysis => "Failed to fetch SHAP analysis",
            Operation::SendAlert => "Failed to send alert",
            Operation::ModelPerformance => "Failed to fetch model performance",
        }
    }

    /// What the operation loads, for user-facing error lines.
    pub fn subject(self) -> &'static str {
        match self {
            Operation::DashboardStats => "dashboard",
            Operation::Students => "students",
            Operation::StudentDetails => "student details",
            Operation::Predict => "prediction",
            Operation::Simulate => "simulation",
            Operation::Analytics => "analytics",
            Operation::Upload => "batch upload",
            Operation::ShapAnalysis => "explanation",
            Operation::SendAlert => "alert",
            Operation::ModelPerformance => "model performance",
        }
    }
}

impl PulseError {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            PulseError::Request { operation, .. } | PulseError::Decode { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }
}
