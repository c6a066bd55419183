use serde::Serialize;

/// `{"success": true}` acknowledgement for writes with nothing else to report.
#[derive(Debug, Serialize, Clone, Copy)]
pub struct Success {
    pub success: bool,
}

impl Default for Success {
    fn default() -> Self {
        Self { success: true }
    }
}
