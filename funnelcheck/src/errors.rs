use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Expected condition absent: {0}")]
    ConditionAbsent(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Gateway probe failed: {0}")]
    GatewayProbe(String),

    #[error("Account creation failed: {0}")]
    AccountCreation(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("WebDriver error: {0}")]
    Driver(String),
}

impl AutomationError {
    /// True for errors that mean "the page simply does not show this right
    /// now", as opposed to a broken session. Optional stages use this to
    /// tell a missing feature apart from real infrastructure failures.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_)
                | AutomationError::ConditionAbsent(_)
                | AutomationError::Timeout(_)
        )
    }
}
