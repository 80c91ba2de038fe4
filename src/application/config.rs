use std::time::Duration;

/// Timeouts bounding every call the service makes to its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How long to wait for the payment processor before treating the outcome as unknown.
    pub processor_timeout: Duration,
    /// How long to wait for any single store call.
    pub storage_timeout: Duration,
}

impl ServiceConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn with_processor_timeout(mut self, timeout: Duration) -> Self {
        self.processor_timeout = timeout;
        self
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            processor_timeout: Self::DEFAULT_TIMEOUT,
            storage_timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
