//! Execution context passed explicitly to every model entry point

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device that executes tensor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Device {
    /// Host CPU
    #[default]
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Execution context: device placement and training vs inference mode
///
/// In evaluation mode model outputs are detached from the autograd graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    training: bool,
    device: Device,
}

impl Context {
    /// Create a new training context on the default device
    pub fn new() -> Self {
        Self { training: true, device: Device::default() }
    }

    /// Inference context on the default device
    pub fn inference() -> Self {
        Self { training: false, device: Device::default() }
    }

    /// Set the execution device
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Execution device
    pub fn device(&self) -> Device {
        self.device
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
