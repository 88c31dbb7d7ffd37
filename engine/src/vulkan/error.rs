use thiserror::Error;
use vulkanalia::vk;

/// Why a physical device was skipped during selection.
#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

/// Fatal bring-up failures. Every variant aborts startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Missing capability: {0}")]
    CapabilityMissing(String),

    #[error("Failed to create {object}: {code}")]
    Creation {
        object: &'static str,
        #[source]
        code: vk::ErrorCode,
    },

    #[error("Failed to create semaphores / fences: {0}")]
    Synchronization(#[source] vk::ErrorCode),

    #[error("Invalid shader bytecode `{path}`: {reason}")]
    Shader { path: String, reason: String },

    #[error("Swapchain format changed from {old:?} to {new:?}; the render pass is not rebuilt")]
    FormatChanged { old: vk::Format, new: vk::Format },
}

impl SetupError {
    /// Adapter for `map_err` on creation calls.
    pub fn creation(object: &'static str) -> impl FnOnce(vk::ErrorCode) -> SetupError {
        move |code| SetupError::Creation { object, code }
    }
}
