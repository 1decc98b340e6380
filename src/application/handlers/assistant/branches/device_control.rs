//! DeviceControl branch.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::application::handlers::assistant::prompts::{DEVICE_DEFAULT_ACK, DEVICE_DISABLED_MESSAGE};
use crate::domain::assistant::{BranchFailure, BranchKind, BranchOutcome, BranchResult, BranchSource, FailureReason};
use crate::ports::DeviceController;

use super::{BranchHandler, BranchInput};

/// Operates equipment through the device service.
///
/// Never redirected to another branch: when disabled it answers with a
/// fixed message and makes no call.
pub struct DeviceControlBranch {
    controller: Option<Arc<dyn DeviceController>>,
    enabled: bool,
    timeout: Duration,
}

impl DeviceControlBranch {
    pub fn new(controller: Option<Arc<dyn DeviceController>>, enabled: bool, timeout: Duration) -> Self {
        Self {
            controller,
            enabled,
            timeout,
        }
    }
}

#[async_trait]
impl BranchHandler for DeviceControlBranch {
    fn kind(&self) -> BranchKind {
        BranchKind::DeviceControl
    }

    async fn handle(&self, input: BranchInput<'_>) -> BranchOutcome {
        let controller = match &self.controller {
            Some(controller) if self.enabled => controller,
            _ => {
                tracing::info!(session_id = %input.session_id, "Device control disabled");
                return BranchOutcome::Degraded(
                    BranchResult::new(DEVICE_DISABLED_MESSAGE, BranchSource::Device, false).with_extra("disabled", true),
                );
            }
        };

        let call = controller.consult(input.text, input.session_id, input.context.auxiliary(), None);
        match timeout(self.timeout, call).await {
            Ok(Ok(response)) if response.success => {
                let answer = response.first_message().unwrap_or(DEVICE_DEFAULT_ACK).to_string();
                let mut result = BranchResult::new(answer, BranchSource::Device, true);
                if let Some(device_type) = response.device_type {
                    result = result.with_extra("device_type", device_type);
                }
                BranchOutcome::Ok(result)
            }
            Ok(Ok(response)) => {
                let detail = response.error.unwrap_or_else(|| "the device reported a failure".to_string());
                tracing::warn!(session_id = %input.session_id, detail = %detail, "Device command unsuccessful");
                BranchOutcome::Fail(BranchFailure::new(self.kind(), FailureReason::Unsuccessful, detail))
            }
            Ok(Err(err)) => {
                tracing::warn!(session_id = %input.session_id, error = %err, "Device service error");
                BranchOutcome::Fail(BranchFailure::new(self.kind(), FailureReason::Errored, err.to_string()))
            }
            Err(_) => {
                tracing::warn!(session_id = %input.session_id, "Device service timed out");
                BranchOutcome::Fail(BranchFailure::new(
                    self.kind(),
                    FailureReason::TimedOut,
                    format!("no response within {}ms", self.timeout.as_millis()),
                ))
            }
        }
    }
}
