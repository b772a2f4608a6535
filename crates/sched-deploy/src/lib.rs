pub mod error;
pub mod manager;
pub mod plan;
pub mod worker;

pub use error::DeployError;
pub use manager::{DeploymentManager, DeploymentProgress, DEFAULT_CANCELLATION_TIMEOUT};
pub use plan::{DeploymentPlan, DeploymentStep, StepAction};
pub use worker::DeploymentWorker;
