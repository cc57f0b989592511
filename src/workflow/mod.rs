pub mod browser_steps;
pub mod context;
pub mod dispatcher;
pub mod executor;
#[cfg(test)]
pub(crate) mod fake_page;
pub mod oauth2_steps;
pub mod progress;

pub use browser_steps::BrowserSteps;
pub use context::{RunContext, RunState};
pub use dispatcher::{dispatch, BatchPosition};
pub use executor::{ExecutionProfile, StepExecutor};
pub use oauth2_steps::{LoginPacing, OAuth2Steps};
pub use progress::{ChannelProgress, ProgressEvent, ProgressSink, TracingProgress};
