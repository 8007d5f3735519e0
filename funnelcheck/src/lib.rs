//! End-to-end functional checking of a web signup-to-subscription funnel
//!
//! This crate automates language selection, account creation, demographic
//! capture, plan selection and payment submission against a staging
//! deployment, across many synthetic accounts. The interaction layer is
//! built to survive uncertain timing: bounded polling for actionability,
//! native clicks with a script-injected fallback, and an exhaustive
//! window/frame search for the payment gateway's submission control.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::instrument;

pub mod config;
pub mod element;
pub mod engine;
pub mod errors;
pub mod flow;
pub mod locator;
pub mod payment;
pub mod selector;

pub use config::FunnelConfig;
pub use element::Element;
pub use engine::{BrowserEngine, ElementHandle, SessionProvider, WindowHandle};
pub use errors::AutomationError;
pub use flow::{
    FunnelRunner, IterationContext, IterationOutcome, IterationReport, Stage, StageOutcome,
    StagePolicy, StageReport,
};
pub use locator::Locator;
pub use selector::Selector;

/// The main entry point for driving one browser session.
///
/// Wraps the engine with the run's default wait budgets and hands out
/// [`Locator`]s configured accordingly.
pub struct Browser {
    engine: Arc<dyn BrowserEngine>,
    wait: Duration,
    poll: Duration,
}

impl Browser {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self::with_waits(engine, Duration::from_secs(45), Duration::from_millis(250))
    }

    pub fn with_waits(engine: Arc<dyn BrowserEngine>, wait: Duration, poll: Duration) -> Self {
        Self { engine, wait, poll }
    }

    pub fn engine(&self) -> &Arc<dyn BrowserEngine> {
        &self.engine
    }

    #[instrument(skip(self, selector))]
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
            .with_timeout(self.wait)
            .with_poll(self.poll)
    }

    /// Navigate to `url` and wait for the document to be fully loaded.
    ///
    /// Failure to reach `readyState == "complete"` within the wait budget is
    /// a [`AutomationError::Navigation`] error; no recovery is defined.
    #[instrument(skip(self))]
    pub async fn open(&self, url: &str) -> Result<(), AutomationError> {
        self.engine
            .goto(url)
            .await
            .map_err(|e| AutomationError::Navigation(format!("failed to open {url}: {e}")))?;

        let deadline = Instant::now() + self.wait;
        loop {
            let state = self.engine.ready_state().await?;
            if state == "complete" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Navigation(format!(
                    "{url} never reached readyState=complete (last state: {state:?})"
                )));
            }
            sleep(self.poll).await;
        }
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AutomationError> {
        self.engine.execute_script(script, args).await
    }
}

impl Clone for Browser {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            wait: self.wait,
            poll: self.poll,
        }
    }
}
