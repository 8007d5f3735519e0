use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

use crate::element::Element;
use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::selector::Selector;

// Defaults if none are specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A high-level API for finding and interacting with elements under
/// uncertain timing.
///
/// The click operation is the interaction primitive everything else builds
/// on: wait until the element is actionable, click natively, and fall back
/// to a single script-injected click if the native path is blocked.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn BrowserEngine>,
    selector: Selector,
    timeout: Duration,
    poll: Duration,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn BrowserEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the timeout budget for waiting operations on this locator.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval for waiting operations on this locator.
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Wait for a matching element to be present, up to the timeout budget.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn wait(&self) -> Result<Element, AutomationError> {
        self.wait_where(false).await
    }

    /// Wait for a matching element to be present AND interactable.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn wait_interactable(&self) -> Result<Element, AutomationError> {
        self.wait_where(true).await
    }

    async fn wait_where(&self, interactable: bool) -> Result<Element, AutomationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.engine.find_element(&self.selector).await {
                Ok(handle) => {
                    let element = Element::new(self.engine.clone(), handle);
                    if !interactable {
                        return Ok(element);
                    }
                    match element.is_interactable().await {
                        Ok(true) => return Ok(element),
                        Ok(false) => {}
                        // The element detached between lookup and the check;
                        // one more miss, re-locate on the next poll.
                        Err(e) if e.is_absence() => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(AutomationError::ElementNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "timed out after {:?} waiting for element {}",
                    self.timeout, self.selector
                )));
            }
            sleep(self.poll).await;
        }
    }

    /// Wait until the element is actionable, then click it.
    ///
    /// If the native click raises (detached, intercepted by an overlay, not
    /// interactable by the time it lands), a single script-injected click on
    /// the same element reference is issued instead. The fallback is
    /// accepted unconditionally and never re-verified; anything beyond this
    /// point is best-effort by design.
    pub async fn click(&self) -> Result<(), AutomationError> {
        let element = self.wait_interactable().await?;
        match element.click_native().await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(selector = %self.selector, "native click failed ({e}); falling back to scripted click");
                element.click_scripted().await
            }
        }
    }

    /// Wait for the element, clear it and type `text` into it.
    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let element = self.wait().await?;
        element.clear().await?;
        element.type_text(text).await
    }

    /// Wait until no matching element is present anymore (e.g. a dialog
    /// that was just confirmed).
    pub async fn wait_gone(&self) -> Result<(), AutomationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.engine.find_element(&self.selector).await {
                Err(AutomationError::ElementNotFound(_)) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "element {} still present after {:?}",
                    self.selector, self.timeout
                )));
            }
            sleep(self.poll).await;
        }
    }

    /// Bounded presence probe for optional-stage entry conditions.
    ///
    /// Absence within the budget is an answer (`false`), not an error;
    /// only genuine infrastructure failures propagate.
    pub async fn probe(&self) -> Result<bool, AutomationError> {
        match self.wait().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_absence() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
