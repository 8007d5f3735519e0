//! Payment resolution: locate and trigger the gateway's submission control,
//! which may live in the top-level document, in a popup window, or nested
//! inside any of an unknown number of embedded frames.
//!
//! Every step is non-fatal on its own; the procedure continues on partial
//! failure and reports an unresolved submission as a warning, not an error.
//! Whatever happens, focus is returned to the home window if it is still
//! open.

use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::FunnelConfig;
use crate::engine::{BrowserEngine, WindowHandle};
use crate::errors::AutomationError;
use crate::flow::PROFILE_CONTROL;
use crate::selector::Selector;
use crate::Browser;

const PLAN_CARD: &str = "//div[contains(@class,'flex flex-col items-center justify-end')]";
const PROCEED_BUTTON: &str = "//button[text()='Proceed']";
const CARD_METHOD: &str = "//div[text()='Credit / Debit / ATM Card']";
const CARD_NUMBER_FIELD: &str = "//input[@placeholder='Enter 16 digit Card Number']";
const CARD_EXPIRY_FIELD: &str = "//input[@placeholder='MM / YY']";
const CARD_CVV_FIELD: &str = "//input[@placeholder='CVV']";
const CARD_NAME_FIELD: &str = "//input[@placeholder='Name on Card']";
const STATE_PICKER: &str = "//span[text()='Choose State']";
const CONTINUE_BUTTON: &str = "//button[text()='Continue']";
const GATEWAY_CURRENCY: &str = "//div[contains(text(),'INR') or contains(@class,'currency')]";
const GATEWAY_SUCCESS: &str =
    "//button[contains(text(),'Success') or contains(text(),'Pass') or @id='success-btn']";

/// The window handle active before an action that may open a new context.
///
/// Captured once, threaded through the resolution procedure explicitly, and
/// restored on every exit path -- but only if the handle is still among the
/// open windows (the gateway may close the original tab).
pub struct HomeContext {
    engine: Arc<dyn BrowserEngine>,
    handle: WindowHandle,
}

impl HomeContext {
    pub async fn capture(engine: Arc<dyn BrowserEngine>) -> Result<Self, AutomationError> {
        let handle = engine.active_window().await?;
        Ok(Self { engine, handle })
    }

    pub fn handle(&self) -> &WindowHandle {
        &self.handle
    }

    /// Best-effort restoration of the home window and top-level document.
    pub async fn restore(&self) {
        match self.engine.window_handles().await {
            Ok(handles) if handles.contains(&self.handle) => {
                if let Err(e) = self.engine.switch_to_window(&self.handle).await {
                    warn!("failed to restore home window: {e}");
                } else if let Err(e) = self.engine.switch_to_default_content().await {
                    warn!("failed to reset to top-level document: {e}");
                }
            }
            Ok(_) => {
                warn!(home = %self.handle, "home window was closed; leaving focus where it is")
            }
            Err(e) => warn!("could not enumerate windows for restoration: {e}"),
        }
    }
}

/// Drives plan selection, card entry and the exhaustive submission search.
pub struct PaymentResolver<'a> {
    config: &'a FunnelConfig,
}

impl<'a> PaymentResolver<'a> {
    pub fn new(config: &'a FunnelConfig) -> Self {
        Self { config }
    }

    /// Returns whether the submission control was found and triggered.
    ///
    /// Only a failure to capture the home context is surfaced as an error;
    /// every other partial failure is logged and absorbed.
    pub async fn resolve(&self, browser: &Browser) -> Result<bool, AutomationError> {
        if let Err(e) = self.open_plans(browser).await {
            warn!("plan navigation failed: {e}");
        }
        if let Err(e) = self.select_plan(browser).await {
            warn!("plan selection failed: {e}");
        }
        if let Err(e) = self.fill_card(browser).await {
            warn!("card entry failed: {e}");
        }

        // The submission below may open the gateway in a new window; the
        // handle active right now is the one to come home to.
        let home = HomeContext::capture(browser.engine().clone()).await?;

        if let Err(e) = self.submit_for_gateway(browser).await {
            warn!("gateway submission failed: {e}");
        }

        let resolved = self.sweep(browser, &home).await;
        home.restore().await;

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("submission search failed: {e}");
                false
            }
        };
        if resolved {
            info!("payment submit action triggered");
        } else {
            warn!("submit control not found in main document or frames");
        }
        Ok(resolved)
    }

    async fn open_plans(&self, browser: &Browser) -> Result<(), AutomationError> {
        browser.locator(PROFILE_CONTROL).click().await
    }

    async fn select_plan(&self, browser: &Browser) -> Result<(), AutomationError> {
        browser
            .locator(Selector::XPath(PLAN_CARD.to_string()).nth(self.config.payment.plan_ordinal))
            .click()
            .await?;
        info!(ordinal = self.config.payment.plan_ordinal, "selected subscription plan");
        browser.locator(PROCEED_BUTTON).click().await
    }

    async fn fill_card(&self, browser: &Browser) -> Result<(), AutomationError> {
        let payment = &self.config.payment;
        browser
            .locator(Selector::XPath(CARD_METHOD.to_string()).nth(1))
            .click()
            .await?;
        browser
            .locator(Selector::XPath(CARD_NUMBER_FIELD.to_string()).nth(1))
            .type_text(&payment.card_number)
            .await?;
        browser
            .locator(Selector::XPath(CARD_EXPIRY_FIELD.to_string()).nth(1))
            .type_text(&payment.card_expiry)
            .await?;
        browser
            .locator(Selector::XPath(CARD_CVV_FIELD.to_string()).nth(1))
            .type_text(&payment.card_cvv)
            .await?;
        browser
            .locator(Selector::XPath(CARD_NAME_FIELD.to_string()).nth(1))
            .type_text(&payment.cardholder)
            .await?;
        info!("entered sandbox card details");
        Ok(())
    }

    async fn submit_for_gateway(&self, browser: &Browser) -> Result<(), AutomationError> {
        browser
            .locator(Selector::XPath(STATE_PICKER.to_string()).nth(1))
            .click()
            .await?;
        browser
            .locator(
                Selector::XPath(format!("//div[text()='{}']", self.config.payment.state)).nth(1),
            )
            .click()
            .await?;
        browser
            .locator(Selector::XPath(CONTINUE_BUTTON.to_string()).nth(1))
            .click()
            .await?;
        info!("submitted billing details; waiting for payment gateway");
        Ok(())
    }

    /// Window discovery plus the exhaustive submission search, in whatever
    /// window focus ends up on.
    async fn sweep(
        &self,
        browser: &Browser,
        home: &HomeContext,
    ) -> Result<bool, AutomationError> {
        let handles = self.discover_windows(browser).await?;
        if handles.len() > 1 {
            for handle in handles.iter().filter(|h| *h != home.handle()) {
                if let Err(e) = self.probe_gateway_window(browser, handle).await {
                    // Absence of gateway controls is a skipped opportunity,
                    // never an error; so is a window that refuses probing.
                    warn!(window = %handle, "gateway probe skipped: {e}");
                }
            }
        } else {
            info!("no popup window detected; staying on original window");
        }
        self.find_and_submit(browser).await
    }

    /// Poll the open window handles until a second one appears or the
    /// budget runs out, and return the final set.
    async fn discover_windows(
        &self,
        browser: &Browser,
    ) -> Result<Vec<WindowHandle>, AutomationError> {
        let deadline = Instant::now() + self.config.timeouts.popup_wait();
        loop {
            let handles = browser.engine().window_handles().await?;
            if handles.len() > 1 || Instant::now() >= deadline {
                return Ok(handles);
            }
            sleep(self.config.timeouts.poll_interval()).await;
        }
    }

    /// Gateway-specific sub-sequence inside one popup window: pick a
    /// currency if offered, then hit the sandbox success control if
    /// rendered. Both best-effort.
    async fn probe_gateway_window(
        &self,
        browser: &Browser,
        handle: &WindowHandle,
    ) -> Result<(), AutomationError> {
        browser
            .engine()
            .switch_to_window(handle)
            .await
            .map_err(|e| AutomationError::GatewayProbe(e.to_string()))?;
        info!(window = %handle, "inspecting gateway popup window");

        let currency = browser
            .locator(GATEWAY_CURRENCY)
            .with_timeout(self.config.timeouts.gateway_wait());
        match currency.click().await {
            Ok(()) => info!("selected gateway currency option"),
            Err(e) if e.is_absence() => debug!("currency control not present; skipping"),
            Err(e) => return Err(AutomationError::GatewayProbe(e.to_string())),
        }

        // The success control renders some time after the currency pick
        // with nothing observable to poll for.
        sleep(self.config.timeouts.gateway_settle()).await;

        let success = browser
            .locator(GATEWAY_SUCCESS)
            .with_timeout(self.config.timeouts.gateway_wait());
        match success.click().await {
            Ok(()) => info!("clicked gateway sandbox success control"),
            Err(e) if e.is_absence() => debug!("sandbox success control not present; skipping"),
            Err(e) => return Err(AutomationError::GatewayProbe(e.to_string())),
        }
        Ok(())
    }

    /// Scripted lookup-and-click of the submission control: first in the
    /// current top-level document, then across all embedded frames in
    /// document order, first match wins.
    async fn find_and_submit(&self, browser: &Browser) -> Result<bool, AutomationError> {
        let script = self.submit_probe_script();

        match browser.execute(&script, vec![]).await {
            Ok(value) if value.as_bool() == Some(true) => {
                info!("clicked submit control in the top-level document");
                return Ok(true);
            }
            Ok(_) => {}
            Err(e) => debug!("top-level submit probe failed: {e}"),
        }

        browser.engine().switch_to_default_content().await?;
        let frames = browser.engine().frame_count().await?;
        info!(frames, "searching embedded frames for the submit control");

        for index in 0..frames {
            if let Err(e) = browser.engine().switch_to_default_content().await {
                debug!(frame = index, "could not reset to top-level document: {e}");
                continue;
            }
            if let Err(e) = browser.engine().switch_to_frame(index).await {
                // Cross-context restrictions and vanished frames are
                // expected; move on to the next candidate.
                debug!(frame = index, "frame probe skipped: {e}");
                continue;
            }
            match browser.execute(&script, vec![]).await {
                Ok(value) if value.as_bool() == Some(true) => {
                    info!(frame = index, "clicked submit control inside frame");
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) => debug!(frame = index, "submit probe failed: {e}"),
            }
        }
        Ok(false)
    }

    fn submit_probe_script(&self) -> String {
        format!(
            "var btn = document.getElementById('{}'); \
             if (btn) {{ btn.click(); return true; }} return false;",
            self.config.payment.submit_control_id
        )
    }
}
