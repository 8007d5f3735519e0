//! The flow orchestrator: a fixed sequence of named stages executed once
//! per synthetic account.
//!
//! Skip-vs-abort semantics are an explicit, per-stage contract: required
//! stages propagate failure and abort the iteration, optional stages treat
//! an absent entry condition as "already satisfied", and best-effort stages
//! record failures without ever failing the run.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{EmailSpec, FunnelConfig};
use crate::engine::{BrowserEngine, SessionProvider};
use crate::errors::AutomationError;
use crate::payment::PaymentResolver;
use crate::selector::Selector;
use crate::Browser;

/// Profile affordance that reveals the login entry (and, later, the plans
/// page). The class-based locator matches repeated structures; the first
/// match is the header control.
pub(crate) const PROFILE_CONTROL: &str = "//div[contains(@class,'relative group inline-block')]";
const LOGIN_AFFORDANCE: &str = "//span[text()='Log In']";
const DEMOGRAPHICS_HEADING: &str = "//h3[text()='Almost done!']";
const DEMOGRAPHICS_DROPDOWN: &str = "//div[contains(@class,'newsignin_dropdown_input')]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    LanguageSelection,
    LoginInitiation,
    AccountRegistration,
    Demographics,
    SubscriptionPayment,
}

impl Stage {
    pub const SEQUENCE: [Stage; 5] = [
        Stage::LanguageSelection,
        Stage::LoginInitiation,
        Stage::AccountRegistration,
        Stage::Demographics,
        Stage::SubscriptionPayment,
    ];

    pub fn policy(&self) -> StagePolicy {
        match self {
            Stage::LanguageSelection => StagePolicy::Optional,
            Stage::LoginInitiation => StagePolicy::Required,
            Stage::AccountRegistration => StagePolicy::Required,
            Stage::Demographics => StagePolicy::Optional,
            Stage::SubscriptionPayment => StagePolicy::BestEffort,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::LanguageSelection => "language selection",
            Stage::LoginInitiation => "login initiation",
            Stage::AccountRegistration => "account registration",
            Stage::Demographics => "demographics",
            Stage::SubscriptionPayment => "subscription payment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StagePolicy {
    /// Failure aborts the iteration.
    Required,
    /// An absent entry condition means "already satisfied"; errors are
    /// recorded and the run continues.
    Optional,
    /// Failures are recorded but never abort the iteration.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    Performed,
    SkippedConditionAbsent,
    SkippedOnError,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IterationOutcome {
    /// The funnel was driven to the end; payment submission may or may not
    /// have been confirmed.
    Completed,
    /// A required stage failed.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub iteration: u32,
    pub email: String,
    pub outcome: IterationOutcome,
    pub stages: Vec<StageReport>,
    pub error: Option<String>,
}

/// Ephemeral per-run values: the iteration number and a freshly generated
/// account email. Never reused across iterations.
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub iteration: u32,
    pub email: String,
}

impl IterationContext {
    pub fn new(iteration: u32, spec: &EmailSpec) -> Self {
        Self {
            iteration,
            email: generate_email(spec),
        }
    }
}

/// Fixed prefix + bounded random serial + fixed domain.
///
/// Uniqueness is probabilistic only: two calls in one run are extremely
/// unlikely but not guaranteed to differ. A collision surfaces downstream
/// as a registration failure, which is the correct signal anyway.
pub fn generate_email(spec: &EmailSpec) -> String {
    let serial = rand::thread_rng().gen_range(1..=spec.max_serial.max(1));
    format!("{}{}{}", spec.prefix, serial, spec.domain)
}

/// Drives the stage sequence, one exclusive browser session per iteration.
pub struct FunnelRunner {
    config: FunnelConfig,
}

impl FunnelRunner {
    pub fn new(config: FunnelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Run the configured number of iterations, acquiring a fresh session
    /// for each and releasing it on every exit path.
    pub async fn run_all(
        &self,
        provider: &dyn SessionProvider,
    ) -> Result<Vec<IterationReport>, AutomationError> {
        let mut reports = Vec::with_capacity(self.config.iterations as usize);
        for iteration in 1..=self.config.iterations {
            let ctx = IterationContext::new(iteration, &self.config.email);
            info!("========== starting iteration {iteration} ==========");
            let engine = provider.acquire().await?;
            let report = self.run_iteration(engine.clone(), &ctx).await;
            if let Err(e) = engine.shutdown().await {
                warn!("failed to release browser session: {e}");
            }
            match report.outcome {
                IterationOutcome::Completed => {
                    info!("========== iteration {iteration} completed ==========")
                }
                IterationOutcome::Aborted => error!(
                    "========== iteration {iteration} aborted: {} ==========",
                    report.error.as_deref().unwrap_or("unknown error")
                ),
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run a single iteration against an already-acquired session. The
    /// session is not released here; the caller owns its lifecycle.
    pub async fn run_iteration(
        &self,
        engine: Arc<dyn BrowserEngine>,
        ctx: &IterationContext,
    ) -> IterationReport {
        let browser = Browser::with_waits(
            engine,
            self.config.timeouts.element_wait(),
            self.config.timeouts.poll_interval(),
        );
        let mut stages = Vec::new();
        match self.drive(&browser, ctx, &mut stages).await {
            Ok(()) => IterationReport {
                iteration: ctx.iteration,
                email: ctx.email.clone(),
                outcome: IterationOutcome::Completed,
                stages,
                error: None,
            },
            Err(e) => IterationReport {
                iteration: ctx.iteration,
                email: ctx.email.clone(),
                outcome: IterationOutcome::Aborted,
                stages,
                error: Some(e.to_string()),
            },
        }
    }

    async fn drive(
        &self,
        browser: &Browser,
        ctx: &IterationContext,
        stages: &mut Vec<StageReport>,
    ) -> Result<(), AutomationError> {
        info!(url = %self.config.base_url, "navigating to site");
        browser.open(&self.config.base_url).await?;

        for stage in Stage::SEQUENCE {
            info!("[{}]", stage.label());
            let result = match stage {
                Stage::LanguageSelection => self.select_language(browser).await,
                Stage::LoginInitiation => self.initiate_login(browser).await,
                Stage::AccountRegistration => self.register_account(browser, ctx).await,
                Stage::Demographics => self.fill_demographics(browser).await,
                Stage::SubscriptionPayment => {
                    let resolver = PaymentResolver::new(&self.config);
                    resolver
                        .resolve(browser)
                        .await
                        .map(|_| StageOutcome::Performed)
                }
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => match stage.policy() {
                    StagePolicy::Required => {
                        error!("required stage '{}' failed: {e}", stage.label());
                        return Err(e);
                    }
                    StagePolicy::Optional | StagePolicy::BestEffort => {
                        warn!("stage '{}' skipped on error: {e}", stage.label());
                        StageOutcome::SkippedOnError
                    }
                },
            };
            stages.push(StageReport { stage, outcome });
        }
        Ok(())
    }

    async fn select_language(&self, browser: &Browser) -> Result<StageOutcome, AutomationError> {
        let option = browser
            .locator(Selector::XPath(format!(
                "//div[text()='{}']",
                self.config.language
            )))
            .with_timeout(self.config.timeouts.probe_wait());
        if !option.probe().await? {
            info!(
                language = %self.config.language,
                "language selection skipped (not offered or already set)"
            );
            return Ok(StageOutcome::SkippedConditionAbsent);
        }
        option.click().await?;
        let done = browser.locator("//button[text()='Done']");
        done.click().await?;
        done.wait_gone().await?;
        info!(language = %self.config.language, "language selected and confirmed");
        Ok(StageOutcome::Performed)
    }

    async fn initiate_login(&self, browser: &Browser) -> Result<StageOutcome, AutomationError> {
        let profile = browser.locator(PROFILE_CONTROL).wait_interactable().await?;
        profile.hover().await?;

        let login = browser
            .locator(LOGIN_AFFORDANCE)
            .with_timeout(self.config.timeouts.reveal_wait());
        match login.wait_interactable().await {
            Ok(_) => {}
            Err(e) if e.is_absence() => {
                // Hover did not reveal the menu; click the profile control
                // once and wait exactly one more time.
                debug!("login affordance hidden after hover ({e}); clicking the profile control");
                browser.locator(PROFILE_CONTROL).click().await?;
                login.wait_interactable().await?;
            }
            Err(e) => return Err(e),
        }
        login.click().await?;
        info!("clicked Log In");
        Ok(StageOutcome::Performed)
    }

    async fn register_account(
        &self,
        browser: &Browser,
        ctx: &IterationContext,
    ) -> Result<StageOutcome, AutomationError> {
        info!(email = %ctx.email, "entering account details");
        self.try_register(browser, ctx)
            .await
            .map_err(|e| AutomationError::AccountCreation(e.to_string()))?;
        info!("password set and account created");
        Ok(StageOutcome::Performed)
    }

    async fn try_register(
        &self,
        browser: &Browser,
        ctx: &IterationContext,
    ) -> Result<(), AutomationError> {
        browser
            .locator(Selector::Name("email".to_string()))
            .type_text(&ctx.email)
            .await?;
        browser.locator("//button[text()='Continue']").click().await?;

        browser
            .locator(Selector::Name("newPassword".to_string()))
            .type_text(&self.config.password)
            .await?;
        browser
            .locator(Selector::Name("confirmPassword".to_string()))
            .type_text(&self.config.password)
            .await?;
        browser
            .locator("//button[text()='Create Account']")
            .click()
            .await
    }

    async fn fill_demographics(&self, browser: &Browser) -> Result<StageOutcome, AutomationError> {
        let heading = browser
            .locator(DEMOGRAPHICS_HEADING)
            .with_timeout(self.config.timeouts.probe_wait());
        if !heading.probe().await? {
            info!("demographics skipped (prompt not shown)");
            return Ok(StageOutcome::SkippedConditionAbsent);
        }

        browser
            .locator(Selector::XPath(DEMOGRAPHICS_DROPDOWN.to_string()).nth(1))
            .click()
            .await?;
        browser
            .locator(Selector::XPath(format!(
                "//div[text()='{}']",
                self.config.demographics.gender
            )))
            .click()
            .await?;

        browser
            .locator(Selector::XPath(DEMOGRAPHICS_DROPDOWN.to_string()).nth(2))
            .click()
            .await?;
        browser
            .locator(Selector::XPath(format!(
                "//div[text()='{}']",
                self.config.demographics.age_bracket
            )))
            .click()
            .await?;

        browser.locator("//button[text()='Save']").click().await?;
        info!("demographics saved");
        Ok(StageOutcome::Performed)
    }
}
