//! Tunables for a funnel run.
//!
//! Every wait budget and settle delay lives here so that no timing constant
//! hides in the flow logic. Defaults target the staging deployment the
//! checker was written for; a JSON config file can override any subset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    /// Staging deployment under test.
    pub base_url: String,
    /// How many synthetic accounts to push through the funnel.
    pub iterations: u32,
    /// Language option picked during onboarding, when offered.
    pub language: String,
    /// Password used for every synthetic account.
    pub password: String,
    pub email: EmailSpec,
    pub demographics: DemographicsConfig,
    pub payment: PaymentConfig,
    pub timeouts: Timeouts,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://preprodpwa.sunnxt.in/".to_string(),
            iterations: 1,
            language: "Tamil".to_string(),
            password: "A1234567".to_string(),
            email: EmailSpec::default(),
            demographics: DemographicsConfig::default(),
            payment: PaymentConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Shape of generated account emails: fixed prefix, bounded random serial,
/// fixed domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSpec {
    pub prefix: String,
    pub domain: String,
    /// Upper bound (inclusive) of the random serial. Uniqueness across a
    /// run is probabilistic, not guaranteed.
    pub max_serial: u32,
}

impl Default for EmailSpec {
    fn default() -> Self {
        Self {
            prefix: "zenit".to_string(),
            domain: "@hotmail.com".to_string(),
            max_serial: 9999,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicsConfig {
    pub gender: String,
    pub age_bracket: String,
}

impl Default for DemographicsConfig {
    fn default() -> Self {
        Self {
            gender: "Male".to_string(),
            age_bracket: "18 - 24 Years".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Which plan card to pick, 1-based. The funnel renders several
    /// structurally identical cards; the second one is the intended target.
    /// If the page reorders the cards, the wrong plan is selected silently.
    pub plan_ordinal: usize,
    /// Sandbox card accepted by the gateway's test mode.
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvv: String,
    pub cardholder: String,
    /// Billing state picked from the region list.
    pub state: String,
    /// DOM id of the gateway's submission control, searched for across the
    /// main document and all embedded frames.
    pub submit_control_id: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            plan_ordinal: 2,
            card_number: "5555555555554444".to_string(),
            card_expiry: "0526".to_string(),
            card_cvv: "111".to_string(),
            cardholder: "Test User".to_string(),
            state: "Andaman and Nicobar Islands".to_string(),
            submit_control_id: "submit-action".to_string(),
        }
    }
}

/// All timing knobs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Budget for waiting on a single element to become actionable.
    pub element_wait_ms: u64,
    /// Interval between readiness polls.
    pub poll_interval_ms: u64,
    /// Budget for probing an optional stage's entry condition.
    pub probe_wait_ms: u64,
    /// Budget for the login affordance to appear after the reveal gesture.
    pub reveal_wait_ms: u64,
    /// Budget for a gateway popup window to appear after plan submission.
    /// Discovery polls the open window handles instead of sleeping blind.
    pub popup_wait_ms: u64,
    /// Budget for gateway-specific controls inside a popup.
    pub gateway_wait_ms: u64,
    /// Settle delay between the gateway's currency pick and its sandbox
    /// success control rendering; no observable signal exists there.
    pub gateway_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_wait_ms: 45_000,
            poll_interval_ms: 250,
            probe_wait_ms: 10_000,
            reveal_wait_ms: 5_000,
            popup_wait_ms: 5_000,
            gateway_wait_ms: 10_000,
            gateway_settle_ms: 1_000,
        }
    }
}

impl Timeouts {
    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    pub fn reveal_wait(&self) -> Duration {
        Duration::from_millis(self.reveal_wait_ms)
    }

    pub fn popup_wait(&self) -> Duration {
        Duration::from_millis(self.popup_wait_ms)
    }

    pub fn gateway_wait(&self) -> Duration {
        Duration::from_millis(self.gateway_wait_ms)
    }

    pub fn gateway_settle(&self) -> Duration {
        Duration::from_millis(self.gateway_settle_ms)
    }
}
