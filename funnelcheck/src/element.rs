use std::sync::Arc;

use serde_json::Value;

use crate::engine::{BrowserEngine, ElementHandle};
use crate::errors::AutomationError;

/// Scripted click on the element reference itself, used as the fallback
/// interaction strategy when the native path is blocked.
const SCRIPTED_CLICK: &str = "arguments[0].click();";

/// A located element in the active document, bound to the engine that found
/// it.
pub struct Element {
    engine: Arc<dyn BrowserEngine>,
    handle: ElementHandle,
}

impl Element {
    pub(crate) fn new(engine: Arc<dyn BrowserEngine>, handle: ElementHandle) -> Self {
        Self { engine, handle }
    }

    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    /// Pointer-simulated click.
    pub async fn click_native(&self) -> Result<(), AutomationError> {
        self.engine.click(&self.handle).await
    }

    /// Script-injected click directly on the element reference.
    pub async fn click_scripted(&self) -> Result<(), AutomationError> {
        self.engine
            .execute_script_on(SCRIPTED_CLICK, &self.handle)
            .await?;
        Ok(())
    }

    pub async fn hover(&self) -> Result<(), AutomationError> {
        self.engine.hover(&self.handle).await
    }

    pub async fn clear(&self) -> Result<(), AutomationError> {
        self.engine.clear(&self.handle).await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.engine.type_text(&self.handle, text).await
    }

    pub async fn is_interactable(&self) -> Result<bool, AutomationError> {
        self.engine.is_interactable(&self.handle).await
    }

    pub async fn execute_script(&self, script: &str) -> Result<Value, AutomationError> {
        self.engine.execute_script_on(script, &self.handle).await
    }
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            handle: self.handle.clone(),
        }
    }
}
