//! The browser capability interface.
//!
//! Everything above this module drives the browser exclusively through
//! [`BrowserEngine`], so the whole funnel logic can run against a real
//! WebDriver session or an in-memory stub interchangeably.

pub mod webdriver;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// Opaque reference to a located element, valid only for the engine that
/// produced it and only while the element stays attached to its document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// Identifier of a top-level browser window or tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A browser session as consumed by the funnel checker.
///
/// The trait mirrors the WebDriver surface the flow actually needs: element
/// discovery, the two interaction strategies (native click and script
/// injection), and window/frame context switching. All calls are strictly
/// sequential within one session; an engine is never shared across
/// iterations.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), AutomationError>;

    /// `document.readyState` of the active document.
    async fn ready_state(&self) -> Result<String, AutomationError>;

    /// Find the first element matching `selector` in the active context.
    /// A miss is `AutomationError::ElementNotFound`, never a driver error.
    async fn find_element(&self, selector: &Selector) -> Result<ElementHandle, AutomationError>;

    /// All elements matching `selector` in the active context, in document
    /// order. A miss is an empty list, never an error.
    async fn find_elements(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, AutomationError>;

    /// Visible and enabled, such that a native click is expected to land.
    async fn is_interactable(&self, element: &ElementHandle) -> Result<bool, AutomationError>;

    /// Native (pointer-simulated) click.
    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    async fn hover(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    async fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    async fn type_text(&self, element: &ElementHandle, text: &str)
        -> Result<(), AutomationError>;

    /// Execute a script in the active context and return its value.
    async fn execute_script(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, AutomationError>;

    /// Execute a script with `element` bound to `arguments[0]`.
    async fn execute_script_on(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<Value, AutomationError>;

    async fn window_handles(&self) -> Result<Vec<WindowHandle>, AutomationError>;

    async fn active_window(&self) -> Result<WindowHandle, AutomationError>;

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), AutomationError>;

    /// Number of embedded frames in the active document, counted as
    /// `iframe` elements in document order.
    async fn frame_count(&self) -> Result<usize, AutomationError> {
        let frames = self
            .find_elements(&Selector::Css("iframe".to_string()))
            .await?;
        Ok(frames.len())
    }

    async fn switch_to_frame(&self, index: usize) -> Result<(), AutomationError>;

    async fn switch_to_default_content(&self) -> Result<(), AutomationError>;

    /// Release the underlying session. Called exactly once per iteration,
    /// on every exit path.
    async fn shutdown(&self) -> Result<(), AutomationError>;
}

/// Hands out one exclusive browser session per funnel iteration.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn BrowserEngine>, AutomationError>;
}
