//! WebDriver-backed engine using fantoccini.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fantoccini::elements::Element as WdElement;
use fantoccini::error::CmdError;
use fantoccini::wd::WindowHandle as WdWindowHandle;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BrowserEngine, ElementHandle, SessionProvider, WindowHandle};
use crate::errors::AutomationError;
use crate::selector::Selector;

/// Scripted hover: the WebDriver protocol has no hover endpoint, so the
/// reveal gesture is dispatched as synthetic pointer events.
const HOVER_SCRIPT: &str = "const el = arguments[0]; \
     for (const type of ['pointerover', 'mouseover', 'mouseenter']) { \
       el.dispatchEvent(new MouseEvent(type, { bubbles: true })); \
     }";

enum CompiledKind {
    Css,
    XPath,
    Id,
}

/// A selector lowered to a single WebDriver strategy plus an optional
/// ordinal pick.
struct Compiled {
    kind: CompiledKind,
    expression: String,
    nth: Option<usize>,
}

impl Compiled {
    fn as_locator(&self) -> WdLocator<'_> {
        match self.kind {
            CompiledKind::Css => WdLocator::Css(&self.expression),
            CompiledKind::XPath => WdLocator::XPath(&self.expression),
            CompiledKind::Id => WdLocator::Id(&self.expression),
        }
    }
}

fn compile(selector: &Selector) -> Result<Compiled, AutomationError> {
    match selector {
        Selector::Css(s) => Ok(Compiled {
            kind: CompiledKind::Css,
            expression: s.clone(),
            nth: None,
        }),
        Selector::XPath(s) => Ok(Compiled {
            kind: CompiledKind::XPath,
            expression: s.clone(),
            nth: None,
        }),
        Selector::Id(s) => Ok(Compiled {
            kind: CompiledKind::Id,
            expression: s.clone(),
            nth: None,
        }),
        Selector::Name(s) => Ok(Compiled {
            kind: CompiledKind::Css,
            expression: format!("[name=\"{s}\"]"),
            nth: None,
        }),
        Selector::Text(s) => Ok(Compiled {
            kind: CompiledKind::XPath,
            expression: format!("//*[normalize-space(text())='{s}']"),
            nth: None,
        }),
        Selector::Nth { inner, index } => {
            if *index == 0 {
                return Err(AutomationError::InvalidSelector(format!(
                    "ordinal selectors are 1-based: {selector}"
                )));
            }
            let compiled = compile(inner)?;
            if compiled.nth.is_some() {
                return Err(AutomationError::InvalidSelector(format!(
                    "nested ordinal selector: {selector}"
                )));
            }
            Ok(Compiled {
                nth: Some(*index),
                ..compiled
            })
        }
        Selector::Invalid(reason) => Err(AutomationError::InvalidSelector(reason.clone())),
    }
}

fn driver_err(e: CmdError) -> AutomationError {
    AutomationError::Driver(e.to_string())
}

/// A stale reference means the element detached after lookup; callers treat
/// that as absence and re-locate instead of failing the session.
fn staleness_err(e: CmdError) -> AutomationError {
    let msg = e.to_string();
    if msg.contains("stale element reference") {
        AutomationError::ElementNotFound(msg)
    } else {
        AutomationError::Driver(msg)
    }
}

/// [`BrowserEngine`] backed by a live WebDriver session.
pub struct WebDriverEngine {
    client: Client,
    // Live element references keyed by the opaque ids we hand out.
    elements: Mutex<HashMap<u64, WdElement>>,
    next_id: AtomicU64,
}

impl WebDriverEngine {
    /// Connect to a running WebDriver endpoint (e.g. chromedriver).
    pub async fn connect(
        webdriver_url: &str,
        capabilities: serde_json::Map<String, Value>,
    ) -> Result<Self, AutomationError> {
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(webdriver_url)
            .await
            .map_err(|e| {
                AutomationError::Driver(format!("failed to connect to {webdriver_url}: {e}"))
            })?;
        Ok(Self::from_client(client))
    }

    /// Wrap an already-established session.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            elements: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    async fn register(&self, element: WdElement) -> ElementHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.elements.lock().await.insert(id, element);
        ElementHandle(id)
    }

    async fn resolve(&self, handle: &ElementHandle) -> Result<WdElement, AutomationError> {
        self.elements
            .lock()
            .await
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!("stale element handle {}", handle.0))
            })
    }
}

#[async_trait]
impl BrowserEngine for WebDriverEngine {
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.client.goto(url).await.map_err(driver_err)
    }

    async fn ready_state(&self) -> Result<String, AutomationError> {
        let value = self
            .client
            .execute("return document.readyState;", vec![])
            .await
            .map_err(driver_err)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_element(&self, selector: &Selector) -> Result<ElementHandle, AutomationError> {
        let compiled = compile(selector)?;
        match compiled.nth {
            None => match self.client.find(compiled.as_locator()).await {
                Ok(element) => Ok(self.register(element).await),
                Err(e) if e.is_no_such_element() => {
                    Err(AutomationError::ElementNotFound(selector.to_string()))
                }
                Err(e) => Err(driver_err(e)),
            },
            Some(index) => {
                let matches = self
                    .client
                    .find_all(compiled.as_locator())
                    .await
                    .map_err(driver_err)?;
                let total = matches.len();
                match matches.into_iter().nth(index - 1) {
                    Some(element) => Ok(self.register(element).await),
                    None => Err(AutomationError::ElementNotFound(format!(
                        "{selector} (only {total} matches)"
                    ))),
                }
            }
        }
    }

    async fn find_elements(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        let compiled = compile(selector)?;
        let matches = self
            .client
            .find_all(compiled.as_locator())
            .await
            .map_err(driver_err)?;
        let mut handles = Vec::with_capacity(matches.len());
        for element in matches {
            handles.push(self.register(element).await);
        }
        Ok(handles)
    }

    async fn is_interactable(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        let element = self.resolve(element).await?;
        let displayed = element.is_displayed().await.map_err(staleness_err)?;
        if !displayed {
            return Ok(false);
        }
        let enabled = element.is_enabled().await.map_err(staleness_err)?;
        Ok(enabled)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let element = self.resolve(element).await?;
        element
            .click()
            .await
            .map_err(|e| AutomationError::Driver(format!("native click failed: {e}")))
    }

    async fn hover(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.execute_script_on(HOVER_SCRIPT, element).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let element = self.resolve(element).await?;
        element.clear().await.map_err(driver_err)
    }

    async fn type_text(
        &self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), AutomationError> {
        let element = self.resolve(element).await?;
        element.send_keys(text).await.map_err(driver_err)
    }

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, AutomationError> {
        self.client.execute(script, args).await.map_err(driver_err)
    }

    async fn execute_script_on(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<Value, AutomationError> {
        let element = self.resolve(element).await?;
        let arg = serde_json::to_value(&element)
            .map_err(|e| AutomationError::Driver(format!("element not serializable: {e}")))?;
        self.client
            .execute(script, vec![arg])
            .await
            .map_err(driver_err)
    }

    async fn window_handles(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        let handles = self.client.windows().await.map_err(driver_err)?;
        Ok(handles
            .into_iter()
            .map(|h| WindowHandle(String::from(h)))
            .collect())
    }

    async fn active_window(&self) -> Result<WindowHandle, AutomationError> {
        let handle = self.client.window().await.map_err(driver_err)?;
        Ok(WindowHandle(String::from(handle)))
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), AutomationError> {
        let wd_handle = WdWindowHandle::try_from(handle.0.clone())
            .map_err(|e| AutomationError::Driver(format!("invalid window handle: {e}")))?;
        self.client
            .switch_to_window(wd_handle)
            .await
            .map_err(driver_err)
    }

    async fn switch_to_frame(&self, index: usize) -> Result<(), AutomationError> {
        let index = u16::try_from(index).map_err(|_| {
            AutomationError::InvalidSelector(format!("frame index out of range: {index}"))
        })?;
        self.client
            .clone()
            .enter_frame(Some(index))
            .await
            .map(|_| ())
            .map_err(driver_err)
    }

    async fn switch_to_default_content(&self) -> Result<(), AutomationError> {
        self.client
            .clone()
            .enter_frame(None)
            .await
            .map(|_| ())
            .map_err(driver_err)
    }

    async fn shutdown(&self) -> Result<(), AutomationError> {
        debug!("closing WebDriver session");
        self.client.clone().close().await.map_err(driver_err)
    }
}

/// Connects a fresh WebDriver session for every iteration.
pub struct WebDriverProvider {
    webdriver_url: String,
    capabilities: serde_json::Map<String, Value>,
}

impl WebDriverProvider {
    pub fn new(webdriver_url: String, capabilities: serde_json::Map<String, Value>) -> Self {
        Self {
            webdriver_url,
            capabilities,
        }
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    async fn acquire(&self) -> Result<Arc<dyn BrowserEngine>, AutomationError> {
        let engine =
            WebDriverEngine::connect(&self.webdriver_url, self.capabilities.clone()).await?;
        Ok(Arc::new(engine))
    }
}
