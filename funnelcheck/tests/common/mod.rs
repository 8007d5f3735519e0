//! Shared in-memory stub of the browser capability interface.
//!
//! The mock records every call so tests can assert which interaction path
//! fired, how many frames were visited and where focus ended up.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::Value;

use funnelcheck::config::{FunnelConfig, Timeouts};
use funnelcheck::{
    AutomationError, BrowserEngine, ElementHandle, Selector, SessionProvider, WindowHandle,
};

static TRACING: Once = Once::new();

/// Route test logs through the usual subscriber; `RUST_LOG` controls
/// verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Goto(String),
    Find(String),
    NativeClick(String),
    ScriptedClick(String),
    Hover(String),
    TypeText(String, String),
    Script(String),
    WindowHandles,
    SwitchWindow(String),
    SwitchFrame(usize),
    DefaultContent,
    Shutdown,
}

/// One stubbed element, matched when its needle occurs in the display form
/// of the selector being looked up.
#[derive(Clone)]
pub struct MockElementSpec {
    pub needle: String,
    pub present: bool,
    pub interactable: bool,
    pub fail_native_click: bool,
    pub vanish_on_click: bool,
    /// Interactability checks that fail with a detached-element error
    /// before the element behaves normally again.
    pub stale_for_checks: u32,
    /// Needle of another element whose click makes this one appear.
    pub revealed_by: Option<String>,
}

impl MockElementSpec {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
            present: true,
            interactable: true,
            fail_native_click: false,
            vanish_on_click: false,
            stale_for_checks: 0,
            revealed_by: None,
        }
    }

    pub fn not_interactable(mut self) -> Self {
        self.interactable = false;
        self
    }

    pub fn failing_native_click(mut self) -> Self {
        self.fail_native_click = true;
        self
    }

    pub fn vanishing_on_click(mut self) -> Self {
        self.vanish_on_click = true;
        self
    }

    pub fn stale_for_checks(mut self, checks: u32) -> Self {
        self.stale_for_checks = checks;
        self
    }

    /// Start hidden; appear once the element with `needle` is clicked.
    pub fn revealed_by(mut self, needle: &str) -> Self {
        self.revealed_by = Some(needle.to_string());
        self.present = false;
        self
    }
}

pub struct MockWindow {
    pub handle: String,
    pub elements: Vec<MockElementSpec>,
    pub frames: usize,
    pub frames_erroring: Vec<usize>,
    pub submit_in_frame: Option<usize>,
    pub submit_in_top: bool,
}

impl MockWindow {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            elements: Vec::new(),
            frames: 0,
            frames_erroring: Vec::new(),
            submit_in_frame: None,
            submit_in_top: false,
        }
    }

    pub fn with_element(mut self, spec: MockElementSpec) -> Self {
        self.elements.push(spec);
        self
    }

    pub fn without_needle(mut self, needle: &str) -> Self {
        self.elements.retain(|e| e.needle != needle);
        self
    }

    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_erroring_frame(mut self, index: usize) -> Self {
        self.frames_erroring.push(index);
        self
    }

    pub fn with_submit_in_frame(mut self, index: usize) -> Self {
        self.submit_in_frame = Some(index);
        self
    }

    pub fn with_submit_in_top(mut self) -> Self {
        self.submit_in_top = true;
        self
    }
}

struct State {
    windows: Vec<MockWindow>,
    active: String,
    frame: Option<usize>,
    // Window that disappears once focus moves elsewhere (gateway closing
    // the original tab).
    close_on_leave: Option<String>,
}

pub struct MockEngine {
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
    next_handle: AtomicU64,
    registry: Mutex<HashMap<u64, (String, String)>>,
}

impl MockEngine {
    pub fn new(windows: Vec<MockWindow>, active: &str) -> Self {
        Self {
            state: Mutex::new(State {
                windows,
                active: active.to_string(),
                frame: None,
                close_on_leave: None,
            }),
            calls: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// The named window closes as soon as focus switches away from it.
    pub fn closing_on_leave(self, handle: &str) -> Self {
        self.state.lock().unwrap().close_on_leave = Some(handle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn active_handle(&self) -> String {
        self.state.lock().unwrap().active.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn lookup(&self, handle: &ElementHandle) -> Result<(String, String), AutomationError> {
        self.registry
            .lock()
            .unwrap()
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| AutomationError::ElementNotFound("stale mock handle".to_string()))
    }

    fn with_spec<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&mut MockElementSpec) -> T,
    ) -> Result<T, AutomationError> {
        let (window, needle) = self.lookup(handle)?;
        let mut state = self.state.lock().unwrap();
        let spec = state
            .windows
            .iter_mut()
            .find(|w| w.handle == window)
            .and_then(|w| w.elements.iter_mut().find(|e| e.needle == needle))
            .ok_or_else(|| AutomationError::ElementNotFound(needle.clone()))?;
        Ok(f(spec))
    }

    fn reveal(&self, window: &str, clicked: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(window) = state.windows.iter_mut().find(|w| w.handle == window) {
            for spec in window.elements.iter_mut() {
                if spec.revealed_by.as_deref() == Some(clicked) {
                    spec.present = true;
                }
            }
        }
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.record(Call::Goto(url.to_string()));
        Ok(())
    }

    async fn ready_state(&self) -> Result<String, AutomationError> {
        Ok("complete".to_string())
    }

    async fn find_element(&self, selector: &Selector) -> Result<ElementHandle, AutomationError> {
        let wanted = selector.to_string();
        self.record(Call::Find(wanted.clone()));
        let state = self.state.lock().unwrap();
        let window = state
            .windows
            .iter()
            .find(|w| w.handle == state.active)
            .ok_or_else(|| AutomationError::Driver("active window gone".to_string()))?;
        match window
            .elements
            .iter()
            .find(|e| e.present && wanted.contains(&e.needle))
        {
            Some(spec) => {
                let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
                self.registry
                    .lock()
                    .unwrap()
                    .insert(id, (window.handle.clone(), spec.needle.clone()));
                Ok(ElementHandle(id))
            }
            None => Err(AutomationError::ElementNotFound(wanted)),
        }
    }

    async fn find_elements(
        &self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        // Frame enumeration asks for iframe elements; answer with one
        // anonymous handle per scripted frame of the active window.
        if matches!(selector, Selector::Css(css) if css == "iframe") {
            let state = self.state.lock().unwrap();
            let window = state
                .windows
                .iter()
                .find(|w| w.handle == state.active)
                .ok_or_else(|| AutomationError::Driver("active window gone".to_string()))?;
            return Ok((0..window.frames)
                .map(|_| ElementHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
                .collect());
        }
        match self.find_element(selector).await {
            Ok(handle) => Ok(vec![handle]),
            Err(AutomationError::ElementNotFound(_)) => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    async fn is_interactable(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        self.with_spec(element, |spec| {
            if spec.stale_for_checks > 0 {
                spec.stale_for_checks -= 1;
                return Err(AutomationError::ElementNotFound(
                    "element detached from the document".to_string(),
                ));
            }
            Ok(spec.present && spec.interactable)
        })?
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let (window, needle) = self.lookup(element)?;
        self.record(Call::NativeClick(needle.clone()));
        self.with_spec(element, |spec| {
            if spec.fail_native_click {
                return Err(AutomationError::Driver(
                    "native click intercepted".to_string(),
                ));
            }
            if spec.vanish_on_click {
                spec.present = false;
            }
            Ok(())
        })??;
        self.reveal(&window, &needle);
        Ok(())
    }

    async fn hover(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let (_, needle) = self.lookup(element)?;
        self.record(Call::Hover(needle));
        Ok(())
    }

    async fn clear(&self, _element: &ElementHandle) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn type_text(
        &self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), AutomationError> {
        let (_, needle) = self.lookup(element)?;
        self.record(Call::TypeText(needle, text.to_string()));
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        _args: Vec<Value>,
    ) -> Result<Value, AutomationError> {
        self.record(Call::Script(script.to_string()));
        if script.contains("getElementById") {
            let state = self.state.lock().unwrap();
            let window = state
                .windows
                .iter()
                .find(|w| w.handle == state.active)
                .ok_or_else(|| AutomationError::Driver("active window gone".to_string()))?;
            let hit = match state.frame {
                None => window.submit_in_top,
                Some(index) => window.submit_in_frame == Some(index),
            };
            return Ok(Value::Bool(hit));
        }
        Ok(Value::Null)
    }

    async fn execute_script_on(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<Value, AutomationError> {
        let (window, needle) = self.lookup(element)?;
        if script.contains("arguments[0].click()") {
            self.record(Call::ScriptedClick(needle.clone()));
            self.with_spec(element, |spec| {
                if spec.vanish_on_click {
                    spec.present = false;
                }
            })?;
            self.reveal(&window, &needle);
        } else {
            self.record(Call::Script(script.to_string()));
        }
        Ok(Value::Null)
    }

    async fn window_handles(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        self.record(Call::WindowHandles);
        let state = self.state.lock().unwrap();
        Ok(state
            .windows
            .iter()
            .map(|w| WindowHandle(w.handle.clone()))
            .collect())
    }

    async fn active_window(&self) -> Result<WindowHandle, AutomationError> {
        Ok(WindowHandle(self.state.lock().unwrap().active.clone()))
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), AutomationError> {
        self.record(Call::SwitchWindow(handle.0.clone()));
        let mut state = self.state.lock().unwrap();
        if !state.windows.iter().any(|w| w.handle == handle.0) {
            return Err(AutomationError::Driver(format!(
                "no such window: {handle}"
            )));
        }
        let leaving = state.active.clone();
        state.active = handle.0.clone();
        state.frame = None;
        if state.close_on_leave.as_deref() == Some(leaving.as_str()) && leaving != handle.0 {
            state.windows.retain(|w| w.handle != leaving);
        }
        Ok(())
    }

    async fn switch_to_frame(&self, index: usize) -> Result<(), AutomationError> {
        self.record(Call::SwitchFrame(index));
        let mut state = self.state.lock().unwrap();
        let (frames, erroring) = {
            let window = state
                .windows
                .iter()
                .find(|w| w.handle == state.active)
                .ok_or_else(|| AutomationError::Driver("active window gone".to_string()))?;
            (window.frames, window.frames_erroring.contains(&index))
        };
        if erroring {
            return Err(AutomationError::Driver(format!(
                "frame {index} refused access"
            )));
        }
        if index >= frames {
            return Err(AutomationError::Driver(format!("no such frame: {index}")));
        }
        state.frame = Some(index);
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), AutomationError> {
        self.record(Call::DefaultContent);
        self.state.lock().unwrap().frame = None;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), AutomationError> {
        self.record(Call::Shutdown);
        Ok(())
    }
}

/// Builds a fresh mock engine per acquired session and keeps every engine
/// around for post-run inspection.
pub struct MockProvider {
    factory: Box<dyn Fn() -> MockEngine + Send + Sync>,
    pub engines: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockProvider {
    pub fn new(factory: impl Fn() -> MockEngine + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            engines: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn acquire(&self) -> Result<Arc<dyn BrowserEngine>, AutomationError> {
        let engine = Arc::new((self.factory)());
        self.engines.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

/// Config with wait budgets small enough for stub-driven tests.
pub fn test_config() -> FunnelConfig {
    let mut config = FunnelConfig::default();
    config.iterations = 1;
    // Wide serial bound so distinctness assertions cannot flake.
    config.email.max_serial = 9_999_999;
    config.timeouts = Timeouts {
        element_wait_ms: 300,
        poll_interval_ms: 10,
        probe_wait_ms: 50,
        reveal_wait_ms: 60,
        popup_wait_ms: 40,
        gateway_wait_ms: 60,
        gateway_settle_ms: 5,
    };
    config
}

/// A window exposing every control of the funnel's happy path, with the
/// submission control in its top-level document.
pub fn funnel_window(handle: &str) -> MockWindow {
    payment_elements(
        MockWindow::new(handle)
            .with_element(MockElementSpec::new("Tamil"))
            .with_element(MockElementSpec::new("Done").vanishing_on_click())
            .with_element(MockElementSpec::new("relative group inline-block"))
            .with_element(MockElementSpec::new("Log In"))
            .with_element(MockElementSpec::new("email"))
            .with_element(MockElementSpec::new("Continue"))
            .with_element(MockElementSpec::new("newPassword"))
            .with_element(MockElementSpec::new("confirmPassword"))
            .with_element(MockElementSpec::new("Create Account"))
            .with_element(MockElementSpec::new("Almost done!"))
            .with_element(MockElementSpec::new("newsignin_dropdown_input"))
            .with_element(MockElementSpec::new("Male"))
            .with_element(MockElementSpec::new("18 - 24 Years"))
            .with_element(MockElementSpec::new("Save")),
    )
    .with_submit_in_top()
}

/// Just the subscription/payment controls, for exercising the payment
/// resolution procedure in isolation.
pub fn payment_window(handle: &str) -> MockWindow {
    payment_elements(
        MockWindow::new(handle)
            .with_element(MockElementSpec::new("relative group inline-block")),
    )
}

fn payment_elements(window: MockWindow) -> MockWindow {
    window
        .with_element(MockElementSpec::new("flex flex-col items-center justify-end"))
        .with_element(MockElementSpec::new("Proceed"))
        .with_element(MockElementSpec::new("Credit / Debit / ATM Card"))
        .with_element(MockElementSpec::new("Enter 16 digit Card Number"))
        .with_element(MockElementSpec::new("MM / YY"))
        .with_element(MockElementSpec::new("CVV"))
        .with_element(MockElementSpec::new("Name on Card"))
        .with_element(MockElementSpec::new("Choose State"))
        .with_element(MockElementSpec::new("Andaman and Nicobar Islands"))
        .with_element(MockElementSpec::new("Continue"))
}
