//! In-memory driver for tests. Documents are keyed by URL and expose canned
//! elements per selector; handles go stale on every navigation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession, DriverResult, Element, LaunchOptions, Page};
use crate::error::DriverError;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    text: String,
    html: String,
    children: HashMap<String, Vec<FakeElement>>,
    navigates_to: Option<String>,
    broken: bool,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.into();
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.into();
        self
    }

    pub fn child(mut self, selector: &str, child: FakeElement) -> Self {
        self.children.entry(selector.into()).or_default().push(child);
        self
    }

    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    /// Every read on this element fails with a protocol error.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    elements: HashMap<String, Vec<FakeElement>>,
    text: String,
}

impl FakeDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.elements.entry(selector.into()).or_default().extend(elements);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.into();
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    docs: HashMap<String, FakeDoc>,
    unreachable: HashSet<String>,
    current: String,
    generation: u64,
    /// Every URL loaded, by `goto` or by a click that navigates.
    pub visits: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub launches: usize,
    pub closes: usize,
}

impl FakeState {
    fn load(&mut self, url: &str) {
        self.current = url.to_string();
        self.generation += 1;
        self.visits.push(url.to_string());
    }

    fn doc(&self) -> Option<&FakeDoc> {
        self.docs.get(&self.current)
    }
}

/// The fake "internet" plus a launcher for it.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pub state: Arc<Mutex<FakeState>>,
    fail_launch: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, doc: FakeDoc) -> Self {
        self.state.lock().unwrap().docs.insert(url.into(), doc);
        self
    }

    pub fn unreachable(self, url: &str) -> Self {
        self.state.lock().unwrap().unreachable.insert(url.into());
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self, _options: &LaunchOptions) -> DriverResult<Box<dyn BrowserSession>> {
        if self.fail_launch {
            return Err(DriverError::Launch("no browser in test".into()));
        }
        self.state.lock().unwrap().launches += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> DriverResult<Box<dyn Page>> {
        Ok(Box::new(FakePage {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    fn handles(&self, elements: Vec<FakeElement>, generation: u64) -> Vec<Box<dyn Element>> {
        elements
            .into_iter()
            .map(|element| {
                Box::new(FakeHandle {
                    state: Arc::clone(&self.state),
                    generation,
                    element,
                }) as Box<dyn Element>
            })
            .collect()
    }

    fn first(&self, selector: &str) -> DriverResult<FakeElement> {
        let state = self.state.lock().unwrap();
        state
            .doc()
            .and_then(|d| d.elements.get(selector))
            .and_then(|els| els.first().cloned())
            .ok_or_else(|| DriverError::NotFound(selector.into()))
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable.contains(url) {
            return Err(DriverError::Navigation {
                url: url.into(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            });
        }
        state.load(url);
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn find_all(&self, selector: &str) -> DriverResult<Vec<Box<dyn Element>>> {
        let (found, generation) = {
            let state = self.state.lock().unwrap();
            let found = state
                .doc()
                .and_then(|d| d.elements.get(selector))
                .cloned()
                .unwrap_or_default();
            (found, state.generation)
        };
        Ok(self.handles(found, generation))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        self.first(selector)?;
        self.state
            .lock()
            .unwrap()
            .fills
            .push((selector.into(), value.into()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        let target = self.first(selector)?;
        if let Some(url) = target.navigates_to {
            self.state.lock().unwrap().load(&url);
        }
        Ok(())
    }

    async fn contains_text(&self, needle: &str) -> DriverResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.doc().is_some_and(|d| d.text.contains(needle)))
    }
}

struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
    generation: u64,
    element: FakeElement,
}

impl FakeHandle {
    fn check(&self) -> DriverResult<&FakeElement> {
        if self.state.lock().unwrap().generation != self.generation {
            return Err(DriverError::StaleElement);
        }
        if self.element.broken {
            return Err(DriverError::Protocol("element exploded".into()));
        }
        Ok(&self.element)
    }
}

#[async_trait]
impl Element for FakeHandle {
    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        Ok(self.check()?.attrs.get(name).cloned())
    }

    async fn text(&self) -> DriverResult<String> {
        Ok(self.check()?.text.clone())
    }

    async fn inner_html(&self) -> DriverResult<String> {
        Ok(self.check()?.html.clone())
    }

    async fn click(&self) -> DriverResult<()> {
        let target = self.check()?.navigates_to.clone();
        if let Some(url) = target {
            self.state.lock().unwrap().load(&url);
        }
        Ok(())
    }

    async fn find(&self, selector: &str) -> DriverResult<Option<Box<dyn Element>>> {
        let child = self
            .check()?
            .children
            .get(selector)
            .and_then(|c| c.first().cloned());
        Ok(child.map(|element| {
            Box::new(FakeHandle {
                state: Arc::clone(&self.state),
                generation: self.generation,
                element,
            }) as Box<dyn Element>
        }))
    }
}
