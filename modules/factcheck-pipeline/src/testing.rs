// Test mocks for the fact-check pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockSearcher (WebSearcher): fixed result list or a forced failure
// - MockFetcher (PageFetcher): HashMap-based URL→response
// - MockGenerator (TextGenerator): prompt-substring rules with queued replies
//
// Plus helpers for building settings and draining the event channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use factcheck_common::{PipelineEvent, SearchResult};

use crate::orchestrator::Orchestrator;
use crate::settings::PipelineSettings;
use crate::traits::{FetchedPage, PageFetcher, TextGenerator, WebSearcher};

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Returns the registered results for every query, or fails every query.
/// Records the queries it received.
pub struct MockSearcher {
    results: Vec<SearchResult>,
    failure: Option<String>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            failure: None,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Results ranked in registration order.
    pub fn on_result(mut self, title: &str, url: &str) -> Self {
        let rank = self.results.len();
        self.results.push(SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            rank,
        });
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.results.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum MockPage {
    Response(FetchedPage),
    Error(String),
    Hang,
}

/// HashMap-based page fetcher. Returns `Err` for unregistered URLs.
/// Builder pattern: `.on_page()`, `.on_response()`, `.on_error()`, `.on_hang()`.
pub struct MockFetcher {
    pages: HashMap<String, MockPage>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(self, url: &str, html: &str) -> Self {
        self.on_response(url, FetchedPage::html(html))
    }

    pub fn on_response(mut self, url: &str, page: FetchedPage) -> Self {
        self.pages.insert(url.to_string(), MockPage::Response(page));
        self
    }

    pub fn on_error(mut self, url: &str, message: &str) -> Self {
        self.pages
            .insert(url.to_string(), MockPage::Error(message.to_string()));
        self
    }

    /// The fetch never completes; only the scrape timeout resolves it.
    pub fn on_hang(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), MockPage::Hang);
        self
    }

    /// URLs requested so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url).cloned() {
            Some(MockPage::Response(page)) => Ok(page),
            Some(MockPage::Error(message)) => Err(anyhow!("{message}")),
            Some(MockPage::Hang) => futures::future::pending().await,
            None => Err(anyhow!("MockFetcher: no page registered for {url}")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// One scripted inference reply.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Fail(String),
    Hang,
    /// Streamed as separate chunks; `generate` returns them joined.
    Chunks(Vec<String>),
    /// Streams the chunks, then errors mid-stream.
    ChunksThenFail(Vec<String>, String),
}

impl MockReply {
    pub fn text(s: &str) -> Self {
        MockReply::Text(s.to_string())
    }

    pub fn fail(s: &str) -> Self {
        MockReply::Fail(s.to_string())
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        MockReply::Chunks(chunks.iter().map(|c| c.to_string()).collect())
    }
}

struct Rule {
    needles: Vec<String>,
    replies: VecDeque<MockReply>,
}

impl Rule {
    fn matches(&self, prompt: &str) -> bool {
        self.needles.iter().all(|n| prompt.contains(n.as_str()))
    }
}

/// Routes each prompt to the first rule whose needles it all contains. A
/// rule's replies are consumed in order; the last one repeats forever.
pub struct MockGenerator {
    rules: Mutex<Vec<Rule>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on(self, needle: &str, reply: MockReply) -> Self {
        self.on_all(&[needle], reply)
    }

    /// Rule that fires only when the prompt contains every needle. Repeated
    /// registrations with the same needles queue further replies.
    pub fn on_all(self, needles: &[&str], reply: MockReply) -> Self {
        {
            let needles: Vec<String> = needles.iter().map(|n| n.to_string()).collect();
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.needles == needles) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    needles,
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    pub fn on_text(self, needle: &str, text: &str) -> Self {
        self.on(needle, MockReply::text(text))
    }

    /// All prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, prompt: &str) -> Result<MockReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| r.matches(prompt))
            .ok_or_else(|| anyhow!("MockGenerator: no reply registered for prompt"))?;
        let reply = if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        };
        reply.ok_or_else(|| anyhow!("MockGenerator: rule has no replies"))
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.next_reply(prompt)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Chunks(chunks) => Ok(chunks.concat()),
            MockReply::Fail(message) | MockReply::ChunksThenFail(_, message) => {
                Err(anyhow!("{message}"))
            }
            MockReply::Hang => futures::future::pending().await,
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        match self.next_reply(prompt)? {
            MockReply::Text(text) => Ok(stream::once(async move { Ok(text) }).boxed()),
            MockReply::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            MockReply::ChunksThenFail(chunks, message) => Ok(stream::iter(
                chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(anyhow!("{message}")))),
            )
            .boxed()),
            MockReply::Fail(message) => Err(anyhow!("{message}")),
            MockReply::Hang => futures::future::pending().await,
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Settings with short timeouts so hanging mocks resolve quickly.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings::builder()
        .search_timeout(Duration::from_millis(500))
        .scrape_timeout(Duration::from_millis(200))
        .inference_timeout(Duration::from_millis(500))
        .build()
}

pub fn orchestrator(
    searcher: Arc<MockSearcher>,
    fetcher: Arc<MockFetcher>,
    generator: Arc<MockGenerator>,
    settings: PipelineSettings,
) -> Orchestrator {
    Orchestrator::new(searcher, fetcher, generator, settings)
}

/// Drain every event until the sender side is dropped.
pub async fn collect_events(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Relevance reply in the shape the ranker asks for.
pub fn relevance_json(score: f64, explanation: &str) -> String {
    serde_json::json!({ "score": score, "explanation": explanation }).to_string()
}

/// Minimal article page whose body text is `text`.
pub fn article(title: &str, text: &str) -> String {
    format!(
        "<html><head><title>{title}</title><script>var tracking = 1;</script></head>\
         <body><nav>Home | About</nav><article><h1>{title}</h1><p>{text}</p></article></body></html>"
    )
}
