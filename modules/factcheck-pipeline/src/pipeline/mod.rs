//! Stage components, leaf-first: search, scrape, rank, select, summarize,
//! synthesize. Each is usable on its own; the orchestrator wires them up.

pub mod decode;
pub mod ranker;
pub mod scraper;
pub mod search;
pub mod selector;
pub mod summarizer;
pub mod synthesizer;

pub use decode::Decoded;
pub use ranker::RelevanceRanker;
pub use scraper::Scraper;
pub use search::SearchClient;
pub use selector::select;
pub use summarizer::Summarizer;
pub use synthesizer::Synthesizer;
