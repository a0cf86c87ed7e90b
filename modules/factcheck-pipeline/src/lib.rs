pub mod adapters;
pub mod orchestrator;
pub mod pipeline;
pub mod settings;
pub mod sink;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use adapters::{orchestrator_from_config, HttpFetcher};
pub use orchestrator::{Orchestrator, Stage};
pub use settings::PipelineSettings;
pub use sink::{event_channel, EventSink};
pub use traits::{FetchedPage, PageFetcher, TextGenerator, WebSearcher};
