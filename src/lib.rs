pub mod diff;
pub mod fetcher;
pub mod monitor;
pub mod store;
pub mod summarizer;
pub mod types;

pub use diff::{generate_diff, has_significant_changes, NO_CHANGES};
pub use fetcher::{html_to_text, Fetcher, PageFetcher};
pub use monitor::{PageMonitor, ServiceStatus};
pub use store::CheckStore;
pub use summarizer::{
    ChangeSummary, LlmSummarizer, MockSummarizer, ProviderConfig, Summarizer,
};
pub use types::*;
