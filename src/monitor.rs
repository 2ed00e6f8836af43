use crate::diff::{generate_diff, has_significant_changes, NO_CHANGES};
use crate::fetcher::PageFetcher;
use crate::store::CheckStore;
use crate::summarizer::Summarizer;
use crate::types::{Check, CheckOutcome, CheckStatus, Link, MonitorError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Health of the pipeline's collaborators, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub database: bool,
    pub llm: bool,
    pub timestamp: DateTime<Utc>,
}

/// Sequences fetch, diff, significance classification, summarization and
/// persistence for each link. Holds no state between invocations: the
/// previous snapshot is always re-read from the store.
pub struct PageMonitor {
    store: Arc<CheckStore>,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Arc<dyn Summarizer>,
}

impl PageMonitor {
    pub fn new(
        store: Arc<CheckStore>,
        fetcher: Arc<dyn PageFetcher>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
        }
    }

    /// Run one check cycle for a single link.
    pub async fn run_check(&self, link_id: Uuid) -> Result<CheckOutcome> {
        let link = self.store.get_link(link_id).await?;
        self.check_link(&link).await
    }

    /// Run one check cycle for every link of a competitor, strictly
    /// sequentially. A link's fetch failure is recorded and the batch
    /// continues; only persistence failures abort the remainder.
    pub async fn run_competitor_checks(&self, competitor_id: Uuid) -> Result<Vec<CheckOutcome>> {
        let links = self.store.links_for_competitor(competitor_id).await?;
        if links.is_empty() {
            return Err(MonitorError::NoLinks { id: competitor_id });
        }

        info!(
            "Checking {} links for competitor {}",
            links.len(),
            competitor_id
        );

        let mut outcomes = Vec::with_capacity(links.len());
        for link in &links {
            outcomes.push(self.check_link(link).await?);
        }

        Ok(outcomes)
    }

    async fn check_link(&self, link: &Link) -> Result<CheckOutcome> {
        // Read-latest-then-insert is not atomic; overlapping invocations
        // against the same link can interleave their check ordering.
        let previous = self.store.latest_check(link.id).await?;

        let (content, text_content, status, error_msg) =
            match self.fetcher.fetch_page(&link.url).await {
                Ok(page) => (page.html, page.text, CheckStatus::Success, None),
                Err(e) => {
                    warn!("Fetch failed for {}: {}", link.url, e);
                    (String::new(), String::new(), CheckStatus::Error, Some(e.to_string()))
                }
            };

        let check = self
            .store
            .create_check(link.id, content, text_content, status, error_msg)
            .await?;

        if check.status == CheckStatus::Success {
            if let Some(previous) = previous {
                self.record_change(link, &previous, &check).await?;
            }
        }

        Ok(CheckOutcome {
            link_id: link.id,
            check_id: check.id,
            status: check.status,
        })
    }

    /// Diff the new snapshot against its predecessor and persist a change
    /// row when anything moved. AI enrichment is best-effort: a failed
    /// summarization still leaves the factual diff recorded.
    async fn record_change(&self, link: &Link, previous: &Check, check: &Check) -> Result<()> {
        let diff_text = generate_diff(&previous.text_content, &check.text_content);
        if diff_text == NO_CHANGES {
            info!("No changes detected for {}", link.url);
            return Ok(());
        }

        let has_significant = has_significant_changes(&diff_text);

        match self
            .summarizer
            .summarize(&previous.text_content, &check.text_content, &diff_text, &link.url)
            .await
        {
            Ok(summary) => {
                self.store
                    .create_change(
                        check.id,
                        &diff_text,
                        Some(&summary.summary),
                        has_significant,
                        Some(&summary.snippets),
                    )
                    .await?;
            }
            Err(e) => {
                warn!("Summarization failed for {}: {}", link.url, e);
                self.store
                    .create_change(check.id, &diff_text, None, has_significant, None)
                    .await?;
            }
        }

        Ok(())
    }

    /// Aggregate collaborator health: database ping plus LLM connectivity
    /// probe, each failure degrading only its own flag.
    pub async fn service_status(&self) -> ServiceStatus {
        let database = self.store.ping().await.is_ok();
        let llm = self.summarizer.probe().await;

        ServiceStatus {
            database,
            llm,
            timestamp: Utc::now(),
        }
    }
}
