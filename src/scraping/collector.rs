use crate::config::HarvestSettings;
use crate::domain::listing::ListingRecord;
use crate::jobs::registry::CancelToken;
use crate::scraping::browser::BrowserLauncher;
use crate::scraping::page_fetcher::{PageFetcher, SearchLabels};
use crate::scraping::pool::WorkerPool;
use crate::scraping::ScraperError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// Fetches pages `1..=pages` on a pool of at most `max_page_workers`
/// browsers and returns the merged listings, deduplicated by link.
///
/// Pages are merged in the order they finish. A failed page contributes
/// nothing; the only error is a pool that could not be started.
pub fn collect_listings(
    launcher: Arc<dyn BrowserLauncher>,
    base_url: &str,
    pages: u32,
    labels: SearchLabels,
    token: &CancelToken,
    settings: &HarvestSettings,
) -> Result<Vec<ListingRecord>, ScraperError> {
    let job = token.job();
    if pages == 0 {
        return Ok(Vec::new());
    }

    let workers = settings.max_page_workers.min(pages as usize);
    let pool = WorkerPool::new("pages", workers)?;
    info!(%job, pages, workers = pool.workers(), base_url, "Collecting listings");

    let fetcher = PageFetcher::new(
        launcher,
        base_url,
        labels,
        token.clone(),
        settings.clone(),
    );
    let completions = pool.dispatch((1..=pages).collect(), move |page: &u32| fetcher.fetch(*page));

    let mut merged = Vec::new();
    for (page, outcome) in completions {
        if token.is_cancelled() {
            info!(%job, page, "Cancelled, discarding remaining page results");
            break;
        }
        match outcome {
            Ok(records) => merged.extend(records),
            Err(failure) => error!(%job, page, "Page worker failed: {failure}"),
        }
    }

    let collected = merged.len();
    let unique = dedupe_by_link(merged);
    info!(%job, collected, unique = unique.len(), "Collection finished");
    Ok(unique)
}

/// Keeps the first record seen for each link. Records without a usable link
/// are all kept.
pub fn dedupe_by_link(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| match record.dedup_key() {
            Some(link) => seen.insert(link.to_string()),
            None => true,
        })
        .collect()
}
