use crate::config::HarvestSettings;
use crate::domain::listing::{EnrichedFields, ListingRecord};
use crate::jobs::registry::CancelToken;
use crate::scraping::browser::BrowserLauncher;
use crate::scraping::detail_fetcher::DetailFetcher;
use crate::scraping::pool::{Received, WorkerPool};
use crate::scraping::ScraperError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Visits each listing's detail page on a bounded pool and merges what was
/// found back onto the records, in their original order.
///
/// Records without a fetchable link get sentinel details straight away and
/// never reach a browser. A listing whose page takes longer than
/// `detail_result_timeout` keeps sentinel details while the rest carry on.
/// Once cancelled, queued pages are never opened and nothing more is merged.
pub fn enrich_listings(
    listings: Vec<ListingRecord>,
    requested_workers: usize,
    launcher: Arc<dyn BrowserLauncher>,
    token: &CancelToken,
    settings: &HarvestSettings,
) -> Result<Vec<ListingRecord>, ScraperError> {
    let job = token.job();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut listings = listings;
    for record in listings.iter_mut() {
        if record.has_fetchable_link() {
            if seen.insert(record.link.clone()) {
                links.push(record.link.clone());
            }
        } else {
            record.details = EnrichedFields::unavailable();
        }
    }

    let skipped = listings.len() - links.len();
    if links.is_empty() {
        info!(%job, skipped, "No detail pages to visit");
        return Ok(listings);
    }

    let workers = requested_workers
        .min(links.len())
        .min(settings.max_detail_workers)
        .max(1);
    let pool = WorkerPool::new("details", workers)?;
    info!(%job, links = links.len(), skipped, workers = pool.workers(), "Enriching listings");

    let fetcher = DetailFetcher::new(launcher, token.clone(), settings.clone());
    let mut completions = pool.dispatch(links, move |link: &String| fetcher.fetch(link));

    let limit = settings.detail_result_timeout;
    let mut details: HashMap<String, EnrichedFields> = HashMap::new();
    loop {
        let (link, fields) = match completions.next_within(Some(limit)) {
            Received::Finished(link, outcome) => {
                let fields = outcome.unwrap_or_else(|failure| {
                    error!(%job, link = %link, "Detail worker failed: {failure}");
                    EnrichedFields::unavailable()
                });
                (link, fields)
            }
            Received::Overdue(link) => {
                warn!(%job, link = %link, "No detail result within {limit:?}, leaving it unavailable");
                (link, EnrichedFields::unavailable())
            }
            Received::Drained => break,
        };

        if token.is_cancelled() {
            info!(%job, pending = completions.pending(), "Cancelled, discarding remaining details");
            completions.abandon();
            break;
        }
        details.insert(link, fields);
    }

    let enriched = details.len();
    let merged: Vec<ListingRecord> = listings
        .into_iter()
        .map(|mut record| {
            if let Some(fields) = details.get(&record.link) {
                record.merge_details(fields.clone());
            }
            record
        })
        .collect();

    let without_details = merged
        .iter()
        .filter(|record| record.details.is_all_unavailable())
        .count();
    info!(%job, enriched, without_details, "Enrichment finished");
    Ok(merged)
}
