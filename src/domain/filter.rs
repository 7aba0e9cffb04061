// src/domain/filter.rs

use crate::domain::criteria::RefinementCriteria;
use crate::domain::listing::{is_unavailable, ListingRecord};
use tracing::info;

/// Property-type labels that mark a land/lot search.
const LAND_MARKERS: [&str; 2] = ["terreno", "lote"];

/// How many leading records decide whether the whole batch is land.
const LAND_SAMPLE: usize = 5;

/// Price/area text to a number: keep digits and commas, comma is the decimal
/// separator. `None` means the value could not be read.
pub fn parse_decimal(text: &str) -> Option<f64> {
    if is_unavailable(text) {
        return None;
    }
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.replace(',', ".").parse::<f64>().ok()
}

/// Room/parking text to a count. Anything unreadable counts as zero.
pub fn parse_count(text: &str) -> u32 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().unwrap_or(0)
}

/// Batch-level heuristic: if any of the first five records is labelled as
/// land, room/bath/parking minimums are skipped for every record.
// Known limitation: a mixed batch is classified by its head only.
pub fn is_land_batch(listings: &[ListingRecord]) -> bool {
    listings.iter().take(LAND_SAMPLE).any(|listing| {
        let label = listing.property_type.to_lowercase();
        LAND_MARKERS.iter().any(|marker| label.contains(marker))
    })
}

pub fn apply_refinements(
    listings: Vec<ListingRecord>,
    criteria: &RefinementCriteria,
) -> Vec<ListingRecord> {
    if criteria.is_unrestricted() {
        return listings;
    }

    let land_only = is_land_batch(&listings);
    let original = listings.len();
    info!(
        listings = original,
        land_only,
        criteria = %criteria.summary(),
        "Applying refinements"
    );

    let kept: Vec<ListingRecord> = listings
        .into_iter()
        .filter(|listing| passes(listing, criteria, land_only))
        .collect();

    let removed = original - kept.len();
    if original > 0 {
        let share = removed as f64 / original as f64 * 100.0;
        info!(kept = kept.len(), removed, "Refinements removed {share:.1}% of listings");
    }

    kept
}

fn passes(listing: &ListingRecord, criteria: &RefinementCriteria, land_only: bool) -> bool {
    if land_only {
        if criteria.requires_condo_fee && is_unavailable(&listing.condo_fee) {
            return false;
        }
    } else {
        let counts = [
            (&listing.bedrooms, criteria.min_bedrooms),
            (&listing.bathrooms, criteria.min_bathrooms),
            (&listing.parking_spaces, criteria.min_parking),
        ];
        for (text, minimum) in counts {
            let minimum = minimum.unwrap_or(0);
            if minimum > 0 && parse_count(text) < minimum {
                return false;
            }
        }
    }

    within_bounds(parse_decimal(&listing.price), criteria.min_price, criteria.max_price)
        && within_bounds(parse_decimal(&listing.area), criteria.min_area, criteria.max_area)
}

/// Unreadable values are exempt from the comparison rather than read as zero.
fn within_bounds(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    let Some(value) = value else {
        return true;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}
