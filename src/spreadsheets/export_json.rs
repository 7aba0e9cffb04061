use crate::domain::listing::ListingRecord;
use crate::errors::AppError;
use serde_json::{Map, Value};

/// Array of flat objects whose keys follow the export column order.
pub fn listings_to_json(listings: &[ListingRecord]) -> Value {
    let rows = listings
        .iter()
        .map(|listing| {
            let row: Map<String, Value> = listing
                .export_row()
                .into_iter()
                .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
                .collect();
            Value::Object(row)
        })
        .collect();
    Value::Array(rows)
}

pub fn export_listings_json(listings: &[ListingRecord]) -> Result<String, AppError> {
    serde_json::to_string_pretty(&listings_to_json(listings))
        .map_err(|e| AppError::Export(format!("Failed to encode listings: {e}")))
}
