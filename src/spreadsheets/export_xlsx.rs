use crate::domain::listing::{ListingRecord, EXPORT_COLUMNS};
use crate::errors::AppError;
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::Path;

/// Header row plus one row per listing, columns in `EXPORT_COLUMNS` order.
pub fn export_listings_xlsx(listings: &[ListingRecord]) -> Result<Vec<u8>, AppError> {
    let mut workbook = build_workbook(listings)?;
    workbook
        .save_to_buffer()
        .map_err(|e| AppError::Export(format!("Failed to save workbook: {e}")))
}

pub fn write_listings_xlsx(listings: &[ListingRecord], path: &Path) -> Result<(), AppError> {
    fs::write(path, export_listings_xlsx(listings)?)?;
    Ok(())
}

fn build_workbook(listings: &[ListingRecord]) -> Result<Workbook, AppError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, header) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(|e| AppError::Export(format!("Failed to write header '{header}': {e}")))?;
    }

    for (i, listing) in listings.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, value) in listing.export_values().iter().enumerate() {
            worksheet.write_string(r, col as u16, *value).map_err(|e| {
                AppError::Export(format!(
                    "Failed to write {} for row {r}: {e}",
                    EXPORT_COLUMNS[col]
                ))
            })?;
        }
    }

    worksheet.autofit();
    Ok(workbook)
}
