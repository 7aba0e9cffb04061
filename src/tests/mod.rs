mod enricher_tests;
mod listing_tests;
pub mod utils;
