pub mod browser;
pub mod collector;
pub mod detail_fetcher;
pub mod enricher;
pub mod html;
pub mod page_fetcher;
pub mod pool;
mod scraper_error;

pub use scraper_error::ScraperError;
