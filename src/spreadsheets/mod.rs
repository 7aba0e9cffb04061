pub mod export_json;
pub mod export_xlsx;

pub use export_json::{export_listings_json, listings_to_json};
pub use export_xlsx::{export_listings_xlsx, write_listings_xlsx};
