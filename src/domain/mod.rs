pub mod criteria;
pub mod filter;
pub mod listing;
