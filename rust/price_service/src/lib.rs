// src/lib.rs

pub mod align;
pub mod error;
pub mod loader;
pub mod models;

pub use align::{align_histories, AlignedPrices};
pub use error::QueryError;
pub use loader::PriceClient;
pub use models::PriceHistory;
