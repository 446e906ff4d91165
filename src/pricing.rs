//! Hourly electricity prices: retrieval, parsing and cheapest-hour selection.

pub mod feed;
pub mod parser;
pub mod selector;
pub mod types;

pub use feed::{HttpPriceFeed, PriceFeedPort, extract_chart_payload};
pub use parser::{ParseFailure, parse_price_table};
pub use selector::{select_lowest_hours, selected_prices};
pub use types::{HOURS_PER_DAY, PricePoint, PriceTable, SelectedHours};
