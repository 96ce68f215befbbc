//! Locating structured data inside loosely structured upstream documents.
//!
//! `table` works on HTML tables, `script` on inline JavaScript and JSON
//! payloads. Both return raw, untyped values.

pub mod script;
pub mod table;

pub use script::{
    extract_codes, extract_date_utc_pairs, extract_price_history, extract_push_series,
    extract_var_pairs, to_series_points, RawPoint,
};
pub use table::{key_value_pairs, locate_table, RawCell, RawRow, RawTable};
