//! Locale-aware conversion of raw upstream tokens into typed values.
//!
//! Every function here is total over its input: malformed tokens become
//! "no value" (`None`) or a [`ParseError`](crate::errors::ParseError) the
//! caller can log and skip. Nothing in this module touches the network or
//! the store.

pub mod date;
pub mod number;
pub mod text;

pub use date::{date_from_epoch, parse_date, parse_date_text, RawDate, EPOCH_MILLIS_THRESHOLD};
pub use number::{format_number, parse_integer, parse_liquidity, parse_number, try_number};
pub use text::normalize_text;
