pub mod field;
pub mod instrument;
pub mod series;
pub mod snapshot;

pub use field::{ClassificationKind, Field, FieldKind, Storage, Value};
pub use instrument::{Classification, Instrument, InstrumentKind, InstrumentUpdate};
pub use series::{SeriesKind, SeriesPoint};
pub use snapshot::{DailyClose, InstrumentSnapshot};
