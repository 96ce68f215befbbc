//! Persisted entity store.
//!
//! The reconciler and the query facade only talk to [`Store`]; the engine
//! behind it is either [`MemoryStore`] or [`SqliteStore`].

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::Result;
use crate::models::{
    Classification, ClassificationKind, Instrument, InstrumentKind, SeriesKind, SeriesPoint,
};
use chrono::NaiveDate;

/// Instruments are keyed by (kind, code); series points by
/// (kind, code, series, date); classifications by (kind, name).
pub trait Store {
    fn get_instrument(&self, code: &str, kind: InstrumentKind) -> Result<Option<Instrument>>;

    /// Returns the instrument and whether it was created by this call.
    fn get_or_create_instrument(&mut self, code: &str, kind: InstrumentKind) -> Result<(Instrument, bool)>;

    /// `name` is used as given; callers trim and reject blanks.
    fn get_or_create_classification(
        &mut self,
        kind: ClassificationKind,
        name: &str,
    ) -> Result<(Classification, bool)>;

    /// Overwrite the stored row of an existing instrument with `instrument`.
    fn save_instrument(&mut self, instrument: &Instrument) -> Result<()>;

    /// Insert or overwrite one point. Returns `true` when the date was new.
    fn upsert_point(
        &mut self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        point: &SeriesPoint,
    ) -> Result<bool>;

    /// Upsert a batch; returns (inserted, updated).
    fn upsert_points(
        &mut self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        points: &[SeriesPoint],
    ) -> Result<(usize, usize)> {
        let mut inserted = 0;
        let mut updated = 0;
        for point in points {
            if self.upsert_point(code, kind, series, point)? {
                inserted += 1;
            } else {
                updated += 1;
            }
        }
        Ok((inserted, updated))
    }

    /// All instruments, optionally of one kind, ordered by code.
    fn list_instruments(&self, kind: Option<InstrumentKind>) -> Result<Vec<Instrument>>;

    /// Points ordered by date ascending; `since` is inclusive.
    fn series(
        &self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>>;

    /// Ordered by name.
    fn list_classifications(&self, kind: ClassificationKind) -> Result<Vec<Classification>>;
}
