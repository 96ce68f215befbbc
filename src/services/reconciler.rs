//! Write path for persisted entities.
//!
//! Updates are merged into what is already stored: fields missing from an
//! [`InstrumentUpdate`] keep their stored value.

use crate::errors::Result;
use crate::models::{
    ClassificationKind, Field, Instrument, InstrumentKind, InstrumentUpdate, SeriesKind, SeriesPoint, Storage, Value,
};
use crate::store::Store;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::America::Sao_Paulo;
use log::debug;

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub instrument: Instrument,
    pub created: bool,
    /// Fields carried by the update, in catalogue order.
    pub touched: Vec<Field>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Points dropped before reaching the store (bad date/number).
    pub dropped: usize,
}

/// 当前圣保罗时间，用作更新时间戳
pub fn now_sao_paulo() -> DateTime<FixedOffset> {
    let now = Utc::now().with_timezone(&Sao_Paulo);
    now.with_timezone(&now.offset().fix())
}

/// Create the instrument if needed, then apply only the fields the update carries.
///
/// Sector/segment names are trimmed and resolved through get-or-create;
/// a blank name leaves the stored classification alone.
pub fn upsert_instrument<S: Store + ?Sized>(store: &mut S, update: &InstrumentUpdate) -> Result<UpsertOutcome> {
    let (mut instrument, created) = store.get_or_create_instrument(&update.code, update.kind)?;
    let mut touched = Vec::with_capacity(update.fields.len());

    for (field, value) in &update.fields {
        match field.storage() {
            Storage::Name => {
                instrument.name = value
                    .as_ref()
                    .and_then(Value::as_text)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
            }
            Storage::Classification(kind) => {
                let name = value
                    .as_ref()
                    .and_then(Value::as_text)
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                let slot = match kind {
                    ClassificationKind::Sector => &mut instrument.sector,
                    ClassificationKind::Segment => &mut instrument.segment,
                };
                match (name, value) {
                    (Some(name), _) => {
                        let (classification, new) = store.get_or_create_classification(kind, name)?;
                        if new {
                            debug!("created {} {:?}", kind.as_str(), name);
                        }
                        *slot = Some(classification);
                    }
                    (None, None) => *slot = None,
                    (None, Some(_)) => continue,
                }
            }
            Storage::Column => match value {
                Some(v) => {
                    instrument.values.insert(*field, v.clone());
                }
                None => {
                    instrument.values.remove(field);
                }
            },
        }
        touched.push(*field);
    }

    instrument.updated_at = Some(now_sao_paulo());
    store.save_instrument(&instrument)?;

    Ok(UpsertOutcome {
        instrument,
        created,
        touched,
    })
}

/// Upsert every point by (instrument, series, date).
pub fn upsert_series<S: Store + ?Sized>(
    store: &mut S,
    code: &str,
    kind: InstrumentKind,
    series: SeriesKind,
    points: &[SeriesPoint],
) -> Result<SeriesOutcome> {
    if points.is_empty() {
        return Ok(SeriesOutcome::default());
    }
    let (inserted, updated) = store.upsert_points(code, kind, series, points)?;
    Ok(SeriesOutcome {
        inserted,
        updated,
        dropped: 0,
    })
}
