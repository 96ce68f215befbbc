use crate::errors::{DataHubError, Result};
use crate::models::{
    Classification, ClassificationKind, Instrument, InstrumentKind, SeriesKind, SeriesPoint,
};
use crate::store::Store;
use chrono::NaiveDate;
use std::collections::BTreeMap;

type SeriesKey = (InstrumentKind, String, SeriesKind);

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    instruments: BTreeMap<(InstrumentKind, String), Instrument>,
    classifications: Vec<Classification>,
    series: BTreeMap<SeriesKey, BTreeMap<NaiveDate, SeriesPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn classification_count(&self) -> usize {
        self.classifications.len()
    }
}

impl Store for MemoryStore {
    fn get_instrument(&self, code: &str, kind: InstrumentKind) -> Result<Option<Instrument>> {
        Ok(self.instruments.get(&(kind, code.to_string())).cloned())
    }

    fn get_or_create_instrument(&mut self, code: &str, kind: InstrumentKind) -> Result<(Instrument, bool)> {
        let key = (kind, code.to_string());
        if let Some(existing) = self.instruments.get(&key) {
            return Ok((existing.clone(), false));
        }
        let instrument = Instrument::new(code, kind);
        self.instruments.insert(key, instrument.clone());
        Ok((instrument, true))
    }

    fn get_or_create_classification(
        &mut self,
        kind: ClassificationKind,
        name: &str,
    ) -> Result<(Classification, bool)> {
        if let Some(existing) = self
            .classifications
            .iter()
            .find(|c| c.kind == kind && c.name == name)
        {
            return Ok((existing.clone(), false));
        }
        let classification = Classification {
            id: self.classifications.len() as i64 + 1,
            kind,
            name: name.to_string(),
        };
        self.classifications.push(classification.clone());
        Ok((classification, true))
    }

    fn save_instrument(&mut self, instrument: &Instrument) -> Result<()> {
        let key = (instrument.kind, instrument.code.clone());
        match self.instruments.get_mut(&key) {
            Some(slot) => {
                *slot = instrument.clone();
                Ok(())
            }
            None => Err(DataHubError::DataError(format!(
                "instrument {} ({}) does not exist",
                instrument.code, instrument.kind
            ))),
        }
    }

    fn upsert_point(
        &mut self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        point: &SeriesPoint,
    ) -> Result<bool> {
        let points = self
            .series
            .entry((kind, code.to_string(), series))
            .or_default();
        Ok(points.insert(point.date, point.clone()).is_none())
    }

    fn list_instruments(&self, kind: Option<InstrumentKind>) -> Result<Vec<Instrument>> {
        let mut list: Vec<Instrument> = self
            .instruments
            .values()
            .filter(|i| kind.map_or(true, |k| i.kind == k))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(list)
    }

    fn series(
        &self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>> {
        let Some(points) = self.series.get(&(kind, code.to_string(), series)) else {
            return Ok(Vec::new());
        };
        let lower = since.unwrap_or(NaiveDate::MIN);
        Ok(points.range(lower..).map(|(_, p)| p.clone()).collect())
    }

    fn list_classifications(&self, kind: ClassificationKind) -> Result<Vec<Classification>> {
        let mut list: Vec<Classification> = self
            .classifications
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut store = MemoryStore::new();
        let (_, created) = store
            .get_or_create_instrument("ABCD11", InstrumentKind::RealEstateFund)
            .unwrap();
        assert!(created);
        let (_, created) = store
            .get_or_create_instrument("ABCD11", InstrumentKind::RealEstateFund)
            .unwrap();
        assert!(!created);
        assert_eq!(store.instrument_count(), 1);

        let (a, _) = store
            .get_or_create_classification(ClassificationKind::Segment, "Logística")
            .unwrap();
        let (b, created) = store
            .get_or_create_classification(ClassificationKind::Segment, "Logística")
            .unwrap();
        assert!(!created);
        assert_eq!(a.id, b.id);
        assert_eq!(store.classification_count(), 1);
    }

    #[test]
    fn test_series_overwrite_and_since() {
        let mut store = MemoryStore::new();
        let kind = InstrumentKind::RealEstateFund;
        let series = SeriesKind::ClosingPrice;
        assert!(store
            .upsert_point("ABCD11", kind, series, &SeriesPoint::new(ymd(2024, 1, 5), dec!(10)))
            .unwrap());
        assert!(!store
            .upsert_point("ABCD11", kind, series, &SeriesPoint::new(ymd(2024, 1, 5), dec!(11)))
            .unwrap());
        store
            .upsert_point("ABCD11", kind, series, &SeriesPoint::new(ymd(2024, 1, 8), dec!(12)))
            .unwrap();

        let all = store.series("ABCD11", kind, series, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].value, dec!(11));

        let since = store.series("ABCD11", kind, series, Some(ymd(2024, 1, 8))).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].value, dec!(12));
    }
}
