use crate::errors::{DataHubError, Result};
use crate::models::{
    Classification, ClassificationKind, Field, FieldKind, Instrument, InstrumentKind, SeriesKind,
    SeriesPoint, Storage, Value,
};
use crate::store::Store;
use chrono::{DateTime, NaiveDate};
use log::debug;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite engine. One wide `instruments` row per (kind, code); indicator
/// columns are generated from [`Field::ALL`], decimals stored as TEXT so
/// no precision is lost.
pub struct SqliteStore {
    conn: Connection,
}

struct InstrumentRow {
    instrument: Instrument,
    sector_id: Option<i64>,
    segment_id: Option<i64>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS classifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE (kind, name)
            )",
            [],
        )?;

        let columns: Vec<String> = indicator_fields()
            .map(|f| format!("{} {}", f.column_name(), sql_type(f)))
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS instruments (
                code TEXT NOT NULL,
                kind TEXT NOT NULL,
                nome TEXT NOT NULL DEFAULT '',
                setor_id INTEGER REFERENCES classifications(id),
                segmento_id INTEGER REFERENCES classifications(id),
                {},
                data_atualizacao TEXT,
                PRIMARY KEY (kind, code)
            )",
            columns.join(",\n                ")
        );
        self.conn.execute(&sql, [])?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS series_points (
                code TEXT NOT NULL,
                kind TEXT NOT NULL,
                series TEXT NOT NULL,
                date TEXT NOT NULL,
                value TEXT NOT NULL,
                volume INTEGER,
                PRIMARY KEY (kind, code, series, date)
            )",
            [],
        )?;
        Ok(())
    }

    fn classification_by_id(&self, id: i64) -> Result<Option<Classification>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, kind, name FROM classifications WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;
        Ok(row.and_then(|(id, kind, name)| {
            ClassificationKind::from_str_opt(&kind).map(|kind| Classification { id, kind, name })
        }))
    }

    fn resolve(&self, row: InstrumentRow) -> Result<Instrument> {
        let mut instrument = row.instrument;
        if let Some(id) = row.sector_id {
            instrument.sector = self.classification_by_id(id)?;
        }
        if let Some(id) = row.segment_id {
            instrument.segment = self.classification_by_id(id)?;
        }
        Ok(instrument)
    }

    fn query_instruments(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Instrument>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, read_instrument_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(|r| self.resolve(r)).collect()
    }
}

impl Store for SqliteStore {
    fn get_instrument(&self, code: &str, kind: InstrumentKind) -> Result<Option<Instrument>> {
        let mut found = self.query_instruments(
            "SELECT * FROM instruments WHERE kind = ?1 AND code = ?2",
            &[&kind.as_str(), &code],
        )?;
        Ok(found.pop())
    }

    fn get_or_create_instrument(&mut self, code: &str, kind: InstrumentKind) -> Result<(Instrument, bool)> {
        let created = self.conn.execute(
            "INSERT OR IGNORE INTO instruments (code, kind) VALUES (?1, ?2)",
            params![code, kind.as_str()],
        )? > 0;
        let instrument = self.get_instrument(code, kind)?.ok_or_else(|| {
            DataHubError::DataError(format!("instrument {} ({}) vanished after insert", code, kind))
        })?;
        Ok((instrument, created))
    }

    fn get_or_create_classification(
        &mut self,
        kind: ClassificationKind,
        name: &str,
    ) -> Result<(Classification, bool)> {
        let created = self.conn.execute(
            "INSERT OR IGNORE INTO classifications (kind, name) VALUES (?1, ?2)",
            params![kind.as_str(), name],
        )? > 0;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM classifications WHERE kind = ?1 AND name = ?2",
            params![kind.as_str(), name],
            |row| row.get(0),
        )?;
        Ok((
            Classification {
                id,
                kind,
                name: name.to_string(),
            },
            created,
        ))
    }

    fn save_instrument(&mut self, instrument: &Instrument) -> Result<()> {
        let fields: Vec<Field> = indicator_fields().collect();
        let mut sets = vec![
            "nome = ?1".to_string(),
            "setor_id = ?2".to_string(),
            "segmento_id = ?3".to_string(),
            "data_atualizacao = ?4".to_string(),
        ];
        let mut values: Vec<SqlValue> = vec![
            SqlValue::Text(instrument.name.clone()),
            instrument.sector.as_ref().map_or(SqlValue::Null, |c| SqlValue::Integer(c.id)),
            instrument.segment.as_ref().map_or(SqlValue::Null, |c| SqlValue::Integer(c.id)),
            instrument
                .updated_at
                .map_or(SqlValue::Null, |t| SqlValue::Text(t.to_rfc3339())),
        ];
        for field in &fields {
            values.push(to_sql_value(instrument.values.get(field)));
            sets.push(format!("{} = ?{}", field.column_name(), values.len()));
        }
        values.push(SqlValue::Text(instrument.kind.as_str().to_string()));
        let kind_idx = values.len();
        values.push(SqlValue::Text(instrument.code.clone()));
        let code_idx = values.len();

        let sql = format!(
            "UPDATE instruments SET {} WHERE kind = ?{} AND code = ?{}",
            sets.join(", "),
            kind_idx,
            code_idx
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(DataHubError::DataError(format!(
                "instrument {} ({}) does not exist",
                instrument.code, instrument.kind
            )));
        }
        Ok(())
    }

    fn upsert_point(
        &mut self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        point: &SeriesPoint,
    ) -> Result<bool> {
        upsert_point_with(&self.conn, code, kind, series, point)
    }

    fn upsert_points(
        &mut self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        points: &[SeriesPoint],
    ) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        let mut updated = 0;
        for point in points {
            if upsert_point_with(&tx, code, kind, series, point)? {
                inserted += 1;
            } else {
                updated += 1;
            }
        }
        tx.commit()?;
        debug!("{} {}: +{} ~{}", code, series, inserted, updated);
        Ok((inserted, updated))
    }

    fn list_instruments(&self, kind: Option<InstrumentKind>) -> Result<Vec<Instrument>> {
        match kind {
            Some(kind) => self.query_instruments(
                "SELECT * FROM instruments WHERE kind = ?1 ORDER BY code",
                &[&kind.as_str()],
            ),
            None => self.query_instruments("SELECT * FROM instruments ORDER BY code", &[]),
        }
    }

    fn series(
        &self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>> {
        let since = since.map(|d| d.format(DATE_FMT).to_string());
        let mut stmt = self.conn.prepare(
            "SELECT date, value, volume FROM series_points
             WHERE kind = ?1 AND code = ?2 AND series = ?3 AND (?4 IS NULL OR date >= ?4)
             ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), code, series.as_str(), since], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, value, volume)| {
                let date = NaiveDate::parse_from_str(&date, DATE_FMT)?;
                let value = decimal_from_text(&value)?;
                Ok(SeriesPoint::new(date, value).with_volume(volume))
            })
            .collect()
    }

    fn list_classifications(&self, kind: ClassificationKind) -> Result<Vec<Classification>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM classifications WHERE kind = ?1 ORDER BY name")?;
        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok(Classification {
                    id: row.get(0)?,
                    kind,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn upsert_point_with(
    conn: &Connection,
    code: &str,
    kind: InstrumentKind,
    series: SeriesKind,
    point: &SeriesPoint,
) -> Result<bool> {
    let date = point.date.format(DATE_FMT).to_string();
    let existed: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM series_points
         WHERE kind = ?1 AND code = ?2 AND series = ?3 AND date = ?4)",
        params![kind.as_str(), code, series.as_str(), date],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO series_points (code, kind, series, date, value, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (kind, code, series, date)
         DO UPDATE SET value = excluded.value, volume = excluded.volume",
        params![code, kind.as_str(), series.as_str(), date, point.value.to_string(), point.volume],
    )?;
    Ok(!existed)
}

fn indicator_fields() -> impl Iterator<Item = Field> {
    Field::ALL
        .into_iter()
        .filter(|f| f.storage() == Storage::Column)
}

fn sql_type(field: Field) -> &'static str {
    match field.kind() {
        FieldKind::Integer | FieldKind::Liquidity => "INTEGER",
        FieldKind::Text | FieldKind::Decimal => "TEXT",
    }
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None => SqlValue::Null,
        Some(Value::Text(s)) => SqlValue::Text(s.clone()),
        Some(Value::Decimal(d)) => SqlValue::Text(d.to_string()),
        Some(Value::Integer(i)) => SqlValue::Integer(*i),
    }
}

fn decimal_from_text(text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| DataHubError::DataError(format!("bad decimal {:?} in store: {}", text, e)))
}

impl FromSql for InstrumentKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        InstrumentKind::parse(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn read_instrument_row(row: &Row) -> rusqlite::Result<InstrumentRow> {
    let code: String = row.get("code")?;
    let kind: InstrumentKind = row.get("kind")?;
    let mut instrument = Instrument::new(&code, kind);
    instrument.name = row.get("nome")?;

    let mut values = BTreeMap::new();
    for field in indicator_fields() {
        let value = match field.kind() {
            FieldKind::Integer | FieldKind::Liquidity => row
                .get::<_, Option<i64>>(field.column_name())?
                .map(Value::Integer),
            FieldKind::Text => row
                .get::<_, Option<String>>(field.column_name())?
                .map(Value::Text),
            FieldKind::Decimal => row
                .get::<_, Option<String>>(field.column_name())?
                .and_then(|s| Decimal::from_str(&s).ok())
                .map(Value::Decimal),
        };
        if let Some(value) = value {
            values.insert(field, value);
        }
    }
    instrument.values = values;

    instrument.updated_at = row
        .get::<_, Option<String>>("data_atualizacao")?
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok());

    Ok(InstrumentRow {
        instrument,
        sector_id: row.get("setor_id")?,
        segment_id: row.get("segmento_id")?,
    })
}
