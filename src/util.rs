use chrono::{Datelike, NaiveDate};
use crate::errors::{DataHubError, Result};

// 日期转换工具
pub fn date_to_int(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

// Arrow数据转换工具
pub mod arrow_utils {
    use super::*;
    use crate::models::{DailyClose, InstrumentSnapshot};
    use arrow::array::{ArrayRef, StringBuilder};
    use arrow::buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
    use arrow::datatypes::{DataType, Field, Fields, Schema};
    use arrow::ipc::reader::FileReader;
    use arrow::ipc::writer::FileWriter;
    use arrow::record_batch::RecordBatch;
    use arrow_array::{Array, Float64Array, Int32Array, Int64Array, ListArray, StringArray, StructArray};
    use log::info;
    use std::fs::File;
    use std::io::{Read, Seek};
    use std::path::Path;
    use std::sync::Arc;

    fn daily_fields() -> Fields {
        Fields::from(vec![
            Field::new("date", DataType::Int32, false),
            Field::new("close", DataType::Float64, false),
            Field::new("volume", DataType::Int64, true),
        ])
    }

    fn arrow_err(e: impl std::fmt::Display) -> DataHubError {
        DataHubError::ArrowError(e.to_string())
    }

    /// Snapshot schema: one row per instrument, `daily` as list<struct>.
    pub fn snapshot_schema() -> Schema {
        Schema::new(vec![
            Field::new("kind", DataType::Utf8, false),
            Field::new("code", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("sector", DataType::Utf8, true),
            Field::new("segment", DataType::Utf8, true),
            Field::new("price", DataType::Float64, true),
            Field::new("p_vp", DataType::Float64, true),
            Field::new("dividend_yield", DataType::Float64, true),
            Field::new("daily_liquidity", DataType::Int64, true),
            Field::new(
                "daily",
                DataType::List(Arc::new(Field::new("item", DataType::Struct(daily_fields()), false))),
                true,
            ),
        ])
    }

    // 将快照转换为Arrow记录批次
    pub fn snapshots_to_record_batch(data: &[InstrumentSnapshot]) -> Result<RecordBatch> {
        let mut kind_builder = StringBuilder::new();
        let mut code_builder = StringBuilder::new();
        let mut name_builder = StringBuilder::new();
        let mut sector_builder = StringBuilder::new();
        let mut segment_builder = StringBuilder::new();

        let mut date_values = Vec::new();
        let mut close_values = Vec::new();
        let mut volume_values = Vec::new();
        let mut offsets = vec![0i32];

        for item in data {
            kind_builder.append_value(&item.kind);
            code_builder.append_value(&item.code);
            name_builder.append_value(&item.name);
            sector_builder.append_option(item.sector.as_deref());
            segment_builder.append_option(item.segment.as_deref());

            for daily in &item.daily {
                date_values.push(daily.date);
                close_values.push(daily.close);
                volume_values.push(daily.volume);
            }
            let last = offsets.last().copied().unwrap_or(0);
            offsets.push(last + item.daily.len() as i32);
        }

        let struct_array = StructArray::try_new(
            daily_fields(),
            vec![
                Arc::new(Int32Array::from(date_values)) as ArrayRef,
                Arc::new(Float64Array::from(close_values)) as ArrayRef,
                Arc::new(Int64Array::from(volume_values)) as ArrayRef,
            ],
            None,
        )
        .map_err(arrow_err)?;

        let list_array = ListArray::try_new(
            Arc::new(Field::new("item", DataType::Struct(daily_fields()), false)),
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            Arc::new(struct_array),
            Some(NullBuffer::new_valid(data.len())),
        )
        .map_err(arrow_err)?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(kind_builder.finish()),
            Arc::new(code_builder.finish()),
            Arc::new(name_builder.finish()),
            Arc::new(sector_builder.finish()),
            Arc::new(segment_builder.finish()),
            Arc::new(Float64Array::from(data.iter().map(|d| d.price).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(data.iter().map(|d| d.p_vp).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(data.iter().map(|d| d.dividend_yield).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(data.iter().map(|d| d.daily_liquidity).collect::<Vec<_>>())),
            Arc::new(list_array),
        ];

        RecordBatch::try_new(Arc::new(snapshot_schema()), columns).map_err(arrow_err)
    }

    /// 将快照保存到Arrow文件
    pub fn save_snapshots_to_arrow(data: &[InstrumentSnapshot], path: &str) -> Result<()> {
        info!("Saving {} instruments to {}", data.len(), path);

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let batch = snapshots_to_record_batch(data)?;
        let file = File::create(path)?;
        let mut writer = FileWriter::try_new(file, &batch.schema()).map_err(arrow_err)?;
        writer.write(&batch).map_err(arrow_err)?;
        writer.finish().map_err(arrow_err)?;
        Ok(())
    }

    // 从Arrow文件读取快照
    pub fn read_snapshots_from_arrow(path: &str) -> Result<Vec<InstrumentSnapshot>> {
        read_snapshots(File::open(path)?)
    }

    fn read_snapshots<R: Read + Seek>(source: R) -> Result<Vec<InstrumentSnapshot>> {
        let reader = FileReader::try_new(source, None).map_err(arrow_err)?;
        let mut result = Vec::new();

        for batch in reader {
            let batch = batch.map_err(arrow_err)?;

            let kind = column::<StringArray>(&batch, "kind")?;
            let code = column::<StringArray>(&batch, "code")?;
            let name = column::<StringArray>(&batch, "name")?;
            let sector = column::<StringArray>(&batch, "sector")?;
            let segment = column::<StringArray>(&batch, "segment")?;
            let price = column::<Float64Array>(&batch, "price")?;
            let p_vp = column::<Float64Array>(&batch, "p_vp")?;
            let dividend_yield = column::<Float64Array>(&batch, "dividend_yield")?;
            let liquidity = column::<Int64Array>(&batch, "daily_liquidity")?;
            let daily_array = column::<ListArray>(&batch, "daily")?;

            for i in 0..batch.num_rows() {
                let mut daily = Vec::new();

                if !daily_array.is_null(i) {
                    let daily_list = daily_array.value(i);
                    let daily_struct = daily_list
                        .as_any()
                        .downcast_ref::<StructArray>()
                        .ok_or_else(|| arrow_err("Failed to downcast daily struct"))?;
                    let (Some(dates), Some(closes), Some(volumes)) = (
                        daily_struct.column_by_name("date").and_then(|a| a.as_any().downcast_ref::<Int32Array>()),
                        daily_struct.column_by_name("close").and_then(|a| a.as_any().downcast_ref::<Float64Array>()),
                        daily_struct.column_by_name("volume").and_then(|a| a.as_any().downcast_ref::<Int64Array>()),
                    ) else {
                        return Err(arrow_err("Missing required columns in daily data"));
                    };

                    for j in 0..daily_struct.len() {
                        daily.push(DailyClose {
                            date: dates.value(j),
                            close: closes.value(j),
                            volume: (!volumes.is_null(j)).then(|| volumes.value(j)),
                        });
                    }
                }

                result.push(InstrumentSnapshot {
                    kind: kind.value(i).to_string(),
                    code: code.value(i).to_string(),
                    name: name.value(i).to_string(),
                    sector: (!sector.is_null(i)).then(|| sector.value(i).to_string()),
                    segment: (!segment.is_null(i)).then(|| segment.value(i).to_string()),
                    price: (!price.is_null(i)).then(|| price.value(i)),
                    p_vp: (!p_vp.is_null(i)).then(|| p_vp.value(i)),
                    dividend_yield: (!dividend_yield.is_null(i)).then(|| dividend_yield.value(i)),
                    daily_liquidity: (!liquidity.is_null(i)).then(|| liquidity.value(i)),
                    daily,
                });
            }
        }

        Ok(result)
    }

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
        batch
            .column_by_name(name)
            .and_then(|a| a.as_any().downcast_ref::<T>())
            .ok_or_else(|| arrow_err(format!("Failed to downcast {} column", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::arrow_utils::*;
    use super::*;
    use crate::models::{DailyClose, InstrumentSnapshot};

    #[test]
    fn test_date_int_conversion() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(date_to_int(date), 20240105);
        assert_eq!(date_to_int(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()), 19991231);
    }

    #[test]
    fn test_snapshot_file_keeps_nested_history() {
        let data = vec![
            InstrumentSnapshot {
                kind: "fii".into(),
                code: "HGLG11".into(),
                name: "CSHG Logística".into(),
                sector: None,
                segment: Some("Logística".into()),
                price: Some(160.5),
                p_vp: Some(1.02),
                dividend_yield: None,
                daily_liquidity: Some(1_500_000),
                daily: vec![
                    DailyClose { date: 20240105, close: 160.5, volume: Some(1200) },
                    DailyClose { date: 20240104, close: 159.0, volume: None },
                ],
            },
            InstrumentSnapshot {
                kind: "acao".into(),
                code: "PETR4".into(),
                name: String::new(),
                sector: Some("Petróleo".into()),
                segment: None,
                price: None,
                p_vp: None,
                dividend_yield: None,
                daily_liquidity: None,
                daily: Vec::new(),
            },
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("snapshot.arrow");
        let path = path.to_str().unwrap();
        save_snapshots_to_arrow(&data, path).unwrap();

        let loaded = read_snapshots_from_arrow(path).unwrap();
        assert_eq!(loaded, data);
    }
}
