// 公开导出的模块，供外部使用
pub mod models;
pub mod data_provider;
pub mod errors;
pub mod store;

pub mod config;
pub mod extract;
pub mod mapper;
pub mod parser;
pub mod scrapers;
pub mod services;
pub mod util;

// 重新导出常用类型，方便使用
pub use config::Config;
pub use data_provider::{InstrumentDataProvider, InstrumentQuery, OrderBy};
pub use errors::{DataHubError, Result};
pub use models::{Field, Instrument, InstrumentKind, InstrumentUpdate, SeriesKind, SeriesPoint};
pub use store::{MemoryStore, SqliteStore, Store};
