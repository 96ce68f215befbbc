use ibovespa_datahub::config::Config;
use ibovespa_datahub::data_provider::{InstrumentDataProvider, InstrumentQuery};
use ibovespa_datahub::models::{ClassificationKind, Field, InstrumentKind, SeriesKind, Value};
use ibovespa_datahub::scrapers::FiiScraper;
use ibovespa_datahub::services::{DataService, Target};
use ibovespa_datahub::store::{MemoryStore, SqliteStore, Store};
use mockito::{Matcher, Server};
use rust_decimal_macros::dec;
use tempfile::tempdir;

const LISTING: &str = r#"<html><body>
<table id="tabelaResultado">
  <thead><tr><th>Papel</th><th>P/VP</th><th>Segmento</th><th>Liquidez</th></tr></thead>
  <tbody>
    <tr><td><a href="detalhes.php?papel=ABCD11">ABCD11</a></td><td>1,05</td><td>Logística</td><td>1.500.000</td></tr>
  </tbody>
</table>
</body></html>"#;

const CHARTS: &str = r#"<script>
  labelsRendimento.push(1704067200000); dataSerieRendimento.push(0.85);
  labelsRendimento.push(1706745600000); dataSerieRendimento.push(0.90);
  var dataSerieDividendYield = [[1704067200000, 0.72], [1706745600000, 0.75]];
</script>"#;

fn fund() -> InstrumentKind {
    InstrumentKind::RealEstateFund
}

#[test]
fn listing_row_becomes_one_instrument() {
    let mut server = Server::new();
    server
        .mock("GET", "/fii_resultado.php")
        .with_status(200)
        .with_body(LISTING)
        .create();

    let config = Config::new().with_base_url(&server.url());
    let scraper = FiiScraper::new(&config).unwrap();
    let mut service = DataService::new(config, Box::new(scraper), MemoryStore::new());

    let summary = service.run_base(&Target::All).unwrap();
    assert_eq!((summary.succeeded, summary.attempted), (1, 1));

    let store = service.into_store();
    assert_eq!(store.instrument_count(), 1);
    let instrument = store.get_instrument("ABCD11", fund()).unwrap().unwrap();
    assert_eq!(instrument.decimal(Field::PriceToBook), Some(dec!(1.05)));
    assert_eq!(instrument.segment.as_ref().map(|c| c.name.as_str()), Some("Logística"));
    assert_eq!(instrument.get(Field::DailyLiquidity), Some(&Value::Integer(1_500_000)));
}

#[test]
fn invalid_code_is_rejected_before_any_request() {
    assert!(Target::parse("ABCD1", fund()).is_err());
    assert!(Target::parse("ABCD11", InstrumentKind::Stock).is_ok());
    assert!(Target::parse("PETR4", fund()).is_err());
}

#[test]
fn base_and_log_runs_persist_to_sqlite() {
    let mut server = Server::new();
    server
        .mock("GET", "/fii_resultado.php")
        .with_status(200)
        .with_body(LISTING)
        .create();
    server
        .mock("GET", "/amline/cot_hist.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"var cotacoes = [{"Data": "2024-01-04", "Preco": "97,10", "Volume": "1.500"}, {"Data": "05/01/2024", "Preco": "98,40"}, {"Data": "ontem", "Preco": "1"}];"#)
        .create();
    server
        .mock("GET", "/fii_graficos.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(CHARTS)
        .create();

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("data").join("ibovespa.sqlite");
    let config = Config::new()
        .with_base_url(&server.url())
        .with_db_path(db_path.to_str().unwrap());

    {
        let store = SqliteStore::open(&config.db_path).unwrap();
        let scraper = FiiScraper::new(&config).unwrap();
        let mut service = DataService::new(config, Box::new(scraper), store);

        service.run_base(&Target::All).unwrap();
        let summary = service.run_log(&Target::Code("ABCD11".into())).unwrap();
        assert_eq!(summary.succeeded, 1);

        let again = service.update_log("ABCD11").unwrap();
        assert_eq!(again.history.inserted, 0);
        assert_eq!(again.history.updated, 2);
        assert_eq!(again.history.dropped, 1);
    }

    // reopen: everything is on disk
    let store = SqliteStore::open(db_path.to_str().unwrap()).unwrap();
    let provider = InstrumentDataProvider::new(&store);

    let found = provider.list(&InstrumentQuery::new().with_segment("logística")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(provider.classifications(ClassificationKind::Segment).unwrap().len(), 1);

    let history = provider.series("ABCD11", fund(), SeriesKind::ClosingPrice, None).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].value, dec!(97.10));
    assert_eq!(history[0].volume, Some(1500));
    assert_eq!(history[1].value, dec!(98.40));

    let distributions = provider.series("ABCD11", fund(), SeriesKind::Distribution, None).unwrap();
    assert_eq!(distributions.iter().map(|p| p.value).collect::<Vec<_>>(), vec![dec!(0.85), dec!(0.90)]);
    let dy = provider.series("ABCD11", fund(), SeriesKind::DividendYield, None).unwrap();
    assert_eq!(dy.len(), 2);
}
