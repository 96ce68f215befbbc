use ibovespa_datahub::config::Config;
use ibovespa_datahub::data_provider::{InstrumentDataProvider, InstrumentQuery, OrderBy};
use ibovespa_datahub::models::{Field, InstrumentKind, InstrumentSnapshot, SeriesKind};
use ibovespa_datahub::scrapers::scraper_for;
use ibovespa_datahub::services::{DataService, RunSummary, Target};
use ibovespa_datahub::store::SqliteStore;
use ibovespa_datahub::util::arrow_utils;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{App, Arg, ArgMatches, SubCommand};
use log::info;
use std::time::Duration;

fn kind_arg() -> Arg<'static> {
    Arg::with_name("kind")
        .short('k')
        .long("kind")
        .value_name("KIND")
        .help("Instrument kind (fii, acao)")
        .takes_value(true)
}

fn target_args(app: App<'static>, default_delay: &'static str) -> App<'static> {
    app.arg(
        Arg::with_name("target")
            .value_name("CODE|ALL")
            .help("Instrument code, or ALL/TUDO for every known code")
            .required(true)
            .index(1),
    )
    .arg(kind_arg().default_value("fii"))
    .arg(
        Arg::with_name("delay")
            .long("delay")
            .value_name("SECS")
            .help("Pause between requests, in seconds")
            .takes_value(true)
            .default_value(default_delay),
    )
}

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let app = App::new("ibovespa_datahub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scrapes and normalizes B3 stock and real-estate fund data")
        .arg(
            Arg::with_name("db")
                .long("db")
                .value_name("PATH")
                .help("SQLite database path")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Upstream site")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Per-request timeout")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("debug")
                .long("debug")
                .help("Enable debug mode")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("debug-limit")
                .long("debug-limit")
                .help("Limit the number of instruments to process in debug mode")
                .takes_value(true)
                .default_value("10"),
        )
        .subcommand(target_args(
            SubCommand::with_name("base").about("Update names, classifications and indicators"),
            "0",
        ))
        .subcommand(target_args(
            SubCommand::with_name("log").about("Download price history, distributions and dividend yield"),
            "0.2",
        ))
        .subcommand(
            SubCommand::with_name("explore")
                .about("Explore stored data")
                .arg(kind_arg())
                .arg(Arg::with_name("search").long("search").value_name("TEXT").takes_value(true))
                .arg(Arg::with_name("sector").long("sector").value_name("NAME").takes_value(true))
                .arg(Arg::with_name("segment").long("segment").value_name("NAME").takes_value(true))
                .arg(
                    Arg::with_name("order")
                        .long("order")
                        .value_name("FIELD")
                        .help("code, name, price or p_vp; prefix with - for descending")
                        .takes_value(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("limit")
                        .short('l')
                        .long("limit")
                        .value_name("LIMIT")
                        .help("Limit the number of records to display")
                        .takes_value(true)
                        .default_value("10"),
                )
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("CODE")
                        .help("Show one instrument and its series")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("series")
                        .long("series")
                        .value_name("SERIES")
                        .help("historico, rendimentos or dy")
                        .takes_value(true)
                        .default_value("historico"),
                )
                .arg(
                    Arg::with_name("since")
                        .long("since")
                        .value_name("YYYY-MM-DD")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("export")
                .about("Write an Arrow snapshot of instruments with their price history")
                .arg(kind_arg())
                .arg(
                    Arg::with_name("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .takes_value(true),
                ),
        );

    let matches = app.get_matches();
    let config = build_config(&matches)?;

    match matches.subcommand() {
        Some(("base", sub)) => {
            let summary = run_batch(config, sub, |service, target| service.run_base(target))?;
            report(&summary);
        }
        Some(("log", sub)) => {
            let summary = run_batch(config, sub, |service, target| service.run_log(target))?;
            report(&summary);
        }
        Some(("explore", sub)) => explore(&config, sub)?,
        Some(("export", sub)) => export(&config, sub)?,
        _ => info!("No command specified. Use --help for usage information."),
    }

    Ok(())
}

fn build_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = Config::new().with_debug_mode(matches.is_present("debug"));

    if let Some(limit) = matches.value_of("debug-limit") {
        config = config.with_debug_limit(limit.parse().context("--debug-limit must be a number")?);
    }
    if let Some(db) = matches.value_of("db") {
        config = config.with_db_path(db);
    }
    if let Some(url) = matches.value_of("base-url") {
        config = config.with_base_url(url);
    }
    if let Some(timeout) = matches.value_of("timeout") {
        config = config.with_request_timeout(seconds(timeout, "--timeout")?);
    }
    Ok(config)
}

fn seconds(raw: &str, flag: &str) -> anyhow::Result<Duration> {
    let secs: f64 = raw.parse().with_context(|| format!("{} must be a number of seconds", flag))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("{} must be a non-negative number of seconds", flag);
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_kind(matches: &ArgMatches) -> anyhow::Result<Option<InstrumentKind>> {
    Ok(match matches.value_of("kind") {
        Some(kind) => Some(InstrumentKind::parse(kind)?),
        None => None,
    })
}

fn run_batch<F>(config: Config, matches: &ArgMatches, run: F) -> anyhow::Result<RunSummary>
where
    F: FnOnce(&mut DataService<SqliteStore>, &Target) -> ibovespa_datahub::Result<RunSummary>,
{
    let kind = parse_kind(matches)?.unwrap_or(InstrumentKind::RealEstateFund);
    // 先校验参数，再做任何网络请求
    let target = Target::parse(matches.value_of("target").unwrap_or_default(), kind)?;
    let delay = seconds(matches.value_of("delay").unwrap_or("0"), "--delay")?;
    let config = config.with_request_delay(delay);

    let store = SqliteStore::open(&config.db_path)?;
    let scraper = scraper_for(kind, &config)?;
    let mut service = DataService::new(config, scraper, store);
    Ok(run(&mut service, &target)?)
}

fn report(summary: &RunSummary) {
    println!("Processed {} of {}", summary.succeeded, summary.attempted);
    for (code, error) in &summary.failures {
        println!("  {}: {}", code, error);
    }
}

fn explore(config: &Config, matches: &ArgMatches) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db_path)?;
    let provider = InstrumentDataProvider::new(&store);
    let kind = parse_kind(matches)?;
    let limit: usize = matches
        .value_of("limit")
        .unwrap_or("10")
        .parse()
        .context("--limit must be a number")?;

    if let Some(symbol) = matches.value_of("symbol") {
        let Some(instrument) = provider.get_instrument(symbol, kind)? else {
            bail!("{} not found", symbol.trim().to_uppercase());
        };
        let series = SeriesKind::parse(matches.value_of("series").unwrap_or("historico"))
            .context("--series must be historico, rendimentos or dy")?;
        let since = matches
            .value_of("since")
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()
            .context("--since must be YYYY-MM-DD")?;

        println!("{} ({}) - {}", instrument.name, instrument.code, instrument.kind);
        if let Some(sector) = &instrument.sector {
            println!("  setor: {}", sector.name);
        }
        if let Some(segment) = &instrument.segment {
            println!("  segmento: {}", segment.name);
        }
        for (field, value) in &instrument.values {
            println!("  {}: {}", field.column_name(), value);
        }

        let points = provider.series(&instrument.code, instrument.kind, series, since)?;
        println!("{:-<40}", "");
        println!("{:<12} {:<14} {:<15}", "Date", series.as_str(), "Volume");
        println!("{:-<40}", "");
        // 最近的记录
        for point in points.iter().rev().take(limit) {
            let volume = point.volume.map(|v| v.to_string()).unwrap_or_default();
            println!("{:<12} {:<14} {:<15}", point.date, point.value, volume);
        }
        if points.len() > limit {
            println!("... and {} more records", points.len() - limit);
        } else if points.is_empty() {
            println!("No {} data available", series);
        }
        return Ok(());
    }

    let mut query = InstrumentQuery::new();
    query.kind = kind;
    if let Some(search) = matches.value_of("search") {
        query = query.with_search(search);
    }
    if let Some(sector) = matches.value_of("sector") {
        query = query.with_sector(sector);
    }
    if let Some(segment) = matches.value_of("segment") {
        query = query.with_segment(segment);
    }
    if let Some(order) = matches.value_of("order") {
        query = query.with_order(OrderBy::parse(order)?);
    }

    let instruments = provider.list(&query)?;
    info!("Found {} instruments", instruments.len());

    println!(
        "{:<8} {:<5} {:<30} {:<20} {:>10} {:>8}",
        "Code", "Kind", "Name", "Segment", "Price", "P/VP"
    );
    println!("{:-<86}", "");
    for instrument in instruments.iter().take(limit) {
        let classification = instrument
            .segment
            .as_ref()
            .or(instrument.sector.as_ref())
            .map(|c| c.name.as_str())
            .unwrap_or("");
        let decimal = |field| instrument.decimal(field).map(|d| d.to_string()).unwrap_or_default();
        println!(
            "{:<8} {:<5} {:<30.30} {:<20.20} {:>10} {:>8}",
            instrument.code,
            instrument.kind.as_str(),
            instrument.name,
            classification,
            decimal(Field::Price),
            decimal(Field::PriceToBook)
        );
    }
    if instruments.len() > limit {
        println!("... and {} more", instruments.len() - limit);
    }
    Ok(())
}

fn export(config: &Config, matches: &ArgMatches) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db_path)?;
    let provider = InstrumentDataProvider::new(&store);
    let kind = parse_kind(matches)?;

    let default_output = format!("{}/ibovespa.arrow", config.data_dir);
    let output = matches.value_of("output").unwrap_or(&default_output);

    let snapshots: Vec<InstrumentSnapshot> = provider
        .instruments_with_history(kind)?
        .iter()
        .map(|(instrument, history)| InstrumentSnapshot::from_instrument(instrument, history))
        .collect();

    arrow_utils::save_snapshots_to_arrow(&snapshots, output)?;
    // 读回校验
    let written = arrow_utils::read_snapshots_from_arrow(output)?;
    println!("Exported {} instruments to {}", written.len(), output);
    Ok(())
}
