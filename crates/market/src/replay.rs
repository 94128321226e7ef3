use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use common::{Error, Result, Tick, TradeSide};

/// Ticks parsed from one historical dataset.
#[derive(Debug, Clone, Default)]
pub struct ReplayData {
    pub ticks: Vec<Tick>,
    /// Rows dropped because a field failed to parse.
    pub skipped: usize,
}

struct Columns {
    timestamp: usize,
    price: usize,
    volume: usize,
    is_ask: usize,
}

impl Columns {
    fn locate(header: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|col| col.trim().eq_ignore_ascii_case(name))
        };
        match (find("timestamp"), find("price"), find("volume"), find("is_ask")) {
            (Some(timestamp), Some(price), Some(volume), Some(is_ask)) => Ok(Self {
                timestamp,
                price,
                volume,
                is_ask,
            }),
            _ => Err(Error::Parse(
                "missing required columns (timestamp, price, volume, is_ask)".into(),
            )),
        }
    }
}

/// Read a CSV dataset with `timestamp` (RFC 3339), `price`, `volume` and
/// `is_ask` columns, in any order.
///
/// Failing to open or read the file is an error. Rows with an unparseable
/// field are skipped with a warning.
pub fn read_ticks(path: impl AsRef<Path>) -> Result<ReplayData> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading historical data");

    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let columns = Columns::locate(reader.headers()?)?;
    let mut data = ReplayData::default();

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(line = line + 2, error = %e, "Skipping malformed CSV row");
                data.skipped += 1;
                continue;
            }
        };
        match parse_row(&record, &columns) {
            Ok(tick) => data.ticks.push(tick),
            Err(e) => {
                warn!(line = line + 2, error = %e, "Skipping invalid row");
                data.skipped += 1;
            }
        }
    }

    info!(
        loaded = data.ticks.len(),
        skipped = data.skipped,
        "Loaded historical data points"
    );
    Ok(data)
}

fn parse_row(record: &csv::StringRecord, cols: &Columns) -> Result<Tick> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .ok_or_else(|| Error::Parse(format!("missing {name} field")))
    };

    let raw = field(cols.timestamp, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| Error::Parse(format!("invalid timestamp format: {raw}")))?
        .with_timezone(&Utc);

    let raw = field(cols.price, "price")?;
    let price: f64 = raw
        .parse()
        .map_err(|_| Error::Parse(format!("invalid price: {raw}")))?;

    let raw = field(cols.volume, "volume")?;
    let volume: f64 = raw
        .parse()
        .map_err(|_| Error::Parse(format!("invalid volume: {raw}")))?;

    let raw = field(cols.is_ask, "is_ask")?;
    let is_ask =
        parse_bool(raw).ok_or_else(|| Error::Parse(format!("invalid is_ask value: {raw}")))?;

    Tick::checked(price, volume, TradeSide::from_is_ask(is_ask), timestamp)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Sorted list of `*.csv` files directly under `dir`.
pub fn list_datasets(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "data directory does not exist: {}",
            dir.display()
        )));
    }

    let mut datasets = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            datasets.push(path);
        }
    }
    datasets.sort();
    Ok(datasets)
}
