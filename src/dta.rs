//! Reading and writing potentiostat DTA measurement files.
//!
//! A DTA file is tab-delimited text: a fixed-size block of header lines
//! followed by the data rows. Three header lines matter here (the date
//! stamp, the time stamp and the chronopotentiometric charging time),
//! each sitting at a fixed line position with the value in the third
//! tab-delimited field. Data rows carry the elapsed time in seconds and
//! the cell voltage in two fixed column positions; everything else is
//! ignored.
//!
//! Files are written incrementally by the instrument while the experiment
//! runs, so "missing", "still header-only" and "no data rows yet" are
//! not-yet-ready conditions rather than errors; [`DtaError::is_not_ready`]
//! classifies them for the polling loop. A structurally complete file
//! with corrupt header metadata is fatal: date, time and charging time
//! feed every downstream computation, and guessing them would silently
//! produce wrong records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::trace::Sample;

/// Number of header lines preceding the data block.
pub const HEADER_LINES: usize = 64;
/// Zero-based header line carrying the date stamp.
pub const DATE_LINE: usize = 3;
/// Zero-based header line carrying the time stamp.
pub const TIME_LINE: usize = 4;
/// Zero-based header line carrying the charging time in seconds.
pub const CHARGING_LINE: usize = 11;

/// Tab-delimited field holding the value on a metadata line.
const STAMP_FIELD: usize = 2;
/// Data column holding elapsed time in seconds.
const TIME_COLUMN: usize = 2;
/// Data column holding the cell voltage.
const VOLTAGE_COLUMN: usize = 3;

/// Timestamp layout used by the instrument, e.g. `10/27/2020 15:00:00`.
const STAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Errors raised while reading a DTA file.
#[derive(Debug, thiserror::Error)]
pub enum DtaError {
    /// I/O error reading the file.
    #[error("failed to read measurement file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV-level parsing error in the data block.
    #[error("malformed data block: {0}")]
    Csv(#[from] csv::Error),

    /// The file exists but holds no complete data rows yet.
    #[error("measurement file has no data rows yet")]
    Empty,

    /// A required header line or field is absent.
    #[error("missing header field: line {line}, field {field}")]
    MissingHeaderField {
        /// Zero-based header line index.
        line: usize,
        /// Zero-based tab-delimited field index.
        field: usize,
    },

    /// A numeric field failed to parse.
    #[error("invalid number {value:?} on line {line}")]
    InvalidNumber {
        /// Zero-based line index in the file.
        line: usize,
        /// The offending text.
        value: String,
    },

    /// The date/time stamps do not form a valid timestamp.
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        /// The combined date/time text.
        value: String,
        /// Underlying chrono error.
        source: chrono::ParseError,
    },
}

impl DtaError {
    /// Whether this condition means "poll again later" rather than
    /// "abort the run".
    pub fn is_not_ready(&self) -> bool {
        match self {
            DtaError::Empty => true,
            DtaError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Metadata extracted from the fixed header lines.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementHeader {
    /// Date stamp as written by the instrument, e.g. `10/27/2020`.
    pub date: String,
    /// Time stamp as written by the instrument, e.g. `15:00:00`.
    pub time: String,
    /// Chronopotentiometric charging time in seconds.
    pub charging_time: f64,
}

impl MeasurementHeader {
    /// Combine the date and time stamps into a timestamp.
    pub fn timestamp(&self) -> Result<NaiveDateTime, DtaError> {
        let value = format!("{} {}", self.date, self.time);
        NaiveDateTime::parse_from_str(&value, STAMP_FORMAT)
            .map_err(|source| DtaError::InvalidTimestamp { value, source })
    }
}

/// One parsed measurement file.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Header metadata.
    pub header: MeasurementHeader,
    /// Raw samples in file order.
    pub samples: Vec<Sample>,
}

/// Read and parse one measurement file.
pub fn read_measurement<P: AsRef<Path>>(path: P) -> Result<Measurement, DtaError> {
    let content = std::fs::read_to_string(path)?;
    parse_measurement(&content)
}

/// Parse measurement text (header block + data rows).
pub fn parse_measurement(content: &str) -> Result<Measurement, DtaError> {
    let header_lines: Vec<&str> = content.lines().take(HEADER_LINES).collect();
    if header_lines.len() < HEADER_LINES {
        // Header still streaming out of the instrument.
        return Err(DtaError::Empty);
    }

    let date = header_field(&header_lines, DATE_LINE)?.to_string();
    let time = header_field(&header_lines, TIME_LINE)?.to_string();
    let charging_raw = header_field(&header_lines, CHARGING_LINE)?;
    let charging_time = charging_raw
        .trim()
        .parse::<f64>()
        .map_err(|_| DtaError::InvalidNumber {
            line: CHARGING_LINE,
            value: charging_raw.to_string(),
        })?;

    // Locate the data block: skip past HEADER_LINES newlines.
    let mut data_start = 0usize;
    for _ in 0..HEADER_LINES {
        match content[data_start..].find('\n') {
            Some(i) => data_start += i + 1,
            None => return Err(DtaError::Empty),
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(content[data_start..].as_bytes());

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() <= VOLTAGE_COLUMN {
            // Short row: either a section separator or a partially
            // written trailing line. Skip it.
            continue;
        }
        let line = HEADER_LINES + row;
        let time = parse_field(&record, TIME_COLUMN, line)?;
        let voltage = parse_field(&record, VOLTAGE_COLUMN, line)?;
        samples.push(Sample::new(time, voltage));
    }

    if samples.is_empty() {
        return Err(DtaError::Empty);
    }

    Ok(Measurement {
        header: MeasurementHeader {
            date,
            time,
            charging_time,
        },
        samples,
    })
}

fn header_field<'a>(lines: &[&'a str], line: usize) -> Result<&'a str, DtaError> {
    let field = lines
        .get(line)
        .and_then(|l| l.split('\t').nth(STAMP_FIELD))
        .map(str::trim)
        .filter(|f| !f.is_empty());
    field.ok_or(DtaError::MissingHeaderField {
        line,
        field: STAMP_FIELD,
    })
}

fn parse_field(record: &csv::StringRecord, column: usize, line: usize) -> Result<f64, DtaError> {
    let raw = record.get(column).unwrap_or_default().trim();
    raw.parse::<f64>().map_err(|_| DtaError::InvalidNumber {
        line,
        value: raw.to_string(),
    })
}

/// Write a measurement file in the instrument's layout.
///
/// Used by the demo generator and tests; the header block is padded with
/// placeholder lines so the stamps land at their fixed positions.
pub fn write_measurement<P: AsRef<Path>>(
    path: P,
    header: &MeasurementHeader,
    samples: &[Sample],
) -> Result<(), DtaError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    for line in 0..HEADER_LINES {
        match line {
            DATE_LINE => writeln!(out, "DATE\tLABEL\t{}\tDate", header.date)?,
            TIME_LINE => writeln!(out, "TIME\tLABEL\t{}\tTime", header.time)?,
            CHARGING_LINE => writeln!(
                out,
                "TCHARGE\tQUANT\t{}\tCharging Time (s)",
                header.charging_time
            )?,
            _ => writeln!(out, "HEADER{line}\tLABEL\t-")?,
        }
    }
    for (i, sample) in samples.iter().enumerate() {
        writeln!(out, "CURVE\t{i}\t{:.6}\t{:.8}", sample.time, sample.voltage)?;
    }
    out.flush()?;
    Ok(())
}
