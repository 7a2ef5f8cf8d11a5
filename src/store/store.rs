use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::StorageError;
use super::format::DataFormat;
use crate::observation::FlightObservation;

/// Append-only file of one flight's observations.
///
/// Every append is written as a single line and synced before it returns, so a
/// crash can only ever leave a torn final line. That line is cut off again the
/// next time the store is opened.
pub struct Store {
    path: PathBuf,
    format: DataFormat,
    flight_id: String,
    file: File,
    records: usize,
    last_captured_at: Option<DateTime<Utc>>,
}

/// Result of reading a flight file.
#[derive(Debug, Default)]
pub struct Scan {
    pub observations: Vec<FlightObservation>,
    /// Byte length of the complete lines.
    pub valid_len: u64,
    /// Bytes after the last line terminator.
    pub torn_bytes: u64,
    pub has_header: bool,
}

pub fn store_path(data_dir: &Path, flight_id: &str, format: DataFormat) -> PathBuf {
    data_dir.join(format!("{}.{}", flight_id, format.extension()))
}

impl Store {
    pub fn open(
        data_dir: &Path,
        flight_id: &str,
        format: DataFormat,
        rebuild: bool,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir)?;
        let path = store_path(data_dir, flight_id, format);

        if rebuild {
            discard(data_dir, flight_id)?;
        } else {
            warn_other_formats(data_dir, flight_id, format);
        }

        let scan = if path.exists() {
            scan_file(&path, format)?
        } else {
            Scan::default()
        };

        if scan.torn_bytes > 0 {
            log::warn!(
                "Dropping {} bytes of an incomplete record at the end of {}",
                scan.torn_bytes,
                path.display()
            );
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        if let Some(other) = scan.observations.iter().find(|o| o.flight_id != flight_id) {
            return Err(StorageError::FlightMismatch {
                expected: flight_id.to_string(),
                found: other.flight_id.clone(),
            });
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let (Some(header), false) = (format.header(), scan.has_header) {
            file.write_all(header.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_data()?;
        }

        let records = scan.observations.len();
        let last_captured_at = scan.observations.last().map(|o| o.captured_at);
        if records > 0 {
            log::info!(
                "Resuming {} with {} stored observations (last at {})",
                path.display(),
                records,
                last_captured_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            );
        } else {
            log::info!("Writing observations to {}", path.display());
        }

        Ok(Self {
            path,
            format,
            flight_id: flight_id.to_string(),
            file,
            records,
            last_captured_at,
        })
    }

    pub fn append(&mut self, observation: &FlightObservation) -> Result<(), StorageError> {
        if observation.flight_id != self.flight_id {
            return Err(StorageError::FlightMismatch {
                expected: self.flight_id.clone(),
                found: observation.flight_id.clone(),
            });
        }
        if let Some(last) = self.last_captured_at {
            if observation.captured_at < last {
                return Err(StorageError::OutOfOrder {
                    last,
                    next: observation.captured_at,
                });
            }
        }

        let line = self.format.encode(observation)?;
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.records += 1;
        self.last_captured_at = Some(observation.captured_at);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn last_captured_at(&self) -> Option<DateTime<Utc>> {
        self.last_captured_at
    }
}

/// Reads all complete records of a flight file, ignoring a torn final line.
pub fn read_observations(
    path: &Path,
    format: DataFormat,
) -> Result<Vec<FlightObservation>, StorageError> {
    Ok(scan_file(path, format)?.observations)
}

pub fn scan_file(path: &Path, format: DataFormat) -> Result<Scan, StorageError> {
    let content = fs::read(path)?;
    let corrupt = |line: usize, reason: String| StorageError::Corrupt {
        path: path.display().to_string(),
        line,
        reason,
    };

    let valid_len = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let text = std::str::from_utf8(&content[..valid_len])
        .map_err(|e| corrupt(0, format!("not utf-8: {}", e)))?;

    let mut scan = Scan {
        valid_len: valid_len as u64,
        torn_bytes: (content.len() - valid_len) as u64,
        ..Scan::default()
    };

    for (idx, line) in text.lines().enumerate() {
        let number = idx + 1;
        if idx == 0 {
            if let Some(header) = format.header() {
                if line != header {
                    return Err(corrupt(number, "unexpected header".to_string()));
                }
                scan.has_header = true;
                continue;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let observation = format.decode(line).map_err(|e| corrupt(number, e))?;
        if let Some(previous) = scan.observations.last() {
            if observation.captured_at < previous.captured_at {
                return Err(corrupt(
                    number,
                    format!(
                        "captured_at {} precedes {}",
                        observation.captured_at, previous.captured_at
                    ),
                ));
            }
        }
        scan.observations.push(observation);
    }

    Ok(scan)
}

fn discard(data_dir: &Path, flight_id: &str) -> Result<(), StorageError> {
    for format in [DataFormat::Json, DataFormat::Csv] {
        let path = store_path(data_dir, flight_id, format);
        if path.exists() {
            log::info!("Rebuilding: removing {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn warn_other_formats(data_dir: &Path, flight_id: &str, format: DataFormat) {
    for other in [DataFormat::Json, DataFormat::Csv] {
        if other != format && store_path(data_dir, flight_id, other).exists() {
            log::warn!(
                "Flight {} already has {} data; new observations go to a separate {} file",
                flight_id,
                other,
                format
            );
        }
    }
}
