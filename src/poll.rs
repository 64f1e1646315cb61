//! Blocking wait-for-file polling.
//!
//! The instrument writes measurement files on its own schedule, so the
//! driver simply waits: read the file, and if it is missing or has no
//! complete data rows yet, sleep and try again. The loop is unbounded:
//! the producing process is known to terminate and the operator controls
//! the run. Anything other than a not-ready condition propagates
//! immediately.

use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use crate::dta::{self, DtaError, Measurement};

/// Polls for measurement files until they are readable and non-empty.
#[derive(Debug, Clone)]
pub struct AcquisitionPoller {
    reset_time: Duration,
}

impl AcquisitionPoller {
    /// Create a poller that sleeps `reset_time` between attempts.
    pub fn new(reset_time: Duration) -> Self {
        Self { reset_time }
    }

    /// Block until `path` parses as a non-empty measurement.
    ///
    /// Not-ready conditions (missing file, header still streaming, no
    /// data rows) trigger another round; fatal parse errors are returned
    /// to the caller.
    pub fn wait_for<P: AsRef<Path>>(&self, path: P) -> Result<Measurement, DtaError> {
        let path = path.as_ref();
        let mut attempts: u64 = 0;
        loop {
            match dta::read_measurement(path) {
                Ok(measurement) => {
                    info!(
                        "read {} ({} samples{})",
                        path.display(),
                        measurement.samples.len(),
                        if attempts > 0 {
                            format!(", after {attempts} polls")
                        } else {
                            String::new()
                        }
                    );
                    return Ok(measurement);
                }
                Err(err) if err.is_not_ready() => {
                    attempts += 1;
                    debug!(
                        "{} not ready ({err}), sleeping {:?}",
                        path.display(),
                        self.reset_time
                    );
                    std::thread::sleep(self.reset_time);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dta::MeasurementHeader;
    use crate::trace::Sample;

    #[test]
    fn returns_immediately_when_the_file_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A_DBRE_#1.DTA");
        let header = MeasurementHeader {
            date: "10/27/2020".to_string(),
            time: "15:00:00".to_string(),
            charging_time: 3.0,
        };
        let samples: Vec<Sample> = (0..10).map(|i| Sample::new(i as f64, -1.2)).collect();
        dta::write_measurement(&path, &header, &samples).unwrap();

        let poller = AcquisitionPoller::new(Duration::from_millis(1));
        let measurement = poller.wait_for(&path).unwrap();
        assert_eq!(measurement.samples.len(), 10);
    }

    #[test]
    fn waits_out_a_late_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A_DBRE_#2.DTA");

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            let header = MeasurementHeader {
                date: "10/27/2020".to_string(),
                time: "16:00:00".to_string(),
                charging_time: 3.0,
            };
            let samples: Vec<Sample> = (0..5).map(|i| Sample::new(i as f64, -1.0)).collect();
            dta::write_measurement(&writer_path, &header, &samples).unwrap();
        });

        let poller = AcquisitionPoller::new(Duration::from_millis(5));
        let measurement = poller.wait_for(&path).unwrap();
        assert_eq!(measurement.samples.len(), 5);
        writer.join().unwrap();
    }

    #[test]
    fn fatal_header_corruption_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A_DBRE_#3.DTA");
        // 64 header lines with no value on the date line, plus one data row.
        let mut content = String::new();
        for _ in 0..crate::dta::HEADER_LINES {
            content.push_str("HEADER\tLABEL\n");
        }
        content.push_str("CURVE\t0\t0.1\t-0.8\n");
        std::fs::write(&path, content).unwrap();

        let poller = AcquisitionPoller::new(Duration::from_millis(1));
        let err = poller.wait_for(&path).unwrap_err();
        assert!(matches!(err, DtaError::MissingHeaderField { .. }));
    }
}
