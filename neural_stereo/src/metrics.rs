//! Scalar metric sinks.
//!
//! Training and validation write `(tag, value, step)` triples; the step is a
//! global counter, not the batch index within an epoch. Sinks are append-only.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Scalar tags written by the training loop.
pub mod tags {
    /// Composed training loss per step.
    pub const TRAIN_LOSS: &str = "Train loss";
    /// Finest-head training error per step.
    pub const TRAIN_EPE: &str = "Train EPE";
    /// Average finest-head training error per epoch.
    pub const TRAIN_EPOCH_EPE: &str = "Train Epoch EPE";
    /// End-point-error per validation step.
    pub const VALIDATION_EPE: &str = "Validation EPE";
    /// 3-pixel error per validation step.
    pub const VALIDATION_3PX: &str = "Validation 3px error";
    /// Average end-point-error per epoch.
    pub const VALIDATION_EPOCH_EPE: &str = "Validation Epoch EPE";
    /// Average 3-pixel error per epoch.
    pub const VALIDATION_EPOCH_3PX: &str = "Validation Epoch 3px error";
}

/// Destination for scalar time series.
pub trait MetricsSink {
    /// Append one scalar.
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()>;

    /// Flush buffered records.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for &mut S {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        (**self).add_scalar(tag, value, step)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for Box<S> {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        (**self).add_scalar(tag, value, step)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// One row of a scalar log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    /// Series name.
    pub tag: String,
    /// Value.
    pub value: f64,
    /// Global step index.
    pub step: u64,
}

/// Appends scalars to `scalars.csv` in a log directory.
///
/// An existing file is extended, so a resumed run keeps its history.
#[derive(Debug)]
pub struct CsvScalarWriter {
    writer: csv::Writer<fs::File>,
    path: PathBuf,
}

impl CsvScalarWriter {
    /// File name inside the log directory.
    pub const FILE_NAME: &'static str = "scalars.csv";

    /// Open (or create) `dir/scalars.csv`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        Ok(Self { writer, path })
    }

    /// Open the writer for `experiment` under `log_root`.
    pub fn for_experiment(log_root: impl AsRef<Path>, experiment: &str) -> Result<Self> {
        Self::create(log_root.as_ref().join(experiment))
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for CsvScalarWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.writer.serialize(ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
        })?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps scalars in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<ScalarRecord>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in write order.
    pub fn records(&self) -> &[ScalarRecord] {
        &self.records
    }

    /// `(step, value)` pairs of one series.
    pub fn series(&self, tag: &str) -> Vec<(u64, f64)> {
        self.records
            .iter()
            .filter(|r| r.tag == tag)
            .map(|r| (r.step, r.value))
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.records.push(ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(path: &Path) -> Vec<ScalarRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.deserialize().collect::<std::result::Result<_, _>>().unwrap()
    }

    #[test]
    fn test_csv_writer_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut sink = CsvScalarWriter::for_experiment(dir.path(), "run").unwrap();
        sink.add_scalar(tags::TRAIN_LOSS, 1.5, 1).unwrap();
        let path = sink.path().to_path_buf();
        drop(sink);

        let mut sink = CsvScalarWriter::for_experiment(dir.path(), "run").unwrap();
        sink.add_scalar(tags::VALIDATION_3PX, 0.25, 1).unwrap();
        drop(sink);

        let records = read_back(&path);
        assert_eq!(path, dir.path().join("run").join("scalars.csv"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "Train loss");
        assert_eq!(records[1].value, 0.25);
    }

    #[test]
    fn test_memory_sink_series() {
        fn write(mut sink: impl MetricsSink) {
            sink.add_scalar(tags::TRAIN_EPE, 2.0, 1).unwrap();
            sink.add_scalar(tags::TRAIN_LOSS, 3.0, 1).unwrap();
            sink.add_scalar(tags::TRAIN_EPE, 1.0, 2).unwrap();
        }

        let mut sink = MemorySink::new();
        write(&mut sink);

        assert_eq!(sink.series(tags::TRAIN_EPE), vec![(1, 2.0), (2, 1.0)]);
        assert_eq!(sink.records().len(), 3);
    }
}
