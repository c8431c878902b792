// SPDX-License-Identifier: MIT
//! Terminal sinks for the processor chain.
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use super::layer::INTERNAL_TARGET;
use super::processor::TelemetrySink;
use super::record::TelemetryRecord;

/// Writes every exported record as one JSON document per line.
pub struct JsonLinesExporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesExporter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Append to `path`, creating the file if needed.
    pub fn file(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(io::LineWriter::new(file)))
    }

    fn write_record(&self, record: &TelemetryRecord) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl TelemetrySink for JsonLinesExporter {
    fn export(&self, record: TelemetryRecord) {
        if let Err(e) = self.write_record(&record) {
            tracing::warn!(target: INTERNAL_TARGET, error = %e, kind = record.kind(), "failed to export telemetry record");
        }
    }
}

/// Collects exported records in memory.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

#[cfg(test)]
impl MemorySink {
    pub(crate) fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TelemetrySink for MemorySink {
    fn export(&self, record: TelemetryRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let buffer = SharedBuffer::default();
        let exporter = JsonLinesExporter::new(buffer.clone());

        exporter.export(TelemetryRecord::request("GET /status", "404", Duration::from_millis(4)));
        exporter.export(TelemetryRecord::event("clicked").with_property("customProp", "customValue"));

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "request");
        assert_eq!(lines[0]["response_code"], "404");
        assert_eq!(lines[1]["kind"], "event");
        assert_eq!(lines[1]["properties"]["customProp"], "customValue");
    }

    #[test]
    fn write_failures_do_not_propagate() {
        let exporter = JsonLinesExporter::new(BrokenPipe);
        exporter.export(TelemetryRecord::event("lost"));
    }
}
