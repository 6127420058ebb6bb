use super::error::ExportError;
use super::naming::partial_path;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a successful filter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub lines_scanned: usize,
    pub lines_matched: usize,
}

/// Copies the lines of a source log that contain a date token into a new file.
///
/// Runs synchronously and is meant to be called from a blocking context.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Extra time spent before reading the source, simulating a slow export.
    processing_delay: Duration,
}

impl LogFilter {
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }

    /// Streams `source` line by line and writes the lines containing `date`
    /// to `target`, in their original order.
    ///
    /// The output is written to a partial file next to `target` and renamed
    /// once complete, so `target` only ever exists fully written.
    pub fn run(
        &self,
        source: &Path,
        target: &Path,
        date: &str,
    ) -> Result<FilterReport, ExportError> {
        if !self.processing_delay.is_zero() {
            std::thread::sleep(self.processing_delay);
        }

        let source_file = File::open(source).map_err(|e| ExportError::SourceUnavailable {
            path: source.to_path_buf(),
            source: e,
        })?;

        let partial = partial_path(target);
        let result = write_matching_lines(BufReader::new(source_file), &partial, date.as_bytes())
            .and_then(|report| {
                fs::rename(&partial, target)?;
                Ok(report)
            });

        match result {
            Ok(report) => {
                debug!(
                    "Filtered {} of {} lines into {:?}",
                    report.lines_matched, report.lines_scanned, target
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial export {:?}: {}", partial, cleanup);
                    }
                }
                Err(e)
            }
        }
    }
}

fn write_matching_lines(
    mut reader: impl BufRead,
    partial: &Path,
    needle: &[u8],
) -> Result<FilterReport, ExportError> {
    let mut writer = BufWriter::new(File::create(partial)?);
    let mut report = FilterReport {
        lines_scanned: 0,
        lines_matched: 0,
    };
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        report.lines_scanned += 1;

        let content = trim_line_ending(&line);
        if contains(content, needle) {
            writer.write_all(content)?;
            writer.write_all(b"\n")?;
            report.lines_matched += 1;
        }
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(report)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
