// ============================================================
// Layer 6 — Loss Logger
// ============================================================
// Records the per-step training loss of every model variant to
// one CSV file, so the attention and no-attention curves can be
// plotted side by side.
//
// Output file: <checkpoint_dir>/loss_history.csv
//
// Example CSV output:
//   variant,batch,loss
//   attention,0,2.302585
//   attention,1,2.298114
//   ...
//   no_attention,0,2.302601
//
// Rows are buffered and flushed at the end of each run.

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

pub const LOSS_CSV: &str = "loss_history.csv";

/// One row of the loss history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub variant: String,
    /// Step index, starting at 0
    pub batch:   usize,
    pub loss:    f64,
}

impl LossRecord {
    pub fn new(variant: impl Into<String>, batch: usize, loss: f64) -> Self {
        Self { variant: variant.into(), batch, loss }
    }
}

/// Appends loss rows to the CSV file.
pub struct LossLogger {
    csv_path: PathBuf,
    writer:   BufWriter<File>,
}

impl LossLogger {
    /// Open (or create) the CSV in `dir`.
    /// Writes the header only when the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(LOSS_CSV);
        let is_new   = !csv_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .with_context(|| format!("Cannot open '{}'", csv_path.display()))?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writeln!(writer, "variant,batch,loss")?;
            tracing::debug!("Created loss CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, writer })
    }

    pub fn log(&mut self, r: &LossRecord) -> Result<()> {
        writeln!(self.writer, "{},{},{:.6}", r.variant, r.batch, r.loss)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Cannot write '{}'", self.csv_path.display()))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Parse a loss CSV back into records; the header is skipped.
pub fn read_history(path: impl AsRef<Path>) -> Result<Vec<LossRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split(',');
            let (Some(variant), Some(batch), Some(loss)) = (fields.next(), fields.next(), fields.next())
            else {
                anyhow::bail!("Malformed loss row: '{line}'");
            };
            Ok(LossRecord::new(variant, batch.parse()?, loss.parse()?))
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_append_across_loggers() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = LossLogger::new(dir.path()).unwrap();
        first.log(&LossRecord::new("attention", 0, 2.5)).unwrap();
        first.log(&LossRecord::new("attention", 1, 2.25)).unwrap();
        first.flush().unwrap();
        drop(first);

        // a second logger must not repeat the header
        let mut second = LossLogger::new(dir.path()).unwrap();
        second.log(&LossRecord::new("no_attention", 0, 3.0)).unwrap();
        second.flush().unwrap();

        let history = read_history(second.csv_path()).unwrap();
        assert_eq!(history, vec![
            LossRecord::new("attention", 0, 2.5),
            LossRecord::new("attention", 1, 2.25),
            LossRecord::new("no_attention", 0, 3.0),
        ]);
    }
}
