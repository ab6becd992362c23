// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per finished epoch:
//
//   epoch,mean_loss,batches,tokens
//   1,5.812340,1042,389120
//   2,4.901277,1042,389120
//
//   mean_loss — mean of the per-batch reported losses
//   batches   — optimiser updates in the epoch
//   tokens    — unmasked target tokens seen
//
// The header is written once; later runs (e.g. resumed with
// --load) append to the same file.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,mean_loss,batches,tokens";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:     usize,
    pub mean_loss: f64,
    pub batches:   usize,
    pub tokens:    usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, mean_loss: f64, batches: usize, tokens: usize) -> Self {
        Self { epoch, mean_loss, batches, tokens }
    }

    fn csv_row(&self) -> String {
        format!("{},{:.6},{},{}", self.epoch, self.mean_loss, self.batches, self.tokens)
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!("Logged epoch {} metrics: mean_loss={:.4}", m.epoch, m.mean_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_format() {
        let m = EpochMetrics::new(2, 3.25, 10, 640);
        assert_eq!(m.csv_row(), "2,3.250000,10,640");
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = std::env::temp_dir().join(format!("seq2seq_metrics_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&EpochMetrics::new(1, 4.0, 3, 30)).unwrap();

        // a second logger on the same directory keeps the existing file
        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&EpochMetrics::new(2, 3.5, 3, 30)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![HEADER, "1,4.000000,3,30", "2,3.500000,3,30"]);

        let _ = fs::remove_dir_all(&dir);
    }
}
