//! Parquet output for validation result batches.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Write one batch to a new Parquet file at `path`, replacing any existing file.
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("opening parquet writer")?;
    writer.write(batch).context("writing record batch")?;
    writer.close().context("finalising parquet file")?;
    tracing::info!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}
