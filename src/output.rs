use crate::model::{OUTPUT_COLUMNS, ParticipationRow};
use anyhow::{Context, Result};
use std::path::Path;

/// Writes the whole table, replacing any existing file. Absent fields are empty cells.
pub fn write_table(path: &Path, delimiter: u8, rows: &[ParticipationRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;

    writer
        .write_record(OUTPUT_COLUMNS)
        .with_context(|| format!("failed to write header to {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(())
}
