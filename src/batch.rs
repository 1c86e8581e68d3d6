use std::path::Path;

use crate::error::{PulseError, PulseResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub file_name: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

/// Reads a batch CSV and checks it has a header and at least one well-formed row
/// before it is sent for scoring.
pub async fn load_batch_file(path: &Path) -> PulseResult<BatchFile> {
    let rejected = |reason: String| PulseError::BatchFile {
        path: path.display().to_string(),
        reason,
    };

    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(rejected("only .csv files are accepted".into()));
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| rejected("path has no file name".into()))?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| rejected(err.to_string()))?;

    let (columns, rows) = inspect_csv(&bytes).map_err(rejected)?;

    Ok(BatchFile {
        file_name,
        columns,
        rows,
        bytes,
    })
}

fn inspect_csv(bytes: &[u8]) -> Result<(Vec<String>, usize), String> {
    let mut reader = csv::Reader::from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| err.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.iter().all(String::is_empty) {
        return Err("missing header row".into());
    }

    let mut rows = 0usize;
    for record in reader.records() {
        record.map_err(|err| format!("row {}: {err}", rows + 1))?;
        rows += 1;
    }

    if rows == 0 {
        return Err("no student rows".into());
    }

    Ok((columns, rows))
}
