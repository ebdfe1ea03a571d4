use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Points;
use crate::model::{Millis, Operation, UserBalance, UserId, now_millis};

/// Errors that can occur when reading or writing csv
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op}'")]
    UnrecognizedType { line: usize, op: String },

    #[error("failed to write balances: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    user: UserId,
    amount: i64,
    timestamp: Option<Millis>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: UserId,
    points: i64,
    updated_at: Millis,
}

/// Read operations from a csv file with a `type,user,amount[,timestamp]`
/// header. Rows without a timestamp are stamped with the current time.
pub fn read_operations(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Operation, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let amount = Points::new(row.amount);
            let timestamp = row.timestamp.unwrap_or_else(now_millis);
            match row.r#type.as_str() {
                "charge" => Ok(Operation::Charge {
                    user: row.user,
                    amount,
                    timestamp,
                }),
                "use" => Ok(Operation::Use {
                    user: row.user,
                    amount,
                    timestamp,
                }),
                other => Err(CsvError::UnrecognizedType {
                    line,
                    op: other.to_string(),
                }),
            }
        }))
}

/// Write balances in csv format, sorted by user
pub fn write_balances(
    writer: impl io::Write,
    balances: impl IntoIterator<Item = UserBalance>,
) -> Result<(), CsvError> {
    let mut balances: Vec<_> = balances.into_iter().collect();
    balances.sort_by_key(|b| b.user_id);

    let mut writer = csv::Writer::from_writer(writer);
    for balance in balances {
        writer.serialize(OutputRow {
            user: balance.user_id,
            points: balance.points.value(),
            updated_at: balance.updated_at,
        })?;
    }
    writer.flush()?;
    Ok(())
}
