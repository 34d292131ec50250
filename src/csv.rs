use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::amount::ParseAmountError;
use crate::engine::Project;
use crate::model::{Command, InitiateRequest, NewProject, PaymentCallback, ProjectId, UserId};

/// Errors that can occur when reading command rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open command file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{tx_type}'")]
    UnrecognizedType { line: usize, tx_type: String },

    #[error("line {line}: {tx_type} missing {field}")]
    MissingField {
        line: usize,
        tx_type: String,
        field: &'static str,
    },

    #[error("line {line}: invalid value: {source}")]
    InvalidAmount {
        line: usize,
        source: ParseAmountError,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    project: ProjectId,
    user: UserId,
    shares: Option<i64>,
    value: Option<String>,
    key: Option<String>,
    success: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    project: ProjectId,
    status: &'static str,
    total_shares: u32,
    shares_sold: u32,
    shares_reserved: u32,
    share_price: String,
}

/// Read commands from a csv file.
///
/// The returned iterator owns the open file and borrows nothing from `path`,
/// so it can be moved onto another task.
pub fn read_commands(
    path: &Path,
) -> Result<impl Iterator<Item = Result<Command, CsvError>> + use<>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            to_command(line, row)
        }))
}

fn to_command(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let missing = |field: &'static str| CsvError::MissingField {
        line,
        tx_type: row.r#type.clone(),
        field,
    };

    let command = match row.r#type.as_str() {
        "create" => {
            let total_shares = row.shares.ok_or_else(|| missing("shares"))?;
            let value = row.value.as_deref().ok_or_else(|| missing("value"))?;
            let total_value = value
                .parse()
                .map_err(|source| CsvError::InvalidAmount { line, source })?;
            Command::CreateProject {
                developer: row.user,
                project: NewProject {
                    id: row.project,
                    total_value,
                    total_shares,
                },
            }
        }
        "submit" => Command::SubmitProject {
            developer: row.user,
            project: row.project,
        },
        "approve" => Command::ApproveProject {
            admin: row.user,
            project: row.project,
        },
        "reject" => Command::RejectProject {
            admin: row.user,
            project: row.project,
        },
        "changes" => Command::RequestChanges {
            admin: row.user,
            project: row.project,
        },
        "initiate" => Command::Initiate {
            investor: row.user,
            request: InitiateRequest {
                project_id: row.project,
                shares_requested: row.shares.ok_or_else(|| missing("shares"))?,
                idempotency_key: row.key.clone().ok_or_else(|| missing("key"))?,
            },
        },
        "confirm" => {
            let key = row.key.clone().ok_or_else(|| missing("key"))?;
            let success = row.success.ok_or_else(|| missing("success"))?;
            let mut payload = json!({
                "project_id": row.project,
                "investor_id": row.user,
            });
            if let Some(shares) = row.shares {
                payload["shares"] = json!(shares);
            }
            Command::Confirm(PaymentCallback::new(key, payload, success))
        }
        other => {
            return Err(CsvError::UnrecognizedType {
                line,
                tx_type: other.to_string(),
            });
        }
    };
    Ok(command)
}

/// Write project inventory in csv format
pub fn write_projects<'a>(
    writer: impl io::Write,
    projects: impl IntoIterator<Item = &'a Project>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for project in projects {
        writer.serialize(OutputRow {
            project: project.id,
            status: project.status.as_str(),
            total_shares: project.total_shares,
            shares_sold: project.shares_sold,
            shares_reserved: project.shares_reserved,
            share_price: project.share_price.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
