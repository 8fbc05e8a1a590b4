//! Downloadable artifacts built from finished tasks

use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors from building or saving an artifact
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("task {task_id} has no solution (state: {state})")]
    NotDone { task_id: String, state: String },

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown artifact format '{0}', expected 'csv' or 'json'")]
    UnknownFormat(String),
}

/// Serialization used for the solution file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Csv,
    Json,
}

impl ArtifactFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactFormat::Csv => "solution.csv",
            ArtifactFormat::Json => "solution.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactFormat::Csv => "text/csv",
            ArtifactFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Csv => write!(f, "csv"),
            ArtifactFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = MaterializeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ArtifactFormat::Csv),
            "json" => Ok(ArtifactFormat::Json),
            _ => Err(MaterializeError::UnknownFormat(s.to_string())),
        }
    }
}

/// A named, typed blob ready to hand to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Write the artifact into `dir` under its file name
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, MaterializeError> {
        let path = dir.as_ref().join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

#[derive(Serialize)]
struct SolutionDocument<'a> {
    solution: &'a [f64],
}

/// Build the artifact for a task. Fails unless the task is `Done`.
pub fn materialize(task: &Task, format: ArtifactFormat) -> Result<Artifact, MaterializeError> {
    let solution = task.solution().ok_or_else(|| MaterializeError::NotDone {
        task_id: task.id().to_string(),
        state: task.state().label().to_string(),
    })?;
    materialize_solution(solution, format)
}

/// Serialize a solution vector
pub fn materialize_solution(
    solution: &[f64],
    format: ArtifactFormat,
) -> Result<Artifact, MaterializeError> {
    let bytes = match format {
        ArtifactFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for value in solution {
                writer.write_record([value.to_string()])?;
            }
            writer
                .into_inner()
                .map_err(|e| MaterializeError::Io(e.into_error()))?
        }
        ArtifactFormat::Json => serde_json::to_vec_pretty(&SolutionDocument { solution })?,
    };

    Ok(Artifact {
        file_name: format.file_name().to_string(),
        content_type: format.content_type(),
        bytes,
    })
}
