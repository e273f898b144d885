//! Export of server-side learning data to JSON files, and re-import.
//!
//! Exports are named `memory_{subject}.json` and `wrong_{subject}.json`;
//! import relies on that naming to pick the endpoint and subject.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tutor_common::{Error, ResultExt};

use crate::api::{ApiError, TutorApi};
use crate::subject::Subject;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Input(#[from] Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl TransferError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Input(e) if e.is_invalid_input())
    }
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Which data set an import file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Memory,
    WrongQuestions,
}

impl ImportKind {
    /// Infer the kind from a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.contains("memory_") {
            Some(Self::Memory)
        } else if name.contains("wrong_") {
            Some(Self::WrongQuestions)
        } else {
            None
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::WrongQuestions => "wrong",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "Memory data"),
            Self::WrongQuestions => write!(f, "Wrong questions data"),
        }
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub subject: Subject,
    /// Message returned by the server
    pub message: String,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} imported successfully: {}", self.kind, self.message)
    }
}

/// File name an export of `kind` for `subject` is written to.
pub fn export_file_name(kind: ImportKind, subject: &Subject) -> String {
    format!("{}_{subject}.json", kind.file_prefix())
}

pub async fn export_memory(api: &TutorApi, subject: &Subject, dir: &Path) -> TransferResult<PathBuf> {
    let memory = api.get_memory(subject).await?;
    write_export(dir, &export_file_name(ImportKind::Memory, subject), &memory).await
}

pub async fn export_wrong_questions(
    api: &TutorApi,
    subject: &Subject,
    dir: &Path,
) -> TransferResult<PathBuf> {
    let questions = api.get_wrong_questions(subject).await?;
    write_export(
        dir,
        &export_file_name(ImportKind::WrongQuestions, subject),
        &questions,
    )
    .await
}

async fn write_export(
    dir: &Path,
    file_name: &str,
    items: &[serde_json::Value],
) -> TransferResult<PathBuf> {
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(items).map_err(Error::from)?;
    tokio::fs::write(&path, json)
        .await
        .context(format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), items = items.len(), "Export written");
    Ok(path)
}

/// Kind and subject encoded in an export file name.
pub fn parse_import_name(path: &Path) -> TransferResult<(ImportKind, Subject)> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(Error::invalid("Please select a JSON file").into());
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let kind = ImportKind::from_file_name(file_name)
        .ok_or_else(|| Error::invalid("Unrecognized file format"))?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let subject = stem.rsplit('_').next().unwrap_or(stem);
    Ok((kind, Subject::parse(subject)?))
}

/// Upload an exported file back to the server. Sent once, never retried.
pub async fn import_file(api: &TutorApi, path: &Path) -> TransferResult<ImportSummary> {
    let (kind, subject) = parse_import_name(path)?;

    let text = tokio::fs::read_to_string(path)
        .await
        .context(format!("Failed to read {}", path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::invalid(format!("File is not valid JSON: {e}")))?;

    let reply = match kind {
        ImportKind::Memory => api.import_memory(&subject, &data).await?,
        ImportKind::WrongQuestions => api.import_wrong_questions(&subject, &data).await?,
    };

    tracing::info!(kind = ?kind, subject = %subject, "Import accepted");
    Ok(ImportSummary {
        kind,
        subject,
        message: reply.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("memory_math.json", ImportKind::Memory, "math")]
    #[test_case("wrong_physics.JSON", ImportKind::WrongQuestions, "physics")]
    #[test_case("backup_memory_2024_chemistry.json", ImportKind::Memory, "chemistry")]
    #[test_case("my_wrong_history.json", ImportKind::WrongQuestions, "history")]
    fn import_names(name: &str, kind: ImportKind, subject: &str) {
        let (k, s) = parse_import_name(Path::new(name)).unwrap();
        assert_eq!(k, kind);
        assert_eq!(s.as_str(), subject);
    }

    #[test_case("memory_math.txt" ; "wrong extension")]
    #[test_case("memory_math" ; "no extension")]
    #[test_case("notes_math.json" ; "unknown kind")]
    fn rejected_import_names(name: &str) {
        assert!(parse_import_name(Path::new(name)).unwrap_err().is_validation());
    }

    #[test]
    fn export_names_round_trip() {
        let subject = Subject::parse("biology").unwrap();
        for kind in [ImportKind::Memory, ImportKind::WrongQuestions] {
            let name = export_file_name(kind, &subject);
            let (k, s) = parse_import_name(Path::new(&name)).unwrap();
            assert_eq!((k, s), (kind, subject.clone()));
        }
    }

    #[test]
    fn summary_reads_like_a_notice() {
        let summary = ImportSummary {
            kind: ImportKind::WrongQuestions,
            subject: Subject::parse("math").unwrap(),
            message: "12 items".into(),
        };
        assert_eq!(
            summary.to_string(),
            "Wrong questions data imported successfully: 12 items"
        );
    }
}
