//! Task source - `.sql` ファイルのディレクトリツリーからタスクを読む
//!
//! # 規則
//! - 再帰的に探索し、パス順に読む（タスク順が再現可能）
//! - 既定の TaskId はファイル名の stem（`-- id:` ヘッダで上書き可）
//! - 読み込み後に [`validate_tasks`] で検証

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::{OverseerError, Task, validate_tasks};

const QUERY_EXT: &str = "sql";

/// TaskSourceError はタスク読み込みのエラー
#[derive(Debug, Error)]
pub enum TaskSourceError {
    #[error("fail to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Task {
        path: PathBuf,
        #[source]
        source: OverseerError,
    },

    #[error(transparent)]
    Invalid(#[from] OverseerError),
}

/// `dir` 以下のすべての `.sql` をタスクとして読み込む
///
/// # エラー
/// - `Io`: ディレクトリ・ファイルが読めない
/// - `Task`: ヘッダが不正なファイル（パス付き）
/// - `Invalid`: タスクが 0 件、または ID の重複
pub fn load_tasks(dir: &Path) -> Result<Vec<Task>, TaskSourceError> {
    let files = list_query_files(dir)?;

    let mut tasks = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(&path).map_err(|source| TaskSourceError::Io {
            path: path.clone(),
            source,
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let task = Task::from_query(&stem, &text)
            .map_err(|source| TaskSourceError::Task {
                path: path.clone(),
                source,
            })?;
        debug!(task_id = %task.id(), path = %path.display(), "loaded task");
        tasks.push(task);
    }

    validate_tasks(&tasks)?;
    Ok(tasks)
}

fn list_query_files(dir: &Path) -> Result<Vec<PathBuf>, TaskSourceError> {
    let io_err = |source| TaskSourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|e| e.path());

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            files.extend(list_query_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == QUERY_EXT) {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_nested_sql_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("auth")).unwrap();
        fs::write(dir.path().join("b.sql"), "SELECT 'b'").unwrap();
        fs::write(
            dir.path().join("auth").join("logins.sql"),
            "-- id: failed_logins\n-- tags: auth\nSELECT 1",
        )
        .unwrap();
        fs::write(dir.path().join("a.sql"), "-- tags: daily\nSELECT 'a'").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a query").unwrap();

        let tasks = load_tasks(dir.path()).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["a", "failed_logins", "b"]);
        assert!(tasks[0].tags().contains("daily"));
    }

    #[test]
    fn empty_directory_has_no_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tasks(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            TaskSourceError::Invalid(OverseerError::NoTasksConfigured)
        ));
    }

    #[test]
    fn duplicate_ids_across_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.sql"), "-- id: same\nSELECT 1").unwrap();
        fs::write(dir.path().join("two.sql"), "-- id: same\nSELECT 2").unwrap();

        let err = load_tasks(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            TaskSourceError::Invalid(OverseerError::DuplicateTaskId(_))
        ));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tasks(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, TaskSourceError::Io { .. }));
    }
}
