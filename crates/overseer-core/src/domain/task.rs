//! Task - クエリ 1 件の定義
//!
//! ID とタグはクエリ本文の先頭コメントから読む:
//!
//! ```text
//! -- id: failed_logins
//! -- tags: auth, hourly
//! SELECT ...
//! ```
//!
//! `-- id:` 行がなければ呼び出し側の既定値（ファイル名の stem）を使う。

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::errors::OverseerError;
use super::ids::TaskId;

/// Task は実行単位のクエリ
///
/// # 不変条件
/// - `id` は Run の中で一意（[`validate_tasks`] で検査）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    tags: BTreeSet<String>,
    query: String,
}

impl Task {
    /// ID・タグ・クエリ本文から Task を作成
    pub fn new<I, S>(id: TaskId, tags: I, query: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            tags: tags.into_iter().map(Into::into).collect(),
            query: query.into(),
        }
    }

    /// クエリ本文から Task を解析
    ///
    /// 先頭の `--` コメント行のまとまり（空行は許す）だけから `id:` と `tags:` を探す。
    /// タグはカンマ区切りで、空要素は捨てる。
    pub fn from_query(default_id: &str, text: &str) -> Result<Self, OverseerError> {
        let mut id: Option<String> = None;
        let mut tags = BTreeSet::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix("--") else {
                break;
            };
            let Some((key, value)) = comment.split_once(':') else {
                continue;
            };
            match key.trim() {
                "id" => {
                    if id.is_some() {
                        return Err(OverseerError::InvalidTask(format!(
                            "{default_id}: id declared more than once"
                        )));
                    }
                    id = Some(value.trim().to_string());
                }
                "tags" => {
                    for tag in value.split(',').map(str::trim) {
                        if tag.is_empty() {
                            return Err(OverseerError::InvalidTask(format!(
                                "{default_id}: empty tag"
                            )));
                        }
                        tags.insert(tag.to_string());
                    }
                }
                _ => {}
            }
        }

        if text.trim().is_empty() {
            return Err(OverseerError::InvalidTask(format!("{default_id}: empty query")));
        }

        let id = TaskId::new(id.unwrap_or_else(|| default_id.to_string()))?;
        Ok(Self {
            id,
            tags,
            query: text.to_string(),
        })
    }

    /// タスク ID
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// タグ集合
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// クエリ本文（ヘッダコメントを含む）
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// 設定されたタスク集合を検証
///
/// # エラー
/// - `NoTasksConfigured`: 空
/// - `DuplicateTaskId`: 同じ ID が 2 回以上（最初に重複した ID を返す）
pub fn validate_tasks(tasks: &[Task]) -> Result<(), OverseerError> {
    if tasks.is_empty() {
        return Err(OverseerError::NoTasksConfigured);
    }
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.id()) {
            return Err(OverseerError::DuplicateTaskId(task.id().clone()));
        }
    }
    Ok(())
}
