//! Target - タグまたは ID によるタスクの絞り込み
//!
//! # 選択規則
//! - Target が空なら全タスク
//! - タグのどれか、または ID のどれかに一致すれば選択（OR）
//! - 選択結果は設定順を保つ

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::errors::OverseerError;
use super::task::Task;

/// Target は選択条件。空なら「全タスク」
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// 選択するタグ
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// 選択するタスク ID
    #[serde(default)]
    pub ids: BTreeSet<String>,
}

impl Target {
    /// タグと ID から Target を作成
    pub fn new<T, I>(tags: T, ids: I) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// 条件が何もないか（= 全タスク）
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.ids.is_empty()
    }

    /// 空白だけのタグ・ID を InvalidTarget として拒否
    pub fn validate(&self) -> Result<(), OverseerError> {
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(OverseerError::InvalidTarget("empty tag".to_string()));
        }
        if self.ids.iter().any(|id| id.trim().is_empty()) {
            return Err(OverseerError::InvalidTarget("empty task id".to_string()));
        }
        Ok(())
    }

    /// `task` がこの Target に一致するか
    pub fn matches(&self, task: &Task) -> bool {
        self.is_empty()
            || self.ids.contains(task.id().as_str())
            || task.tags().iter().any(|tag| self.tags.contains(tag))
    }

    /// `tasks` を一致するものだけに絞る（順序は保つ）
    ///
    /// # エラー
    /// - `InvalidTarget`: Target が不正
    /// - `NoTasksConfigured`: `tasks` が空
    /// - `NoTasksSelected`: 一致するタスクがない
    pub fn select(&self, tasks: &[Task]) -> Result<Vec<Task>, OverseerError> {
        self.validate()?;
        if tasks.is_empty() {
            return Err(OverseerError::NoTasksConfigured);
        }

        let selected: Vec<Task> = tasks.iter().filter(|t| self.matches(t)).cloned().collect();
        if selected.is_empty() {
            return Err(OverseerError::NoTasksSelected {
                tags: self.tags.iter().cloned().collect(),
                ids: self.ids.iter().cloned().collect(),
            });
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use rstest::rstest;

    fn task(id: &str, tags: &[&str]) -> Task {
        Task::new(TaskId::new(id).unwrap(), tags.iter().copied(), "SELECT 1")
    }

    fn tasks() -> Vec<Task> {
        vec![
            task("a", &["x"]),
            task("b", &["y"]),
            task("c", &["x", "z"]),
            task("d", &[]),
        ]
    }

    fn ids(selected: &[Task]) -> Vec<&str> {
        selected.iter().map(|t| t.id().as_str()).collect()
    }

    #[rstest]
    #[case(Target::new(["x"], Vec::<String>::new()), vec!["a", "c"])]
    #[case(Target::new(Vec::<String>::new(), ["d", "b"]), vec!["b", "d"])]
    #[case(Target::new(["z"], ["a"]), vec!["a", "c"])]
    #[case(Target::new(["y", "nope"], Vec::<String>::new()), vec!["b"])]
    fn selects_matching_subset_in_order(#[case] target: Target, #[case] expected: Vec<&str>) {
        let all = tasks();
        let selected = target.select(&all).unwrap();
        assert_eq!(ids(&selected), expected);
    }

    #[test]
    fn empty_target_selects_everything() {
        let all = tasks();
        let selected = Target::default().select(&all).unwrap();
        assert_eq!(selected, all);
    }

    #[test]
    fn no_match_is_an_error() {
        let err = Target::new(["typo"], Vec::<String>::new())
            .select(&tasks())
            .unwrap_err();
        assert!(matches!(
            err,
            OverseerError::NoTasksSelected { ref tags, .. } if tags == &vec!["typo".to_string()]
        ));
    }

    #[test]
    fn no_candidates_is_distinct_from_no_match() {
        let err = Target::new(["x"], Vec::<String>::new())
            .select(&[])
            .unwrap_err();
        assert!(matches!(err, OverseerError::NoTasksConfigured));
    }

    #[rstest]
    #[case(Target::new([""], Vec::<String>::new()))]
    #[case(Target::new(Vec::<String>::new(), ["  "]))]
    fn blank_criteria_are_invalid(#[case] target: Target) {
        assert!(matches!(
            target.select(&tasks()),
            Err(OverseerError::InvalidTarget(_))
        ));
    }
}
