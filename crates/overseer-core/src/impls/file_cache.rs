//! FileCache - ローカルファイルシステム上の job スコープキャッシュ
//!
//! レイアウト: `<root>/<job_id>/<task_id>.json`（1 ファイル = 1 [`CacheEntry`]）。
//! ID はエスケープされ、どんな文字列も 1 つのパス要素に収まる。
//!
//! # 学習ポイント
//! - 一時ファイル → hard link による「上書きしない」書き込み
//!   （link 先が存在すれば失敗するので、別プロセス同士でも上書きが起きない）
//! - 読み手は書きかけのエントリを観測しない
//! - Drop ガードによる一時ファイルの後始末（エラー時・キャンセル時も残らない）

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::{CacheEntry, CacheError, JobId, TaskId};
use crate::ports::{CacheService, Clock, SystemClock};

const ENTRY_EXT: &str = "json";

/// パス要素に残す文字は英数字と `_` `-` だけ
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

/// FileCache は job ごとに 1 ディレクトリを持つ
///
/// # 設計原則
/// - 同じ root を指す別インスタンス（別プロセス）とストアを共有する
/// - `entries` は TaskId 順（エスケープ前の ID で整列）
pub struct FileCache<C = SystemClock> {
    root: PathBuf,
    clock: C,
}

impl FileCache<SystemClock> {
    /// システム時刻で `stored_at` を刻む FileCache を作成
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> FileCache<C> {
    /// Clock を差し替えて作成（テスト用に FixedClock を渡せる）
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// キャッシュのルートディレクトリ
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(escape_component(job_id.as_str()))
    }

    fn entry_path(&self, job_id: &JobId, task_id: &TaskId) -> PathBuf {
        self.partition_dir(job_id)
            .join(format!("{}.{ENTRY_EXT}", escape_component(task_id.as_str())))
    }
}

#[async_trait]
impl<C: Clock> CacheService for FileCache<C> {
    async fn put(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
        payload: serde_json::Value,
    ) -> Result<(), CacheError> {
        let dir = self.partition_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.entry_path(job_id, task_id);
        if tokio::fs::try_exists(&path).await? {
            return Err(duplicate(job_id, task_id));
        }

        let entry = CacheEntry::new(task_id.clone(), self.clock.now(), payload);
        let bytes = serde_json::to_vec(&entry)?;

        let staged = StagedFile::new(dir.join(format!(
            ".{}.{:016x}.tmp",
            escape_component(task_id.as_str()),
            rand::random::<u64>()
        )));
        staged.write(&bytes).await?;

        let linked = tokio::fs::hard_link(staged.path(), &path).await;
        drop(staged);
        match linked {
            Ok(()) => {
                debug!(%job_id, %task_id, path = %path.display(), "cached result on disk");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(duplicate(job_id, task_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(job_id, task_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => decode_entry(&path, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn entries<'a>(&'a self, job_id: &'a JobId) -> BoxStream<'a, Result<CacheEntry, CacheError>> {
        let dir = self.partition_dir(job_id);
        stream::once(async move { list_entry_files(&dir).await })
            .map_ok(|paths| stream::iter(paths.into_iter().map(Ok::<_, CacheError>)))
            .try_flatten()
            .and_then(|path| async move {
                let bytes = tokio::fs::read(&path).await?;
                decode_entry(&path, &bytes)
            })
            .boxed()
    }

    async fn remove(&self, job_id: &JobId, task_id: &TaskId) -> Result<bool, CacheError> {
        let path = self.entry_path(job_id, task_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%job_id, %task_id, "removed cached result");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, job_id: &JobId) -> Result<usize, CacheError> {
        let dir = self.partition_dir(job_id);
        let removed = list_entry_files(&dir).await?.len();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// StagedFile は link 前の一時ファイル
///
/// Drop 時に削除する。書き込み失敗で `?` が早期 return しても、
/// put の future ごと破棄されても、パーティションに `.tmp` は残らない。
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(&self.path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // 未作成・削除済みなら NotFound なので無視してよい
        let _ = std::fs::remove_file(&self.path);
    }
}

fn duplicate(job_id: &JobId, task_id: &TaskId) -> CacheError {
    CacheError::DuplicateKey {
        job_id: job_id.clone(),
        task_id: task_id.clone(),
    }
}

fn decode_entry(path: &Path, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupted {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// パーティション内のエントリファイルを TaskId 順に列挙
///
/// ファイル名はエスケープ済みなので、名前ではなく復元した ID で整列する。
/// パーティションが無ければ空。
async fn list_entry_files(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    while let Some(dent) = read_dir.next_entry().await? {
        let path = dent.path();
        let hidden = dent.file_name().to_string_lossy().starts_with('.');
        if !hidden && path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
            paths.push(path);
        }
    }
    paths.sort_by_cached_key(|path| {
        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        unescape_component(&stem)
    });
    Ok(paths)
}

/// `[A-Za-z0-9_-]` 以外をパーセントエスケープ
fn escape_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// `escape_component` の逆変換。不正な `%` はそのまま残す。
fn unescape_component(escaped: &str) -> String {
    percent_decode_str(escaped).decode_utf8_lossy().into_owned()
}
