//! Command-backed capabilities - 外部プログラムによる query / policy
//!
//! クエリエンジンとポリシーエンジンは外部プログラム。呼び出しごとに
//! 設定されたコマンドを起動し、stdin に入力を書き、stdout から JSON を読む。
//! 終了コードが 0 以外なら、捕まえた stderr 付きで失敗にする。
//!
//! # 学習ポイント
//! - tokio::process による子プロセスの起動と入出力
//! - CancellationToken で子プロセスを kill（`kill_on_drop` で future の破棄時も）

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::{AlertBody, CacheEntry, CapabilityError, Task};
use crate::ports::{PolicyService, QueryService};

/// CommandSpec は外部コマンドのプログラムと引数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// 実行ファイル（PATH から探す）
    pub program: String,
    /// 引数
    #[serde(default)]
    pub args: Vec<String>,
    /// 追加の環境変数
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// argv から作成。空（または先頭が空白だけ）なら None
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: Vec::new(),
        })
    }

    /// 環境変数を追加
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// `spec` を起動し、`input` を stdin に流して stdout を集める
///
/// `cancel` の発火時、または返した future の破棄時に子プロセスを kill する。
pub(crate) async fn run_command(
    spec: &CommandSpec,
    input: Vec<u8>,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<u8>, CapabilityError> {
    trace!(program = %spec.program, args = ?spec.args, "spawn");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CapabilityError::Failed("stdin was not captured".to_string()))?;
    let writer = tokio::spawn(async move {
        // 入力を読まずに終わるプログラムもある。broken pipe は終了コードで判断する
        let _ = stdin.write_all(&input).await;
        let _ = stdin.shutdown().await;
    });

    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    let output = tokio::select! {
        out = child.wait_with_output() => out?,
        _ = cancelled => {
            debug!(program = %spec.program, "cancelled; killing child");
            writer.abort();
            return Err(CapabilityError::Cancelled);
        }
    };
    let _ = writer.await;

    if !output.status.success() {
        return Err(CapabilityError::Exit {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// CommandQuery はクエリ本文をコマンドの stdin に流す QueryService
///
/// 子プロセスには `OVERSEER_TASK_ID` を設定する。出力が空なら空の行集合。
pub struct CommandQuery {
    spec: CommandSpec,
}

impl CommandQuery {
    /// コマンドを指定して作成
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl QueryService for CommandQuery {
    async fn execute(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, CapabilityError> {
        let spec = self
            .spec
            .clone()
            .with_env("OVERSEER_TASK_ID", task.id().as_str());
        let stdout = run_command(&spec, task.query().as_bytes().to_vec(), Some(cancel)).await?;
        if is_blank(&stdout) {
            return Ok(serde_json::Value::Array(Vec::new()));
        }
        Ok(serde_json::from_slice(&stdout)?)
    }
}

/// policy コマンドが出力してよい形
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolicyOutput {
    List(Vec<AlertBody>),
    Wrapped { alerts: Vec<AlertBody> },
}

/// CommandPolicy はキャッシュ 1 件の評価をコマンドに任せる PolicyService
///
/// # 入出力
/// - stdin: `{"task_id": ..., "stored_at": ..., "payload": ...}`
/// - stdout: AlertBody の JSON 配列、または `{"alerts": [...]}`
pub struct CommandPolicy {
    spec: CommandSpec,
}

impl CommandPolicy {
    /// コマンドを指定して作成
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl PolicyService for CommandPolicy {
    async fn evaluate(&self, entry: &CacheEntry) -> Result<Vec<AlertBody>, CapabilityError> {
        let input = serde_json::to_vec(entry)?;
        let stdout = run_command(&self.spec, input, None).await?;
        if is_blank(&stdout) {
            return Ok(Vec::new());
        }
        let bodies = match serde_json::from_slice::<PolicyOutput>(&stdout)? {
            PolicyOutput::List(bodies) => bodies,
            PolicyOutput::Wrapped { alerts } => alerts,
        };
        Ok(bodies)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use chrono::Utc;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::from_argv(&["sh".to_string(), "-c".to_string(), script.to_string()]).unwrap()
    }

    fn task() -> Task {
        Task::new(TaskId::new("t1").unwrap(), ["x"], "SELECT 42")
    }

    #[test]
    fn empty_argv_has_no_spec() {
        assert!(CommandSpec::from_argv(&[]).is_none());
        assert!(CommandSpec::from_argv(&["".to_string()]).is_none());
    }

    #[tokio::test]
    async fn query_reads_json_rows() {
        let query = CommandQuery::new(sh(
            r#"read q; printf '[{"query":"%s","task":"%s"}]' "$q" "$OVERSEER_TASK_ID""#,
        ));
        let rows = query.execute(&task(), &CancellationToken::new()).await.unwrap();
        assert_eq!(rows, json!([{"query": "SELECT 42", "task": "t1"}]));
    }

    #[tokio::test]
    async fn query_without_output_is_empty() {
        let query = CommandQuery::new(sh("cat > /dev/null"));
        let rows = query.execute(&task(), &CancellationToken::new()).await.unwrap();
        assert_eq!(rows, json!([]));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let query = CommandQuery::new(sh("echo 'quota exceeded' >&2; exit 3"));
        let err = query.execute(&task(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Exit { ref stderr, .. } if stderr == "quota exceeded"));
    }

    #[tokio::test]
    async fn cancellation_kills_the_command() {
        let query = CommandQuery::new(sh("sleep 30"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = query.execute(&task(), &cancel).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn policy_accepts_both_output_shapes() {
        let entry = CacheEntry::new(TaskId::new("t1").unwrap(), Utc::now(), json!([{"n": 1}]));

        let list = CommandPolicy::new(sh(r#"cat > /dev/null; echo '[{"title":"a"},{"title":"b"}]'"#));
        let bodies = list.evaluate(&entry).await.unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1].title, "b");

        let wrapped = CommandPolicy::new(sh(r#"cat > /dev/null; echo '{"alerts":[{"title":"c"}]}'"#));
        let bodies = wrapped.evaluate(&entry).await.unwrap();
        assert_eq!(bodies, vec![AlertBody::new("c")]);

        let silent = CommandPolicy::new(sh("cat > /dev/null"));
        assert!(silent.evaluate(&entry).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn policy_receives_the_cached_entry() {
        let entry = CacheEntry::new(TaskId::new("t9").unwrap(), Utc::now(), json!({"k": "v"}));
        // task id をそのまま title として返す
        let policy = CommandPolicy::new(sh(
            r#"id=$(sed -n 's/.*"task_id":"\([^"]*\)".*/\1/p'); printf '[{"title":"%s"}]' "$id""#,
        ));
        let bodies = policy.evaluate(&entry).await.unwrap();
        assert_eq!(bodies[0].title, "t9");
    }
}
