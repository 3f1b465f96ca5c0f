use clap::Parser;
mod cli;
mod commands;

use cli::{Args, Commands};
use overseer_core::config::{self, LogFormat, LoggingConfig};
use overseer_core::domain::{ErrorKind, OverseerError};
use overseer_core::impls::TaskSourceError;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    init_tracing(&cfg.logging)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received Ctrl+C; cancelling");
            trigger.cancel();
        }
    });

    match args.command {
        Commands::Run(run_args) => commands::run(run_args, &cfg, cancel).await,
        Commands::Eval(eval_args) => commands::eval(eval_args, &cfg, cancel).await,
    }
}

// 0: 成功
// 1: 下記以外
// 2: fail-fast または検証エラー
// 3: バッチの一部が失敗
// 130: キャンセル
fn exit_code_for_error(e: &anyhow::Error) -> i32 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<OverseerError>() {
            return match err.kind() {
                ErrorKind::FailFast | ErrorKind::Validation => 2,
                ErrorKind::Aggregate => 3,
                ErrorKind::Cancelled => 130,
                ErrorKind::Collaborator => 1,
            };
        }
        if let Some(err) = cause.downcast_ref::<TaskSourceError>() {
            return match err {
                TaskSourceError::Io { .. } => 1,
                TaskSourceError::Task { .. } | TaskSourceError::Invalid(_) => 2,
            };
        }
    }
    1
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(&logging.level)?,
    };

    let text_layer = (logging.format == LogFormat::Text)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = (logging.format == LogFormat::Json)
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use overseer_core::domain::{BatchFailure, Phase};

    #[test]
    fn exit_codes_follow_error_kind() {
        let cases = [
            (OverseerError::NoTasksConfigured, 2),
            (OverseerError::MissingJobId, 2),
            (OverseerError::Cancelled, 130),
            (
                OverseerError::Batch(BatchFailure {
                    phase: Phase::Run,
                    attempted: 2,
                    failures: vec![OverseerError::Cancelled],
                }),
                3,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(exit_code_for_error(&anyhow::Error::new(err)), code);
        }
    }

    #[test]
    fn exit_code_looks_through_context() {
        let err: anyhow::Result<()> = Err(OverseerError::NoTasksConfigured).context("load tasks");
        assert_eq!(exit_code_for_error(&err.unwrap_err()), 2);
    }

    #[test]
    fn empty_query_dir_is_a_validation_failure() {
        let err = anyhow::Error::new(TaskSourceError::Invalid(OverseerError::NoTasksConfigured));
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn unclassified_errors_exit_one() {
        assert_eq!(exit_code_for_error(&anyhow::anyhow!("boom")), 1);
    }
}
