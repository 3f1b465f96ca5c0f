//! サブコマンドの配線: 設定 → アダプタ → オーケストレータ

use std::sync::Arc;

use anyhow::Context;
use overseer_core::app::{JobContext, PipelineBuilder};
use overseer_core::config::{AppConfig, CacheBackend, CacheConfig, NotifyConfig, NotifyKind};
use overseer_core::domain::{JobId, Target};
use overseer_core::impls::{
    CommandPolicy, CommandQuery, FileCache, InMemoryCache, JsonLinesNotify, load_tasks,
};
use overseer_core::ports::{CacheService, NotifyService};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{EvalArgs, RunArgs};

pub async fn run(args: RunArgs, cfg: &AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let job_id = JobId::new(args.job_id)?;
    let tasks = load_tasks(&args.query_dir)
        .with_context(|| format!("load tasks from {}", args.query_dir.display()))?;
    let target = Target::new(args.tags, args.ids);

    let query = cfg
        .query
        .spec()
        .context("query.command is not configured")?;
    let runner = PipelineBuilder::new()
        .with_cache(open_cache(&cfg.cache))
        .with_query(Arc::new(CommandQuery::new(query)))
        .run_settings(cfg.run.settings(args.reset))
        .build_runner()?;

    let ctx = JobContext::with_cancel(job_id, cancel);
    let report = runner.run(&ctx, &tasks, &target).await?;
    eprintln!(
        "job {}: cached {} task result(s)",
        ctx.job_id(),
        report.cached.len()
    );
    Ok(())
}

pub async fn eval(args: EvalArgs, cfg: &AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let job_id = JobId::new(args.job_id)?;

    let policy = cfg
        .policy
        .spec()
        .context("policy.command is not configured")?;
    let evaluator = PipelineBuilder::new()
        .with_cache(open_cache(&cfg.cache))
        .with_policy(Arc::new(CommandPolicy::new(policy)))
        .with_notify(open_notify(&cfg.notify).await?)
        .eval_settings(cfg.eval.settings())
        .build_evaluator()?;

    let ctx = JobContext::with_cancel(job_id, cancel);
    let report = evaluator.eval(&ctx).await?;
    eprintln!(
        "job {}: evaluated {} entr(ies), dispatched {} alert(s)",
        ctx.job_id(),
        report.entries,
        report.alerts.len()
    );
    Ok(())
}

fn open_cache(cfg: &CacheConfig) -> Arc<dyn CacheService> {
    match cfg.backend {
        CacheBackend::Memory => {
            warn!("memory cache selected; results do not outlive this process");
            Arc::new(InMemoryCache::new())
        }
        CacheBackend::File => {
            info!(dir = %cfg.dir.display(), "using file cache");
            Arc::new(FileCache::new(cfg.dir.clone()))
        }
    }
}

async fn open_notify(cfg: &NotifyConfig) -> anyhow::Result<Arc<dyn NotifyService>> {
    match cfg.kind {
        NotifyKind::Stdout => Ok(Arc::new(JsonLinesNotify::stdout())),
        NotifyKind::File => {
            let path = cfg
                .path
                .as_deref()
                .context("notify.path is required when notify.kind = \"file\"")?;
            let notify = JsonLinesNotify::append_to(path)
                .await
                .with_context(|| format!("open alert log {}", path.display()))?;
            Ok(Arc::new(notify))
        }
    }
}
