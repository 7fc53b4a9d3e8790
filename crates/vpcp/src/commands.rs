//! One function per CLI subcommand (spec.md §6 "CLI surface"). Kept out of
//! `main.rs` so `AppConfig`/`Stack` wiring stays testable independent of
//! argument parsing.

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::error::CliError;
use crate::wiring::Stack;
use serde_json::json;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use vpcp_types::{GenerationRequest, RequestId, RetryPolicy, TaskEnvelope};

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::from_file(&cli.config)?;

    match cli.command {
        Command::Submit {
            tier,
            prompt,
            duration_seconds,
            aspect_ratio,
            platform,
            deadline,
        } => submit(config, tier.into(), prompt, duration_seconds, aspect_ratio, platform, deadline).await,
        Command::Status { worker_url, failures_limit } => status(config, worker_url, failures_limit).await,
        Command::Plan { date } => plan(config, date).await,
        Command::RunScheduler => run_scheduler(config).await,
        Command::RunQueue => run_queue(config).await,
        Command::RunWorker => run_worker(config).await,
        Command::RunPoller => run_poller(config).await,
    }
}

async fn submit(
    config: AppConfig,
    quality_tier: vpcp_types::QualityTier,
    prompt: String,
    duration_seconds: u32,
    aspect_ratio: String,
    platform_hint: Option<String>,
    deadline: Option<String>,
) -> Result<(), CliError> {
    let deadline = deadline
        .map(|raw| {
            OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339)
                .map_err(|e| CliError::Permanent(format!("invalid --deadline {raw:?}: {e}")))
        })
        .transpose()?;

    let worker_url = config.worker.worker_url_seen_by_queue.clone();
    let stack = Stack::build(config)?;
    let queue = stack.queue_manager(worker_url)?;

    let now = OffsetDateTime::now_utc();
    let request = GenerationRequest {
        request_id: RequestId::new(),
        quality_tier,
        prompt,
        duration_seconds,
        aspect_ratio,
        platform_hint,
        created_at: now,
        deadline,
    };
    let request_id = request.request_id;
    let envelope = TaskEnvelope {
        request,
        attempt_no: 1,
        enqueue_time: now,
        not_before: None,
        retry_policy: RetryPolicy::default(),
    };

    queue.enqueue(envelope)?;
    println!("{request_id}");
    Ok(())
}

async fn status(config: AppConfig, worker_url: Option<String>, failures_limit: usize) -> Result<(), CliError> {
    let fallback_worker_url = config.worker.worker_url_seen_by_queue.clone();
    let stack = Stack::build(config)?;

    let queue_url = worker_url.clone().unwrap_or(fallback_worker_url);
    let queue_status = stack.queue_manager(queue_url).ok().and_then(|q| q.status().ok());

    let health = stack.router.health_snapshot();
    let (provider_capacity, tier_capacity) = stack.router.capacity_report();

    let mut report = json!({
        "queue": queue_status.map(|s| json!({
            "approximate_depth": s.approximate_depth,
            "running": s.running,
            "dispatch_rate": s.dispatch_rate,
            "max_concurrent": s.max_concurrent,
        })),
        "router_health": health.into_iter().map(|(id, snap)| (id, format!("{:?}", snap.state))).collect::<std::collections::BTreeMap<_, _>>(),
        "provider_capacity": provider_capacity.into_iter().map(|(id, c)| (id, json!({
            "credits_remaining": c.credits_remaining,
            "credits_reserved": c.credits_reserved,
            "credits_committed": c.credits_committed,
        }))).collect::<std::collections::BTreeMap<_, _>>(),
        "tier_capacity": tier_capacity.into_iter().map(|(tier, c)| (format!("{tier:?}"), json!({
            "target": c.target,
            "completed": c.completed,
            "failed": c.failed,
        }))).collect::<std::collections::BTreeMap<_, _>>(),
    });

    if let Some(url) = worker_url {
        let client = reqwest::Client::new();
        let worker_stats: serde_json::Value = client.get(format!("{url}/stats")).send().await?.json().await?;
        let worker_health: serde_json::Value = client.get(format!("{url}/health")).send().await?.json().await?;
        let failures: serde_json::Value = client
            .get(format!("{url}/failures?limit={failures_limit}"))
            .send()
            .await?
            .json()
            .await?;
        report["worker_stats"] = worker_stats;
        report["worker_health"] = worker_health;
        report["recent_failures"] = failures;
    }

    println!("{}", serde_json::to_string_pretty(&report).expect("json value always serializes"));
    Ok(())
}

async fn plan(config: AppConfig, date: String) -> Result<(), CliError> {
    let date = time::Date::parse(&date, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|e| CliError::Permanent(format!("invalid --date {date:?}: {e}")))?;

    let scheduler_config = config.scheduler_config()?;
    let stack = Stack::build(config)?;
    let remaining = vpcp_scheduler::remaining_budget(&stack.budget, &scheduler_config);
    let source = vpcp_scheduler::FixedTopicSource::new(vec!["a daily production topic".into()], 5, "16:9");

    let planned = vpcp_scheduler::plan(&scheduler_config, date, remaining, &source).await?;
    let rendered: Vec<_> = planned
        .iter()
        .map(|item| {
            json!({
                "request_id": item.request.request_id.to_string(),
                "quality_tier": format!("{:?}", item.request.quality_tier),
                "platform_hint": item.request.platform_hint,
                "not_before": item.not_before.to_string(),
                "batch_index": item.batch_index,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rendered).expect("json value always serializes"));
    Ok(())
}

async fn run_scheduler(config: AppConfig) -> Result<(), CliError> {
    let scheduler_config = Arc::new(config.scheduler_config()?);
    let worker_url = config.worker.worker_url_seen_by_queue.clone();
    let stack = Stack::build(config)?;
    let queue = Arc::new(stack.queue_manager(worker_url)?);
    let source: Arc<dyn vpcp_scheduler::TopicSource> = Arc::new(vpcp_scheduler::FixedTopicSource::new(vec!["a daily production topic".into()], 5, "16:9"));

    info!("scheduler daemon starting");
    vpcp_scheduler::run_daemon(scheduler_config, source, queue, stack.budget, RetryPolicy::default()).await
}

async fn run_queue(config: AppConfig) -> Result<(), CliError> {
    let worker_url = config.worker.worker_url_seen_by_queue.clone();
    let tick_interval = std::time::Duration::from_secs(config.queue.tick_interval_seconds);
    let stack = Stack::build(config)?;
    let queue = stack.queue_manager(worker_url)?;

    info!("queue dispatch daemon starting");
    queue.run_daemon(tick_interval).await
}

async fn run_worker(config: AppConfig) -> Result<(), CliError> {
    let bind_addr = config.worker.bind_addr.clone();
    let worker_config = config.worker_config()?;
    let stack = Stack::build(config)?;

    let state = Arc::new(vpcp_worker::WorkerState::new(
        stack.provider_job_store,
        stack.adapters,
        stack.rate_limiter,
        stack.router,
        stack.budget,
        Arc::new(vpcp_poller::NullUploadCollaborator),
        worker_config,
    ));
    let app = vpcp_worker::router(vpcp_worker::AppState::new(state));

    info!(%bind_addr, "worker HTTP surface starting");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_poller(config: AppConfig) -> Result<(), CliError> {
    let poller_config = config.poller_config();
    let tick_interval = std::time::Duration::from_secs(5);
    let stack = Stack::build(config)?;

    let poller = vpcp_poller::Poller::new(
        stack.provider_job_store,
        stack.adapters,
        stack.rate_limiter,
        stack.router,
        stack.budget,
        Arc::new(vpcp_poller::NullUploadCollaborator),
        poller_config,
    );

    info!("poller daemon starting");
    loop {
        match poller.tick().await {
            Ok(report) => info!(?report, "poller tick completed"),
            Err(err) => tracing::warn!(error = %err, "poller tick failed"),
        }
        tokio::time::sleep(tick_interval).await;
    }
}
