use std::path::PathBuf;
use std::time::Duration;

use ferry_core::impls::{HttpTransport, SimulatedTransport};
use ferry_core::{FilePayload, QueueConfig, QueueEvent, QueueStats, StatusKind, UploadQueue};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

struct Args {
    config: Option<PathBuf>,
    retry_failed: bool,
    files: Vec<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        retry_failed: false,
        files: Vec::new(),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let path = it.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--retry-failed" => args.retry_failed = true,
            "-h" | "--help" => {
                return Err("usage: ferry [--config ferry.toml] [--retry-failed] FILE...".into());
            }
            _ => args.files.push(PathBuf::from(arg)),
        }
    }
    Ok(args)
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(env_filter);
    tracing_subscriber::registry().with(console_layer).init();
}

/// 指定がなければデモ用のダミーファイル
async fn load_files(paths: &[PathBuf]) -> Result<Vec<FilePayload>, std::io::Error> {
    if paths.is_empty() {
        return Ok(["hero.jpg", "logo.png", "promo.mp4"]
            .into_iter()
            .map(|name| FilePayload::from_bytes(name, vec![0u8; 4096]))
            .collect());
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(FilePayload::from_path(path).await?);
    }
    Ok(files)
}

fn build_queue(config: QueueConfig) -> Result<UploadQueue, Box<dyn std::error::Error>> {
    let builder = UploadQueue::builder();
    let builder = match &config.http {
        Some(http) => {
            info!(endpoint = %http.endpoint, "using http transport");
            builder.transport(HttpTransport::from_config(http)?)
        }
        None => {
            info!("no [http] section, simulating uploads");
            builder.transport(
                SimulatedTransport::new(Duration::from_millis(150), 5)
                    .failing_first(1)
                    .rejecting("reject"),
            )
        }
    };
    Ok(builder.config(config).build()?)
}

const SUMMARY_ORDER: [StatusKind; 5] = [
    StatusKind::Completed,
    StatusKind::Failed,
    StatusKind::Cancelled,
    StatusKind::Pending,
    StatusKind::Uploading,
];

fn print_summary(queue_stats: &QueueStats) -> Result<(), serde_json::Error> {
    let counts: Vec<String> = SUMMARY_ORDER
        .iter()
        .filter(|kind| queue_stats.count(**kind) > 0)
        .map(|kind| format!("{kind}={}", queue_stats.count(*kind)))
        .collect();
    println!("{} of {} ({}%)", counts.join(" "), queue_stats.total, queue_stats.global_progress);
    println!("{}", serde_json::to_string_pretty(queue_stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => QueueConfig::load(path)?,
        None => QueueConfig::default(),
    };

    let queue = build_queue(config)?;

    // (A) イベントを1行ずつ表示
    let mut events = queue.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(QueueEvent::Progress { .. }) => {}
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(error = %err, "event not printable"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // (B) 投入して処理が落ち着くまで待つ（Ctrl-C で全部取り消し）
    let files = load_files(&args.files).await?;
    queue.enqueue(files).await?;

    let mut stats = tokio::select! {
        stats = queue.wait_idle() => stats,
        _ = tokio::signal::ctrl_c() => {
            let removed = queue.clear_all().await;
            warn!(removed, "interrupted, queue cleared");
            queue.stats().await
        }
    };

    // (C) 失敗分を一度だけ手動リトライ
    if args.retry_failed && stats.failed > 0 {
        for item in queue.items().await {
            if item.kind() == StatusKind::Failed {
                if let Err(err) = queue.retry(item.id).await {
                    warn!(upload_id = %item.id, error = %err, "retry refused");
                }
            }
        }
        stats = queue.wait_idle().await;
    }

    for item in queue.items().await {
        let detail = match item.status.failure() {
            Some(failure) => failure.to_string(),
            None => String::new(),
        };
        println!(
            "{:<28} {:<10} retries={} {}",
            item.name,
            item.kind(),
            item.retry_count,
            detail
        );
    }
    print_summary(&stats)?;

    drop(queue);
    printer.abort();
    Ok(())
}
