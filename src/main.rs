//! Readmission Pipeline - Main Entry Point
//!
//! Derives feature stores from a training corpus, evaluates the fitted
//! classifiers on labeled data, and serves interactive predictions, either
//! once from a JSON file or continuously over NATS.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use readmission_pipeline::{
    config::AppConfig,
    consumer::{respond, RequestConsumer},
    data::load_corpus,
    evaluation::Evaluator,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{InferenceEngine, ModelId},
    producer::ResponsePublisher,
    report, FeatureStore, PredictionResponse,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "readmission", version, about = "Hospital readmission prediction pipeline")]
struct Cli {
    /// Configuration file; defaults are used when it does not exist
    #[arg(long, global = true, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture vocabularies and schemas from a training corpus
    DeriveStore(DeriveStoreArgs),
    /// Score a labeled corpus and report classification metrics
    Evaluate(EvaluateArgs),
    /// Score one encounter read from a JSON file
    Predict(PredictArgs),
    /// Answer prediction requests over NATS
    Serve,
}

#[derive(Args)]
struct DeriveStoreArgs {
    /// Training corpus CSV
    #[arg(long)]
    data: PathBuf,

    /// Version stamped into the store and checked against model artifacts
    #[arg(long = "store-version")]
    store_version: String,

    /// Output path; defaults to artifacts.feature_store from the config
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Labeled corpus CSV
    #[arg(long)]
    data: PathBuf,

    /// Models to evaluate (repeatable); all loaded models when omitted
    #[arg(long = "model", value_name = "ID")]
    models: Vec<ModelId>,

    /// Override scoring.decision_threshold
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    metrics_out: Option<PathBuf>,

    #[arg(long)]
    roc_out: Option<PathBuf>,
}

#[derive(Args)]
struct PredictArgs {
    /// JSON file holding one encounter, or "-" for stdin
    #[arg(long)]
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    init_logging(&config)?;
    info!(config = %cli.config.display(), "Configuration loaded successfully");

    match cli.command {
        Command::DeriveStore(args) => derive_store(&config, args),
        Command::Evaluate(args) => evaluate(&config, args),
        Command::Predict(args) => predict(&config, args),
        Command::Serve => serve(config).await,
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("readmission_pipeline={}", config.logging.level)
            .parse()
            .context("Invalid logging.level")?,
    );

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn derive_store(config: &AppConfig, args: DeriveStoreArgs) -> Result<()> {
    let records = load_corpus(&args.data)?;
    let store = FeatureStore::derive(&records, args.store_version)?;

    let out = args.out.unwrap_or_else(|| config.artifacts.feature_store.clone());
    store.save(&out)?;

    info!(
        path = %out.display(),
        version = %store.version(),
        linear_columns = store.linear_schema().len(),
        "Feature store written"
    );
    Ok(())
}

fn evaluate(config: &AppConfig, args: EvaluateArgs) -> Result<()> {
    let engine = InferenceEngine::from_config(config)?;
    let records = load_corpus(&args.data)?;
    let threshold = args.threshold.unwrap_or(config.scoring.decision_threshold);
    anyhow::ensure!(
        (0.0..=1.0).contains(&threshold),
        "--threshold {threshold} must lie in [0, 1]"
    );

    info!(
        records = records.len(),
        threshold = threshold,
        "Starting evaluation"
    );

    let reports = Evaluator::new(&engine, threshold)
        .evaluate_models(&args.models, &records)
        .context("Evaluation aborted")?;

    report::log_comparison(&reports);
    if let Some(path) = &args.metrics_out {
        report::save_metrics(&reports, path)?;
    }
    if let Some(path) = &args.roc_out {
        report::save_roc(&reports, path)?;
    }
    Ok(())
}

fn predict(config: &AppConfig, args: PredictArgs) -> Result<()> {
    let engine = InferenceEngine::from_config(config)?;

    let mut payload = Vec::new();
    if args.input.as_os_str() == "-" {
        std::io::stdin()
            .read_to_end(&mut payload)
            .context("Failed to read request from stdin")?;
    } else {
        payload = std::fs::read(&args.input)
            .with_context(|| format!("Failed to read {}", args.input.display()))?;
    }

    let response = respond(&engine, &payload);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Some(body) = response.fatal_error() {
        anyhow::bail!("Prediction failed ({}): {}", body.kind, body.message);
    }
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting readmission prediction service");

    let engine = Arc::new(InferenceEngine::from_config(&config)?);
    info!(
        models = ?engine.registry().loaded(),
        moderate = engine.risk_tiers().moderate,
        high = engine.risk_tiers().high,
        "Inference engine ready"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let publisher = Arc::new(ResponsePublisher::new(
        client.clone(),
        &config.nats.response_subject,
    ));

    let num_workers = config.service.workers;
    info!(
        workers = num_workers,
        requests = consumer.subject(),
        responses = publisher.subject(),
        "Starting request loop"
    );

    // Limits the number of requests scored concurrently
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.service.report_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    // Scoring tasks report a schema mismatch here; serving stops on the first one
    let (drift_tx, mut drift_rx) = mpsc::channel::<String>(1);

    loop {
        let message = tokio::select! {
            Some(detail) = drift_rx.recv() => {
                error!(detail = %detail, "Schema mismatch between encoder and models, stopping service");
                metrics.print_summary();
                anyhow::bail!("Encoded layout diverged from the training schema: {detail}");
            }
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let engine = engine.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();
        let drift_tx = drift_tx.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let response: PredictionResponse = respond(&engine, &message.payload);
            let latency = start_time.elapsed();

            match (&response.prediction, &response.error) {
                (Some(prediction), _) => metrics.record_prediction(latency, prediction),
                (None, body) => metrics.record_failure(
                    latency,
                    body.as_ref().map_or("unknown", |b| b.kind.as_str()),
                ),
            }

            let reply = message.reply.as_ref().map(|subject| subject.to_string());
            if let Err(e) = publisher.publish(reply, &response).await {
                error!(
                    response_id = %response.response_id,
                    error = %e,
                    "Failed to publish prediction response"
                );
            }

            if let Some(body) = response.error.as_ref().filter(|b| b.is_schema_mismatch()) {
                let _ = drift_tx.try_send(body.message.clone());
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let latency_stats = metrics.latency_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.throughput()),
                    avg_latency_us = latency_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
