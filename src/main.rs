//! Crop Advisor - Main Entry Point
//!
//! Loads the model artifacts, then answers prediction requests over NATS.

use anyhow::{Context, Result};
use crop_advisor::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PredictionMetrics},
    models::inference::InferencePipeline,
    producer::ReplyProducer,
    service::{self, WorkerPool},
    types::PredictionReply,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for in-flight requests
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crop_advisor={}", logging.level)));

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    info!("Starting Crop Advisor");
    info!(
        models_dir = %config.models.models_dir,
        classifier = %config.models.classifier_file,
        "Configuration loaded successfully"
    );

    // Artifacts must all load before anything is served
    let pipeline = match InferencePipeline::load(&config.models) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!(error = %e, "Failed to load model artifacts");
            return Err(e).context("Refusing to serve predictions without model artifacts");
        }
    };
    info!(
        classifier = pipeline.classifier_name(),
        crops = pipeline.class_names().len(),
        "Inference pipeline ready"
    );

    // Initialize metrics
    let metrics = Arc::new(PredictionMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.request_subject,
        &config.nats.queue_group,
    );
    let producer = Arc::new(ReplyProducer::new(
        client.clone(),
        config.nats.results_subject.as_deref(),
    ));
    if let Some(subject) = producer.results_subject() {
        info!("Broadcasting results to: {}", subject);
    }

    let num_workers = config.service.workers.max(1);
    info!(
        "Starting request loop with {} parallel workers on subject {}",
        num_workers,
        consumer.subject()
    );

    // Limits concurrent processing; drained on shutdown
    let pool = WorkerPool::new(num_workers);
    let handled_count = Arc::new(AtomicU64::new(0));

    if config.service.metrics_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.service.metrics_interval_secs);
        tokio::spawn(reporter.start());
    }

    let mut subscription = consumer.subscribe().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => {
                    warn!("Request subscription closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        };

        // Acquire permit (limits concurrent tasks)
        let permit = tokio::select! {
            permit = pool.acquire() => permit?,
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                warn!(subject = %message.subject, "Dropping request received during shutdown");
                break;
            }
        };

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let handled_count = handled_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let reply = service::handle_payload(&pipeline, &message.payload);
            let processing_time = start_time.elapsed();

            match &reply {
                PredictionReply::Ok(response) => {
                    metrics.record_prediction(processing_time, &response.crop, response.confidence);
                    debug!(
                        request_id = %response.request_id,
                        crop = %response.crop,
                        confidence = ?response.confidence,
                        processing_time_us = processing_time.as_micros(),
                        "Prediction served"
                    );
                }
                PredictionReply::Error(failure) => {
                    metrics.record_failure(processing_time, &failure.kind);
                    if failure.kind == "unknown_class_index" {
                        // classifier and label encoder artifacts do not match
                        error!(
                            request_id = %failure.request_id,
                            error = %failure.message,
                            "Model artifacts are inconsistent"
                        );
                    } else {
                        warn!(
                            request_id = %failure.request_id,
                            kind = %failure.kind,
                            error = %failure.message,
                            "Prediction request failed"
                        );
                    }
                }
            }

            match message.reply {
                Some(reply_to) => {
                    if let Err(e) = producer.reply(reply_to, &reply).await {
                        error!(
                            request_id = %reply.request_id(),
                            error = %e,
                            "Failed to publish reply"
                        );
                    }
                }
                None => {
                    debug!(request_id = %reply.request_id(), "Request has no reply subject");
                }
            }

            if let Err(e) = producer.broadcast(&reply).await {
                warn!(error = %e, "Failed to broadcast result");
            }

            let count = handled_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let stats = metrics.get_processing_stats();
                info!(
                    handled = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Crop Advisor shutting down...");
    drop(subscription);
    if tokio::time::timeout(SHUTDOWN_GRACE, pool.drain()).await.is_err() {
        warn!(
            in_flight = pool.in_flight(),
            "In-flight requests did not finish before shutdown"
        );
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS connection");
    }
    metrics.print_summary();

    Ok(())
}
