//! Symptom Prediction Service - Main Entry Point
//!
//! Answers prediction requests received over NATS request/reply.
//! Requests are handled in parallel, bounded by the configured worker count.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use symptom_prediction_service::{
    config::AppConfig,
    consumer::{decode_request, RequestConsumer},
    error::{ErrorKind, PredictionError},
    metrics::{MetricsReporter, PipelineMetrics},
    models::inference::PredictionService,
    producer::{aborted_body, reply_body, ReplyPublisher},
    types::prediction::ErrorResponse,
};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    config.logging.init()?;

    info!("Starting Symptom Prediction Service");

    // Load artifacts; the service does not start without the mandatory ones
    let service = match PredictionService::from_config(&config.artifacts) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "Mandatory artifacts failed to load, refusing to serve");
            return Err(e).context("Artifact loading failed");
        }
    };
    let artifacts = service.artifacts();
    info!(
        feature_width = artifacts.feature_width(),
        models = ?artifacts.model_names(),
        mandatory = %artifacts.mandatory_model,
        "Prediction service ready"
    );
    drop(artifacts);

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject)
        .with_queue_group(config.nats.queue_group.clone());
    let publisher = ReplyPublisher::new(client.clone());

    // Artifact reload listener
    if let Some(reload_subject) = config.nats.reload_subject.clone() {
        let mut reloads = RequestConsumer::new(client.clone(), &reload_subject)
            .subscribe()
            .await?;
        let service = service.clone();
        let publisher = publisher.clone();
        let artifacts_config = config.artifacts.clone();

        tokio::spawn(async move {
            while let Some(message) = reloads.next().await {
                // file reads and session builds block
                let reloading = service.clone();
                let config = artifacts_config.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || reloading.reload_from(&config)).await;

                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(format!("reload task failed: {}", e)),
                };
                let reply = match failure {
                    None => serde_json::json!({ "reloaded": service.model_names() }),
                    Some(reason) => {
                        error!(error = %reason, "Artifact reload failed, keeping current artifacts");
                        serde_json::to_value(ErrorResponse::new(reason, ErrorKind::Unavailable))
                            .unwrap_or_default()
                    }
                };
                if let Some(reply_to) = message.reply {
                    if let Err(e) = publisher.reply(reply_to, &reply).await {
                        warn!(error = %e, "Failed to acknowledge reload");
                    }
                }
            }
        });
        info!(subject = %reload_subject, "Listening for artifact reloads");
    }

    // Start metrics reporter
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting request loop with {} parallel workers on subject {}",
        num_workers,
        consumer.subject()
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let outcome = match decode_request(&message.payload) {
                // inference is CPU-bound; keep it off the async workers
                Ok(payload) => {
                    tokio::task::spawn_blocking(move || service.encode_and_predict(&payload))
                        .await
                        .map_err(|e| anyhow::anyhow!("prediction task failed: {}", e))
                }
                Err(e) => Ok(Err(PredictionError::from(e))),
            };

            let processing_time = start_time.elapsed();
            let body = match outcome {
                Ok(outcome) => {
                    match &outcome {
                        Ok(predictions) => {
                            metrics.record_prediction(processing_time, predictions);
                            debug!(
                                models = ?predictions.model_names(),
                                processing_time_us = processing_time.as_micros(),
                                "Request answered"
                            );
                        }
                        Err(e) => {
                            metrics.record_error(processing_time, e.kind());
                            warn!(error = %e, kind = ?e.kind(), "Request rejected");
                        }
                    }
                    reply_body(&outcome)
                }
                Err(e) => {
                    error!(error = %e, "Request handling aborted");
                    metrics.record_error(processing_time, ErrorKind::Unavailable);
                    aborted_body(&e.to_string())
                }
            };

            match message.reply {
                Some(reply_to) => match body {
                    Ok(body) => {
                        if let Err(e) = publisher.reply_raw(reply_to, body).await {
                            error!(error = %e, "Failed to publish reply");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to serialise reply"),
                },
                None => debug!("Request has no reply subject, result not sent"),
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
