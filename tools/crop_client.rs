//! Crop Advisor Client
//!
//! Sends prediction requests to the service over NATS and logs the replies.

use crop_advisor::features::{FeatureVector, FEATURE_RANGES};
use crop_advisor::types::{PredictionReply, PredictionRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Feature vector generator for exercising the service
struct ReadingGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ReadingGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Uniform readings inside the form's guidance ranges
    fn generate(&mut self) -> FeatureVector {
        let mut values = [0.0; 7];
        for (value, range) in values.iter_mut().zip(FEATURE_RANGES.iter()) {
            *value = self.rng.gen_range(range.min..=range.max);
        }
        FeatureVector::new(
            values[0], values[1], values[2], values[3], values[4], values[5], values[6],
        )
    }
}

fn describe(reply: &PredictionReply) -> String {
    match reply {
        PredictionReply::Ok(r) => match r.confidence {
            Some(c) => format!("{} (confidence: {:.2}%)", r.crop, c * 100.0),
            None => r.crop.clone(),
        },
        PredictionReply::Error(f) => format!("error [{}]: {}", f.kind, f.message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crop_client=info".parse()?),
        )
        .init();

    info!("Starting Crop Advisor Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("crop.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
    };

    let mut generator = ReadingGenerator::new();
    let mut answered = 0;
    let mut failed = 0;

    for i in 0..count {
        // first request is always the rice exemplar
        let features = if i == 0 {
            FeatureVector::rice_exemplar()
        } else {
            generator.generate()
        };
        let request = PredictionRequest::new(features);
        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(message) => match serde_json::from_slice::<PredictionReply>(&message.payload) {
                Ok(reply) => {
                    if reply.is_ok() {
                        answered += 1;
                    } else {
                        failed += 1;
                    }
                    info!(request_id = %reply.request_id(), "{}", describe(&reply));
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "Unreadable reply");
                }
            },
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Request failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} answered, {} failed)",
        count, answered, failed
    );

    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ReadingGenerator::new();

    for i in 0..count {
        let request = PredictionRequest::new(generator.generate());
        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
