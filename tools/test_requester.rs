//! Test Request Generator
//!
//! Sends generated patient requests to the prediction service over NATS
//! request/reply and logs the answers.

use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const SYMPTOMS: &[&str] = &[
    "fever",
    "cough",
    "headache",
    "fatigue",
    "sore throat",
    "runny nose",
    "nausea",
    "vomiting",
    "chest pain",
    "shortness of breath",
    "rash",
    "joint pain",
    "dizziness",
    "chills",
];

/// Request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    request_counter: u64,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    /// Generate a well-formed request with plausible vitals
    fn generate_valid(&mut self) -> Value {
        self.request_counter += 1;

        let count = self.rng.gen_range(1..=4);
        let symptoms: Vec<&str> = (0..count).map(|_| self.random_choice(SYMPTOMS)).collect();

        json!({
            "request_id": format!("req_{:08}", self.request_counter),
            "symptoms": symptoms.join(" "),
            "age": self.rng.gen_range(1..95),
            "heart_rate": self.rng.gen_range(55..130),
            "blood_pressure": format!(
                "{}/{}",
                self.rng.gen_range(95..170),
                self.rng.gen_range(60..105)
            ),
            "temperature": (self.rng.gen_range(96.0..104.0_f64) * 10.0).round() / 10.0,
            "oxygen_saturation": self.rng.gen_range(85..100),
        })
    }

    /// Generate a request with missing or malformed fields
    fn generate_malformed(&mut self) -> Value {
        self.request_counter += 1;

        match self.rng.gen_range(0..4) {
            0 => json!({ "symptoms": self.random_choice(SYMPTOMS), "blood_pressure": "high" }),
            1 => json!({ "symptoms": "cough", "heart_rate": "fast", "age": null }),
            2 => json!({}),
            _ => json!(["not", "an", "object"]),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Request Generator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("symptoms.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let malformed_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        malformed_rate = malformed_rate,
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
            return run_dry_mode(count, malformed_rate, delay_ms).await;
        }
    };

    let mut generator = RequestGenerator::new();
    let mut rng = rand::thread_rng();
    let malformed_rate = malformed_rate.clamp(0.0, 1.0);

    let mut answered = 0;
    let mut rejected = 0;

    for i in 0..count {
        let request = if rng.gen_bool(malformed_rate) {
            generator.generate_malformed()
        } else {
            generator.generate_valid()
        };

        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                let body: Value = serde_json::from_slice(&reply.payload)?;
                if body.get("result").is_some() {
                    answered += 1;
                    info!(request = %request, result = %body["result"], "Prediction received");
                } else {
                    rejected += 1;
                    info!(request = %request, error = %body["error"], kind = %body["kind"], "Request rejected");
                }
            }
            Err(e) => warn!(error = %e, "Request failed"),
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} answered, {} rejected)",
                i + 1,
                count,
                answered,
                rejected
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} answered, {} rejected)",
        count, answered, rejected
    );

    Ok(())
}

async fn run_dry_mode(count: u64, malformed_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RequestGenerator::new();
    let mut rng = rand::thread_rng();
    let malformed_rate = malformed_rate.clamp(0.0, 1.0);

    for i in 0..count {
        let request = if rng.gen_bool(malformed_rate) {
            generator.generate_malformed()
        } else {
            generator.generate_valid()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, serde_json::to_string_pretty(&request)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
