//! Sample Request Producer
//!
//! Generates synthetic encounters from a feature store's vocabularies and
//! sends them to the prediction service over NATS.

use anyhow::Context;
use clap::Parser;
use rand::rngs::ThreadRng;
use rand::Rng;
use readmission_pipeline::types::CategoricalField;
use readmission_pipeline::{FeatureStore, PredictionResponse, RawInput};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sample_requests", about = "Send synthetic prediction requests")]
struct Args {
    /// Feature store whose vocabularies the samples draw from
    #[arg(long, default_value = "artifacts/feature_store.json")]
    feature_store: PathBuf,

    #[arg(long, default_value = "nats://localhost:4222")]
    nats_url: String,

    #[arg(long, default_value = "readmission.predict")]
    subject: String,

    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Share of requests carrying a category outside the vocabulary
    #[arg(long, default_value_t = 0.05)]
    invalid_rate: f64,

    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

/// Encounter generator for exercising the service
struct EncounterGenerator<'a> {
    store: &'a FeatureStore,
    rng: ThreadRng,
}

impl<'a> EncounterGenerator<'a> {
    fn new(store: &'a FeatureStore) -> Self {
        Self {
            store,
            rng: rand::thread_rng(),
        }
    }

    fn level(&mut self, field: CategoricalField) -> String {
        let levels = self.store.vocabulary(field).levels();
        levels[self.rng.gen_range(0..levels.len())].clone()
    }

    /// An encounter whose categories all belong to the vocabulary
    fn generate(&mut self) -> RawInput {
        let length_of_stay = self.rng.gen_range(1..15);
        RawInput {
            length_of_stay,
            lab_procedures: self.rng.gen_range(1..110),
            procedures: self.rng.gen_range(0..7),
            medications: self.rng.gen_range(1..60),
            outpatient_visits: self.rng.gen_range(0..4),
            inpatient_visits: self.rng.gen_range(0..4),
            emergency_visits: self.rng.gen_range(0..3),
            n_diagnoses: self.rng.gen_range(1..17),
            age: self.level(CategoricalField::Age),
            medical_specialty: self.level(CategoricalField::MedicalSpecialty),
            diag_1: self.level(CategoricalField::PrimaryDiagnosis),
            change: self.level(CategoricalField::Change),
            diabetes_med: self.level(CategoricalField::DiabetesMed),
            glucose_test: self.level(CategoricalField::GlucoseTest),
            a1c_test: self.level(CategoricalField::A1cTest),
        }
    }

    /// An encounter with one category the service must reject
    fn generate_invalid(&mut self) -> RawInput {
        let mut raw = self.generate();
        let field = CategoricalField::ALL[self.rng.gen_range(0..CategoricalField::ALL.len())];
        let drifted = raw.categorical(field).replace('/', ".") + "?";
        *raw.categorical_mut(field) = drifted;
        raw
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_requests=info".parse()?),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.invalid_rate),
        "--invalid-rate must lie in [0, 1]"
    );
    let store = FeatureStore::load(&args.feature_store).context("Failed to load feature store")?;

    info!(
        nats_url = %args.nats_url,
        subject = %args.subject,
        count = args.count,
        invalid_rate = args.invalid_rate,
        "Starting sample request producer"
    );

    let client = match async_nats::connect(&args.nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&store, &args).await;
        }
    };

    let mut generator = EncounterGenerator::new(&store);
    let mut rng = rand::thread_rng();
    let (mut ok_count, mut error_count) = (0u64, 0u64);

    for i in 0..args.count {
        let raw = if rng.gen_bool(args.invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate()
        };
        let payload = serde_json::to_vec(&raw)?;

        match client.request(args.subject.clone(), payload.into()).await {
            Ok(reply) => {
                let response: PredictionResponse = serde_json::from_slice(&reply.payload)?;
                if response.is_ok() {
                    ok_count += 1;
                } else {
                    error_count += 1;
                }
            }
            Err(e) => warn!(error = %e, "Request failed"),
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} scored, {} rejected)",
                i + 1,
                args.count,
                ok_count,
                error_count
            );
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    info!(
        "Completed! {} scored, {} rejected",
        ok_count, error_count
    );
    Ok(())
}

async fn run_dry_mode(store: &FeatureStore, args: &Args) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = EncounterGenerator::new(store);
    let mut rng = rand::thread_rng();

    for i in 0..args.count {
        let raw = if rng.gen_bool(args.invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, serde_json::to_string_pretty(&raw)?);
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    Ok(())
}
