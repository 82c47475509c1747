//! Sample Record Generator
//!
//! Writes random food waste records as JSON Lines for `food-waste-estimator batch`.
//! A share of the records is drifted: unseen countries or categories, values
//! outside the form ranges, or years the models never saw.
//!
//! Usage: sample_records [COUNT] [DRIFT_RATE] [OUTPUT]

use food_waste_estimator::config::FormConfig;
use food_waste_estimator::types::record::WasteRecord;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

/// Record generator for exercising the estimator
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    form: FormConfig,
    record_counter: u64,
}

impl RecordGenerator {
    fn new(form: FormConfig) -> Self {
        Self {
            rng: rand::thread_rng(),
            form,
            record_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.record_counter += 1;
        format!("rec_{:08}", self.record_counter)
    }

    /// Generate a record inside every form range
    fn generate_valid(&mut self) -> WasteRecord {
        let country = self.random_choice(&self.form.countries.clone());
        let category = self.random_choice(&self.form.food_categories.clone());
        let population: f64 = self.rng.gen_range(10.0..1400.0);
        let per_capita: f64 = self.rng.gen_range(20.0..200.0);
        // Total waste loosely follows population and per-capita waste
        let total = (population * per_capita / 4.0 * self.rng.gen_range(0.7..1.3)).round();

        let mut record = WasteRecord::new(
            &country,
            self.rng.gen_range(self.form.year_min..=self.form.year_max),
            &category,
            total,
            round1(per_capita),
            round1(population),
            round1(self.rng.gen_range(20.0..80.0)),
        );
        record.record_id = self.next_id();
        record
    }

    /// Generate a record the estimator should reject
    fn generate_drifted(&mut self) -> WasteRecord {
        let mut record = self.generate_valid();
        match self.rng.gen_range(0..4) {
            0 => {
                record.country = self
                    .random_choice(&["Germany", "Canada", "Nigeria", "Australia"])
                    .to_string()
            }
            1 => {
                record.food_category = self
                    .random_choice(&["Bakery Items", "Beverages", "Frozen Food"])
                    .to_string()
            }
            2 => record.household_waste_pct = round1(self.rng.gen_range(101.0..150.0)),
            _ => record.year = self.form.year_max + self.rng.gen_range(1..10),
        }
        record
    }

    fn random_choice<T: Clone>(&mut self, choices: &[T]) -> T {
        choices[self.rng.gen_range(0..choices.len())].clone()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_records=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let drift_rate: f64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);
    let output = args.get(3);

    info!(
        count = count,
        drift_rate = drift_rate,
        output = output.map(|s| s.as_str()).unwrap_or("stdout"),
        "Generating sample records"
    );

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let mut generator = RecordGenerator::new(FormConfig::default());
    let mut rng = rand::thread_rng();
    let mut valid_count = 0;
    let mut drifted_count = 0;

    for _ in 0..count {
        let record = if rng.gen_bool(drift_rate) {
            drifted_count += 1;
            generator.generate_drifted()
        } else {
            valid_count += 1;
            generator.generate_valid()
        };

        serde_json::to_writer(&mut writer, &record)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} records ({} valid, {} drifted)",
        count, valid_count, drifted_count
    );

    Ok(())
}
