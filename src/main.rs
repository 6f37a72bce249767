use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use stream_anomaly::utils::data_stream::generate_energy_data_stream_seeded;
use stream_anomaly::{plot_energy_stream, AppConfig, Evaluator, Label, StreamDetector};

#[derive(Parser)]
#[command(
    name = "stream_anomaly",
    about = "Flag anomalies in a synthetic hourly energy stream",
    version,
    long_about = None
)]
struct Cli {
    /// TOML file with [detector], [stream] and [output] sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of hourly points to generate
    #[arg(long)]
    hours: Option<usize>,

    /// Inject a spike every N hours
    #[arg(long)]
    anomaly_freq: Option<usize>,

    /// Seed for the synthetic stream
    #[arg(long)]
    stream_seed: Option<u64>,

    /// Leading points used to seed the detector
    #[arg(long)]
    initial_batch: Option<usize>,

    /// Detector window size
    #[arg(long)]
    window_size: Option<usize>,

    /// Expected outlier fraction when fitting the scorer
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Seed for the scorer
    #[arg(long)]
    seed: Option<u64>,

    /// Retrain after this many full-window detections
    #[arg(long)]
    retrain_interval: Option<usize>,

    /// Where to write detected anomalies
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delay between animation frames
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Draw only the final frame
    #[arg(long)]
    no_animate: bool,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };

        let stream = &mut config.stream;
        stream.hours = self.hours.unwrap_or(stream.hours);
        stream.anomaly_freq = self.anomaly_freq.unwrap_or(stream.anomaly_freq);
        stream.seed = self.stream_seed.unwrap_or(stream.seed);
        stream.initial_batch = self.initial_batch.unwrap_or(stream.initial_batch);

        let detector = &mut config.detector;
        detector.window_size = self.window_size.unwrap_or(detector.window_size);
        detector.sensitivity = self.sensitivity.unwrap_or(detector.sensitivity);
        detector.seed = self.seed.unwrap_or(detector.seed);
        detector.retrain_interval = self.retrain_interval.unwrap_or(detector.retrain_interval);

        let output = &mut config.output;
        if let Some(path) = self.output {
            output.csv_path = path;
        }
        output.frame_interval_ms = self.frame_interval_ms.unwrap_or(output.frame_interval_ms);
        output.animate = output.animate && !self.no_animate;

        config.detector.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Cli::parse().into_config()?;
    let stream = generate_energy_data_stream_seeded(
        config.stream.hours,
        config.stream.anomaly_freq,
        config.stream.seed,
    )?;
    tracing::info!(
        hours = stream.len(),
        injected = stream.anomaly_indices.len(),
        "generated energy stream"
    );

    let mut detector = StreamDetector::with_config(config.detector.clone())?;
    let seed_len = config.stream.initial_batch.min(stream.len());
    detector
        .initial_fit(&stream.values[..seed_len])
        .context("seeding detector")?;

    let labels: Vec<Label> = detector.detect_batch(&stream.values)?;
    let evaluation = Evaluator::from_labels(&stream.anomaly_indices, &labels)?;

    let mut stdout = io::stdout().lock();
    let records = plot_energy_stream(&stream.values, &labels, &config.output, &mut stdout)?;

    tracing::info!(
        detected = records.len(),
        retrains = detector.retrain_count(),
        precision = evaluation.precision(),
        recall = evaluation.recall(),
        f1 = evaluation.f1(),
        "detection finished"
    );
    Ok(())
}
