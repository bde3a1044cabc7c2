use std::path::PathBuf;
use std::process;

use clap::Parser;

use facesweep_core::detection::domain::detector_config::{ColorOrder, DetectorConfig};
use facesweep_core::detection::infrastructure::onnx_box_backend::OnnxBoxBackend;
use facesweep_core::io::domain::detection_writer::DetectionWriter;
use facesweep_core::io::domain::frame_reader::FrameReader;
use facesweep_core::io::infrastructure::image_file_reader::ImageFileReader;
use facesweep_core::io::infrastructure::json_lines_writer::JsonLinesWriter;
use facesweep_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
use facesweep_core::pipeline::infrastructure::threaded_detection_runner::ThreadedDetectionRunner;
use facesweep_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facesweep_core::shared::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE};

/// Batched, rotation-aware face detection over image files.
#[derive(Parser)]
#[command(name = "facesweep")]
struct Cli {
    /// Input image files or directories of images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// ONNX face detection model.
    #[arg(long)]
    model: PathBuf,

    /// Square model input size in pixels.
    #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
    input_size: u32,

    /// Images per inference batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Rotation search: off, on, a step in degrees, or a comma-separated angle list.
    #[arg(long, default_value = "off")]
    rotation: String,

    /// Drop faces whose diagonal is below this many pixels (0 = keep all).
    #[arg(long, default_value_t = 0)]
    min_size: u32,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Channel order the model expects: rgb or bgr.
    #[arg(long, default_value = "rgb")]
    color_order: String,

    /// JSON-lines output file (stdout when omitted).
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;

    let backend = OnnxBoxBackend::new(&cli.model, cli.confidence)?;
    if let Some(model_size) = backend.model_input_size() {
        if model_size != config.input_size() {
            log::warn!(
                "Model declares input size {model_size}, but --input-size is {}",
                config.input_size()
            );
        }
    }

    let reader: Box<dyn FrameReader> = Box::new(
        ImageFileReader::new(&cli.inputs).map_err(|e| e as Box<dyn std::error::Error>)?,
    );
    if reader.is_empty() {
        return Err("No input images found".into());
    }
    let total = reader.len();

    let writer: Box<dyn DetectionWriter> = match &cli.output {
        Some(path) => Box::new(
            JsonLinesWriter::create(path).map_err(|e| e as Box<dyn std::error::Error>)?,
        ),
        None => Box::new(JsonLinesWriter::new(std::io::stdout())),
    };

    let mut use_case = DetectFacesUseCase::new(
        &config,
        Box::new(backend),
        Box::new(StdoutPipelineLogger::default()),
    )
    .with_total_items(total);

    let delivered = ThreadedDetectionRunner::new().run(reader, writer, &mut use_case)?;
    match &cli.output {
        Some(path) => log::info!("Wrote detections for {delivered} images to {}", path.display()),
        None => log::info!("Wrote detections for {delivered} images"),
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<DetectorConfig, Box<dyn std::error::Error>> {
    let color_order: ColorOrder = cli.color_order.parse()?;
    let config = DetectorConfig::new(cli.input_size, cli.batch_size, &cli.rotation, cli.min_size)?
        .with_color_order(color_order);
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.model.is_file() {
        return Err(format!("Model file not found: {}", cli.model.display()).into());
    }
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input not found: {}", input.display()).into());
        }
    }
    if cli.input_size == 0 {
        return Err("Input size must be greater than zero".into());
    }
    if cli.batch_size == 0 {
        return Err("Batch size must be greater than zero".into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    Ok(())
}
