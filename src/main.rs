use anyhow::{Context, Result};
use probeanno::cli::{parse_args, setup_logging, AnnotateArgs, Commands, VerifyArgs};
use probeanno::export;
use probeanno::pipeline::{Pipeline, PipelineConfig};
use probeanno::utils::validation;
use probeanno::verify::{verify_exports, VerifyConfig};
use tracing::{error, info, warn};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", probeanno::info());

    let result = match cli.command {
        Commands::Annotate(args) => run_annotate(args),
        Commands::Verify(args) => run_verify(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_annotate(args: AnnotateArgs) -> Result<()> {
    info!("Config file: {:?}", args.config);

    let mut config = PipelineConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    info!("Output directory: {:?}", config.output_dir);

    let pipeline = Pipeline::new(config).with_progress(!args.no_progress);
    let report = pipeline.run().context("Annotation run failed")?;

    let failures = report.failures();
    for failure in &failures {
        warn!("Failed: {}: {}", failure.dataset, failure.error);
    }

    if args.verify {
        info!("Verifying exports...");
        let quality = pipeline.verify(&report)?;
        quality.log();
    }

    info!(
        "{} datasets annotated, {} failed",
        report.results.len() - failures.len(),
        failures.len()
    );
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    info!("Input directory: {:?}", args.input);

    validation::ordered_bounds(args.min_value, args.max_value, "value range")?;
    validation::positive(args.top_n, "top-n")?;

    let config = VerifyConfig {
        min_value: args.min_value,
        max_value: args.max_value,
        top_n: args.top_n,
    };

    let exports = export::discover_exports(&args.input)?;
    if exports.is_empty() {
        anyhow::bail!("No *{} files found in {:?}", export::ANNOTATED_SUFFIX, args.input);
    }
    info!("Found {} annotated tables", exports.len());

    let quality = verify_exports(&exports, &config);
    quality.log();

    let output = args
        .output
        .unwrap_or_else(|| args.input.join(export::QUALITY_REPORT_FILE));
    export::write_quality_report(&output, &quality)?;

    Ok(())
}
