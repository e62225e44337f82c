use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use fitcam::camera::device_from_config;
use fitcam::measurements::MeasurementField;
use fitcam::{
    Collaborators, FitcamConfig, FsObjectStore, FsRecordStore, Identity, PipelineStatus,
    SessionContext, StaticIdentity, Submission, TracingNotifier, TryOnStudio,
};

#[derive(Parser, Debug)]
#[command(name = "fitcam")]
#[command(about = "Photo and measurement intake for virtual try-on profiles")]
#[command(version)]
#[command(long_about = "Acquires a profile photo from a file or the camera, validates it, \
stores it and links it to the user's sizing profile. Body measurements can be entered \
directly and are merged into the same profile.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fitcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Signed-in user; falls back to session.user_id
    #[arg(short, long, value_name = "USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a photo file to the profile
    Upload { file: PathBuf },

    /// Take a photo with the camera and upload it
    Capture {
        /// Grab a preview frame before capturing
        #[arg(long)]
        preview: bool,
    },

    /// Save body measurements (cm / kg)
    Measure {
        #[arg(long)]
        height: String,
        #[arg(long)]
        weight: String,
        #[arg(long)]
        chest: Option<String>,
        #[arg(long)]
        waist: Option<String>,
        #[arg(long)]
        hips: Option<String>,
    },

    /// Print the stored profile
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting fitcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match FitcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let Some(command) = args.command else {
        bail!("no command given, see --help");
    };

    let user = args.user.or_else(|| config.session.user_id.clone());
    let identity = user.map(Identity::parse).transpose()?;
    let context = SessionContext::bootstrap(&StaticIdentity::new(identity)).await;

    let collaborators = Collaborators {
        objects: Arc::new(FsObjectStore::from_config(&config.storage)),
        records: Arc::new(FsRecordStore::from_config(&config.storage)),
        notifier: Arc::new(TracingNotifier),
    };
    let device = device_from_config(&config.camera)?;
    let mut studio = TryOnStudio::new(&config, context, device, collaborators);

    let outcome = run_command(&mut studio, command).await;
    studio.shutdown().await;

    let exit_code = outcome?;
    info!("fitcam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

async fn run_command(studio: &mut TryOnStudio, command: Command) -> Result<i32> {
    match command {
        Command::Upload { file } => {
            let submission = studio.upload_file(&file).await?;
            Ok(report_submission(&submission))
        }
        Command::Capture { preview } => {
            studio.open_camera().await?;
            if preview {
                let frame = studio.preview().await?;
                println!("Preview frame {} ({}x{})", frame.id, frame.width, frame.height);
            }
            let submission = studio.capture_photo().await?;
            Ok(report_submission(&submission))
        }
        Command::Measure {
            height,
            weight,
            chest,
            waist,
            hips,
        } => {
            studio.set_measurement(MeasurementField::Height, height);
            studio.set_measurement(MeasurementField::Weight, weight);
            let optional = [
                (MeasurementField::Chest, chest),
                (MeasurementField::Waist, waist),
                (MeasurementField::Hips, hips),
            ];
            for (field, value) in optional {
                if let Some(value) = value {
                    studio.set_measurement(field, value);
                }
            }

            match studio.submit_measurements().await {
                Ok(saved) => {
                    println!("✓ Measurements saved: {}", serde_json::to_string(&saved)?);
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("✗ {}", e);
                    Ok(1)
                }
            }
        }
        Command::Show => match studio.profile().await? {
            Some(profile) => {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                Ok(0)
            }
            None => {
                println!("No profile stored yet");
                Ok(0)
            }
        },
    }
}

fn report_submission(submission: &Submission) -> i32 {
    match &submission.status {
        PipelineStatus::Succeeded(reference) => {
            println!("✓ Photo saved: {}", reference.url);
            0
        }
        PipelineStatus::Failed(reason) => {
            eprintln!("✗ {}: {}", reason.kind.title(), reason.message);
            1
        }
        other => {
            eprintln!("✗ Submission ended in {}", other.label());
            1
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fitcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Fitcam Configuration File");
    println!("# Every option with its default value; FITCAM_<SECTION>__<KEY> overrides any of them");
    println!();
    println!("{}", toml::to_string_pretty(&FitcamConfig::default())?);
    Ok(())
}
