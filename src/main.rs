use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use flight_o_mat::session::{Session, SessionConfig, TrackArgs, DEFAULT_DATA_DIR};
use flight_o_mat::store::{scan_file, store_path, DataFormat};

#[derive(Parser)]
#[command(name = "flight-o-mat", version)]
#[command(about = "Records inflight wifi flight telemetry")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LogArgs {
    /// Directory for the timestamped log file of `track`
    #[arg(short, long, global = true, default_value = ".")]
    logfile_dir: PathBuf,
    /// Also print log events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a provider and store flight observations until interrupted
    Track(TrackArgs),
    /// Verify a stored flight file and summarize it
    Check {
        #[arg(short = 'n', long)]
        flight_name: String,
        #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        #[arg(short = 'f', long, value_enum, default_value_t = DataFormat::Json)]
        data_format: DataFormat,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_to_file = matches!(cli.command, Commands::Track(_));
    if let Err(e) = init_logging(&cli.log, log_to_file) {
        eprintln!("Cannot set up logging: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Track(args) => track(&args).await,
        Commands::Check {
            flight_name,
            data_dir,
            data_format,
        } => check(&flight_name, data_dir, data_format),
    }
}

/// Copies log output to stderr on top of the log file.
struct Tee(File);

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        io::stderr().flush()
    }
}

/// `track` logs to a file, plus stderr with `--verbose`. `check` logs to stderr only.
fn init_logging(args: &LogArgs, to_file: bool) -> io::Result<()> {
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    if to_file {
        let dir = &args.logfile_dir;
        if dir.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "log file directory must not be empty",
            ));
        }
        fs::create_dir_all(dir)?;
        let name = format!("{}_scraping_log.txt", Local::now().format("%Y%m%d-%H%M%S"));
        let file = File::create(dir.join(name))?;
        if args.verbose {
            builder.target(env_logger::Target::Pipe(Box::new(Tee(file))));
        } else {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }

    builder.init();
    Ok(())
}

async fn track(args: &TrackArgs) -> ExitCode {
    let config = match SessionConfig::resolve(args) {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid configuration: {}", e);
            eprintln!("Error: invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("flight-o-mat {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Tracking {} via {}, requesting new data every {:?}",
        config.flight_id, config.provider, config.scrape_interval
    );
    println!("Press Ctrl+C to exit");
    config.log_summary();

    let session = match Session::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match session.run().await {
        Ok(summary) => {
            println!(
                "Stored {} new observations ({} degraded, {} discarded, {} clock-behind cycles); {} total in {}",
                summary.stats.stored,
                summary.stats.degraded,
                summary.stats.discarded,
                summary.stats.clock_behind,
                summary.total_records,
                summary.path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(flight_name: &str, data_dir: PathBuf, format: DataFormat) -> ExitCode {
    let path = store_path(&data_dir, flight_name, format);
    if !path.exists() {
        eprintln!("No {} data for flight {} at {}", format, flight_name, path.display());
        return ExitCode::FAILURE;
    }

    let scan = match scan_file(&path, format) {
        Ok(scan) => scan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}: {} observations", path.display(), scan.observations.len());
    if let (Some(first), Some(last)) = (scan.observations.first(), scan.observations.last()) {
        println!("  first: {}", first.captured_at);
        println!("  last:  {}", last.captured_at);
        match (last.latitude, last.longitude) {
            (Some(lat), Some(lon)) => println!("  last position: {:.4}, {:.4}", lat, lon),
            _ => println!("  last position: unknown"),
        }
    }
    if scan.torn_bytes > 0 {
        println!(
            "  {} trailing bytes of an incomplete record (dropped on the next track run)",
            scan.torn_bytes
        );
    }
    ExitCode::SUCCESS
}
