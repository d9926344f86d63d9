use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, FuzzySelect, Input};
use fileconv::{
    AppConfig, BatchConverter, BatchError, BatchEvent, CancelToken, TargetFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert individual files: .txt -> converted_output.pdf, .png -> converted_output.jpg
    Drop {
        /// Files to convert
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for the converted_output.* files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Print the persisted conversion log
    Logs,
}

#[derive(Parser, Debug)]
#[command(version, about = "Batch converter for text and image files.")]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Directory containing .txt, .jpg and .png files
    input: Option<PathBuf>,

    /// Directory for the converted files
    out: Option<PathBuf>,

    /// Target format (txt, csv, jpg, png, pdf)
    #[arg(long, short)]
    format: Option<TargetFormat>,

    /// Maximum number of conversions running at once
    #[arg(long, short)]
    workers: Option<usize>,

    /// Config file (TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Conversion log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Never prompt; fail if a required value is missing
    #[arg(long, short, default_value_t = false)]
    yes: bool,

    /// Print debug diagnostics to stderr
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fileconv=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut cfg = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::discover().context("loading config")?,
    };
    if let Some(workers) = args.workers {
        cfg = cfg.with_max_workers(workers);
    }
    if let Some(log_file) = &args.log_file {
        cfg = cfg.with_log_file(log_file.clone());
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    init_tracing(args.verbose);

    let cfg = load_config(&args)?;
    let converter = BatchConverter::with_config(cfg).context("invalid configuration")?;

    match &args.cmd {
        Some(Command::Logs) => return run_logs(&converter),
        Some(Command::Drop { files, output_dir }) => {
            return run_drop(&converter, files, output_dir);
        }
        None => {}
    }

    let is_interactive = !args.yes;

    // --- Interactive Prompts ---
    if args.input.is_none() {
        if !is_interactive {
            return Err(anyhow!("Input directory must be provided when using --yes."));
        }
        let dir: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Input directory")
            .default(".".into())
            .interact_text()?;
        args.input = Some(PathBuf::from(dir));
    }

    if args.out.is_none() {
        if !is_interactive {
            return Err(anyhow!("Output directory must be provided when using --yes."));
        }
        let dir: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Output directory")
            .default("converted".into())
            .interact_text()?;
        args.out = Some(PathBuf::from(dir));
    }

    if args.format.is_none() {
        if !is_interactive {
            return Err(anyhow!("Target format must be provided when using --yes."));
        }
        let choices: Vec<&str> = TargetFormat::ALL.iter().map(|f| f.extension()).collect();
        let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Target format")
            .default(0)
            .items(&choices)
            .interact()?;
        args.format = Some(TargetFormat::ALL[selection]);
    }

    let (Some(input), Some(out), Some(format)) = (&args.input, &args.out, args.format) else {
        return Err(anyhow!("Input directory, output directory and format are required."));
    };

    if is_interactive && input == out {
        let proceed = Confirm::new()
            .with_prompt("Input and output directories are the same. Continue?")
            .default(false)
            .interact()?;
        if !proceed {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    // --- Execution ---
    let mut progress_bar: Option<ProgressBar> = None;
    let result = converter.run_batch(input, out, format, &CancelToken::new(), |event| match event {
        BatchEvent::Started { total, workers } => {
            let pb = ProgressBar::new(*total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message(format!("{} workers", workers));
            progress_bar = Some(pb);
        }
        BatchEvent::Log(entry) => match &progress_bar {
            Some(pb) => pb.println(&entry.message),
            None => println!("{}", entry.message),
        },
        BatchEvent::JobFinished { progress, .. } => {
            if let Some(pb) = &progress_bar {
                pb.set_position(progress.completed as u64);
            }
        }
        BatchEvent::Finished { .. } => {
            if let Some(pb) = progress_bar.take() {
                pb.finish_and_clear();
            }
        }
        BatchEvent::JobStarted { .. } => {}
    });

    let run = match result {
        Ok(run) => run,
        Err(BatchError::Scan(e)) => {
            return Err(anyhow!(e).context("Error opening input directory. Check logs."));
        }
        Err(e) => return Err(anyhow!(e)),
    };

    if run.is_empty() {
        println!("No files found to convert.");
        return Ok(());
    }

    println!(
        "\nConversion complete in {}: {}",
        out.display(),
        run.summary()
    );
    Ok(())
}

fn run_drop(converter: &BatchConverter, files: &[PathBuf], output_dir: &Path) -> Result<()> {
    fileconv::persist::ensure_output_dir(output_dir)
        .with_context(|| format!("preparing output directory {}", output_dir.display()))?;

    let pb = ProgressBar::new_spinner();
    pb.set_message("Converting dropped files");
    let tasks = converter.convert_dropped(files, output_dir);
    let mut failed = 0usize;
    for (path, task) in files.iter().zip(tasks) {
        match task {
            Ok(task) => {
                let outcome = task.wait();
                pb.println(&outcome.message);
                if !outcome.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                pb.println(format!("Failed to convert {}: {}", path.display(), e));
                failed += 1;
            }
        }
        pb.tick();
    }
    pb.finish_and_clear();

    println!(
        "Conversion complete: {} succeeded, {} failed",
        files.len() - failed,
        failed
    );
    Ok(())
}

fn run_logs(converter: &BatchConverter) -> Result<()> {
    match converter.view_logs().context("reading conversion log")? {
        Some(text) if !text.is_empty() => print!("{}", text),
        _ => println!("No logs found."),
    }
    Ok(())
}
