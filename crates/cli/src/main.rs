// listmerge CLI - merge, deduplicate and filter contact lists

mod exit_codes;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use listmerge_config::settings::{parse_delimiter, Settings};
use listmerge_engine::aggregate::{default_workers, AggregateOptions};
use listmerge_engine::writer::has_csv_extension;
use listmerge_engine::{
    inspect_headers, run_combine, run_filter, CanonicalField, ChannelSink, IncompatiblePolicy,
    LogSink, MergeError, RunOptions, RunReport, SourceSpec, TableHeaders, WriteMode,
};
use listmerge_io::ReadOptions;

use exit_codes::{
    merge_exit_code, ErrorOutput, EXIT_ERROR, EXIT_INTERRUPTED, EXIT_SUCCESS, EXIT_USAGE,
};

/// How long to wait for abandoned readers when the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "listmerge")]
#[command(about = "Merge, deduplicate and filter contact lists from CSV and XLSX files")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every input into one CSV, keeping the first record seen per email
    #[command(after_help = "\
Examples:
  listmerge combine a.csv b.xlsx -o merged.csv
  listmerge combine --dir ./exports -o merged.csv
  listmerge combine new.csv -o merged.csv --append
  listmerge combine --dir ./exports -o merged.csv --columns Name,Email,Phone")]
    Combine {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Merge the inputs, then drop every record whose email is in a reference list
    #[command(after_help = "\
Examples:
  listmerge filter signups.csv -r members.xlsx -o new_signups.csv
  listmerge filter signups.csv -r members.csv -o ./out/
    (writes ./out/signups_filtered_output.csv)")]
    Filter {
        /// Reference file (CSV or XLSX) whose email column lists addresses to drop
        #[arg(long, short = 'r', value_name = "FILE")]
        reference: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show each file's header row and which columns map to Name, Email and Organization
    Headers {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// CSV delimiter (default: detect)
        #[arg(long)]
        delimiter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Settings file management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file location
    Path,
    /// Print the effective settings as JSON
    Show,
}

#[derive(Args)]
struct RunArgs {
    /// Input files (CSV or XLSX), used exactly as given
    files: Vec<PathBuf>,

    /// File or directory to search for inputs when no files are listed
    #[arg(long, short = 'd', value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Output CSV file (for `filter`, a directory also works)
    #[arg(long, short = 'o', value_name = "FILE")]
    output: PathBuf,

    /// Append rows to an existing output instead of replacing it
    #[arg(long)]
    append: bool,

    /// When appending to a file without Name/Email headers, replace it
    #[arg(long, requires = "append")]
    overwrite_incompatible: bool,

    /// When appending, fail if the output does not exist yet
    #[arg(long, requires = "append")]
    no_create: bool,

    /// Output header row, comma-separated (default: Name,Email,Organization + extra columns)
    #[arg(long, value_delimiter = ',', value_name = "COLS")]
    columns: Vec<String>,

    /// Files read at once [settings: pipeline.workers]
    #[arg(long, env = "LISTMERGE_WORKERS")]
    workers: Option<usize>,

    /// Seconds before giving up on one file, 0 = never [settings: pipeline.sourceTimeoutSecs]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// CSV delimiter, e.g. ';' or 'tab' (default: detect) [settings: input.delimiter]
    #[arg(long)]
    delimiter: Option<String>,

    /// Do not write the process log file next to the output
    #[arg(long)]
    no_log_file: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Only print warnings and errors
    #[arg(long, short = 'q')]
    quiet: bool,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  listmerge-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: listmerge <command> [options]");
            eprintln!("       listmerge --help for more information");
            Ok(())
        }
        Some(Commands::Combine { run }) => cmd_run(None, run),
        Some(Commands::Filter { reference, run }) => cmd_run(Some(reference), run),
        Some(Commands::Headers { files, delimiter, json }) => cmd_headers(files, delimiter, json),
        Some(Commands::Config(ConfigCommands::Path)) => {
            println!("{}", Settings::config_path_display());
            Ok(())
        }
        Some(Commands::Config(ConfigCommands::Show)) => cmd_config_show(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from a run error with the registry's exit code.
    pub fn merge(err: &MergeError) -> Self {
        let hint = match err {
            MergeError::NoSources => Some("inputs must end in .csv or .xlsx".to_string()),
            MergeError::IncompatibleHeaders { .. } => Some(
                "pass --overwrite-incompatible to replace it, or pick another output".to_string(),
            ),
            MergeError::Reference(inner) if matches!(**inner, MergeError::Schema { .. }) => {
                Some("the reference file needs a column whose header contains \"email\"".to_string())
            }
            MergeError::UnsupportedFileType { .. } => {
                Some("only .csv and .xlsx files can be read".to_string())
            }
            _ => None,
        };
        Self { code: merge_exit_code(err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// combine / filter
// ============================================================================

fn cmd_run(reference: Option<PathBuf>, args: RunArgs) -> Result<(), CliError> {
    logging::init(args.quiet);
    let settings = Settings::load();

    if args.files.is_empty() && args.dir.is_none() {
        return Err(CliError::args("no inputs given").with_hint("list input files or pass --dir <PATH>"));
    }

    let output_is_dir = reference.is_some() && args.output.is_dir();
    if !output_is_dir && !has_csv_extension(&args.output) {
        return Err(CliError::args(format!(
            "output file must end in .csv: {}",
            args.output.display()
        )));
    }

    let delimiter = match args.delimiter.as_deref() {
        Some(raw) => Some(
            parse_delimiter(raw)
                .ok_or_else(|| CliError::args(format!("invalid delimiter '{raw}'")))?,
        ),
        None => settings.delimiter_byte(),
    };

    let workers = match args.workers.unwrap_or(settings.workers) {
        0 => default_workers(),
        n => n,
    };
    let source_timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => settings.source_timeout(),
    };

    let options = RunOptions {
        aggregate: AggregateOptions {
            workers,
            source_timeout,
            channel_capacity: settings.channel_capacity.max(1),
            read: ReadOptions { delimiter },
            ..AggregateOptions::default()
        },
        mode: if args.append { WriteMode::Append } else { WriteMode::Create },
        on_incompatible: if args.overwrite_incompatible {
            IncompatiblePolicy::Overwrite
        } else {
            IncompatiblePolicy::Abort
        },
        create_missing: !args.no_create,
        columns: (!args.columns.is_empty()).then(|| args.columns.clone()),
    };

    let spec = if args.files.is_empty() {
        SourceSpec { files: Vec::new(), root: args.dir.clone() }
    } else {
        SourceSpec::files(args.files.clone())
    };

    let log_file = if args.no_log_file {
        None
    } else {
        let dir = if output_is_dir {
            args.output.clone()
        } else {
            args.output.parent().map(Path::to_path_buf).unwrap_or_default()
        };
        match logging::open_log_file(&dir, &settings.log_file_name) {
            Ok((path, file)) => {
                tracing::debug!(path = %path.display(), "process log opened");
                Some(file)
            }
            Err(e) => {
                tracing::warn!("cannot create process log in {}: {e}", dir.display());
                None
            }
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::io(format!("cannot start runtime: {e}")))?;

    let result = runtime.block_on(async {
        let (sink, rx) = ChannelSink::new();
        let drain = logging::LogDrain::spawn(rx, log_file);

        let cancel = options.aggregate.cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, finishing with the files read so far");
                cancel.cancel();
            }
        });

        let log: Arc<dyn LogSink> = Arc::new(sink);
        let result = match &reference {
            Some(reference) => run_filter(&spec, reference, &args.output, &options, log).await,
            None => run_combine(&spec, &args.output, &options, log).await,
        };

        interrupt.abort();
        drain.finish().await;
        result
    });

    // Readers stuck past their deadline must not hold the process open
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(report) => finish_run(&report, args.json, args.quiet),
        Err(err) => {
            if args.json {
                if let Ok(out) = serde_json::to_string_pretty(&ErrorOutput::from_merge_error(&err)) {
                    println!("{out}");
                }
            }
            Err(CliError::merge(&err))
        }
    }
}

fn finish_run(report: &RunReport, json: bool, quiet: bool) -> Result<(), CliError> {
    if json {
        let out = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::io(format!("cannot serialize report: {e}")))?;
        println!("{out}");
    } else if !quiet {
        eprintln!("{}", report.summary());
    }

    if report.cancelled {
        return Err(CliError {
            code: EXIT_INTERRUPTED,
            message: format!("interrupted; partial output written to {}", report.output.display()),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// headers
// ============================================================================

fn cmd_headers(files: Vec<PathBuf>, delimiter: Option<String>, json: bool) -> Result<(), CliError> {
    let delimiter = match delimiter.as_deref() {
        Some(raw) => Some(
            parse_delimiter(raw).ok_or_else(|| CliError::args(format!("invalid delimiter '{raw}'")))?,
        ),
        None => Settings::load().delimiter_byte(),
    };
    let options = ReadOptions { delimiter };

    let mut all = Vec::new();
    for file in &files {
        let tables = inspect_headers(file, &options).map_err(|e| CliError::merge(&e))?;
        if tables.is_empty() && !json {
            eprintln!("{}: no header row", file.display());
        }
        all.extend(tables);
    }

    if json {
        let out = serde_json::to_string_pretty(&all)
            .map_err(|e| CliError::io(format!("cannot serialize headers: {e}")))?;
        println!("{out}");
    } else {
        for table in &all {
            print_table_headers(table);
        }
    }
    Ok(())
}

fn print_table_headers(table: &TableHeaders) {
    match &table.sheet {
        Some(sheet) => println!("{} [{}]", table.path.display(), sheet),
        None => println!("{}", table.path.display()),
    }

    let width = table.headers.iter().map(|h| h.chars().count()).max().unwrap_or(0);
    for (i, header) in table.headers.iter().enumerate() {
        let field = CanonicalField::ALL
            .into_iter()
            .find(|f| table.index_of(*f) == Some(i));
        match field {
            Some(f) => println!("  [{i}] {header:<width$}  -> {f}"),
            None => println!("  [{i}] {header}"),
        }
    }
    if !table.is_usable() {
        println!("  (missing Name or Email column; rows will be skipped)");
    }
    for warning in &table.warnings {
        println!("  warning: {warning}");
    }
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_show() -> Result<(), CliError> {
    let settings = Settings::load();
    let out = serde_json::to_string_pretty(&settings)
        .map_err(|e| CliError::io(format!("cannot serialize settings: {e}")))?;
    println!("{out}");
    Ok(())
}
