use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use hapadmin::config::Config;
use hapadmin::metrics::{self, HAPROXY_METRICS};
use hapadmin::models::{EntityHandle, EntityKind, Setting};
use hapadmin::requests::{Action, GlobalOption};
use hapadmin::{Aggregated, ApplyReport, Error, Haproxy};

/// hapadmin: manage a multi-process HAProxy over its stats sockets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Config path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with HAProxy socket files
    #[arg(short = 'D', long)]
    socket_dir: Option<PathBuf>,

    /// Timeout for each socket operation, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage frontends
    Frontend {
        #[command(subcommand)]
        action: EntityCommand,
    },
    /// Manage backends
    Backend {
        #[command(subcommand)]
        action: EntityCommand,
    },
    /// Manage servers, named backend/server
    Server {
        #[command(subcommand)]
        action: EntityCommand,
    },
    /// Manage the HAProxy instance
    Haproxy {
        #[command(subcommand)]
        action: HaproxyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum EntityCommand {
    /// Show all names
    List,
    /// Show status
    Status { names: Vec<String> },
    /// Show total requests
    Requests { names: Vec<String> },
    /// Show proxy ID per process
    Iid { names: Vec<String> },
    /// Show process numbers
    Process { names: Vec<String> },
    /// Show the value of options that can be changed with `write`
    Options { names: Vec<String> },
    /// Show the value of a metric
    Metric { metric: String, names: Vec<String> },
    /// Show all metric names
    ListMetrics,
    Enable { names: Vec<String> },
    Disable { names: Vec<String> },
    /// Shut a frontend down, or kill a server's sessions
    Shutdown { names: Vec<String> },
    /// Change an option (maxconn, weight)
    Write {
        option: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum HaproxyCommand {
    /// Show `show info` of every process
    Info,
    /// Show the last known request and response errors
    Errors,
    /// Show total requests processed by all processes
    Requests,
    /// Show the configured maximum connection limit
    Maxconn,
    /// Show the value of options that can be changed with `write`
    Options,
    /// Clear max values of statistics counters
    Clear {
        /// Clear all statistics counters
        #[arg(short, long)]
        all: bool,
    },
    /// Show the value of a metric
    Metric { metric: String },
    /// Show all metric names
    ListMetrics,
    /// Set an option (maxconn, ratelimitconn, ratelimitsess, ratelimitsslsess)
    Write {
        option: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

/// Returns whether every socket took part successfully.
fn main_impl() -> Result<bool, Error> {
    let cli_args = CliArgs::parse();

    let mut config = match &cli_args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(socket_dir) = cli_args.socket_dir {
        config.socket_dir = socket_dir;
    }
    if let Some(timeout_ms) = cli_args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    match cli_args.command {
        Commands::Frontend { action } => run_entity(&config, EntityKind::Frontend, action),
        Commands::Backend { action } => run_entity(&config, EntityKind::Backend, action),
        Commands::Server { action } => run_entity(&config, EntityKind::Server, action),
        Commands::Haproxy { action } => run_haproxy(&config, action),
    }
}

fn run_entity(config: &Config, kind: EntityKind, command: EntityCommand) -> Result<bool, Error> {
    // Inputs are checked before any socket is touched.
    let action = match &command {
        EntityCommand::ListMetrics => {
            for metric in metrics::metrics_for(kind) {
                println!("{}", metric);
            }
            return Ok(true);
        }
        EntityCommand::Metric { metric, .. } => {
            metrics::lookup(kind, metric)?;
            None
        }
        EntityCommand::Enable { .. } => Some(Action::Enable),
        EntityCommand::Disable { .. } => Some(Action::Disable),
        EntityCommand::Shutdown { .. } => Some(Action::Shutdown),
        EntityCommand::Write { option, value, .. } => {
            Some(Action::parse(&format!("set-{}", option), &[value.as_str()])?)
        }
        _ => None,
    };

    let hap = Haproxy::new(config)?;
    let mut complete = true;

    match command {
        EntityCommand::List => {
            for handle in select(&hap, kind, &[], &mut complete)? {
                println!("{}", handle.qualified_name());
            }
        }
        EntityCommand::Status { names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                println!("{} {}", handle.qualified_name(), handle.status()?);
            }
        }
        EntityCommand::Requests { names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                println!("{} {}", handle.qualified_name(), show(handle.requests()?));
            }
        }
        EntityCommand::Iid { names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                let iids: Vec<String> = handle
                    .iid()?
                    .iter()
                    .map(|(endpoint, iid)| format!("{}={}", endpoint.display(), iid))
                    .collect();
                println!("{} {}", handle.qualified_name(), iids.join(" "));
            }
        }
        EntityCommand::Process { names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                let processes: Vec<String> =
                    handle.processes()?.iter().map(u64::to_string).collect();
                println!("{} {}", handle.qualified_name(), processes.join(","));
            }
        }
        EntityCommand::Options { names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                println!(
                    "{} maxconn={}",
                    handle.qualified_name(),
                    show_setting(&Some(handle.maxconn()?))
                );
            }
        }
        EntityCommand::Metric { metric, names } => {
            for handle in select(&hap, kind, &names, &mut complete)? {
                let value = hap.metric(&handle, &metric)?;
                complete &= report_failures(&value);
                println!("{} {}", handle.qualified_name(), show(value.value));
            }
        }
        EntityCommand::Enable { names }
        | EntityCommand::Disable { names }
        | EntityCommand::Shutdown { names }
        | EntityCommand::Write { names, .. } => {
            let Some(action) = action else {
                return Ok(complete);
            };
            for handle in select(&hap, kind, &names, &mut complete)? {
                match hap.apply(&handle, &action) {
                    Ok(report) => complete &= print_report(&handle.qualified_name(), &report),
                    Err(Error::AllEndpointsFailed(failures)) => {
                        complete = false;
                        println!("{} failed: {}", handle.qualified_name(), action);
                        for failure in failures {
                            println!("  {}", failure);
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        EntityCommand::ListMetrics => {}
    }
    Ok(complete)
}

fn run_haproxy(config: &Config, command: HaproxyCommand) -> Result<bool, Error> {
    let action = match &command {
        HaproxyCommand::ListMetrics => {
            for metric in HAPROXY_METRICS {
                println!("{}", metric);
            }
            return Ok(true);
        }
        HaproxyCommand::Metric { metric } => {
            metrics::lookup_global(metric)?;
            None
        }
        HaproxyCommand::Clear { all } => Some(Action::ClearCounters { all: *all }),
        HaproxyCommand::Write { option, value } => {
            let option = GlobalOption::from_str(option)?;
            let value = i64::from_str(value).map_err(|_| {
                Error::Validation(format!("invalid input {}, expected number", value))
            })?;
            Some(option.action(value))
        }
        _ => None,
    };

    let hap = Haproxy::new(config)?;

    let complete = match command {
        HaproxyCommand::Info => {
            let infos = hap.info()?;
            for (endpoint, info) in &infos.value {
                let process = info
                    .get("Process_num")
                    .map(str::to_string)
                    .unwrap_or_else(|| endpoint.display().to_string());
                println!("{c}Process {n}{c}", c = "#".repeat(18), n = process);
                for (key, value) in info.iter() {
                    println!("{}: {}", key, value);
                }
            }
            report_failures(&infos)
        }
        HaproxyCommand::Errors => {
            let errors = hap.errors()?;
            for (endpoint, log) in &errors.value {
                println!("Process: {} ({} events)", endpoint.display(), log.total);
                for line in &log.lines {
                    println!("{}", line);
                }
            }
            report_failures(&errors)
        }
        HaproxyCommand::Requests => print_value(hap.total_requests()?),
        HaproxyCommand::Maxconn => print_value(hap.maxconn()?),
        HaproxyCommand::Options => {
            let options = hap.options()?;
            for (option, value) in &options.value {
                println!("{} = {}", option, show_setting(value));
            }
            report_failures(&options)
        }
        HaproxyCommand::Metric { metric } => {
            let value = hap.global_metric(&metric)?;
            println!("{} = {}", metric, show(value.value));
            report_failures(&value)
        }
        HaproxyCommand::Clear { .. } | HaproxyCommand::Write { .. } => match action {
            Some(action) => print_report("haproxy", &hap.apply_global(&action)?),
            None => true,
        },
        HaproxyCommand::ListMetrics => true,
    };
    Ok(complete)
}

/// The named entities, or every entity of `kind` when no name is given.
fn select(
    hap: &Haproxy,
    kind: EntityKind,
    names: &[String],
    complete: &mut bool,
) -> Result<Vec<EntityHandle>, Error> {
    if names.is_empty() {
        let handles = hap.discover(kind)?;
        *complete &= report_failures(&handles);
        return Ok(handles.value);
    }

    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        match hap.get(kind, name) {
            Ok(handle) => {
                *complete &= report_failures(&handle);
                handles.push(handle.value);
            }
            Err(Error::NotFound { .. }) => {
                *complete = false;
                println!("{} was not found", name);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(handles)
}

fn print_value(value: Aggregated<Option<u64>>) -> bool {
    println!("{}", show(value.value));
    report_failures(&value)
}

fn print_report(name: &str, report: &ApplyReport) -> bool {
    if report.is_success() {
        println!("{} {}: OK", name, report.command);
        return true;
    }
    println!(
        "{} {}: succeeded on {} of {} processes",
        name,
        report.command,
        report.succeeded(),
        report.results.len()
    );
    for result in &report.results {
        if let Err(err) = &result.outcome {
            println!("  {}: {}", result.endpoint.display(), err);
        }
    }
    false
}

fn report_failures<T>(aggregated: &Aggregated<T>) -> bool {
    for failure in &aggregated.failed {
        warn!("{}", failure);
    }
    aggregated.is_complete()
}

fn show(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn show_setting(setting: &Option<Setting<Option<u64>>>) -> String {
    match setting {
        None => "-".to_string(),
        Some(Setting::Uniform(value)) => show(*value),
        Some(Setting::PerProcess(values)) => values
            .iter()
            .map(|(endpoint, value)| format!("{}={}", endpoint.display(), show(*value)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn main() -> ExitCode {
    let tracer = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(tracer) {
        eprintln!("failed to install logger: {e}");
    }

    match main_impl() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
