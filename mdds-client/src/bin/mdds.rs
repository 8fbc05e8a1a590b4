//! MDDS CLI - solve a linear system on a remote MDDS service
//!
//! Usage:
//!   mdds <MATRIX_FILE> <RHS_FILE> [--method <method>] [--url <url>] [--verbose]
//!
//! Example:
//!   mdds matrix.csv rhs.csv --method numpy_lstsq_solver
//!   mdds matrix.csv rhs.csv --format json --output ./out -v

use anyhow::{bail, Context, Result};
use colored::Colorize;
use mdds_client::parser::{read_matrix_file, read_vector_file};
use mdds_client::poller::PollConfig;
use mdds_client::request::SolverMethod;
use mdds_client::service::{HttpSolverService, SolverService};
use mdds_client::session::SolveSession;
use mdds_client::task::{Task, TaskState};
use mdds_client::ClientConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn print_usage() {
    eprintln!(
        r#"
{} - Solve systems of linear algebraic equations on an MDDS server

{}
    mdds <MATRIX_FILE> <RHS_FILE> [OPTIONS]
    mdds --check [OPTIONS]
    mdds --list-methods

{}
    <MATRIX_FILE>   Comma separated coefficient matrix, one row per line
    <RHS_FILE>      Right hand side vector, one value per line or comma separated

{}
    -m, --method <METHOD>       Solving method (default: numpy_exact_solver)
    -u, --url <URL>             Server URL (default: http://localhost:8080, or MDDS_URL)
    -c, --config <FILE>         Load settings from a TOML file
    -f, --format <csv|json>     Solution file format (default: csv)
    -o, --output <DIR>          Directory for the solution file (default: .)
    --interval-ms <MS>          Wait between status queries (default: 1000)
    --timeout-secs <SECS>       Give up this long after submission (default: 30)
    --check                     Only check that the server is reachable
    --list-methods              Print the available solving methods
    -v, --verbose               Log progress details
    -vv                         Extra verbose (debug logging)
    -h, --help                  Print this help message

{}
    mdds matrix.csv rhs.csv
    mdds matrix.csv rhs.csv -m scipy_gmres_solver -f json -o results
    mdds --check -u http://solver.internal:8080
"#,
        "MDDS CLI".bold(),
        "USAGE:".bold(),
        "ARGS:".bold(),
        "OPTIONS:".bold(),
        "EXAMPLES:".bold(),
    );
}

struct CliArgs {
    matrix_file: Option<PathBuf>,
    rhs_file: Option<PathBuf>,
    method: Option<String>,
    url: Option<String>,
    config: Option<PathBuf>,
    format: Option<String>,
    output: PathBuf,
    interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
    check: bool,
    list_methods: bool,
    verbose: u8, // 0=warnings, 1=info, 2=debug
}

fn parse_args() -> Result<CliArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.is_empty() { 1 } else { 0 });
    }

    let mut cli = CliArgs {
        matrix_file: None,
        rhs_file: None,
        method: None,
        url: None,
        config: None,
        format: None,
        output: PathBuf::from("."),
        interval_ms: None,
        timeout_secs: None,
        check: false,
        list_methods: false,
        verbose: 0,
    };
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .with_context(|| format!("Missing value for {}", flag))
        };
        match flag {
            "--method" | "-m" => cli.method = Some(value()?),
            "--url" | "-u" => cli.url = Some(value()?),
            "--config" | "-c" => cli.config = Some(PathBuf::from(value()?)),
            "--format" | "-f" => cli.format = Some(value()?),
            "--output" | "-o" => cli.output = PathBuf::from(value()?),
            "--interval-ms" => {
                let ms = value()?.parse().context("--interval-ms expects a number")?;
                cli.interval_ms = Some(ms);
            }
            "--timeout-secs" => {
                let secs = value()?.parse().context("--timeout-secs expects a number")?;
                cli.timeout_secs = Some(secs);
            }
            "--check" => cli.check = true,
            "--list-methods" => cli.list_methods = true,
            "--verbose" | "-v" => cli.verbose = cli.verbose.max(1),
            "-vv" => cli.verbose = 2,
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            other => positional.push(PathBuf::from(other)),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    cli.matrix_file = positional.next();
    cli.rhs_file = positional.next();
    if positional.next().is_some() {
        bail!("Too many arguments, expected <MATRIX_FILE> <RHS_FILE>");
    }

    Ok(cli)
}

/// Merge config file, environment and flags, flags winning
fn resolve_config(args: &CliArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(url) = args.url.clone().or_else(|| std::env::var("MDDS_URL").ok()) {
        config.base_url = url;
    }
    if let Some(method) = &args.method {
        config.default_method = method.parse()?;
    }
    if let Some(format) = &args.format {
        config.artifact_format = format.parse()?;
    }
    if let Some(ms) = args.interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_header(
    args: &CliArgs,
    config: &ClientConfig,
    rows: usize,
    columns: usize,
    rhs_len: usize,
) {
    let border = "│".blue();
    eprintln!();
    eprintln!("{}", "╭──────────────────────────────────────────────────────────────╮".blue());
    eprintln!("{}  {}", border, "MDDS CLI - Linear System Solver".bold());
    eprintln!("{}", "├──────────────────────────────────────────────────────────────┤".blue());
    if let (Some(matrix), Some(rhs)) = (&args.matrix_file, &args.rhs_file) {
        let dims = format!("{}x{}", rows, columns);
        eprintln!("{}  {}  {} ({})", border, "Matrix:".dimmed(), matrix.display(), dims);
        eprintln!("{}  {}     {} ({} values)", border, "RHS:".dimmed(), rhs.display(), rhs_len);
    }
    eprintln!("{}  {}  {}", border, "Method:".dimmed(), config.default_method);
    eprintln!("{}  {}  {}", border, "Server:".dimmed(), config.base_url);
    eprintln!("{}", "╰──────────────────────────────────────────────────────────────╯".blue());
    eprintln!();
}

fn print_progress(task: &Task) {
    let filled = task.progress() as usize / 5;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled));
    eprint!(
        "\r{} {} {:>3}% {}   ",
        "▶".cyan(),
        bar.cyan(),
        task.progress(),
        task.state().label().dimmed()
    );
    let _ = std::io::stderr().flush();
}

fn print_outcome(task: &Task) {
    eprintln!();
    match task.state() {
        TaskState::Done { solution } => {
            eprintln!(
                "{} task {} solved ({} values)",
                "✔".green().bold(),
                task.id(),
                solution.len()
            );
            eprintln!("{}", "Solution:".bold());
            eprintln!("{}", "════════════════════════════════════════════════════════════════".green());
            for value in solution {
                println!("{value}");
            }
            eprintln!("{}", "════════════════════════════════════════════════════════════════".green());
        }
        TaskState::Error { message } => {
            eprintln!("{} task {} failed: {}", "Error:".red().bold(), task.id(), message);
        }
        TaskState::TimedOut => {
            eprintln!("{} task {} did not finish in time", "Timed out:".yellow().bold(), task.id());
        }
        TaskState::Cancelled => {
            eprintln!("{} task {} was cancelled", "Cancelled:".yellow().bold(), task.id());
        }
        TaskState::Pending | TaskState::Running => {}
    }
}

async fn check_health(service: &HttpSolverService) -> Result<()> {
    let status = service.health_check().await;
    if status.healthy {
        eprintln!(
            "{} {} is healthy ({} ms)",
            "✔".green().bold(),
            service.base_url(),
            status.latency_ms.unwrap_or_default()
        );
        Ok(())
    } else {
        bail!(
            "{} is not healthy: {}",
            service.base_url(),
            status.error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args()?;
    init_logging(args.verbose)?;

    if args.list_methods {
        for method in SolverMethod::ALL {
            println!("{method}");
        }
        return Ok(());
    }

    let config = resolve_config(&args)?;
    let service = Arc::new(HttpSolverService::from_config(&config)?);

    if args.check {
        return check_health(&service).await;
    }

    let (Some(matrix_file), Some(rhs_file)) = (&args.matrix_file, &args.rhs_file) else {
        print_usage();
        bail!("Both <MATRIX_FILE> and <RHS_FILE> are required");
    };

    let matrix = read_matrix_file(matrix_file).await?;
    let rhs = read_vector_file(rhs_file).await?;
    print_header(&args, &config, matrix.row_count(), matrix.column_count(), rhs.len());

    let mut session = SolveSession::new(Arc::clone(&service), PollConfig::from(&config));
    let mut updates = session.subscribe();

    let task_id = session.submit(matrix, rhs, config.default_method).await?;
    debug!(task_id = %task_id, "Submitted");
    eprintln!("{} task {}", "Submitted".dimmed(), task_id);

    let task = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    bail!("Session closed unexpectedly");
                }
                let Some(task) = updates.borrow_and_update().task.clone() else {
                    continue;
                };
                print_progress(&task);
                if task.is_terminal() {
                    break task;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                eprintln!("{}", "Interrupted, requesting cancellation...".yellow());
                if let Err(e) = session.cancel().await {
                    warn!(error = %e, "Cancellation failed");
                }
            }
        }
    };

    print_outcome(&task);

    match task.state() {
        TaskState::Done { .. } => {
            let artifact = session.download(config.artifact_format)?;
            tokio::fs::create_dir_all(&args.output)
                .await
                .with_context(|| format!("Failed to create {}", args.output.display()))?;
            let path = artifact.save(&args.output).await?;
            eprintln!(
                "{} {} ({})",
                "Saved".green(),
                path.display(),
                artifact.content_type
            );
            Ok(())
        }
        _ => std::process::exit(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdds_client::artifact::ArtifactFormat;

    fn args() -> CliArgs {
        CliArgs {
            matrix_file: None,
            rhs_file: None,
            method: None,
            url: None,
            config: None,
            format: None,
            output: PathBuf::from("."),
            interval_ms: None,
            timeout_secs: None,
            check: false,
            list_methods: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdds.toml");
        std::fs::write(&path, "base_url = \"http://a:1\"\ntimeout_secs = 90\n").unwrap();

        let mut cli = args();
        cli.config = Some(path);
        cli.url = Some("http://b:2".to_string());
        cli.method = Some("numpy_pinv_solver".to_string());
        cli.format = Some("json".to_string());

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.base_url, "http://b:2");
        assert_eq!(config.timeout_secs, 90);
        assert_eq!(config.default_method, SolverMethod::NumpyPinvSolver);
        assert_eq!(config.artifact_format, ArtifactFormat::Json);
    }

    #[test]
    fn test_invalid_method_is_reported() {
        let mut cli = args();
        cli.method = Some("cramer".to_string());
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.to_string().contains("cramer"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut cli = args();
        cli.interval_ms = Some(0);
        assert!(resolve_config(&cli).is_err());
    }
}
