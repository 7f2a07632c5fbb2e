//! pcrlink - Main Entry Point
//!
//! Command-line front end for a thermal cycler mounted as a storage volume.
//! Status and CSV output go to stdout; diagnostics go to stderr.

use anyhow::{bail, Context};
use crossterm::{
    cursor::{Hide, MoveTo, MoveToNextLine, Show},
    event::{self, Event, KeyEventKind},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use pcrlink::{
    config::AppConfig,
    device::{Device, RunState},
    program::{self, ProgramLimits, WireCompiler, COMMAND_SIGNATURE},
    session::{self, CsvLogger, Monitor},
};
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage: pcrlink [--config <path>] [--device <mount>] <command> [args..]

Commands:
  status                    Print a one-time status message
  monitor                   Live status display; any key exits
  send-string <string>      Send a raw command string to the device
  send-program <file|->     Compile a program file (or stdin) and upload it
  compile <file|->          Compile a program and print the command string
  stop                      Send the stop command
  log [interval] <file|->   Append CSV status lines every <interval> seconds
                            to a file or stdout, until the run ends
  prog-help                 Describe the program file format

Options:
  --config <path>           Read configuration from <path>
  --device <mount>          Device mount point (overrides config)
  -h, --help                Show this message";

const PROGRAM_HELP: &str = "\
How to write programs for pcrlink:

A program file has a header, one blank line, then a body.

Header lines are `Key: Value`. Two keys are understood (case-insensitive):
  Title: Canonical PCR     Program name shown on the device
  Lid: 95C                 Lid temperature in degrees C (default 95)
Other keys are kept but ignored. `&` and `=` in values are replaced by `+`
and `:`.

Body lines are steps or repeat blocks:
  <seconds>[s] @ <temperature>[C] <description>
  x<count>[:]

Lines indented under a repeat line form its block:

  Title: Canonical PCR
  Lid: 95

  60s @ 95C Burn In
  x35:
      20s @ 95C Denature
      15s @ 65C Anneal
      30s @ 72C Extend
  20s @ 4C Chill

The device receives a command string of the form
  s=ACGTC&l=<lid>&c=start&n=<title>&p=<groups>
where each top-level line becomes one group:
  ([20|4|Chill])                       a single step
  (35[20|95|Denature][15|65|Anneal])   a repeat block

Device limits:
  Programs cannot be longer than 252 characters.
  Programs cannot have more than 16 top-level groups.
  Programs cannot have more than 30 steps.
  Temperatures must lie between 0 and 99 C.
  Repeat blocks cannot be nested.
  Descriptions cannot contain | [ ] ( ) or &.";

// ==================== Arguments ====================

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    Monitor,
    SendString(String),
    SendProgram(String),
    Compile(String),
    Stop,
    Log {
        interval_secs: Option<u64>,
        output: String,
    },
    ProgHelp,
    Help,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<PathBuf>,
    device: Option<PathBuf>,
    command: Command,
}

fn parse_args<I>(args: I) -> anyhow::Result<Cli>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut device = None;
    let mut positional = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--device" => {
                let path = args.next().context("--device needs a mount point")?;
                device = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                positional.clear();
                positional.push("help".to_string());
                break;
            }
            flag if flag.starts_with("--") => bail!("unknown option `{}`\n\n{}", flag, USAGE),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        return Ok(Cli {
            config,
            device,
            command: Command::Help,
        });
    };
    let rest: Vec<String> = positional.collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("status", []) => Command::Status,
        ("monitor", []) => Command::Monitor,
        ("stop", []) => Command::Stop,
        ("prog-help" | "proghelp", []) => Command::ProgHelp,
        ("help", []) => Command::Help,
        ("send-string" | "sendstring", [s]) => Command::SendString(s.clone()),
        ("send-program" | "sendprogram", [source]) => Command::SendProgram(source.clone()),
        ("compile", [source]) => Command::Compile(source.clone()),
        ("log", [output]) => Command::Log {
            interval_secs: None,
            output: output.clone(),
        },
        ("log", [interval, output]) => {
            let secs: u64 = interval
                .parse()
                .with_context(|| format!("log interval `{}` is not a whole number", interval))?;
            if secs == 0 {
                bail!("log interval must be at least one second");
            }
            Command::Log {
                interval_secs: Some(secs),
                output: output.clone(),
            }
        }
        (
            "status" | "monitor" | "stop" | "prog-help" | "proghelp" | "help" | "send-string"
            | "sendstring" | "send-program" | "sendprogram" | "compile" | "log",
            _,
        ) => bail!("wrong number of arguments for `{}`\n\n{}", name, USAGE),
        _ => bail!("unknown command `{}`\n\n{}", name, USAGE),
    };

    Ok(Cli {
        config,
        device,
        command,
    })
}

// ==================== Setup ====================

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    Ok(match &cli.device {
        Some(mount) => config.with_mount_path(mount),
        None => config,
    })
}

fn open_device(config: &AppConfig) -> anyhow::Result<Device> {
    let device = Device::open(&config.device, config.status.schema.clone())?;
    if config.status.require_cache_invalidation {
        device.status().require_coherent_reads()?;
    }
    Ok(device)
}

fn read_source(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read program from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
    }
}

/// Parse and compile a program, warning about device limits on stderr
fn compile_source(config: &AppConfig, source: &str) -> anyhow::Result<String> {
    let text = read_source(source)?;
    let program = program::parse_program(&text).with_context(|| format!("In {}", source))?;
    let compiler = WireCompiler::new(config.compiler.description_policy);

    let groups = compiler.compile_groups(&program)?;
    for violation in ProgramLimits::default().check(&program, &groups) {
        tracing::warn!("Program exceeds device limits: {}", violation);
        eprintln!("warning: {}", violation);
    }

    Ok(compiler.compile(&program)?)
}

fn upload(device: &Device, config: &AppConfig, command: &str) -> anyhow::Result<()> {
    println!("Sending: {}", command);
    match device.upload(command, &config.upload)? {
        Some(nonce) => println!("Program acknowledged by device (nonce {}).", nonce),
        None => println!("Program sent."),
    }
    Ok(())
}

// ==================== Monitor ====================

/// Raw-mode alternate screen, restored on drop
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn draw_screen(out: &mut impl Write, text: &str) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for line in text.lines() {
        queue!(out, Print(line), MoveToNextLine(1))?;
    }
    out.flush()
}

/// Clear `running` on the first key press
fn spawn_key_listener(running: Arc<AtomicBool>) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        running.store(false, Ordering::SeqCst);
                    }
                }
            }
        }
        Ok(())
    })
}

fn run_monitor(device: &Device, config: &AppConfig) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let guard = TerminalGuard::enter().context("Failed to set up terminal")?;
    let keys = spawn_key_listener(Arc::clone(&running));

    let mut stdout = io::stdout();
    let result = Monitor::new(device.status(), config.monitor.poll_interval()).run(
        &running,
        |record| {
            if let Err(e) = draw_screen(&mut stdout, &session::render_monitor(record)) {
                tracing::warn!("Failed to draw monitor screen: {}", e);
            }
            ControlFlow::Continue(())
        },
    );

    running.store(false, Ordering::SeqCst);
    match keys.join() {
        Ok(Err(e)) => tracing::warn!("Key listener failed: {}", e),
        Err(_) => tracing::warn!("Key listener panicked"),
        Ok(Ok(())) => {}
    }
    drop(guard);

    result?;
    Ok(())
}

// ==================== Log ====================

fn run_log(
    device: &Device,
    config: &AppConfig,
    interval_secs: Option<u64>,
    output: &str,
) -> anyhow::Result<()> {
    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.log.interval());

    let writer: Box<dyn Write> = if output == "-" {
        Box::new(io::stdout())
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .with_context(|| format!("Failed to open log file {}", output))?;
        Box::new(file)
    };
    let mut logger = CsvLogger::from_names(writer, &config.log.fields, config.status.schema.clone())
        .with_header(config.log.include_header);

    let running = AtomicBool::new(true);
    let mut write_error = None;
    Monitor::new(device.status(), interval).run(&running, |record| {
        if session::log_finished(record) {
            if record.state == RunState::Complete {
                eprintln!("Program complete, no more logs to give.");
            } else {
                eprintln!("Program not running; device inactive.");
            }
            return ControlFlow::Break(());
        }
        match logger.write_record(record) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;

    if let Some(e) = write_error {
        return Err(e).with_context(|| format!("Failed to write log to {}", output));
    }
    tracing::info!("Wrote {} log rows", logger.rows_written());
    Ok(())
}

// ==================== Main ====================

fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,pcrlink=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = parse_args(std::env::args().skip(1))?;

    match &cli.command {
        Command::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        Command::ProgHelp => {
            println!("{}", PROGRAM_HELP);
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;

    if let Command::Compile(source) = &cli.command {
        println!("{}", compile_source(&config, source)?);
        return Ok(());
    }

    let device = open_device(&config)?;
    match &cli.command {
        Command::Status => println!("{}", session::render_status(&device.read_status()?)),
        Command::Monitor => run_monitor(&device, &config)?,
        Command::SendString(command) => {
            if !command.starts_with(COMMAND_SIGNATURE) {
                eprintln!(
                    "warning: command does not start with `{}`; the device will ignore it",
                    COMMAND_SIGNATURE
                );
            }
            upload(&device, &config, command)?;
        }
        Command::SendProgram(source) => {
            let command = compile_source(&config, source)?;
            upload(&device, &config, &command)?;
        }
        Command::Stop => {
            device.stop()?;
            println!("Stop command sent.");
        }
        Command::Log {
            interval_secs,
            output,
        } => run_log(&device, &config, *interval_secs, output)?,
        Command::Help | Command::ProgHelp | Command::Compile(_) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_arguments_shows_help() {
        let cli = parse_args(Vec::<String>::new()).unwrap();
        assert_eq!(cli.command, Command::Help);
    }

    #[test]
    fn test_global_options_anywhere() {
        let cli = parse_args(args(&["status", "--device", "/mnt/pcr", "--config", "c.toml"]))
            .unwrap();
        assert_eq!(cli.command, Command::Status);
        assert_eq!(cli.device, Some(PathBuf::from("/mnt/pcr")));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_log_arguments() {
        let cli = parse_args(args(&["log", "5", "-"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Log {
                interval_secs: Some(5),
                output: "-".to_string()
            }
        );

        let cli = parse_args(args(&["log", "run.csv"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Log {
                interval_secs: None,
                output: "run.csv".to_string()
            }
        );

        assert!(parse_args(args(&["log", "0", "-"])).is_err());
        assert!(parse_args(args(&["log", "fast", "-"])).is_err());
    }

    #[test]
    fn test_legacy_command_names() {
        let cli = parse_args(args(&["sendprogram", "-"])).unwrap();
        assert_eq!(cli.command, Command::SendProgram("-".to_string()));
        let cli = parse_args(args(&["proghelp"])).unwrap();
        assert_eq!(cli.command, Command::ProgHelp);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_args(args(&["status", "extra"])).is_err());
        assert!(parse_args(args(&["send-string"])).is_err());
        assert!(parse_args(args(&["launch"])).is_err());
        assert!(parse_args(args(&["--verbose", "status"])).is_err());
        assert!(parse_args(args(&["status", "--device"])).is_err());
    }
}
