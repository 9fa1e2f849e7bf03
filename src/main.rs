//! MIDI Ping-Pong - Main CLI Application
//!
//! Sends a SysEx ping to a MIDI output, waits for the pong on a MIDI input
//! and reports the round-trip time of every exchange.

use clap::Parser;
use midi_ping_pong::{
    cli::Cli,
    config::{display_config_summary, load_config},
    error::{AppError, ErrorContext, ErrorReporter, Result},
    logging::{Logger, LoggerFactory},
    output::{
        ConsoleObserver, IterationFormatter, JsonRenderer, OutputFormatterFactory, RenderOptions,
        SeriesRenderer, SvgRenderer,
    },
    session::Session,
    transport::{Responder, TransportDriver, VirtualDriver},
    Config, RunReport, PKG_NAME, VERSION,
};
use std::process;
use std::time::Duration;
use tokio::sync::watch;

/// Reply delay of the built-in loopback device
const LOOPBACK_DELAY: Duration = Duration::from_millis(2);

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            reporter.report_error(&e);
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; returns the process exit code
async fn run_application(cli: Cli) -> Result<i32> {
    cli.validate().map_err(AppError::validation)?;

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        return Ok(0);
    }

    if cli.debug {
        eprintln!("{} v{}{}", PKG_NAME, VERSION, build_suffix());
    }

    let config = load_config(cli.clone())?;
    if config.debug {
        eprintln!("Configuration loaded successfully:");
        eprintln!("{}", display_config_summary(&config));
        eprintln!();
    }

    let factory = LoggerFactory::new(config.clone());
    let logger = factory.create_logger("APP").await;
    let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);

    let driver = create_driver(&config)?;
    logger
        .debug("Transport driver ready")
        .field("driver", driver.name())
        .log()
        .await;

    if cli.list {
        let ports = driver.list_ports();
        driver.shutdown();
        println!("{}", formatter.format_port_list(&ports?));
        return Ok(0);
    }

    let result = measure(driver.as_ref(), &config, &logger).await;
    driver.shutdown();
    let report = result?;

    write_outputs(&report, &config, formatter.as_ref(), &logger).await?;
    println!();
    println!("{}", formatter.format_summary(&report, &report.statistics()));

    if report.stop_reason.is_clean() {
        Ok(0)
    } else {
        let error = AppError::listener(report.stop_reason.to_string());
        eprintln!("{}", formatter.format_error(&error.to_string()));
        Ok(error.exit_code())
    }
}

/// Pick the backend: the virtual device for `--loopback`, real ports otherwise
fn create_driver(config: &Config) -> Result<Box<dyn TransportDriver>> {
    if config.loopback {
        return Ok(Box::new(VirtualDriver::new(Responder::echo_after(LOOPBACK_DELAY))));
    }

    #[cfg(feature = "midi")]
    {
        Ok(Box::new(midi_ping_pong::transport::MidirDriver::default()))
    }
    #[cfg(not(feature = "midi"))]
    {
        Err(AppError::config(
            "this build has no MIDI device support; rebuild with --features midi or use --loopback",
        ))
    }
}

/// Open both ports, run until a stop condition and release the ports
async fn measure(
    driver: &dyn TransportDriver,
    config: &Config,
    logger: &Logger,
) -> Result<RunReport> {
    let endpoints = config.endpoints()?;
    let session = Session::open(driver, endpoints, logger.named("SESSION"))?;

    println!("In: {}", session.input_name().unwrap_or("-"));
    println!("Out: {}", session.output_name());

    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    let mut observer = ConsoleObserver::new(OutputFormatterFactory::create_formatter(
        config.enable_color,
        config.verbose,
    ));
    let report = session
        .run(config.loop_config(), Some(interrupt_rx), &mut observer)
        .await;
    ctrl_c.abort();

    let report = report?;
    logger
        .info("Run finished")
        .field("iterations", report.iterations)
        .field("matched", report.outcomes.matched)
        .field("stop_reason", report.stop_reason)
        .log()
        .await;
    Ok(report)
}

/// Write the graph and, when requested, the JSON report
async fn write_outputs(
    report: &RunReport,
    config: &Config,
    formatter: &dyn IterationFormatter,
    logger: &Logger,
) -> Result<()> {
    let title = config.effective_graph_title();

    let graph = SvgRenderer::default()
        .render(&report.series, &RenderOptions::new(title, &config.graph_filename))
        .with_context(|| "saving graph".to_string())?;
    logger.info("Graph saved").field("path", graph.display().to_string()).log().await;
    eprintln!("{}", formatter.format_success(&format!("Graph saved to {}", graph.display())));

    if let Some(ref path) = config.json_report {
        let json = JsonRenderer::for_report(report)
            .render(&report.series, &RenderOptions::new(title, path))
            .with_context(|| "saving JSON report".to_string())?;
        eprintln!("{}", formatter.format_success(&format!("Report saved to {}", json.display())));
    }

    if report.series.is_empty() {
        eprintln!("{}", formatter.format_warning("No pong was received; the graph is empty"));
    }
    Ok(())
}

/// Build metadata appended to the version in debug output
fn build_suffix() -> String {
    match (option_env!("GIT_COMMIT"), option_env!("BUILD_TIME")) {
        (Some(commit), Some(time)) => format!(" ({} {})", commit, time),
        (None, Some(time)) => format!(" ({})", time),
        _ => String::new(),
    }
}

/// Print hints for errors users can fix themselves
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Suggestions:");
            eprintln!("  - Run 'ping-pong --help' for usage");
            eprintln!("  - Run 'ping-pong --help-topic config' for environment variables");
        }
        AppError::PortOpen(_) => {
            eprintln!();
            eprintln!("Suggestions:");
            eprintln!("  - Run 'ping-pong --list' to see the available device IDs");
            eprintln!("  - Check that the device is connected and not held by another program");
        }
        AppError::Transport(_) | AppError::Listener(_) => {
            eprintln!();
            eprintln!("Suggestions:");
            eprintln!("  - Check the MIDI cable or USB connection");
        }
        AppError::Io(_) | AppError::Render(_) => {
            eprintln!();
            eprintln!("Suggestions:");
            eprintln!("  - Check that the graph and report paths are writable");
        }
        _ => {}
    }
}
