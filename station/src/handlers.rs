use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use station_core::report::save_report;
use station_core::{BotInfo, BotRegistry, BotRun, ReportFormat, RunContext};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::warn;

/// Banner and status lines go to stderr; stdout carries only the report.
pub fn print_banner() {
    print_divider();
    eprintln!(
        "{} {}",
        "  STATION".bright_white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    eprintln!("{}", "  scraping & automation bots".bright_black());
    print_divider();
    eprintln!();
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

/// One `Name/Description/Author/Version/Usage` block per bot.
pub fn format_bot_info(info: &BotInfo) -> String {
    format!(
        "Name: {}\nDescription: {}\nAuthor: {}\nVersion: {}\nUsage: station run {} --params {}\n",
        info.name, info.description, info.author, info.version, info.name, info.usage
    )
}

pub fn handle_list(registry: &BotRegistry) {
    let bots = registry.list();
    if bots.is_empty() {
        println!("{} No bots registered.", "⚠".yellow().bold());
        return;
    }

    println!("{} {} bot(s) available\n", "✓".green().bold(), bots.len());
    for info in bots {
        println!("{}", format_bot_info(&info));
    }
}

pub fn parse_format(raw: &str) -> Result<ReportFormat> {
    ReportFormat::from_str(raw).ok_or_else(|| anyhow!("Unsupported report format '{}'", raw))
}

/// Expand `~` and environment variables in a user-supplied output path.
pub fn resolve_output_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Could not expand output path '{}'", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Write `content` to `path`, creating missing parent directories.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    save_report(content, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

pub async fn handle_run(registry: &BotRegistry, args: &ArgMatches, quiet: bool) -> Result<()> {
    let bot = args.get_one::<String>("BOT").context("missing bot name")?;
    let params: Vec<String> = args
        .get_many::<String>("params")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let format = parse_format(
        args.get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text"),
    )?;
    let output = args
        .get_one::<String>("output")
        .map(String::as_str)
        .map(resolve_output_path)
        .transpose()?;

    let ctx = RunContext {
        format,
        show_progress: !quiet,
        ..RunContext::default()
    };

    let stop_flag = ctx.stop_flag.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current page");
            stop_flag.store(true, Ordering::SeqCst);
        }
    });

    let result = registry.run(bot, &params, &ctx).await;
    interrupt.abort();
    let run = result?;

    deliver_run(
        &run,
        output.as_deref(),
        quiet,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )
}

/// Report to `path` or `out`; the saved notice and completion line to `status`.
pub fn deliver_run(
    run: &BotRun,
    path: Option<&Path>,
    quiet: bool,
    out: &mut impl Write,
    status: &mut impl Write,
) -> Result<()> {
    match path {
        Some(path) => {
            write_report(&run.report, path)?;
            if !quiet {
                writeln!(
                    status,
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                )?;
            }
        }
        None => {
            out.write_all(run.report.as_bytes())?;
            out.flush()?;
        }
    }

    writeln!(status, "Bot completed. Result: {}", run.summary)?;
    Ok(())
}
