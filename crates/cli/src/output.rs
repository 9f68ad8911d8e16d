//! Output formatting for CLI

use std::io::Write;

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use parking_lot::Mutex;
use serde::Serialize;

use saucejs_common::{LogMethod, Notification, NotificationSink, TunnelLogEvent};
use saucejs_runner::{JobReport, RunVerdict};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for JobReport {
    fn headers() -> Vec<&'static str> {
        vec!["URL", "Platform", "Result", "Job", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            self.platform.to_string(),
            if self.passed { "passed" } else { "failed" }.to_string(),
            self.job_url.clone().unwrap_or_else(|| "-".to_string()),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Print a serializable value in a machine-readable format
pub fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    write_serialized(&mut std::io::stdout().lock(), value, format)
}

pub fn write_serialized<T: Serialize + ?Sized>(
    out: &mut impl Write,
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(value)?)?,
        OutputFormat::Json | OutputFormat::Table => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
    }
    Ok(())
}

/// Print the per-job summary of a finished run
pub fn print_verdict(verdict: &RunVerdict, format: OutputFormat) -> anyhow::Result<()> {
    write_verdict(&mut std::io::stdout().lock(), verdict, format)
}

pub fn write_verdict(out: &mut impl Write, verdict: &RunVerdict, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if verdict.jobs.is_empty() {
                writeln!(out, "No jobs were run.")?;
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(JobReport::headers());
            for job in &verdict.jobs {
                table.add_row(job.row());
            }

            writeln!(out, "{table}")?;
            Ok(())
        }
        _ => write_serialized(out, verdict, format),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Renders run progress for a terminal
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
    verbose: bool,
}

impl ConsoleReporter<Box<dyn Write + Send>> {
    /// Progress on stdout beside a table, on stderr when stdout carries a document
    pub fn for_format(format: OutputFormat, verbose: bool) -> Self {
        Self::routed(format, Box::new(std::io::stdout()), Box::new(std::io::stderr()), verbose)
    }

    pub fn routed(
        format: OutputFormat,
        stdout: Box<dyn Write + Send>,
        stderr: Box<dyn Write + Send>,
        verbose: bool,
    ) -> Self {
        match format {
            OutputFormat::Table => Self::new(stdout, verbose),
            OutputFormat::Json | OutputFormat::Yaml => Self::new(stderr, verbose),
        }
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out: Mutex::new(out),
            verbose,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Text for one notification; `None` when it is not shown at this verbosity
    pub fn render(&self, notification: &Notification) -> Option<String> {
        let text = match notification {
            Notification::TunnelOpen => "=> Starting Tunnel to Sauce Labs".bold().reversed().to_string(),
            Notification::TunnelOpened => format!("{} Connected to Saucelabs", "OK".green()),
            Notification::TunnelClose => "=> Stopping Tunnel to Sauce Labs".bold().reversed().to_string(),
            Notification::TunnelEvent(event) => return self.render_tunnel_line(event),
            Notification::JobStarted {
                started_jobs,
                number_of_jobs,
            } => format!("\n{} / {} tests started", started_jobs, number_of_jobs),
            Notification::JobCompleted {
                url,
                platform,
                passed,
                job_url,
                port_warning,
                ..
            } => {
                let mut lines = vec![
                    format!("\n{}", format!("Tested {}", url).bold()),
                    format!("Platform: {}", platform),
                ];
                if *port_warning {
                    lines.push(
                        "Warning: This url might use a port that is not proxied by Sauce Connect."
                            .yellow()
                            .to_string(),
                    );
                }
                lines.push(format!("Passed: {}", passed));
                lines.push(format!("Url {}", job_url.as_deref().unwrap_or("-")));
                lines.join("\n")
            }
            Notification::JobFailed { url, platform, error } => format!(
                "\n{}\nPlatform: {}\n{} {}",
                format!("Tested {}", url).bold(),
                platform,
                "ERROR".red(),
                error
            ),
            Notification::TestCompleted { passed } => {
                let status = format!("All tests completed with status {}", passed);
                if *passed {
                    format!("{} {}", "OK".green(), status)
                } else {
                    format!("{} {}", "ERROR".red(), status)
                }
            }
            Notification::Retrying { url, browser } => {
                format!("Timed out, retrying URL {} on browser {}", url, browser)
            }
        };
        Some(text)
    }

    fn render_tunnel_line(&self, event: &TunnelLogEvent) -> Option<String> {
        if event.verbose && !self.verbose {
            return None;
        }
        let text = match event.method {
            LogMethod::Write | LogMethod::Writeln => event.text.clone(),
            LogMethod::Error => format!("{} {}", "ERROR".red(), event.text),
            LogMethod::Ok => format!("{} {}", "OK".green(), event.text),
            LogMethod::Debug => format!("[D] {}", event.text).dimmed().to_string(),
        };
        Some(text)
    }
}

impl<W: Write + Send> NotificationSink for ConsoleReporter<W> {
    fn notify(&self, notification: Notification) {
        let Some(text) = self.render(&notification) else {
            return;
        };
        let mut out = self.out.lock();
        let written = match &notification {
            Notification::TunnelEvent(TunnelLogEvent {
                method: LogMethod::Write,
                ..
            }) => write!(out, "{}", text),
            _ => writeln!(out, "{}", text),
        };
        // A closed terminal must not fail the run.
        let _ = written.and_then(|_| out.flush());
    }
}
