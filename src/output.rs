// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (scripts), and JSON lines output modes.

use crate::diagnostics::Diagnostics;
use crate::health::{HealthEvent, HealthReport};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Only final results and errors
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> Option<f64> {
        self.start_time.map(|t| t.elapsed().as_secs_f64())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed_secs() {
                Some(elapsed) => println!("{message} ({elapsed:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.elapsed_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Advice shown after an error; humans only.
    pub fn hint(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            eprintln!("hint: {message}");
        }
    }

    /// Print collected warnings (always to stderr; JSON mode as events).
    pub fn diagnostics(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            match self.mode {
                OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {}", warning.message),
                OutputMode::Json => {
                    let event = JsonEvent {
                        event: "warning",
                        message: &warning.message,
                        duration_secs: None,
                    };
                    if let Ok(json) = serde_json::to_string(&event) {
                        eprintln!("{json}");
                    }
                }
            }
        }
    }

    /// Table in normal and quiet mode, one JSON document otherwise.
    pub fn report(&self, report: &HealthReport) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => print!("{report}"),
            OutputMode::Json => print_json(report),
        }
    }

    /// A supervision event as it happens (quiet mode drops them).
    pub fn event(&self, event: &HealthEvent) {
        match self.mode {
            OutputMode::Normal => {
                let detail = event.detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default();
                println!("{} {} {}{detail}", event.at.format("%H:%M:%S"), event.name, event.kind);
            }
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(event),
        }
    }

    /// Arbitrary structured data: pretty in normal mode, one line in JSON mode.
    pub fn data<T: Serialize>(&self, value: &T) {
        match self.mode {
            OutputMode::Json => print_json(value),
            OutputMode::Normal | OutputMode::Quiet => {
                if let Ok(yaml) = serde_yaml::to_string(value) {
                    print!("{yaml}");
                }
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
