use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for a reasoning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        run_id: String,
        question_preview: String,
        max_steps: usize,
        target: f64,
    },
    StepStarted {
        step_index: usize,
        max_steps: usize,
    },
    StepCompleted {
        step_index: usize,
        title: String,
        aggregate: f64,
        degraded: bool,
        duration_secs: f64,
    },
    FeedbackGenerated {
        step_index: usize,
        source: String,
        length: usize,
    },
    /// Per-iteration telemetry record
    StepTelemetry {
        run_id: String,
        step_index: usize,
        max_steps: usize,
        aggregate: f64,
        mindfulness: f64,
        emptiness: f64,
        non_duality: f64,
        boundless_care: f64,
        target: f64,
        target_reached: bool,
        termination_reason: String,
        latency_ms: u64,
        feedback_len: usize,
    },
    StepFailed {
        step_index: usize,
        error: String,
    },
    SynthesisStarted {
        steps: usize,
    },
    SynthesisCompleted {
        synthesized: bool,
        answer_len: usize,
    },
    SessionCompleted {
        run_id: String,
        steps: usize,
        termination: String,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
    /// No console output (file sink only)
    Silent,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "silent" => Ok(LogFormat::Silent),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for session events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
            LogFormat::Silent => {}
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                question_preview,
                max_steps,
                target,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "dharmaloops".bold().bright_white(),
                    " ".repeat(56) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Question:".dimmed(),
                    Self::truncate_with_padding(question_preview, 56, 66).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Policy:".dimmed(),
                    Self::truncate_with_padding(
                        &format!("target {:.2}, max {} steps", target, max_steps),
                        58,
                        68
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::StepStarted {
                step_index,
                max_steps,
            } => {
                let step_text = format!("─ Step {}/{} ", step_index, max_steps);
                let padding = "─".repeat(67usize.saturating_sub(step_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    step_text.bright_blue().bold(),
                    padding.bright_blue()
                );
            }
            LogEvent::StepCompleted {
                title,
                aggregate,
                degraded,
                duration_secs,
                ..
            } => {
                if *degraded {
                    let _ = writeln!(
                        stderr,
                        "  {} {} ({:.1}s, unparsed scores)",
                        "⚠".bright_yellow(),
                        title.bright_yellow(),
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "  {} {} ({:.1}s)",
                        "▶".bright_cyan(),
                        title.bright_cyan().bold(),
                        duration_secs
                    );
                }
                let _ = writeln!(stderr, "    {} {:.2}", "Aggregate:".dimmed(), aggregate);
            }
            LogEvent::FeedbackGenerated { source, length, .. } => {
                let label = if source == "fallback" {
                    format!("Feedback: {} chars (rule-based)", length)
                        .bright_yellow()
                        .to_string()
                } else {
                    format!("Feedback: {} chars", length).dimmed().to_string()
                };
                let _ = writeln!(stderr, "    {}", label);
            }
            LogEvent::StepTelemetry {
                termination_reason,
                target_reached,
                ..
            } => {
                let styled = if *target_reached && termination_reason == "target_reached" {
                    format!("✓ {}", termination_reason).bright_green().to_string()
                } else if termination_reason == "max_steps_reached" {
                    format!("■ {}", termination_reason).bright_yellow().to_string()
                } else {
                    format!("→ {}", termination_reason).bright_blue().to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::StepFailed { step_index, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Step {} failed: {}",
                    "✗".bright_red(),
                    step_index,
                    error.bright_red()
                );
            }
            LogEvent::SynthesisStarted { steps } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} ({} steps)",
                    "▶".bright_magenta(),
                    "SYNTHESIS".bright_magenta().bold(),
                    steps
                );
            }
            LogEvent::SynthesisCompleted { synthesized, .. } => {
                if !synthesized {
                    let _ = writeln!(
                        stderr,
                        "    {} {}",
                        "✗".bright_red(),
                        "Synthesis failed, emitting diagnostic".bright_red()
                    );
                }
            }
            LogEvent::SessionCompleted { .. } => {
                // The final summary is printed by the binary
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted { run_id, .. } => {
                format!("[{}] session:start {}", timestamp, run_id)
            }
            LogEvent::StepStarted { step_index, .. } => {
                format!("[{}] step:start:{}", timestamp, step_index)
            }
            LogEvent::StepCompleted {
                step_index,
                aggregate,
                degraded,
                duration_secs,
                ..
            } => format!(
                "[{}] step:done:{} agg={:.2}{} {:.1}s",
                timestamp,
                step_index,
                aggregate,
                if *degraded { " degraded" } else { "" },
                duration_secs
            ),
            LogEvent::FeedbackGenerated {
                step_index,
                source,
                length,
            } => format!(
                "[{}] feedback:{} {} {}c",
                timestamp, step_index, source, length
            ),
            LogEvent::StepTelemetry {
                step_index,
                termination_reason,
                latency_ms,
                ..
            } => format!(
                "[{}] route:{} {} {}ms",
                timestamp, step_index, termination_reason, latency_ms
            ),
            LogEvent::StepFailed { step_index, error } => {
                format!("[{}] error:{}:{}", timestamp, step_index, error)
            }
            LogEvent::SynthesisStarted { steps } => {
                format!("[{}] synthesis:start:{}", timestamp, steps)
            }
            LogEvent::SynthesisCompleted { synthesized, .. } => {
                format!(
                    "[{}] synthesis:{}",
                    timestamp,
                    if *synthesized { "done" } else { "failed" }
                )
            }
            LogEvent::SessionCompleted {
                steps,
                termination,
                duration_secs,
                ..
            } => format!(
                "[{}] session:done:{} {} {:.1}s",
                timestamp, steps, termination, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_serializes_with_event_tag() {
        let event = LogEvent::StepTelemetry {
            run_id: "run-1".into(),
            step_index: 2,
            max_steps: 10,
            aggregate: 0.6,
            mindfulness: 0.5,
            emptiness: 0.6,
            non_duality: 0.7,
            boundless_care: 0.6,
            target: 0.75,
            target_reached: false,
            termination_reason: "minimum_steps_required".into(),
            latency_ms: 1200,
            feedback_len: 140,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "step_telemetry");
        assert_eq!(json["termination_reason"], "minimum_steps_required");
        assert_eq!(json["feedback_len"], 140);
    }

    #[test]
    fn test_file_sink_writes_timestamped_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("session.jsonl");
        let logger = Logger::with_file(LogFormat::Silent, &path).unwrap();

        logger.log(&LogEvent::StepStarted {
            step_index: 1,
            max_steps: 4,
        });
        logger.log(&LogEvent::SynthesisStarted { steps: 1 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "step_started");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["steps"], 1);
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("short", 10, 12);
        assert_eq!(padded, "short      │");

        let truncated = Logger::truncate_with_padding("a very long question", 10, 12);
        assert!(truncated.starts_with("a very ..."));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
