//! Alert notifications
//!
//! Regressions that survive deduplication become [`Notification`]s, which are
//! rendered into plain-text [`Message`]s (one per recipient) and handed to a
//! [`Notifier`]. Delivery transports live outside this crate; the provided
//! notifiers log messages or drop them into an outbox directory.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::regression::RegressionRecord;

/// Default sender address for alert mail
pub const DEFAULT_FROM_ADDR: &str = "telemetry-alert@mozilla.com";

/// A regression to surface, with the recipients that still need to hear of it
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub record: RegressionRecord,
    /// Probe description from the catalog
    pub description: String,
    /// Recipients not yet notified about this (date, metric) pair
    pub recipients: Vec<String>,
    /// True the first time the pair is seen
    pub first_report: bool,
}

impl Notification {
    /// Render one message per recipient
    pub fn messages(&self, from_addr: &str) -> Vec<Message> {
        let record = &self.record;
        let subject = format!(
            "Histogram regression detected: {} on {}",
            record.metric_name, record.date
        );
        let body = render_alert_body(self);

        self.recipients
            .iter()
            .map(|to| Message {
                id: format!("{}-{}-{}", record.date, record.metric_name, to),
                from: from_addr.to_string(),
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
            })
            .collect()
    }
}

/// A rendered plain-text message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Stable identifier, used as the outbox file name
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    /// RFC 822 style rendering
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\n\n{}",
            self.from, self.to, self.subject, self.body
        )
    }
}

fn render_alert_body(notification: &Notification) -> String {
    let record = &notification.record;
    let mut body = String::new();

    let _ = writeln!(
        body,
        "A persistent change in the distribution of {} was detected on {}.",
        record.metric_name, record.date
    );
    if !notification.description.is_empty() {
        let _ = writeln!(body, "\nDescription: {}", notification.description);
    }
    if !record.filter_path.is_empty() {
        let _ = writeln!(body, "Filter: {}", record.filter_path.join("/"));
    }
    let _ = writeln!(
        body,
        "Reference day: {} (Bhattacharyya distance {:.4})\n",
        record.reference_date, record.distance
    );

    let _ = writeln!(body, "{:>12}  {:>10}  {:>10}", "bucket", "regression", "reference");
    for (i, (current, reference)) in record.candidate.iter().zip(&record.reference).enumerate() {
        let label = record
            .labels
            .as_ref()
            .and_then(|l| l.get(i))
            .cloned()
            .unwrap_or_else(|| i.to_string());
        let _ = writeln!(
            body,
            "{:>12}  {:>9.2}%  {:>9.2}%",
            label,
            current * 100.0,
            reference * 100.0
        );
    }

    body.push_str("\nThis is an automated message sent by Cerberus.\n");
    body
}

/// Delivers rendered messages
pub trait Notifier {
    fn send(&mut self, message: &Message) -> Result<()>;
}

/// Logs every message through `tracing` instead of delivering it
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: usize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages logged so far
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl Notifier for LogNotifier {
    fn send(&mut self, message: &Message) -> Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "notification");
        tracing::debug!("{}", message.body);
        self.sent += 1;
        Ok(())
    }
}

/// Writes each message as a file into an outbox directory
#[derive(Debug)]
pub struct OutboxNotifier {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl OutboxNotifier {
    /// Create the notifier, creating `dir` if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create outbox: {}", dir.display()))?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl Notifier for OutboxNotifier {
    fn send(&mut self, message: &Message) -> Result<()> {
        let path = self.dir.join(format!("{}.eml", sanitize_file_name(&message.id)));
        fs::write(&path, message.to_rfc822())
            .with_context(|| format!("Failed to write message: {}", path.display()))?;
        tracing::info!(to = %message.to, path = %path.display(), "message queued");
        self.written.push(path);
        Ok(())
    }
}

fn sanitize_file_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
