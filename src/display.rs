// Console presentation for the CLI
// Labels are injected; nothing here is process-global

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use crate::licensing::LicenseStatus;

/// Kind of console line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Success,
    Error,
    Info,
    Warn,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Success => "SUCCESS",
            LineKind::Error => "ERROR",
            LineKind::Info => "INFO",
            LineKind::Warn => "WARN",
        }
    }
}

/// Prefix shown before each line kind
#[derive(Debug, Clone)]
pub struct Labels(HashMap<String, String>);

impl Default for Labels {
    fn default() -> Self {
        let pairs = [
            ("SUCCESS", "✅"),
            ("ERROR", "❌"),
            ("INFO", "ℹ️"),
            ("WARN", "⚠️"),
        ];
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl Labels {
    /// Plain-text labels for terminals without emoji
    pub fn plain() -> Self {
        Self::default()
            .with("SUCCESS", "[ok]")
            .with("ERROR", "[error]")
            .with("INFO", "[info]")
            .with("WARN", "[warn]")
    }

    pub fn with(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.0.insert(key.into(), label.into());
        self
    }

    pub fn get(&self, kind: LineKind) -> &str {
        self.0.get(kind.as_str()).map(String::as_str).unwrap_or("")
    }
}

/// Writes user-facing lines, as text or JSON
pub struct Console<W> {
    out: W,
    labels: Labels,
    json: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, labels: Labels, json: bool) -> Self {
        Self { out, labels, json }
    }

    pub fn line(&mut self, kind: LineKind, message: &str) {
        // Nothing sensible to do when stdout is gone
        let _ = if self.json {
            writeln!(
                self.out,
                "{}",
                serde_json::json!({ "kind": kind.as_str(), "message": message })
            )
        } else {
            writeln!(self.out, "{} {}", self.labels.get(kind), message)
        };
    }

    pub fn banner(&mut self, title: &str) {
        if self.json {
            return;
        }
        let rule = "=".repeat(50);
        let _ = writeln!(self.out, "\n{rule}\n{} {title}\n{rule}", self.labels.get(LineKind::Info));
    }

    pub fn value<T: Serialize>(&mut self, label: &str, value: &T) {
        if self.json {
            let mut object = serde_json::Map::new();
            object.insert(label.to_string(), serde_json::to_value(value).unwrap_or_default());
            let _ = writeln!(self.out, "{}", serde_json::Value::Object(object));
        } else if let Ok(serde_json::Value::String(s)) = serde_json::to_value(value) {
            let _ = writeln!(self.out, "{label}: {s}");
        } else {
            let _ = writeln!(self.out, "{label}: {}", serde_json::to_string(value).unwrap_or_default());
        }
    }

    pub fn status(&mut self, status: &LicenseStatus) {
        if self.json {
            let _ = writeln!(self.out, "{}", serde_json::to_string(status).unwrap_or_default());
            return;
        }
        match status {
            LicenseStatus::Valid(id) => self.line(LineKind::Success, &format!("License valid ({id})")),
            LicenseStatus::Invalid(reason) => self.line(LineKind::Error, &format!("License invalid: {reason}")),
            LicenseStatus::Unknown(reason) => self.line(LineKind::Warn, &format!("License status unknown: {reason}")),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
