//! Result writers for the bulk and single-check commands.
//!
//! The format is picked from the output filename: `.json` collects a pretty
//! JSON array, `.jsonl`/`.ndjson` emit one object per line, `.csv` uses a
//! fixed header, and any other extension lists only valid/risky addresses.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use emailverify_core::{Status, VerificationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Jsonl,
    Csv,
    Txt,
}

/// Detects the output format from the filename extension.
pub fn detect_format(path: &Path) -> Format {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("json") => Format::Json,
        Some("jsonl") | Some("ndjson") => Format::Jsonl,
        Some("csv") => Format::Csv,
        _ => Format::Txt,
    }
}

const CSV_HEADER: &[&str] = &[
    "email",
    "valid",
    "status",
    "status_code",
    "reason",
    "disposable",
    "role_account",
    "free_provider",
    "catch_all",
    "mx_host",
    "confidence_score",
    "latency_ms",
    "verified_at",
];

struct WriterState {
    file: BufWriter<File>,
    buffered: Vec<VerificationResult>,
}

/// Format-aware result writer. Record emission is serialized by an internal
/// mutex so it can be shared across tasks.
pub struct OutputWriter {
    format: Format,
    inner: Mutex<WriterState>,
}

impl OutputWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let format = detect_format(path);
        let file = File::create(path)
            .with_context(|| format!("failed to create output file {}", path.display()))?;
        let mut file = BufWriter::new(file);

        if format == Format::Csv {
            writeln!(file, "{}", CSV_HEADER.join(","))?;
        }

        Ok(Self {
            format,
            inner: Mutex::new(WriterState {
                file,
                buffered: Vec::new(),
            }),
        })
    }

    /// Emits one record. JSON arrays are buffered until [`finish`].
    ///
    /// [`finish`]: OutputWriter::finish
    pub fn write(&self, result: &VerificationResult) -> Result<()> {
        let mut state = self.inner.lock().expect("output writer poisoned");

        match self.format {
            Format::Json => {
                state.buffered.push(result.clone());
            }
            Format::Jsonl => {
                serde_json::to_writer(&mut state.file, result)?;
                state.file.write_all(b"\n")?;
            }
            Format::Csv => {
                let row = csv_row(result);
                writeln!(state.file, "{row}")?;
            }
            Format::Txt => {
                // Plain listings carry only addresses worth contacting.
                if result.valid || result.status == Status::Risky {
                    writeln!(state.file, "{}", result.email)?;
                }
            }
        }

        Ok(())
    }

    /// Flushes buffered content and closes the file.
    pub fn finish(self) -> Result<()> {
        let mut state = self.inner.into_inner().expect("output writer poisoned");

        if self.format == Format::Json {
            serde_json::to_writer_pretty(&mut state.file, &state.buffered)?;
            state.file.write_all(b"\n")?;
        }

        state.file.flush()?;
        Ok(())
    }
}

fn csv_row(result: &VerificationResult) -> String {
    let fields = [
        result.email.clone(),
        result.valid.to_string(),
        result.status.to_string(),
        result.status_code.to_string(),
        result.reason.clone(),
        result.disposable.to_string(),
        result.role_account.to_string(),
        result.free_provider.to_string(),
        result.catch_all.to_string(),
        result.mx_host.clone(),
        result.confidence_score.to_string(),
        result.latency_ms.to_string(),
        result.verified_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ];
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(email: &str, status: Status) -> VerificationResult {
        let mut r = VerificationResult::new(email);
        match status {
            Status::Valid => r.set_valid(250, "250 OK"),
            Status::Invalid => r.set_invalid(550, "550 no", "Recipient rejected"),
            Status::Risky => {
                r.catch_all = true;
                r.catch_all_checked = true;
                r.set_risky("Domain accepts all emails (catch-all)");
            }
            _ => r.set_unknown("SMTP verification skipped"),
        }
        r
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(detect_format(Path::new("out.json")), Format::Json);
        assert_eq!(detect_format(Path::new("out.JSONL")), Format::Jsonl);
        assert_eq!(detect_format(Path::new("out.ndjson")), Format::Jsonl);
        assert_eq!(detect_format(Path::new("out.csv")), Format::Csv);
        assert_eq!(detect_format(Path::new("out.txt")), Format::Txt);
        assert_eq!(detect_format(Path::new("results")), Format::Txt);
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn txt_writer_lists_only_valid_and_risky() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let writer = OutputWriter::create(&path).unwrap();
        writer.write(&sample("good@example.com", Status::Valid)).unwrap();
        writer.write(&sample("bad@example.com", Status::Invalid)).unwrap();
        writer.write(&sample("maybe@example.com", Status::Risky)).unwrap();
        writer.write(&sample("shrug@example.com", Status::Unknown)).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "good@example.com\nmaybe@example.com\n");
    }

    #[test]
    fn csv_writer_emits_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let writer = OutputWriter::create(&path).unwrap();
        writer.write(&sample("good@example.com", Status::Valid)).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("good@example.com,true,valid,250,"));
    }

    #[test]
    fn json_writer_produces_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let writer = OutputWriter::create(&path).unwrap();
        writer.write(&sample("a@example.com", Status::Valid)).unwrap();
        writer.write(&sample("b@example.com", Status::Unknown)).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<VerificationResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].email, "a@example.com");
        assert_eq!(parsed[1].status, Status::Unknown);
    }

    #[test]
    fn jsonl_writer_produces_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let writer = OutputWriter::create(&path).unwrap();
        writer.write(&sample("a@example.com", Status::Valid)).unwrap();
        writer.write(&sample("b@example.com", Status::Invalid)).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let _: VerificationResult = serde_json::from_str(line).unwrap();
        }
    }
}
