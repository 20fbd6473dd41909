//! Per-record output
//!
//! Prints each record to stdout and optionally appends it as a JSON line
//! to a daily log file.

use crate::types::DnsRecord;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use log::warn;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Stdout rendering of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordFormat {
    /// Multi-line human readable block
    Text,
    /// One JSON object per line
    Json,
}

/// Append-only JSON-lines file that rolls over daily
///
/// The open handle is kept until a record arrives with a new date.
pub struct DailyLog {
    dir: PathBuf,
    current: Option<(NaiveDate, File)>,
}

impl DailyLog {
    /// Log writing into `dir`, which must already exist
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, current: None }
    }

    /// Append one record to the file for `date`
    pub fn append(&mut self, date: NaiveDate, record: &DnsRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = log_file_path(&self.dir, date);
        if self.open_date() != Some(date) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            self.current = Some((date, file));
        }

        if let Some((_, file)) = &mut self.current {
            file.write_all(line.as_bytes())
                .with_context(|| format!("Failed to write to log file: {:?}", path))?;
        }
        Ok(())
    }

    /// Date of the currently open file
    pub fn open_date(&self) -> Option<NaiveDate> {
        self.current.as_ref().map(|(date, _)| *date)
    }
}

/// Destination for decoded records
pub struct RecordSink {
    format: RecordFormat,
    quiet: bool,
    log: Option<DailyLog>,
}

impl RecordSink {
    /// Create a sink
    ///
    /// # Arguments
    ///
    /// * `format` - Stdout rendering
    /// * `quiet` - Suppress stdout output
    /// * `log_dir` - Directory for daily JSON-lines files
    pub fn new(format: RecordFormat, quiet: bool, log_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &log_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
        }

        Ok(Self {
            format,
            quiet,
            log: log_dir.map(DailyLog::new),
        })
    }

    /// Emit one record
    ///
    /// Log-file failures are reported and otherwise ignored so a full disk
    /// never stops capture.
    pub fn emit(&mut self, record: &DnsRecord) {
        if !self.quiet {
            match self.format {
                RecordFormat::Text => println!("{}", render_text(record)),
                RecordFormat::Json => match serde_json::to_string(record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize record: {}", e),
                },
            }
        }

        if let Some(log) = &mut self.log {
            if let Err(e) = log.append(Local::now().date_naive(), record) {
                warn!("Failed to write record log: {:#}", e);
            }
        }
    }
}

/// Daily log file for a given date
pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("dns_records_{}.json", date.format("%Y-%m-%d")))
}

/// Human readable record block
pub fn render_text(record: &DnsRecord) -> String {
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();

    let mut out = String::new();
    out.push_str("==== DNS Record ====\n");
    out.push_str(&format!("Timestamp:      {}\n", record.timestamp));
    out.push_str(&format!(
        "Protocol:       {} ({})\n",
        record.protocol, record.direction
    ));
    out.push_str(&format!("Source:         {}\n", record.source));
    out.push_str(&format!("Destination:    {}\n", record.destination));
    out.push_str(&format!(
        "Process:        {} (PID {}, TID {})\n",
        record.process_name, record.process_id, record.thread_id
    ));
    out.push_str(&format!("Path:           {}\n", record.process_path));
    out.push_str(&format!("User:           uid={} gid={}\n", record.uid, record.gid));
    out.push_str(&format!("Interface:      {}\n", record.ifindex));
    out.push_str(&format!(
        "Transaction ID: {}\n",
        record
            .transaction_id
            .map(|id| format!("0x{:04x}", id))
            .unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "Query:          {}\n",
        or_dash(record.query_name.as_deref())
    ));
    out.push_str(&format!(
        "Type:           {}\n",
        or_dash(record.query_type.as_deref())
    ));
    out.push_str(&format!("Payload:        {} bytes\n", record.payload_len));
    out.push_str("====================");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn record() -> DnsRecord {
        DnsRecord {
            timestamp: "2026-03-01T12:00:00+00:00".to_string(),
            protocol: "UDP".to_string(),
            direction: Direction::Query,
            source: "10.0.0.5:41234".to_string(),
            destination: "9.9.9.9:53".to_string(),
            client_ip: "10.0.0.5".to_string(),
            process_id: 100,
            thread_id: 101,
            uid: 1000,
            gid: 1000,
            comm: "firefox".to_string(),
            process_name: "firefox".to_string(),
            process_path: "/usr/lib/firefox/firefox".to_string(),
            ifindex: 0,
            transaction_id: Some(0xbeef),
            query_name: Some("mozilla.org".to_string()),
            query_type: Some("AAAA".to_string()),
            payload_len: 29,
        }
    }

    #[test]
    fn test_log_file_path() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let path = log_file_path(Path::new("/var/log/dnsflux"), date);
        assert_eq!(
            path,
            PathBuf::from("/var/log/dnsflux/dns_records_2026-03-01.json")
        );
    }

    fn temp_log_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dnsflux-output-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_append_json_lines() {
        let dir = temp_log_dir("append");
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut log = DailyLog::new(dir.clone());

        log.append(date, &record()).unwrap();
        log.append(date, &record()).unwrap();

        let content = fs::read_to_string(log_file_path(&dir, date)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: DnsRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_daily_log_keeps_handle_until_rollover() {
        let dir = temp_log_dir("rollover");
        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut log = DailyLog::new(dir.clone());

        log.append(day1, &record()).unwrap();
        // An open handle keeps writing to the unlinked file
        fs::remove_file(log_file_path(&dir, day1)).unwrap();
        log.append(day1, &record()).unwrap();
        assert!(!log_file_path(&dir, day1).exists());
        assert_eq!(log.open_date(), Some(day1));

        log.append(day2, &record()).unwrap();
        assert_eq!(log.open_date(), Some(day2));
        let content = fs::read_to_string(log_file_path(&dir, day2)).unwrap();
        assert_eq!(content.lines().count(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sink_writes_log_when_quiet() {
        let dir = temp_log_dir("sink");
        let mut sink = RecordSink::new(RecordFormat::Json, true, Some(dir.clone())).unwrap();

        sink.emit(&record());
        sink.emit(&record());

        let path = log_file_path(&dir, Local::now().date_naive());
        assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&record());

        assert!(text.contains("Protocol:       UDP (query)"));
        assert!(text.contains("Transaction ID: 0xbeef"));
        assert!(text.contains("Query:          mozilla.org"));
        assert!(text.contains("Process:        firefox (PID 100, TID 101)"));
    }

    #[test]
    fn test_render_text_undecoded() {
        let mut r = record();
        r.transaction_id = None;
        r.query_name = None;
        r.query_type = None;

        let text = render_text(&r);
        assert!(text.contains("Transaction ID: -"));
        assert!(text.contains("Query:          -"));
    }
}
