//! Pure parsers for process-table text.
//!
//! Two formats are understood:
//! - a `ps`-style listing: header line(s), then `pid uid command...` rows;
//! - `/proc/<pid>/status` blocks paired with the raw `cmdline` blob, as
//!   produced by [`status_query_script`] with explicit marker lines.
//!
//! Every function here works on plain text and reports per line or per
//! block, so a malformed entry never spoils its neighbours.

use std::collections::BTreeSet;

use crate::error::ParseError;
use crate::process::record::ProcessRecord;

/// Marker line opening one process's block: `@@PID:<pid>`.
pub const PID_MARKER: &str = "@@PID:";

/// Marker line separating the status text from the cmdline blob.
pub const CMDLINE_MARKER: &str = "@@CMDLINE";

/// Records parsed from one chunk of output plus the number of entries dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub records: Vec<ProcessRecord>,
    pub skipped: usize,
}

impl ParsedBatch {
    fn push(&mut self, outcome: Result<ProcessRecord, ParseError>) {
        match outcome {
            Ok(record) => self.records.push(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable process entry");
                self.skipped += 1;
            }
        }
    }

    pub fn extend(&mut self, other: ParsedBatch) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

/// Converts NUL separators to spaces and collapses runs of whitespace.
pub fn normalize_command_line(raw: &str) -> String {
    raw.replace('\0', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_pid(text: &str) -> Result<u32, ParseError> {
    match text.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(ParseError::InvalidPid(text.to_string())),
    }
}

fn parse_uid(text: &str) -> Result<u32, ParseError> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidUid(text.to_string()))
}

/// Parses one `pid uid command...` row.
pub fn parse_listing_line(line: &str) -> Result<ProcessRecord, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(ParseError::TooFewFields(fields.len()));
    }

    let pid = parse_pid(fields[0])?;
    let uid = parse_uid(fields[1])?;
    let command_line = normalize_command_line(&fields[2..].join(" "));

    Ok(ProcessRecord::new(pid, uid, command_line))
}

/// Parses a full listing, dropping the first `header_lines` lines by position.
///
/// Blank lines are ignored without counting as skipped.
pub fn parse_listing(text: &str, header_lines: usize) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    for line in text.lines().skip(header_lines) {
        if line.trim().is_empty() {
            continue;
        }
        batch.push(parse_listing_line(line));
    }
    batch
}

/// Parses the output of a pid enumeration (one pid per line), sorted and deduplicated.
pub fn parse_pid_list(text: &str) -> Vec<u32> {
    text.lines()
        .filter_map(|line| parse_pid(line).ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Real uid from the `Uid:` line of a `/proc/<pid>/status` text.
pub fn parse_status_uid(status: &str) -> Result<u32, ParseError> {
    let line = status
        .lines()
        .find(|l| l.starts_with("Uid:"))
        .ok_or(ParseError::MissingUid)?;

    let real_uid = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ParseError::InvalidUid(line.to_string()))?;

    parse_uid(real_uid)
}

/// Builds a record from one process's status text and raw cmdline blob.
pub fn parse_process_block(pid: u32, status: &str, raw_cmdline: &str) -> Result<ProcessRecord, ParseError> {
    let uid = parse_status_uid(status)?;
    let command_line = normalize_command_line(raw_cmdline);
    if command_line.is_empty() {
        return Err(ParseError::EmptyCommandLine);
    }
    Ok(ProcessRecord::new(pid, uid, command_line))
}

/// Shell loop printing status and cmdline for each pid between marker lines.
pub fn status_query_script(pids: &[u32]) -> String {
    let list = pids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "for p in {list}; do echo \"{PID_MARKER}$p\"; cat /proc/$p/status 2>/dev/null; \
         echo \"{CMDLINE_MARKER}\"; cat /proc/$p/cmdline 2>/dev/null; echo; done"
    )
}

struct Block {
    pid: String,
    status: String,
    cmdline: String,
    in_cmdline: bool,
}

impl Block {
    fn new(pid: &str) -> Self {
        Self {
            pid: pid.trim().to_string(),
            status: String::new(),
            cmdline: String::new(),
            in_cmdline: false,
        }
    }

    fn finish(self) -> Result<ProcessRecord, ParseError> {
        let pid = parse_pid(&self.pid)?;
        parse_process_block(pid, &self.status, &self.cmdline)
    }
}

/// Parses marker-delimited status blocks; text before the first marker is ignored.
pub fn parse_status_blocks(text: &str) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    let mut current: Option<Block> = None;

    for line in text.lines() {
        if let Some(pid) = line.strip_prefix(PID_MARKER) {
            if let Some(block) = current.take() {
                batch.push(block.finish());
            }
            current = Some(Block::new(pid));
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };

        if line.trim_end() == CMDLINE_MARKER {
            block.in_cmdline = true;
        } else if block.in_cmdline {
            block.cmdline.push_str(line);
            block.cmdline.push(' ');
        } else {
            block.status.push_str(line);
            block.status.push('\n');
        }
    }

    if let Some(block) = current {
        batch.push(block.finish());
    }
    batch
}
