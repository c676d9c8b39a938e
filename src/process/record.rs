//! The immutable per-process value produced by every scan.

use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;

use crate::process::classifier::PrivilegeTier;

/// One running process as seen through the privileged shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessRecord {
    pub pid: u32,
    pub uid: u32,
    /// Whitespace-normalized command line, NUL separators turned into spaces.
    pub command_line: String,
    pub package_id: Option<String>,
}

impl ProcessRecord {
    /// Builds a record, deriving the package id from `command_line`.
    pub fn new(pid: u32, uid: u32, command_line: impl Into<String>) -> Self {
        let command_line = command_line.into();
        let package_id = extract_package_id(&command_line);
        Self {
            pid,
            uid,
            command_line,
            package_id,
        }
    }

    pub fn tier(&self) -> PrivilegeTier {
        PrivilegeTier::from_uid(self.uid)
    }
}

// Carries the derived tier so JSON/YAML consumers don't recompute it.
impl Serialize for ProcessRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProcessRecord", 5)?;
        s.serialize_field("pid", &self.pid)?;
        s.serialize_field("uid", &self.uid)?;
        s.serialize_field("command_line", &self.command_line)?;
        s.serialize_field("package_id", &self.package_id)?;
        s.serialize_field("tier", &self.tier())?;
        s.end()
    }
}

/// First space-separated token containing a `.` and no `/`.
///
/// `com.example.app:remote --flag` yields `com.example.app:remote`; a binary
/// path such as `/system/bin/surfaceflinger` yields nothing.
pub fn extract_package_id(command_line: &str) -> Option<String> {
    command_line
        .split(' ')
        .find(|token| token.contains('.') && !token.contains('/'))
        .map(str::to_string)
}
