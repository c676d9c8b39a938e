//! Process classification into privilege tiers.
//!
//! Android assigns uids in fixed ranges: kernel and core daemons below 1000,
//! system services between 1000 and 9999, and one uid per installed
//! application from 10000 upward. The tier is a pure function of the uid.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First uid of the system-service range.
pub const SYSTEM_UID_FLOOR: u32 = 1000;

/// First uid handed out to installed applications.
pub const APP_UID_FLOOR: u32 = 10000;

/// Privilege tier derived from the owning uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegeTier {
    CoreSystem,
    SystemService,
    UserApp,
}

impl PrivilegeTier {
    pub fn from_uid(uid: u32) -> Self {
        if uid < SYSTEM_UID_FLOOR {
            PrivilegeTier::CoreSystem
        } else if uid < APP_UID_FLOOR {
            PrivilegeTier::SystemService
        } else {
            PrivilegeTier::UserApp
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrivilegeTier::CoreSystem => "core-system",
            PrivilegeTier::SystemService => "system-service",
            PrivilegeTier::UserApp => "user-app",
        }
    }
}

impl fmt::Display for PrivilegeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_core_system(uid: u32) -> bool {
    PrivilegeTier::from_uid(uid) == PrivilegeTier::CoreSystem
}

pub fn is_system_service(uid: u32) -> bool {
    PrivilegeTier::from_uid(uid) == PrivilegeTier::SystemService
}

pub fn is_user_app(uid: u32) -> bool {
    PrivilegeTier::from_uid(uid) == PrivilegeTier::UserApp
}

/// Two-way split kept for callers that only distinguish apps from the rest.
pub fn is_system_process(uid: u32) -> bool {
    uid < APP_UID_FLOOR
}
