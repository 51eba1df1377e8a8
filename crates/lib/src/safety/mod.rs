use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{config::StorageConfig, error::ReclaimError};

/// Accounts and owners exempt from reclaim. Unique entries are enforced at
/// the add/remove boundary, not by the storage representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl Whitelist {
    pub fn contains(&self, account: &str, owner: Option<&str>) -> bool {
        if self.accounts.iter().any(|a| a == account) {
            return true;
        }
        if let Some(owner) = owner {
            if self.owners.iter().any(|o| o == owner) {
                return true;
            }
        }
        false
    }
}

/// Global kill-switch. Invariant: `stopped_at` is present iff `stopped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyStop {
    pub stopped: bool,
    pub stopped_at: Option<i64>,
    #[serde(default)]
    pub reason: String,
}

/// File-backed safety state consulted before every state-changing action.
/// Reads fall back to the safe default (empty whitelist, not stopped) when a
/// document is missing or unreadable, so first-run behavior is well-defined.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    whitelist_path: PathBuf,
    emergency_stop_path: PathBuf,
}

impl SafetyGate {
    pub fn new(whitelist_path: impl Into<PathBuf>, emergency_stop_path: impl Into<PathBuf>) -> Self {
        Self { whitelist_path: whitelist_path.into(), emergency_stop_path: emergency_stop_path.into() }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.whitelist_file, &storage.emergency_stop_file)
    }

    pub fn whitelist(&self) -> Whitelist {
        read_json(&self.whitelist_path)
    }

    pub fn is_whitelisted(&self, account: &Pubkey, owner: Option<&Pubkey>) -> bool {
        let owner = owner.map(|o| o.to_string());
        self.whitelist().contains(&account.to_string(), owner.as_deref())
    }

    /// Add an account address; returns false when it was already present.
    pub fn add_account(&self, account: &Pubkey) -> Result<bool, ReclaimError> {
        let mut whitelist = self.whitelist();
        let account = account.to_string();
        if whitelist.accounts.contains(&account) {
            return Ok(false);
        }
        whitelist.accounts.push(account);
        self.write_whitelist(&whitelist)?;
        Ok(true)
    }

    pub fn remove_account(&self, account: &Pubkey) -> Result<bool, ReclaimError> {
        let mut whitelist = self.whitelist();
        let account = account.to_string();
        let before = whitelist.accounts.len();
        whitelist.accounts.retain(|a| a != &account);
        if whitelist.accounts.len() == before {
            return Ok(false);
        }
        self.write_whitelist(&whitelist)?;
        Ok(true)
    }

    pub fn add_owner(&self, owner: &Pubkey) -> Result<bool, ReclaimError> {
        let mut whitelist = self.whitelist();
        let owner = owner.to_string();
        if whitelist.owners.contains(&owner) {
            return Ok(false);
        }
        whitelist.owners.push(owner);
        self.write_whitelist(&whitelist)?;
        Ok(true)
    }

    pub fn remove_owner(&self, owner: &Pubkey) -> Result<bool, ReclaimError> {
        let mut whitelist = self.whitelist();
        let owner = owner.to_string();
        let before = whitelist.owners.len();
        whitelist.owners.retain(|o| o != &owner);
        if whitelist.owners.len() == before {
            return Ok(false);
        }
        self.write_whitelist(&whitelist)?;
        Ok(true)
    }

    pub fn emergency_stop(&self) -> EmergencyStop {
        read_json(&self.emergency_stop_path)
    }

    pub fn set_stopped(&self, reason: &str) -> Result<(), ReclaimError> {
        let state = EmergencyStop {
            stopped: true,
            stopped_at: Some(chrono::Utc::now().timestamp_millis()),
            reason: reason.to_string(),
        };
        write_json(&self.emergency_stop_path, &state)
    }

    pub fn clear_stopped(&self) -> Result<(), ReclaimError> {
        write_json(&self.emergency_stop_path, &EmergencyStop::default())
    }

    fn write_whitelist(&self, whitelist: &Whitelist) -> Result<(), ReclaimError> {
        write_json(&self.whitelist_path, whitelist)
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Failed to parse {}, using defaults: {e}", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}

/// Full-document replace via temp-file-then-rename, so a concurrent reader
/// never observes a torn write.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReclaimError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
