// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Host Store
// One TOML file per host, shared by the CLI and the daemon

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::HostConfig;

/// Get the hosts directory path
pub fn hosts_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("shuttlecraft").join("hosts"))
}

/// Load all hosts from the config directory
pub fn load_all_hosts() -> Result<Vec<HostConfig>> {
    load_all_hosts_from(&hosts_dir()?)
}

/// Load all hosts from `dir`, sorted by name. Unreadable files are skipped.
pub fn load_all_hosts_from(dir: &Path) -> Result<Vec<HostConfig>> {
    if !dir.exists() {
        debug!("Hosts directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).context("Failed to read hosts directory")?;

    let mut hosts = Vec::new();

    for entry in entries {
        let path = entry?.path();

        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        match load_host(&path) {
            Ok(host) => {
                debug!("Loaded host: {} ({})", host.name, host.id);
                hosts.push(host);
            }
            Err(e) => {
                warn!("Failed to load host {}: {:#}", path.display(), e);
            }
        }
    }

    hosts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(hosts)
}

/// Load a single host from a path
pub fn load_host(path: &Path) -> Result<HostConfig> {
    let contents =
        fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

    let host: HostConfig =
        toml::from_str(&contents).context(format!("Failed to parse {}", path.display()))?;

    Ok(host)
}

/// Find a host by UUID or by (case-insensitive) name
pub fn find_host(hosts: &[HostConfig], key: &str) -> Option<HostConfig> {
    if let Ok(id) = key.parse::<Uuid>() {
        if let Some(host) = hosts.iter().find(|h| h.id == id) {
            return Some(host.clone());
        }
    }
    hosts
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(key.trim()))
        .cloned()
}

/// Load a host by UUID or name from the config directory
pub fn load_host_by_key(key: &str) -> Result<HostConfig> {
    let hosts = load_all_hosts()?;
    find_host(&hosts, key).ok_or_else(|| anyhow::anyhow!("Host '{}' not found", key))
}

/// Save a host to the config directory
pub fn save_host(host: &HostConfig, overwrite: bool) -> Result<PathBuf> {
    save_host_to(&hosts_dir()?, host, overwrite)
}

/// Save a host into `dir`.
///
/// With `overwrite == false` this fails if the file exists or another host
/// already uses the same name.
pub fn save_host_to(dir: &Path, host: &HostConfig, overwrite: bool) -> Result<PathBuf> {
    host.validate().context("Invalid host configuration")?;

    fs::create_dir_all(dir).context("Failed to create hosts directory")?;

    let path = host.file_in(dir);

    if !overwrite {
        if path.exists() {
            anyhow::bail!("Host '{}' already exists at: {}", host.name, path.display());
        }
        let existing = load_all_hosts_from(dir)?;
        if existing.iter().any(|h| h.name.eq_ignore_ascii_case(&host.name)) {
            anyhow::bail!("A host named '{}' already exists", host.name);
        }
    }

    let toml_content = toml::to_string_pretty(host).context("Failed to serialize host")?;

    fs::write(&path, toml_content)
        .context(format!("Failed to write host to {}", path.display()))?;

    debug!("Saved host '{}' to {}", host.name, path.display());

    Ok(path)
}

/// Delete a host from the config directory
pub fn delete_host(id: &Uuid) -> Result<PathBuf> {
    delete_host_from(&hosts_dir()?, id)
}

/// Delete a host file from `dir`
pub fn delete_host_from(dir: &Path, id: &Uuid) -> Result<PathBuf> {
    let path = dir.join(format!("{}.toml", id));

    if !path.exists() {
        anyhow::bail!("Host not found: {}", id);
    }

    fs::remove_file(&path)
        .context(format!("Failed to delete host from {}", path.display()))?;

    debug!("Deleted host at {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_dir() {
        let dir = hosts_dir().expect("Should get hosts directory");
        assert!(dir.to_string_lossy().contains("shuttlecraft"));
        assert!(dir.ends_with("hosts"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let hosts = load_all_hosts_from(&tmp.path().join("nope")).unwrap();
        assert!(hosts.is_empty());
    }

    #[test]
    fn test_save_load_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let mut work = HostConfig::new("Work", "me@work.example.com");
        work.forward_dns = true;
        let dev = HostConfig::new("dev", "me@dev.internal");

        save_host_to(tmp.path(), &work, false).unwrap();
        save_host_to(tmp.path(), &dev, false).unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        fs::write(tmp.path().join("broken.toml"), "not = [valid").unwrap();

        let hosts = load_all_hosts_from(tmp.path()).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].name, "dev");
        assert_eq!(hosts[1], work);

        delete_host_from(tmp.path(), &dev.id).unwrap();
        assert_eq!(load_all_hosts_from(tmp.path()).unwrap().len(), 1);
        assert!(delete_host_from(tmp.path(), &dev.id).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        save_host_to(tmp.path(), &HostConfig::new("Work", "a@b"), false).unwrap();

        let err = save_host_to(tmp.path(), &HostConfig::new("work", "c@d"), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_overwrite_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = HostConfig::new("Work", "a@b");
        save_host_to(tmp.path(), &host, false).unwrap();

        host.vpn_mode = true;
        save_host_to(tmp.path(), &host, true).unwrap();
        let loaded = load_host(&host.file_in(tmp.path())).unwrap();
        assert!(loaded.vpn_mode);
    }

    #[test]
    fn test_find_host_by_id_or_name() {
        let hosts = vec![HostConfig::new("Work", "a@b"), HostConfig::new("Dev", "c@d")];

        let by_id = find_host(&hosts, &hosts[1].id.to_string()).unwrap();
        assert_eq!(by_id.name, "Dev");

        let by_name = find_host(&hosts, "work").unwrap();
        assert_eq!(by_name.id, hosts[0].id);

        assert!(find_host(&hosts, "staging").is_none());
    }
}
