//! Local journal and directory maintenance used when (re)configuring folders.

use crate::models::journal_path_for;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

const BACKUP_SUFFIX: &str = ".sync_bak";

/// Delete the sync journal inside `local_path`.
///
/// # Returns
/// `true` if no journal remains afterwards
pub fn ensure_journal_gone(local_path: &Utf8Path) -> bool {
    let journal = journal_path_for(local_path);
    match fs::remove_file(&journal) {
        Ok(()) => {
            tracing::info!("Removed sync journal {}", journal);
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("Unable to remove sync journal {}: {}", journal, e);
            false
        }
    }
}

/// First unused backup name for `local_path`: `<path>.sync_bak`, then
/// `<path>.sync_bak_1`, `<path>.sync_bak_2`, ...
pub fn backup_name(local_path: &Utf8Path) -> Utf8PathBuf {
    let base = format!("{}{}", local_path.as_str().trim_end_matches('/'), BACKUP_SUFFIX);
    let mut candidate = Utf8PathBuf::from(&base);
    let mut counter = 1;
    while candidate.exists() {
        candidate = Utf8PathBuf::from(format!("{}_{}", base, counter));
        counter += 1;
    }
    candidate
}

/// Make `local_path` an empty directory without a journal.
///
/// A missing directory is created. A non-empty one is moved aside to
/// [`backup_name`] and recreated, so no user data is deleted.
pub fn start_from_scratch(local_path: &Utf8Path) -> bool {
    if local_path.as_str().is_empty() {
        return false;
    }

    if !ensure_journal_gone(local_path) {
        return false;
    }

    if !local_path.exists() {
        return match fs::create_dir_all(local_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Unable to create {}: {}", local_path, e);
                false
            }
        };
    }

    if !local_path.is_dir() {
        tracing::warn!("{} exists but is not a directory", local_path);
        return false;
    }

    match is_empty_dir(local_path) {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("Unable to list {}: {}", local_path, e);
            return false;
        }
    }

    let backup = backup_name(local_path);
    if let Err(e) = fs::rename(local_path, &backup) {
        tracing::warn!("Unable to move {} to {}: {}", local_path, backup, e);
        return false;
    }
    if let Err(e) = fs::create_dir(local_path) {
        tracing::warn!("Unable to recreate {}: {}", local_path, e);
        return false;
    }

    tracing::info!("Moved {} to {}, starting from scratch", local_path, backup);
    true
}

fn is_empty_dir(path: &Utf8Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}
