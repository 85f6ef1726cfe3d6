//! Backup & recovery for the snapshot database.
//!
//! Archives the whole data directory as tar.gz with a SHA256 checksum and a
//! JSON metadata index, so operators can take a consistent copy of all
//! inventory data before migrations or risky maintenance. Restore always
//! verifies the checksum first.

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

const METADATA_FILE: &str = "backups.json";
const ARCHIVE_ROOT: &str = "data";

/// Metadata for one archived backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Timestamp-based identifier, also the archive file stem.
    pub id: String,
    /// Optional operator-supplied label.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// SHA256 of the archive file.
    pub checksum: String,
    /// Whether a verify pass has confirmed the checksum since creation.
    pub verified: bool,
    /// Archive path relative to the backup directory.
    pub path: PathBuf,
}

/// Creates, verifies, restores, and prunes snapshot-database backups.
pub struct BackupManager {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    backups: HashMap<String, BackupMetadata>,
}

impl BackupManager {
    pub fn new(data_dir: PathBuf, backup_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&backup_dir)?;
        let mut manager = Self {
            data_dir,
            backup_dir,
            backups: HashMap::new(),
        };
        manager.load_metadata()?;
        Ok(manager)
    }

    fn metadata_path(&self) -> PathBuf {
        self.backup_dir.join(METADATA_FILE)
    }

    fn load_metadata(&mut self) -> io::Result<()> {
        let path = self.metadata_path();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            self.backups = serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
        Ok(())
    }

    fn save_metadata(&self) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.backups)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.metadata_path(), contents)
    }

    /// Archive the data directory. The archive is finished and flushed
    /// before the checksum is taken.
    pub fn create_backup(&mut self, name: Option<String>) -> io::Result<BackupMetadata> {
        let timestamp = Utc::now();
        let id = format!("backup_{}", timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let filename = format!("{}.tar.gz", id);
        let archive_path = self.backup_dir.join(&filename);

        log::info!("creating backup {}", id);

        let file = File::create(&archive_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(encoder);
        tar.append_dir_all(ARCHIVE_ROOT, &self.data_dir)?;
        let encoder = tar.into_inner()?;
        encoder.finish()?;

        let checksum = file_sha256(&archive_path)?;
        let size_bytes = fs::metadata(&archive_path)?.len();

        let metadata = BackupMetadata {
            id: id.clone(),
            name,
            created_at: timestamp,
            size_bytes,
            checksum,
            verified: false,
            path: PathBuf::from(filename),
        };
        self.backups.insert(id.clone(), metadata.clone());
        self.save_metadata()?;

        log::info!("backup {} written ({} bytes)", id, size_bytes);
        Ok(metadata)
    }

    fn archive_file(&self, backup_id: &str) -> io::Result<(&BackupMetadata, PathBuf)> {
        let metadata = self
            .backups
            .get(backup_id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "backup not found"))?;
        let path = self.backup_dir.join(&metadata.path);
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "backup archive missing",
            ));
        }
        Ok((metadata, path))
    }

    /// Recompute the archive checksum and compare against the index.
    pub fn verify_backup(&mut self, backup_id: &str) -> io::Result<bool> {
        let (metadata, path) = self.archive_file(backup_id)?;
        let expected = metadata.checksum.clone();
        let valid = file_sha256(&path)? == expected;
        if valid {
            if let Some(meta) = self.backups.get_mut(backup_id) {
                meta.verified = true;
            }
            self.save_metadata()?;
        } else {
            log::error!("backup verification failed for {} (checksum mismatch)", backup_id);
        }
        Ok(valid)
    }

    /// Unpack a backup into `restore_path`. Refuses to touch a corrupt
    /// archive.
    pub fn restore_backup(&self, backup_id: &str, restore_path: &Path) -> io::Result<()> {
        let (metadata, path) = self.archive_file(backup_id)?;
        if file_sha256(&path)? != metadata.checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "backup checksum mismatch",
            ));
        }

        log::info!("restoring backup {} to {}", backup_id, restore_path.display());
        fs::create_dir_all(restore_path)?;
        let file = File::open(&path)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.unpack(restore_path)?;
        Ok(())
    }

    /// Newest first.
    pub fn list_backups(&self) -> Vec<BackupMetadata> {
        let mut backups: Vec<_> = self.backups.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        backups
    }

    pub fn get_backup(&self, backup_id: &str) -> Option<&BackupMetadata> {
        self.backups.get(backup_id)
    }

    /// Keep the newest `keep` backups, delete the rest. Returns the deleted
    /// ids.
    pub fn prune(&mut self, keep: usize) -> io::Result<Vec<String>> {
        let doomed: Vec<String> = self
            .list_backups()
            .into_iter()
            .skip(keep)
            .map(|b| b.id)
            .collect();
        for id in &doomed {
            if let Some(metadata) = self.backups.remove(id) {
                let path = self.backup_dir.join(&metadata.path);
                if path.exists() {
                    fs::remove_file(&path)?;
                }
                log::info!("pruned old backup {}", id);
            }
        }
        if !doomed.is_empty() {
            self.save_metadata()?;
        }
        Ok(doomed)
    }
}

fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_data_dir(path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)?;
        fs::write(path.join("db"), b"snapshot bytes")?;
        fs::write(path.join("conf"), b"tree names")?;
        Ok(())
    }

    fn manager(temp: &TempDir) -> BackupManager {
        let data = temp.path().join("data");
        seed_data_dir(&data).expect("seed");
        BackupManager::new(data, temp.path().join("backups")).expect("manager")
    }

    #[test]
    fn create_then_verify() {
        let temp = TempDir::new().expect("tempdir");
        let mut mgr = manager(&temp);

        let meta = mgr.create_backup(Some("pre-migration".into())).expect("create");
        assert!(meta.size_bytes > 0);
        assert!(!meta.checksum.is_empty());
        assert!(temp.path().join("backups").join(&meta.path).exists());

        assert!(mgr.verify_backup(&meta.id).expect("verify"));
        assert!(mgr.get_backup(&meta.id).expect("meta").verified);
    }

    #[test]
    fn tampered_archive_fails_verification() {
        let temp = TempDir::new().expect("tempdir");
        let mut mgr = manager(&temp);
        let meta = mgr.create_backup(None).expect("create");

        let archive = temp.path().join("backups").join(&meta.path);
        let mut bytes = fs::read(&archive).expect("read");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&archive, bytes).expect("write");

        assert!(!mgr.verify_backup(&meta.id).expect("verify"));
        let restore_to = temp.path().join("restore");
        assert!(mgr.restore_backup(&meta.id, &restore_to).is_err());
    }

    #[test]
    fn restore_round_trip() {
        let temp = TempDir::new().expect("tempdir");
        let mgr = {
            let mut m = manager(&temp);
            m.create_backup(None).expect("create");
            m
        };
        let meta = mgr.list_backups().remove(0);

        let restore_to = temp.path().join("restore");
        mgr.restore_backup(&meta.id, &restore_to).expect("restore");
        let restored = fs::read(restore_to.join(ARCHIVE_ROOT).join("db")).expect("read");
        assert_eq!(restored, b"snapshot bytes");
    }

    #[test]
    fn prune_keeps_newest() {
        let temp = TempDir::new().expect("tempdir");
        let mut mgr = manager(&temp);
        for i in 0..4 {
            mgr.create_backup(Some(format!("b{}", i))).expect("create");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let deleted = mgr.prune(2).expect("prune");
        assert_eq!(deleted.len(), 2);
        let remaining = mgr.list_backups();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].name.as_deref(), Some("b3"));
        assert_eq!(remaining[1].name.as_deref(), Some("b2"));
    }

    #[test]
    fn metadata_survives_reopen() {
        let temp = TempDir::new().expect("tempdir");
        let id = {
            let mut mgr = manager(&temp);
            mgr.create_backup(None).expect("create").id
        };
        let data = temp.path().join("data");
        let reopened = BackupManager::new(data, temp.path().join("backups")).expect("reopen");
        assert!(reopened.get_backup(&id).is_some());
    }
}
