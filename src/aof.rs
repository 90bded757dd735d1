//! Append-only file persistence.
//!
//! The file is the concatenation, in execution order, of the raw request
//! bytes of every successful write command. At startup it is fed through
//! the same [`CommandReader`] and command table that serve live traffic,
//! which rebuilds the keyspace exactly.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{
    commands::CommandRegistry,
    config::FsyncPolicy,
    input::{CommandReadError, CommandReader},
    key_value_store::KeyValueStore,
};

#[derive(Error, Debug)]
pub enum AofError {
    #[error("failed to open append only file {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to replay append only file: {0}")]
    Replay(#[from] CommandReadError),
    #[error("failed to write append only file: {0}")]
    Write(io::Error),
    #[error("failed to sync append only file: {0}")]
    Sync(io::Error),
}

/// The append-only file, behind its own lock so that disk I/O never holds
/// up the keyspace.
#[derive(Debug)]
pub struct AppendOnlyFile {
    path: PathBuf,
    writer: Mutex<AofWriter>,
}

#[derive(Debug)]
pub struct AofWriter {
    file: File,
    fsync: FsyncPolicy,
    unsynced: bool,
}

impl AppendOnlyFile {
    /// Opens the file for reading and appending, creating it if absent.
    pub async fn open(path: impl AsRef<Path>, fsync: FsyncPolicy) -> Result<Self, AofError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| AofError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self::from_file(path, file, fsync))
    }

    /// Wraps a file handle that is already open. `path` is only used for
    /// reporting.
    pub fn from_file(path: impl Into<PathBuf>, file: File, fsync: FsyncPolicy) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(AofWriter {
                file,
                fsync,
                unsynced: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays the whole file into `store`, returning the number of commands
    /// replayed. Must run before anything is appended.
    pub async fn load(
        &self,
        registry: &CommandRegistry,
        store: &mut KeyValueStore,
    ) -> Result<usize, AofError> {
        let mut writer = self.writer.lock().await;
        let replayed = replay(&mut writer.file, registry, store).await?;

        Ok(replayed)
    }

    /// Locks the file for writing.
    pub async fn lock(&self) -> MutexGuard<'_, AofWriter> {
        self.writer.lock().await
    }

    pub async fn sync(&self) -> Result<(), AofError> {
        self.writer.lock().await.sync().await
    }

    /// Syncs the file every `period` until a sync fails.
    pub async fn sync_every(&self, period: Duration) -> Result<(), AofError> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sync().await?;
        }
    }
}

impl AofWriter {
    /// Appends raw command bytes, syncing right away under the `always` policy.
    pub async fn append(&mut self, bytes: &[u8]) -> Result<(), AofError> {
        self.file.write_all(bytes).await.map_err(AofError::Write)?;
        self.file.flush().await.map_err(AofError::Write)?;
        self.unsynced = true;

        if self.fsync == FsyncPolicy::Always {
            self.sync().await?;
        }

        Ok(())
    }

    pub async fn sync(&mut self) -> Result<(), AofError> {
        if !self.unsynced {
            return Ok(());
        }

        self.file.sync_data().await.map_err(AofError::Sync)?;
        self.unsynced = false;
        debug!("append only file synced");

        Ok(())
    }
}

/// Decodes every command in `source` and applies it to `store`.
///
/// Replies are discarded. Any malformed or truncated input is an error: a
/// damaged file is never silently skipped.
pub async fn replay<R>(
    source: R,
    registry: &CommandRegistry,
    store: &mut KeyValueStore,
) -> Result<usize, CommandReadError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = CommandReader::new(source);
    let mut replayed = 0;

    while let Some(command) = reader.read_command().await? {
        let Some((name, arguments)) = command.arguments.split_first() else {
            continue;
        };

        match registry.lookup(name) {
            Some(spec) => {
                if let Err(e) = spec.apply(store, arguments) {
                    warn!("replayed {} command failed: {}", spec.name(), e);
                }
            }
            None => warn!(
                "unknown command '{}' in append only file",
                String::from_utf8_lossy(name)
            ),
        }

        replayed += 1;
    }

    Ok(replayed)
}
