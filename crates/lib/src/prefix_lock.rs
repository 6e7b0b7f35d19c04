//! Advisory lock over an install prefix.
//!
//! Installing rewrites files under the prefix and its receipt, so `kiln
//! install` holds the lock exclusively and records who it is in
//! `<prefix>/.kiln/lock`. Commands that only read the prefix, like
//! `kiln test`, hold it shared: any number of readers, no writer.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::LOCK_FILENAME;
use crate::install::InstallPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  /// Reads the prefix and its receipts.
  Shared,
  /// Installs into the prefix.
  Exclusive,
}

/// The installer currently writing to a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  /// RFC 3339, seconds precision.
  pub since: String,
  pub formula: String,
  pub prefix: PathBuf,
}

impl LockHolder {
  fn current(prefix: &InstallPrefix) -> Self {
    Self {
      pid: std::process::id(),
      since: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
      formula: prefix.name().to_string(),
      prefix: prefix.root().to_path_buf(),
    }
  }

  fn read_from(mut file: &File) -> io::Result<Self> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  fn record(&self, file: &File) -> io::Result<()> {
    file.set_len(0)?;
    let mut out = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, self).map_err(io::Error::other)?;
    out.flush()
  }
}

#[derive(Debug, Error)]
pub enum PrefixLockError {
  #[error(
    "{} is busy: kiln is installing `{}` (PID {}, since {})\n\
     If that process is gone, delete {}",
    holder.prefix.display(), holder.formula, holder.pid, holder.since, lock_path.display()
  )]
  Busy { holder: Box<LockHolder>, lock_path: PathBuf },

  #[error("prefix is busy and its lock file names no installer\nIf no kiln process is running, delete {}", lock_path.display())]
  BusyUnknown { lock_path: PathBuf },

  #[error("failed to {action} {}: {source}", path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> PrefixLockError + 'a {
  move |source| PrefixLockError::Io {
    action,
    path: path.to_path_buf(),
    source,
  }
}

/// Held until dropped.
pub struct PrefixLock {
  file: File,
  lock_path: PathBuf,
}

impl PrefixLock {
  /// Take the lock on `prefix` or fail at once if a conflicting holder
  /// exists. An exclusive holder writes a [`LockHolder`] record.
  pub fn acquire(prefix: &InstallPrefix, mode: LockMode) -> Result<Self, PrefixLockError> {
    let state_dir = prefix.state_dir();
    std::fs::create_dir_all(&state_dir).map_err(io_error("create", &state_dir))?;

    let lock_path = state_dir.join(LOCK_FILENAME);
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(io_error("open", &lock_path))?;

    if let Err(err) = try_lock(&file, mode) {
      return Err(if err.kind() == io::ErrorKind::WouldBlock {
        busy(&lock_path)
      } else {
        io_error("lock", &lock_path)(err)
      });
    }

    if mode == LockMode::Exclusive {
      LockHolder::current(prefix)
        .record(&file)
        .map_err(io_error("write", &lock_path))?;
    }
    debug!(path = %lock_path.display(), ?mode, "locked prefix");

    Ok(PrefixLock { file, lock_path })
  }

  /// The record written by this process, read through its own handle.
  pub fn holder(&self) -> io::Result<LockHolder> {
    LockHolder::read_from(&self.file)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn busy(lock_path: &Path) -> PrefixLockError {
  match File::open(lock_path).and_then(|file| LockHolder::read_from(&file)) {
    Ok(holder) => PrefixLockError::Busy {
      holder: Box::new(holder),
      lock_path: lock_path.to_path_buf(),
    },
    Err(_) => PrefixLockError::BusyUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};

  let op = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };
  flock(file, op).map_err(io::Error::from)
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};
  use windows_sys::Win32::System::IO::OVERLAPPED;

  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: the handle is owned by `file` and stays open for the call; a
  // zeroed OVERLAPPED locks from offset 0.
  let locked = unsafe {
    let mut overlapped: OVERLAPPED = std::mem::zeroed();
    LockFileEx(file.as_raw_handle() as HANDLE, flags, 0, 1, 0, &mut overlapped)
  };

  if locked == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
