//! Filesystem helpers shared by staging and installation.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Recursively copy the contents of `src` into `dst`.
///
/// `dst` is created if needed. Regular files keep their permissions; symlinks
/// are recreated rather than followed.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
  fs::create_dir_all(dst)?;
  let mut copied = 0;

  for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      let link = fs::read_link(entry.path())?;
      copy_symlink(&link, &target)?;
    } else if file_type.is_file() {
      fs::copy(entry.path(), &target)?;
      copied += 1;
    }
  }

  Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  if link.is_dir() {
    std::os::windows::fs::symlink_dir(link, target)
  } else {
    std::os::windows::fs::symlink_file(link, target)
  }
}

/// Remove `path` if it exists.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Mark a file as executable by its owner, group and others.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  let mut perms = fs::metadata(path)?.permissions();
  perms.set_mode(perms.mode() | 0o755);
  fs::set_permissions(path, perms)
}

#[cfg(windows)]
pub fn set_executable(_path: &Path) -> io::Result<()> {
  Ok(())
}
