// files.rs — persisted server data directory
// Converted from: myq2-original/qcommon/files.c (see myq2_common::files for
// the pak/zip virtual filesystem this descends from). A dedicated match
// server has no game content to serve — no paks, no zips, no search-path
// layering — so this keeps only what survives: a single data directory
// holding `config.cfg`, the ban/notice list, and recorded demos.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::{com_dprintf, com_printf};

const DEFAULT_DATA_DIR: &str = ".";

/// Central storage context, replacing the teacher's pak-backed `FsContext`.
pub struct FsContext {
    /// Directory holding config.cfg, bans.txt, demos/.
    pub data_dir: PathBuf,
}

impl Default for FsContext {
    fn default() -> Self {
        Self { data_dir: PathBuf::from(DEFAULT_DATA_DIR) }
    }
}

impl FsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: dir.into() }
    }

    /// Returns the length of an open file.
    pub fn filelength(f: &mut File) -> io::Result<u64> {
        let pos = f.stream_position()?;
        let end = f.seek(SeekFrom::End(0))?;
        f.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    /// Creates any intermediate directories needed to store the given filename.
    pub fn create_path(path: &str) {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                com_printf(&format!("couldn't create {}: {}\n", parent.display(), e));
            }
        }
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.data_dir.join(relative)
    }

    /// Loads a file relative to the data directory, or `None` if missing.
    pub fn load_file(&self, relative: &str) -> Option<Vec<u8>> {
        let path = self.resolve(relative);
        match fs::read(&path) {
            Ok(data) => {
                com_dprintf(&format!("loaded {}\n", path.display()));
                Some(data)
            }
            Err(_) => None,
        }
    }

    /// Writes a file relative to the data directory, creating parent dirs.
    pub fn save_file(&self, relative: &str, contents: &[u8]) -> io::Result<()> {
        let path = self.resolve(relative);
        Self::create_path(&path.to_string_lossy());
        let mut f = File::create(&path)?;
        f.write_all(contents)
    }

    /// Lists files directly under the given relative subdirectory, sorted.
    pub fn list_dir(&self, relative: &str) -> Vec<String> {
        let path = self.resolve(relative);
        let mut names: Vec<String> = match fs::read_dir(&path) {
            Ok(entries) => entries
                .flatten()
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Prints the data directory and its top-level contents (the "path"
    /// console command, reduced to what's left to show).
    pub fn path_f(&self) {
        com_printf(&format!("data directory: {}\n", self.data_dir.display()));
        for name in self.list_dir(".") {
            com_printf(&format!("  {}\n", name));
        }
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

use std::sync::Mutex;

static FS_CTX: Mutex<Option<FsContext>> = Mutex::new(None);

pub fn fs_init(data_dir: impl Into<PathBuf>) {
    let mut g = FS_CTX.lock().unwrap();
    *g = Some(FsContext::with_data_dir(data_dir));
}

pub fn fs_shutdown() {
    let mut g = FS_CTX.lock().unwrap();
    *g = None;
}

pub fn fs_load_file(name: &str) -> Option<Vec<u8>> {
    FS_CTX.lock().unwrap().as_ref().and_then(|c| c.load_file(name))
}

pub fn fs_save_file(name: &str, contents: &[u8]) -> io::Result<()> {
    match FS_CTX.lock().unwrap().as_ref() {
        Some(c) => c.save_file(name, contents),
        None => Err(io::Error::new(io::ErrorKind::NotFound, "filesystem not initialized")),
    }
}

/// Access the global FS_CTX with a closure. Returns None if not initialized.
pub fn with_fs_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&FsContext) -> R,
{
    let g = FS_CTX.lock().unwrap();
    g.as_ref().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("sauer_fs_test_{:p}", &0u8));
        let ctx = FsContext::with_data_dir(&dir);
        ctx.save_file("config.cfg", b"set maxclients 16\n").unwrap();
        assert_eq!(ctx.load_file("config.cfg").unwrap(), b"set maxclients 16\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_returns_none() {
        let ctx = FsContext::with_data_dir(std::env::temp_dir());
        assert!(ctx.load_file("does-not-exist-sauer.cfg").is_none());
    }

    #[test]
    fn list_dir_sorted() {
        let dir = std::env::temp_dir().join(format!("sauer_fs_list_{:p}", &0u8));
        let ctx = FsContext::with_data_dir(&dir);
        ctx.save_file("demos/b.demo", b"b").unwrap();
        ctx.save_file("demos/a.demo", b"a").unwrap();
        assert_eq!(ctx.list_dir("demos"), vec!["a.demo".to_string(), "b.demo".to_string()]);
        let _ = fs::remove_dir_all(&dir);
    }
}
