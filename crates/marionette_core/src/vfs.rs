//! Virtual file reading
//!
//! Asset loaders never touch `std::fs` directly; they open files through a
//! [`FileSource`]. A source hands back a [`VirtualFile`], an in-memory
//! `Read + Seek` stream with helpers for reading packed binary records.

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Something asset files can be opened from.
pub trait FileSource: Send + Sync {
    fn open(&self, path: &str) -> io::Result<VirtualFile>;
}

/// An opened file, fully resident in memory.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    path: String,
    cursor: Cursor<Arc<[u8]>>,
}

impl VirtualFile {
    #[must_use]
    pub fn new(path: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            cursor: Cursor::new(data.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Whole file contents regardless of the cursor.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("seek to {offset} past end of '{}'", self.path),
            ));
        }
        self.cursor.set_position(offset);
        Ok(())
    }

    /// Reads one packed record.
    pub fn read_pod<T: Pod>(&mut self) -> io::Result<T> {
        let mut value = T::zeroed();
        self.cursor.read_exact(bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Reads `count` packed records.
    pub fn read_pod_vec<T: Pod>(&mut self, count: usize) -> io::Result<Vec<T>> {
        let remaining = self.len() as u64 - self.position().min(self.len() as u64);
        let wanted = (count as u64).saturating_mul(size_of::<T>() as u64);
        if wanted > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("'{}' is truncated: {wanted} bytes wanted, {remaining} left", self.path),
            ));
        }
        let mut values = vec![T::zeroed(); count];
        self.cursor.read_exact(bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }
}

impl Read for VirtualFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for VirtualFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

/// Reads files relative to a root directory.
pub struct DiskFileSource {
    root_path: PathBuf,
}

impl DiskFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl FileSource for DiskFileSource {
    fn open(&self, path: &str) -> io::Result<VirtualFile> {
        let data = std::fs::read(self.root_path.join(path))?;
        Ok(VirtualFile::new(path, data))
    }
}

/// Thread-safe in-memory file table, used by tools and tests.
#[derive(Default)]
pub struct MemoryFileSource {
    files: RwLock<FxHashMap<String, Arc<[u8]>>>,
}

impl MemoryFileSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), data.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }
}

impl FileSource for MemoryFileSource {
    fn open(&self, path: &str) -> io::Result<VirtualFile> {
        let data = self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("'{path}' not found"))
        })?;
        Ok(VirtualFile::new(path, data))
    }
}

impl<S: FileSource + ?Sized> FileSource for Arc<S> {
    fn open(&self, path: &str) -> io::Result<VirtualFile> {
        (**self).open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_open_and_read() {
        let fs = MemoryFileSource::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        fs.insert("a.bin", bytes);

        let mut f = fs.open("a.bin").unwrap();
        assert_eq!(f.len(), 8);
        let n: u32 = f.read_pod().unwrap();
        let x: f32 = f.read_pod().unwrap();
        assert_eq!(n, 7);
        assert!((x - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn memory_source_missing_file() {
        let fs = MemoryFileSource::new();
        let err = fs.open("nope").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn read_past_end_fails() {
        let mut f = VirtualFile::new("short", vec![1u8, 2]);
        assert!(f.read_pod::<u32>().is_err());
        assert!(f.seek_to(3).is_err());
        assert!(f.seek_to(2).is_ok());
    }

    #[test]
    fn read_pod_vec_reads_records() {
        let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut f = VirtualFile::new("v", data);
        let v: Vec<[f32; 2]> = f.read_pod_vec(2).unwrap();
        assert_eq!(v, vec![[1.0, 2.0], [3.0, 4.0]]);
    }
}
