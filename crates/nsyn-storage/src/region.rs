//! Memory-mapped checkpoint files split into pre-reserved regions
//!
//! The file is sized once up front. Each writer then receives a disjoint
//! mutable slice of the mapping, so threads can fill their regions
//! concurrently without any coordination.

use crate::error::{Result, StorageError};

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A checkpoint file with a fixed total length
pub struct ReservedFile {
    path: PathBuf,
    _file: File,
    mmap: Option<MmapMut>,
    len: usize,
}

impl ReservedFile {
    /// Create (or truncate) `path` and reserve `len` bytes
    pub fn create<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(len as u64)?;

        // Zero-length mappings are rejected by some platforms.
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the file was just created and sized by us and is not
            // resized or truncated while the mapping is alive.
            Some(unsafe { MmapMut::map_mut(&file)? })
        };

        log::debug!("reserved {} bytes in {}", len, path.display());

        Ok(Self {
            path,
            _file: file,
            mmap,
            len,
        })
    }

    /// Path of the reserved file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserved length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing was reserved
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Split the file into consecutive regions of the given lengths
    pub fn regions(&mut self, lengths: &[usize]) -> Result<Vec<RegionWriter<'_>>> {
        let total: usize = lengths.iter().sum();
        if total > self.len {
            return Err(StorageError::invalid_format(format!(
                "regions need {} bytes but only {} are reserved",
                total, self.len
            )));
        }

        let mut rest: &mut [u8] = match self.mmap.as_mut() {
            Some(mmap) => &mut mmap[..],
            None => &mut [],
        };

        let mut out = Vec::with_capacity(lengths.len());
        for (index, &len) in lengths.iter().enumerate() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
            out.push(RegionWriter {
                index,
                data: head,
                pos: 0,
            });
            rest = tail;
        }
        Ok(out)
    }

    /// Flush the mapping to disk
    pub fn flush(&self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }
}

/// Writer over one reserved region
pub struct RegionWriter<'a> {
    index: usize,
    data: &'a mut [u8],
    pos: usize,
}

impl RegionWriter<'_> {
    /// Region index within its file
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the region is completely filled
    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }
}

impl Write for RegionWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                StorageError::RegionOverflow {
                    region: self.index,
                    requested: buf.len(),
                    available: self.remaining(),
                },
            ));
        }
        self.data[self.pos..self.pos + buf.len()].copy_from_slice(buf);
        self.pos += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_are_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.bin");

        let mut file = ReservedFile::create(&path, 6).unwrap();
        {
            let mut regions = file.regions(&[2, 4]).unwrap();
            regions[1].write_all(&[3, 4, 5, 6]).unwrap();
            regions[0].write_all(&[1, 2]).unwrap();
            assert!(regions.iter().all(|r| r.is_full()));
        }
        file.flush().unwrap();
        drop(file);

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_region_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ReservedFile::create(dir.path().join("x.bin"), 2).unwrap();
        let mut regions = file.regions(&[2]).unwrap();
        assert!(regions[0].write_all(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_regions_exceeding_reservation() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ReservedFile::create(dir.path().join("x.bin"), 2).unwrap();
        assert!(file.regions(&[1, 2]).is_err());
    }

    #[test]
    fn test_empty_reservation() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ReservedFile::create(dir.path().join("empty.bin"), 0).unwrap();
        assert!(file.is_empty());
        let regions = file.regions(&[0, 0]).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].is_full());
    }
}
