//! Append-only tar bundle backing an export
//!
//! Exported files are stored as entries of a plain tar stream. The bundle is
//! only ever appended to; duplicate entry names are superseded by later
//! appends and physically removed by [`compact`]. Re-opening an existing
//! bundle seeks back over the 1024-byte end-of-archive trailer so new entries
//! overwrite it instead of landing after it.

use crate::error::{CliError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};
use tracing::debug;

/// Size of the tar end-of-archive trailer (two 512-byte zero blocks).
const TRAILER_LEN: u64 = 1024;

/// Fixed mode applied to every bundle entry.
const ENTRY_MODE: u32 = 0o644;

/// Metadata for one physical entry visited during a walk
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Physical position of the entry within the archive, starting at 0
    pub index: usize,

    /// Entry name as recorded in the tar header
    pub name: String,

    /// Declared payload size in bytes
    pub size: u64,

    /// Modification timestamp recorded in the tar header
    pub mtime: u64,
}

/// Flow control returned by walk callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Visit the next entry
    Continue,
    /// Stop the walk without an error
    Stop,
}

/// An export bundle open for appending
///
/// The backing file handle is held exclusively until [`BundleFile::close`] is
/// called. Callers must not walk or compact the file while a writer is open.
pub struct BundleFile {
    path: PathBuf,
    builder: Builder<File>,
}

impl BundleFile {
    /// Open a bundle for appending, creating it if it does not exist
    ///
    /// When the file already holds a finished archive the write cursor is
    /// positioned over the end-of-archive trailer, so appended entries extend
    /// the archive instead of following the old trailer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len > TRAILER_LEN {
            file.seek(SeekFrom::Start(len - TRAILER_LEN))?;
        }

        debug!(path = %path.display(), existing_bytes = len, "Opened bundle");

        Ok(Self {
            path: path.to_path_buf(),
            builder: Builder::new(file),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a named entry holding `data`
    pub fn append_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.append_stream(name, data.len() as u64, data)
    }

    /// Append a named entry streaming exactly `size` bytes from `reader`
    ///
    /// The entry boundary is derived from `size`; a reader yielding a
    /// different number of bytes corrupts the archive.
    pub fn append_stream(&mut self, name: &str, size: u64, reader: impl Read) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_size(size);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(Utc::now().timestamp().max(0) as u64);
        self.builder.append_data(&mut header, name, reader)?;
        debug!(entry = name, size, "Appended bundle entry");
        Ok(())
    }

    /// Finalize the archive trailer and release the file handle
    ///
    /// Must be called before the bundle can be walked or compacted.
    pub fn close(self) -> Result<()> {
        let mut file = self.builder.into_inner()?;
        file.flush()?;
        Ok(())
    }
}

/// Walk every physical entry of a bundle in append order
///
/// The callback receives the entry metadata and a reader over its payload.
/// Duplicate names from superseded appends are visited too; compaction state
/// is the caller's concern. Returning [`WalkAction::Stop`] ends the walk
/// early without an error; any error from the callback aborts the walk and
/// propagates.
pub fn walk<F>(path: impl AsRef<Path>, mut callback: F) -> Result<()>
where
    F: FnMut(&EntryInfo, &mut dyn Read) -> Result<WalkAction>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    let file = File::open(path)?;
    let mut archive = Archive::new(file);

    for (index, entry) in archive.entries()?.enumerate() {
        let mut entry = entry?;
        let info = EntryInfo {
            index,
            name: entry.path()?.to_string_lossy().into_owned(),
            size: entry.header().size()?,
            mtime: entry.header().mtime()?,
        };

        match callback(&info, &mut entry)? {
            WalkAction::Continue => {},
            WalkAction::Stop => break,
        }
    }

    Ok(())
}

/// Rewrite the bundle, dropping superseded and unwanted entries
///
/// Two sequential walks keep memory flat: the first records the last physical
/// index of every name, the second copies only entries whose index matches
/// that record, additionally filtered to `keep` when one is given. The
/// rewrite lands in a temporary file that atomically replaces the original,
/// so a crash mid-compaction leaves the bundle untouched.
///
/// After compaction each surviving name appears exactly once, holding the
/// most recently appended content.
pub fn compact(path: impl AsRef<Path>, keep: Option<&HashSet<String>>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    let mut last_index: HashMap<String, usize> = HashMap::new();
    walk(path, |info, _| {
        last_index.insert(info.name.clone(), info.index);
        Ok(WalkAction::Continue)
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut builder = Builder::new(tmp.as_file_mut());
        let mut kept = 0usize;
        let mut dropped = 0usize;

        walk(path, |info, reader| {
            let superseded = last_index.get(&info.name) != Some(&info.index);
            let filtered = keep.map_or(false, |names| !names.contains(&info.name));
            if superseded || filtered {
                dropped += 1;
                return Ok(WalkAction::Continue);
            }

            let mut header = Header::new_gnu();
            header.set_size(info.size);
            header.set_mode(ENTRY_MODE);
            header.set_mtime(info.mtime);
            builder.append_data(&mut header, &info.name, reader)?;
            kept += 1;
            Ok(WalkAction::Continue)
        })?;

        builder.finish()?;
        debug!(path = %path.display(), kept, dropped, "Compacted bundle");
    }

    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| CliError::Io(e.error))?;
    Ok(())
}

/// Read the full payload of every entry, keyed by walk order
///
/// Convenience for the push stage, which needs entry contents one at a time
/// but uploads them through async calls a sync walk callback cannot await.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<(EntryInfo, Vec<u8>)>> {
    let mut entries = Vec::new();
    walk(path, |info, reader| {
        let mut content = Vec::with_capacity(info.size as usize);
        reader.read_to_end(&mut content)?;
        entries.push((info.clone(), content));
        Ok(WalkAction::Continue)
    })?;
    Ok(entries)
}
