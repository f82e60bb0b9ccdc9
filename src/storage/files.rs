//! Generation file layout and the atomic publish step.
//!
//! An index generation is five data files plus a manifest, all living
//! in one directory:
//!
//! ```text
//! fwd-ids.dat     sorted canonical document ids
//! fwd-data.dat    fixed-width per-document entries
//! fwd-spans.dat   span store records
//! rev-words.dat   (term id, end offset) pairs, sorted by term id
//! rev-docs.dat    concatenated tree-postings blocks
//! manifest.json   generation metadata
//! ```
//!
//! Builders write a whole new generation under `.next` names. Once every
//! output is flushed, [`IndexFileSet::publish`] fsyncs and renames the
//! set into place, manifest last, so a crash at any point leaves either
//! the old generation or the new one, never a mix. Readers holding maps
//! of the old files keep working off the old inodes until they reopen.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SileneError};

pub const FORWARD_IDS_FILE: &str = "fwd-ids.dat";
pub const FORWARD_DATA_FILE: &str = "fwd-data.dat";
pub const FORWARD_SPANS_FILE: &str = "fwd-spans.dat";
pub const REVERSE_WORDS_FILE: &str = "rev-words.dat";
pub const REVERSE_DOCS_FILE: &str = "rev-docs.dat";
pub const MANIFEST_FILE: &str = "manifest.json";

const NEXT_SUFFIX: &str = ".next";

const DATA_FILES: [&str; 5] = [
    FORWARD_IDS_FILE,
    FORWARD_DATA_FILE,
    FORWARD_SPANS_FILE,
    REVERSE_WORDS_FILE,
    REVERSE_DOCS_FILE,
];

/// Which generation of a file set to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Live,
    Next,
}

/// Metadata describing a published generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationManifest {
    /// Monotonic generation counter, assigned by the conversion job.
    pub epoch: u64,
    pub document_count: u64,
    pub journal_page_count: u32,
}

/// Paths of the three forward-index files of one generation.
#[derive(Debug, Clone)]
pub struct ForwardFileSet {
    pub ids: PathBuf,
    pub data: PathBuf,
    pub spans: PathBuf,
}

impl ForwardFileSet {
    pub fn all_exist(&self) -> bool {
        self.ids.is_file() && self.data.is_file() && self.spans.is_file()
    }
}

/// Paths of the two reverse-index files of one generation.
#[derive(Debug, Clone)]
pub struct ReverseFileSet {
    pub words: PathBuf,
    pub docs: PathBuf,
}

impl ReverseFileSet {
    pub fn all_exist(&self) -> bool {
        self.words.is_file() && self.docs.is_file()
    }
}

/// The file set of an index directory, across generations.
#[derive(Debug, Clone)]
pub struct IndexFileSet {
    dir: PathBuf,
}

impl IndexFileSet {
    pub fn new<P: Into<PathBuf>>(dir: P) -> IndexFileSet {
        IndexFileSet { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str, generation: Generation) -> PathBuf {
        match generation {
            Generation::Live => self.dir.join(name),
            Generation::Next => self.dir.join(format!("{name}{NEXT_SUFFIX}")),
        }
    }

    pub fn forward(&self, generation: Generation) -> ForwardFileSet {
        ForwardFileSet {
            ids: self.path(FORWARD_IDS_FILE, generation),
            data: self.path(FORWARD_DATA_FILE, generation),
            spans: self.path(FORWARD_SPANS_FILE, generation),
        }
    }

    pub fn reverse(&self, generation: Generation) -> ReverseFileSet {
        ReverseFileSet {
            words: self.path(REVERSE_WORDS_FILE, generation),
            docs: self.path(REVERSE_DOCS_FILE, generation),
        }
    }

    pub fn manifest(&self, generation: Generation) -> PathBuf {
        self.path(MANIFEST_FILE, generation)
    }

    /// Read the live generation's manifest, if one has been published.
    pub fn read_manifest(&self) -> Result<Option<GenerationManifest>> {
        let path = self.manifest(Generation::Live);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Atomically switch the `.next` generation live.
    ///
    /// Every data file must have been written and closed. Files are
    /// fsynced before any rename, and the manifest is renamed last so it
    /// only ever describes a complete file set.
    pub fn publish(&self, manifest: &GenerationManifest) -> Result<()> {
        for name in DATA_FILES {
            let next = self.path(name, Generation::Next);
            if !next.is_file() {
                return Err(SileneError::index(format!(
                    "incomplete next generation: {} is missing",
                    next.display()
                )));
            }
            File::open(&next)?.sync_all()?;
        }

        let manifest_next = self.manifest(Generation::Next);
        fs::write(&manifest_next, serde_json::to_vec_pretty(manifest)?)?;
        File::open(&manifest_next)?.sync_all()?;

        for name in DATA_FILES {
            fs::rename(self.path(name, Generation::Next), self.path(name, Generation::Live))?;
        }
        fs::rename(&manifest_next, self.manifest(Generation::Live))?;

        File::open(&self.dir)?.sync_all()?;

        info!(
            "published index generation {} in {}",
            manifest.epoch,
            self.dir.display()
        );
        Ok(())
    }

    /// Delete any partially written `.next` files, leaving the live
    /// generation untouched.
    pub fn discard_next(&self) -> Result<()> {
        for name in DATA_FILES.iter().chain([&MANIFEST_FILE]) {
            let next = self.path(name, Generation::Next);
            match fs::remove_file(&next) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_next_files(set: &IndexFileSet) {
        for name in DATA_FILES {
            fs::write(set.path(name, Generation::Next), name.as_bytes()).unwrap();
        }
    }

    #[test]
    fn test_publish_renames_all() {
        let dir = TempDir::new().unwrap();
        let set = IndexFileSet::new(dir.path());
        write_next_files(&set);

        let manifest = GenerationManifest {
            epoch: 1,
            document_count: 10,
            journal_page_count: 2,
        };
        set.publish(&manifest).unwrap();

        assert!(set.forward(Generation::Live).all_exist());
        assert!(set.reverse(Generation::Live).all_exist());
        assert!(!set.forward(Generation::Next).all_exist());
        assert_eq!(set.read_manifest().unwrap(), Some(manifest));
    }

    #[test]
    fn test_publish_requires_complete_set() {
        let dir = TempDir::new().unwrap();
        let set = IndexFileSet::new(dir.path());
        write_next_files(&set);
        fs::remove_file(set.path(REVERSE_DOCS_FILE, Generation::Next)).unwrap();

        let manifest = GenerationManifest {
            epoch: 1,
            document_count: 0,
            journal_page_count: 0,
        };
        assert!(set.publish(&manifest).is_err());

        // Nothing went live.
        assert!(!set.forward(Generation::Live).all_exist());
        assert_eq!(set.read_manifest().unwrap(), None);
    }

    #[test]
    fn test_republish_replaces_live() {
        let dir = TempDir::new().unwrap();
        let set = IndexFileSet::new(dir.path());

        write_next_files(&set);
        set.publish(&GenerationManifest {
            epoch: 1,
            document_count: 1,
            journal_page_count: 1,
        })
        .unwrap();

        write_next_files(&set);
        set.publish(&GenerationManifest {
            epoch: 2,
            document_count: 2,
            journal_page_count: 1,
        })
        .unwrap();

        assert_eq!(set.read_manifest().unwrap().unwrap().epoch, 2);
    }

    #[test]
    fn test_discard_next() {
        let dir = TempDir::new().unwrap();
        let set = IndexFileSet::new(dir.path());
        write_next_files(&set);

        set.discard_next().unwrap();
        assert!(!set.forward(Generation::Next).all_exist());

        // Discarding again is a no-op.
        set.discard_next().unwrap();
    }
}
