//! Batched scatter writes.
//!
//! The reverse index scatter pass produces one positioned write per
//! posting, at essentially random offsets across a file that is much
//! larger than memory. [`RandomWriteFunnel`] absorbs those writes into
//! per-region bins and replays each bin in turn, so the target file is
//! touched one locality at a time instead of one word at a time.
//!
//! Bins buffer entries in memory and overflow to anonymous temp files,
//! which bounds memory independently of how skewed the write pattern
//! is. The final file content does not depend on the order of puts;
//! every slot is written at most once per conversion.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{Result, SileneError};

const BIN_BUFFER_ENTRIES: usize = 8192;

/// Default number of u64 slots covered by one bin.
pub const DEFAULT_BIN_SLOTS: u64 = 10_000_000;

pub struct RandomWriteFunnel {
    work_dir: PathBuf,
    bins: Vec<Bin>,
    bin_slots: u64,
    total_slots: u64,
}

struct Bin {
    buffer: Vec<(u64, u64)>,
    spill: Option<File>,
    spilled: u64,
}

impl RandomWriteFunnel {
    /// A funnel covering `total_slots` u64 slots of the target file,
    /// grouped into bins of `bin_slots` each. Spill files are created in
    /// `work_dir` only for bins that overflow their memory buffer.
    pub fn new(work_dir: &Path, total_slots: u64, bin_slots: u64) -> Result<RandomWriteFunnel> {
        if bin_slots == 0 {
            return Err(SileneError::invalid_argument("funnel bin size must be positive"));
        }

        let n_bins = total_slots.div_ceil(bin_slots).max(1) as usize;
        let mut bins = Vec::with_capacity(n_bins);
        for _ in 0..n_bins {
            bins.push(Bin {
                buffer: Vec::new(),
                spill: None,
                spilled: 0,
            });
        }

        Ok(RandomWriteFunnel {
            work_dir: work_dir.to_path_buf(),
            bins,
            bin_slots,
            total_slots,
        })
    }

    /// Queue `value` for slot `slot` of the target file.
    pub fn put(&mut self, slot: u64, value: u64) -> Result<()> {
        if slot >= self.total_slots {
            return Err(SileneError::invalid_argument(format!(
                "slot {slot} beyond funnel range {}",
                self.total_slots
            )));
        }

        let idx = (slot / self.bin_slots) as usize;
        self.bins[idx].buffer.push((slot, value));

        if self.bins[idx].buffer.len() >= BIN_BUFFER_ENTRIES {
            Self::spill_bin(&self.work_dir, &mut self.bins[idx])?;
        }

        Ok(())
    }

    fn spill_bin(work_dir: &Path, bin: &mut Bin) -> Result<()> {
        if bin.spill.is_none() {
            bin.spill = Some(tempfile::tempfile_in(work_dir)?);
        }

        let mut encoded = Vec::with_capacity(bin.buffer.len() * 16);
        for &(slot, value) in &bin.buffer {
            encoded.extend_from_slice(&slot.to_le_bytes());
            encoded.extend_from_slice(&value.to_le_bytes());
        }

        if let Some(file) = &mut bin.spill {
            file.write_all(&encoded)?;
        }
        bin.spilled += bin.buffer.len() as u64;
        bin.buffer.clear();

        Ok(())
    }

    /// Replay all queued writes into `target`, bin by bin.
    pub fn write(mut self, target: &File) -> Result<()> {
        for bin in &mut self.bins {
            if let Some(file) = &mut bin.spill {
                file.seek(SeekFrom::Start(0))?;
                let mut entry = [0u8; 16];
                for _ in 0..bin.spilled {
                    file.read_exact(&mut entry)?;
                    let slot = u64::from_le_bytes([
                        entry[0], entry[1], entry[2], entry[3], entry[4], entry[5], entry[6],
                        entry[7],
                    ]);
                    target.write_all_at(&entry[8..16], slot * 8)?;
                }
            }

            for &(slot, value) in &bin.buffer {
                target.write_all_at(&value.to_le_bytes(), slot * 8)?;
            }
            bin.buffer.clear();
            bin.spill = None;
        }

        Ok(())
    }
}
