//! Domain priority rankings.
//!
//! A domain's rank is a small non-negative integer where lower means
//! higher priority. Rankings are computed outside this crate and handed
//! to the conversion job as a snapshot; during reverse index
//! construction they are spliced into the high bits of every posting's
//! document id so that better domains sort first, and during forward
//! index construction into the document metadata word.

use std::path::Path;

use ahash::AHashMap;
use log::info;
use serde::Deserialize;

use crate::error::Result;

/// Rank assigned to domains absent from the snapshot. Clamps to the
/// worst encodable rank wherever it is spliced in.
pub const UNRANKED: u32 = u32::MAX;

#[derive(Debug, Deserialize)]
struct RankingRow {
    domain_id: u32,
    rank: u32,
}

/// An immutable domain id to rank lookup table.
#[derive(Debug, Clone, Default)]
pub struct DomainRankings {
    table: AHashMap<u32, u32>,
}

impl DomainRankings {
    pub fn new() -> DomainRankings {
        DomainRankings::default()
    }

    /// Load a rankings snapshot from a headered CSV file of
    /// `domain_id,rank` rows.
    pub fn from_csv(path: &Path) -> Result<DomainRankings> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut table = AHashMap::new();

        for row in reader.deserialize() {
            let row: RankingRow = row?;
            table.insert(row.domain_id, row.rank);
        }

        info!("loaded {} domain rankings from {}", table.len(), path.display());
        Ok(DomainRankings { table })
    }

    pub fn from_pairs<I: IntoIterator<Item = (u32, u32)>>(pairs: I) -> DomainRankings {
        DomainRankings {
            table: pairs.into_iter().collect(),
        }
    }

    /// The raw rank for a domain, [`UNRANKED`] if the snapshot does not
    /// cover it.
    pub fn rank(&self, domain_id: u32) -> u32 {
        self.table.get(&domain_id).copied().unwrap_or(UNRANKED)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
