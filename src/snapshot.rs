//! Versioned persisted state.
//!
//! Every snapshot carries a `schema_version`. Older layouts are migrated forward on
//! load; unknown versions are refused.
//!
//! - v1: swaps without `sequence_id`, position in the list implied it.
//! - v2: swaps carry their `sequence_id`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{SequenceId, Swap, SwapStatus};
use crate::{Address, Amount};

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    #[error("swap at position {index} carries sequence id {found}")]
    SequenceGap { index: usize, found: SequenceId },
}

/// Pool state as persisted: the swap sequence and both registries. The next
/// sequence id is the number of swaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub swaps: Vec<Swap>,
    pub inbound: Vec<Address>,
    pub outbound: Vec<Address>,
}

#[derive(Deserialize)]
struct VersionTag {
    schema_version: u32,
}

#[derive(Deserialize)]
struct SwapV1 {
    in_asset: Address,
    out_asset: Address,
    amount_in: Amount,
    amount_out: Amount,
    sender: Address,
    receiver: Address,
    status: SwapStatus,
}

#[derive(Deserialize)]
struct SnapshotV1 {
    swaps: Vec<SwapV1>,
    inbound: Vec<Address>,
    outbound: Vec<Address>,
}

impl From<SnapshotV1> for Snapshot {
    fn from(old: SnapshotV1) -> Self {
        let swaps = old
            .swaps
            .into_iter()
            .enumerate()
            .map(|(idx, swap)| Swap {
                sequence_id: idx as SequenceId,
                in_asset: swap.in_asset,
                out_asset: swap.out_asset,
                amount_in: swap.amount_in,
                amount_out: swap.amount_out,
                sender: swap.sender,
                receiver: swap.receiver,
                status: swap.status,
            })
            .collect();
        Snapshot {
            schema_version: SCHEMA_VERSION,
            swaps,
            inbound: old.inbound,
            outbound: old.outbound,
        }
    }
}

impl Snapshot {
    pub fn new(swaps: Vec<Swap>, inbound: Vec<Address>, outbound: Vec<Address>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            swaps,
            inbound,
            outbound,
        }
    }

    /// Parse a snapshot of any supported version, migrating it to the current one.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let tag: VersionTag = serde_json::from_str(json)?;
        match tag.schema_version {
            1 => Ok(serde_json::from_str::<SnapshotV1>(json)?.into()),
            SCHEMA_VERSION => Ok(serde_json::from_str(json)?),
            other => Err(SnapshotError::UnsupportedVersion(other)),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const V1: &str = r#"{
        "schema_version": 1,
        "swaps": [
            {
                "in_asset": "0x0101010101010101010101010101010101010101",
                "out_asset": "0x0202020202020202020202020202020202020202",
                "amount_in": "200",
                "amount_out": "100",
                "sender": "0x0303030303030303030303030303030303030303",
                "receiver": "0x0404040404040404040404040404040404040404",
                "status": "finalized"
            },
            {
                "in_asset": "0x0101010101010101010101010101010101010101",
                "out_asset": "0x0202020202020202020202020202020202020202",
                "amount_in": "50",
                "amount_out": "25",
                "sender": "0x0303030303030303030303030303030303030303",
                "receiver": "0x0404040404040404040404040404040404040404",
                "status": "pending"
            }
        ],
        "inbound": ["0x0101010101010101010101010101010101010101"],
        "outbound": ["0x0202020202020202020202020202020202020202"]
    }"#;

    #[test]
    fn v1_is_migrated_with_positional_ids() {
        let snapshot = Snapshot::from_json(V1).unwrap();
        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.swaps.len(), 2);
        assert_eq!(snapshot.swaps[0].sequence_id, 0);
        assert_eq!(snapshot.swaps[1].sequence_id, 1);
        assert_eq!(snapshot.swaps[0].status, SwapStatus::Finalized);
        assert_eq!(snapshot.swaps[1].amount_in, Amount::new(50));
        assert_eq!(snapshot.inbound, vec![Address::repeat_byte(1)]);
    }

    #[test]
    fn current_version_survives_json() {
        let migrated = Snapshot::from_json(V1).unwrap();
        let json = migrated.to_json().unwrap();
        assert!(json.contains("\"schema_version\": 2"));
        assert_eq!(Snapshot::from_json(&json).unwrap(), migrated);
    }

    #[test]
    fn unknown_version_is_refused() {
        let result = Snapshot::from_json(r#"{"schema_version": 9, "swaps": []}"#);
        assert!(matches!(result, Err(SnapshotError::UnsupportedVersion(9))));
    }

    #[test]
    fn missing_version_is_malformed() {
        let result = Snapshot::from_json(r#"{"swaps": []}"#);
        assert!(matches!(result, Err(SnapshotError::Json(_))));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(V1.as_bytes()).unwrap();
        let snapshot = Snapshot::load(file.path()).unwrap();
        assert_eq!(snapshot.swaps.len(), 2);
    }
}
