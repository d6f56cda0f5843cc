//! Append-only block journal.
//!
//! Each committed block is one JSON line. Keys and values are base64 so the
//! composite key delimiter survives any text tooling. A torn final line is
//! discarded on replay; a malformed line elsewhere is a storage error. A
//! failed append is truncated away before the error is returned.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::ledger::LedgerError;

const SOURCE: &str = "marquee::ledger::journal";

/// One committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub tx_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub writes: Vec<BlockWrite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<BlockEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWrite {
    #[serde(with = "b64_string")]
    pub key: String,
    #[serde(with = "b64_bytes")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub name: String,
    #[serde(with = "b64_bytes")]
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    poisoned: bool,
}

impl Journal {
    /// Opens (or creates) the journal and returns the blocks already in it.
    pub fn open(path: &Path) -> Result<(Self, Vec<Block>), LedgerError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let blocks = if path.exists() {
            replay(path)?
        } else {
            Vec::new()
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(
            target = SOURCE,
            path = %path.display(),
            blocks = blocks.len(),
            "ledger journal opened"
        );
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                poisoned: false,
            },
            blocks,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends a block before it is applied in memory.
    ///
    /// On failure the file is cut back to its previous length, so the block
    /// is neither replayed later nor left as a torn line in the middle.
    pub fn append(&mut self, block: &Block) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(block)
            .map_err(|err| LedgerError::storage(format!("failed to encode block: {err}")))?;
        line.push(b'\n');
        self.append_line(block.number, &line, |file, line| {
            file.write_all(line)?;
            file.sync_data()
        })
    }

    fn append_line<W>(&mut self, number: u64, line: &[u8], write: W) -> Result<(), LedgerError>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        if self.poisoned {
            return Err(LedgerError::storage(format!(
                "journal {} could not be rolled back after an earlier failure",
                self.path.display()
            )));
        }

        let previous_len = self.file.metadata()?.len();
        let Err(err) = write(&mut self.file, line) else {
            return Ok(());
        };

        match self.file.set_len(previous_len).and_then(|()| self.file.sync_data()) {
            Ok(()) => warn!(
                target = SOURCE,
                path = %self.path.display(),
                block = number,
                error = %err,
                "journal append failed; partial write rolled back"
            ),
            Err(rollback) => {
                self.poisoned = true;
                error!(
                    target = SOURCE,
                    path = %self.path.display(),
                    block = number,
                    error = %err,
                    rollback_error = %rollback,
                    "journal append failed and could not be rolled back"
                );
            }
        }
        Err(err.into())
    }
}

/// Reads every intact block and truncates a torn tail so later appends
/// start on a fresh line.
fn replay(path: &Path) -> Result<Vec<Block>, LedgerError> {
    let contents = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = contents.split_inclusive('\n').collect();
    let last = lines.len().saturating_sub(1);

    let mut blocks = Vec::with_capacity(lines.len());
    let mut intact_len = 0usize;
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            intact_len += line.len();
            continue;
        }
        match serde_json::from_str::<Block>(line) {
            Ok(block) if line.ends_with('\n') => {
                blocks.push(block);
                intact_len += line.len();
            }
            _ if index == last => {
                warn!(
                    target = SOURCE,
                    path = %path.display(),
                    line = index + 1,
                    "discarding torn journal tail"
                );
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(intact_len as u64)?;
            }
            result => {
                let detail = result
                    .err()
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "missing line terminator".to_string());
                return Err(LedgerError::storage(format!(
                    "journal {} line {} is corrupt: {detail}",
                    path.display(),
                    index + 1
                )));
            }
        }
    }
    Ok(blocks)
}

mod b64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

mod b64_string {
    use serde::{Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        super::b64_bytes::serialize(value.as_bytes(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let bytes = super::b64_bytes::deserialize(deserializer)?;
        String::from_utf8(bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64) -> Block {
        Block {
            number,
            tx_id: format!("tx-{number}"),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            writes: vec![BlockWrite {
                key: "\u{0}request\u{0}tt1375666\u{0}".into(),
                value: br#"{"version":1}"#.to_vec(),
            }],
            event: Some(BlockEvent {
                name: "ContentRequested".into(),
                payload: b"{}".to_vec(),
            }),
        }
    }

    #[test]
    fn appended_blocks_are_replayed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let (mut journal, replayed) = Journal::open(&path).unwrap();
        assert!(replayed.is_empty());
        journal.append(&block(1)).unwrap();
        journal.append(&block(2)).unwrap();
        drop(journal);

        let (_, replayed) = Journal::open(&path).unwrap();
        assert_eq!(replayed, vec![block(1), block(2)]);
    }

    #[test]
    fn torn_tail_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(&block(1)).unwrap();
        journal.file.write_all(b"{\"number\":2,\"tx_").unwrap();
        drop(journal);

        let (mut journal, replayed) = Journal::open(&path).unwrap();
        assert_eq!(replayed.len(), 1);
        journal.append(&block(3)).unwrap();
        drop(journal);

        let (_, replayed) = Journal::open(&path).unwrap();
        assert_eq!(replayed, vec![block(1), block(3)]);
    }

    #[test]
    fn failed_append_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(&block(1)).unwrap();

        let line = serde_json::to_vec(&block(2)).unwrap();
        let err = journal
            .append_line(2, &line, |file, line| {
                file.write_all(&line[..line.len() / 2])?;
                Err(io::Error::other("disk full"))
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));

        journal.append(&block(2)).unwrap();
        drop(journal);

        let (_, replayed) = Journal::open(&path).unwrap();
        assert_eq!(replayed, vec![block(1), block(2)]);
    }

    #[test]
    fn corruption_before_the_tail_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let good = serde_json::to_string(&block(2)).unwrap();
        std::fs::write(&path, format!("not json\n{good}\n")).unwrap();

        let err = Journal::open(&path).unwrap_err();
        assert!(matches!(err, LedgerError::Storage { .. }));
    }
}
