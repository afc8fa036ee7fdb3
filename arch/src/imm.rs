//! Immediate-cost table.
//!
//! Maps every 16-bit value to the shortest known micro-op sequence that loads
//! it into `(seg, acc)`. The word count of that sequence is what a jump to the
//! value costs. Tables are produced offline by [`ImmTable::generate`] and
//! shipped as JSON artifacts of the form `{ "<value>": ["lda 0", ...] }`.

use crate::op::{replay, Acc, MicroOp};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

/// Number of representable immediates.
pub const IMM_VALUES: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum ImmError {
    #[error("Failed to access immediate table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed immediate table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key in immediate table: `{0}`")]
    InvalidKey(String),

    #[error("Invalid sequence for {0}: {1}")]
    InvalidSequence(u16, String),

    #[error("Sequence for {0} loads {1} instead")]
    WrongValue(u16, u16),

    #[error("Immediate table has more than {0} entries")]
    TooLarge(usize),

    #[error("Immediate table is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct ImmTable {
    seqs: Vec<Option<Vec<MicroOp>>>,
    longest: u32,
    shortest: u32,
}

impl ImmTable {
    /// Build a table from per-value sequences, indexed by value.
    /// Sequences are trusted as given; use [`ImmTable::from_json`] for artifacts.
    pub fn new(seqs: Vec<Option<Vec<MicroOp>>>) -> Result<Self, ImmError> {
        if seqs.len() > IMM_VALUES {
            return Err(ImmError::TooLarge(IMM_VALUES));
        }
        let lens = seqs.iter().flatten().map(|seq| seq.len() as u32);
        let longest = lens.clone().max().ok_or(ImmError::Empty)?;
        let shortest = lens.min().ok_or(ImmError::Empty)?;
        Ok(Self {
            seqs,
            longest,
            shortest,
        })
    }

    /// Breadth-first search over every `(seg, acc)` state reachable from
    /// `lda 0`. Each value gets a shortest sequence.
    pub fn generate() -> Self {
        let ops = MicroOp::all();
        let mut prev: Vec<Option<(u16, MicroOp)>> = vec![None; IMM_VALUES];
        let mut seen = vec![false; IMM_VALUES];

        let root = Acc::default();
        seen[root.value() as usize] = true;
        let mut queue = VecDeque::from([root]);

        while let Some(state) = queue.pop_front() {
            for op in &ops {
                let next = op.apply(state);
                let idx = next.value() as usize;
                if !seen[idx] {
                    seen[idx] = true;
                    prev[idx] = Some((state.value(), *op));
                    queue.push_back(next);
                }
            }
        }

        let seqs = (0..IMM_VALUES)
            .map(|value| {
                if !seen[value] {
                    return None;
                }
                let mut seq = vec![];
                let mut cur = value;
                while let Some((from, op)) = prev[cur] {
                    seq.push(op);
                    cur = from as usize;
                }
                seq.push(MicroOp::Clear);
                seq.reverse();
                Some(seq)
            })
            .collect();

        // The root state is always reached, so the table is never empty.
        let mut table = Self {
            seqs,
            longest: 0,
            shortest: u32::MAX,
        };
        for len in table.seqs.iter().flatten().map(|seq| seq.len() as u32) {
            table.longest = table.longest.max(len);
            table.shortest = table.shortest.min(len);
        }
        table
    }

    /// Word count needed to load `value`.
    pub fn cost(&self, value: u16) -> Option<u32> {
        self.sequence(value).map(|seq| seq.len() as u32)
    }

    pub fn sequence(&self, value: u16) -> Option<&[MicroOp]> {
        self.seqs.get(value as usize)?.as_deref()
    }

    /// Largest word count in the table.
    pub fn longest(&self) -> u32 {
        self.longest
    }

    /// Smallest word count in the table.
    pub fn shortest(&self) -> u32 {
        self.shortest
    }

    /// Number of values with a known sequence.
    pub fn coverage(&self) -> usize {
        self.seqs.iter().flatten().count()
    }

    pub fn from_json(json: &str) -> Result<Self, ImmError> {
        let raw: IndexMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut seqs = vec![None; IMM_VALUES];
        for (key, lines) in raw {
            let value = key
                .trim()
                .parse::<u16>()
                .map_err(|_| ImmError::InvalidKey(key.clone()))?;
            let seq = lines
                .iter()
                .map(|line| MicroOp::parse(line))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|msg| ImmError::InvalidSequence(value, msg))?;
            let loaded = replay(&seq);
            if loaded != value {
                return Err(ImmError::WrongValue(value, loaded));
            }
            seqs[value as usize] = Some(seq);
        }
        Self::new(seqs)
    }

    pub fn to_json(&self) -> Result<String, ImmError> {
        let raw: IndexMap<String, Vec<String>> = self
            .seqs
            .iter()
            .enumerate()
            .filter_map(|(value, seq)| {
                seq.as_ref().map(|seq| {
                    (
                        value.to_string(),
                        seq.iter().map(|op| op.to_string()).collect(),
                    )
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImmError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ImmError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
