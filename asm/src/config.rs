use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

/// Settings threaded through every stage of the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address of the first instruction.
    pub starting_address: u32,
    /// Padding bound of the first solver attempt.
    pub buffer: u32,
    /// Largest padding bound tried with `timeout_ms`.
    pub buffer_ceiling: u32,
    /// Budget of every bounded attempt. `None` waits forever.
    pub timeout_ms: Option<u64>,
    /// Padding bound of the last-resort attempt.
    pub final_buffer: u32,
    /// Budget of the last-resort attempt. `None` waits forever.
    pub final_timeout_ms: Option<u64>,
    /// Instruction used as padding.
    pub filler: String,
    /// Instructions placed between the immediate load and the branch.
    pub jump_setup: Vec<String>,
    /// Mnemonics that start a conditional branch.
    pub branch_mnemonics: Vec<String>,
    /// Solve the layout. When off, every jump reserves the longest sequence.
    pub optimize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_address: 0,
            buffer: 1,
            buffer_ceiling: 4,
            timeout_ms: Some(2000),
            final_buffer: 14,
            final_timeout_ms: None,
            filler: "nop".to_string(),
            jump_setup: vec![],
            branch_mnemonics: vec!["brc".to_string()],
            optimize: true,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn final_timeout(&self) -> Option<Duration> {
        self.final_timeout_ms.map(Duration::from_millis)
    }

    /// Words every jump needs on top of its immediate load.
    pub fn branch_overhead(&self) -> u32 {
        self.jump_setup.len() as u32
    }

    pub fn is_branch(&self, mnemonic: &str) -> bool {
        self.branch_mnemonics
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mnemonic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str("starting_address: 1000\nfiller: \"add r0\"\n").unwrap();
        assert_eq!(cfg.starting_address, 1000);
        assert_eq!(cfg.filler, "add r0");
        assert_eq!(cfg.buffer, 1);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(2000)));
        assert_eq!(cfg.final_timeout(), None);
        assert!(cfg.is_branch("BRC"));
    }
}
