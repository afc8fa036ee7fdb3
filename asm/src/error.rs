use crate::solver::Attempts;
use arch::imm::ImmError;
use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Undefined label: `{0}`")]
    UnresolvedLabel(String, usize),

    #[error("Re-defined label: `{0}`")]
    RedefinedLabel(String, usize),

    #[error("Branch without target label")]
    MissingBranchTarget(usize),

    #[error(
        "No address layout found ({0}). Add nop instructions near the jumps, raise the buffer \
         ceiling or the timeout, or turn off address optimization"
    )]
    LayoutInfeasible(Attempts),

    #[error("Solver inconsistency in segment {segment}: expected {expected} words, got {actual}")]
    SolverInconsistency {
        segment: usize,
        expected: u32,
        actual: u32,
    },

    #[error("Entry {entry} jumps to entry {target}, which is not in the layout")]
    JumpTargetOutOfRange { entry: usize, target: usize },

    #[error("Address conflict at 0x{0:04X}")]
    AddressConflict(u32),

    #[error("Address space overflow: program needs addresses up to 0x{0:X}")]
    AddressOverflow(u64),

    #[error("No immediate sequence for 0x{0:04X}")]
    ImmTableGap(u32),

    #[error("Immediate table: {0}")]
    ImmTable(#[from] ImmError),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Source line (0-based) the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::UnresolvedLabel(_, line)
            | Error::RedefinedLabel(_, line)
            | Error::MissingBranchTarget(line) => Some(*line),
            _ => None,
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, file: &str, source: &str) {
        cprintln!("<red,bold>error</>: {}", self);

        let Some(line_idx) = self.line() else {
            return;
        };
        let line_num = line_idx + 1;
        let line_content = source.lines().nth(line_idx).unwrap_or("");

        cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
        cprintln!("      <blue>|</>");
        cprintln!(" <blue>{:>4} |</> {}", line_num, line_content);
        cprintln!("      <blue>|</>");
    }
}
