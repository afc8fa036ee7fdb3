//! Layout-resolving assembler core.
//!
//! Conditional branches load their target address as an immediate before
//! branching, so a branch's length depends on where its target lands. The
//! pipeline splits the program into segments, states their lengths as a
//! layout problem, solves every address at once and then materializes the
//! addressed instruction stream.

pub mod config;
pub mod error;
pub mod label;
pub mod layout;
pub mod line;
pub mod listing;
pub mod materialize;
pub mod segment;
pub mod solver;
pub mod source;

pub use config::Config;
pub use error::Error;
pub use materialize::Assembled;

use arch::imm::ImmTable;
use line::Program;
use solver::Search;

/// Run every layout stage on `program` in order.
pub fn assemble(mut program: Program, table: &ImmTable, config: &Config) -> Result<Assembled, Error> {
    let segments = segment::mark(&mut program.lines, &program.labels);
    log::debug!("{} lines in {} segments", program.lines.len(), segments.len());

    let labels = label::resolve(&program.lines, &program.labels, &segments)?;
    let problem = layout::translate(&program.lines, &segments, &labels)?;

    let solution = if config.optimize {
        solver::find_addresses(&problem, table, config, &Search)?
    } else {
        log::info!("address optimization is off, reserving the longest jumps");
        solver::worst_case(&problem, table, config)?
    };

    materialize::materialize(&program.lines, &segments, &labels, &solution, table, config)
}
