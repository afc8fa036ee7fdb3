//! Address/length solver.
//!
//! Every jump loads its target as an immediate whose length depends on the
//! target address, which in turn depends on the lengths before it. Each
//! attempt states the whole layout as a constraint model and hands it to a
//! [`Backend`]; [`find_addresses`] drives attempts up the escalation ladder.

mod ladder;
mod model;
mod search;

pub use ladder::{AttemptRecord, Attempts, Ladder, Rung, State, Verdict};
pub use model::{Assignment, Constraint, CostFn, Envelope, Model, ADDRESS_LIMIT};
pub use search::Search;

use crate::config::Config;
use crate::error::Error;
use crate::layout::Problem;
use arch::imm::ImmTable;
use std::time::Duration;

/// Solved placement of one layout entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub address: u32,
    pub length: u32,
    pub padding: u32,
    pub jump_target_address: Option<u32>,
    pub jump_length: Option<u32>,
}

impl Section {
    pub fn end(&self) -> u32 {
        self.address + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub sections: Vec<Section>,
    /// Padding bound the solution was found with.
    pub buffer: u32,
    start: u32,
}

impl Solution {
    pub fn new(sections: Vec<Section>, buffer: u32, start: u32) -> Self {
        Self {
            sections,
            buffer,
            start,
        }
    }

    /// First address after the program.
    pub fn end(&self) -> u32 {
        self.sections.last().map_or(self.start, Section::end)
    }
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Sat(T),
    Unsat,
    /// The budget ran out before the backend decided.
    TimedOut,
}

impl<T> Outcome<T> {
    pub fn verdict(&self) -> Verdict {
        match self {
            Outcome::Sat(_) => Verdict::Solved,
            Outcome::Unsat => Verdict::Unsatisfiable,
            Outcome::TimedOut => Verdict::TimedOut,
        }
    }
}

/// Constraint backend deciding one model within a time budget.
pub trait Backend {
    fn check(&self, model: &Model, timeout: Option<Duration>) -> Outcome<Assignment>;
}

/// Single attempt with a fixed padding bound. No retries.
pub fn try_solve<B: Backend>(
    problem: &Problem,
    table: &ImmTable,
    start: u32,
    buffer: u32,
    overhead: u32,
    timeout: Option<Duration>,
    backend: &B,
) -> Result<Outcome<Solution>, Error> {
    if problem.is_empty() {
        return Ok(Outcome::Sat(Solution {
            sections: vec![],
            buffer,
            start,
        }));
    }

    let model = Model::build(problem, table, start, buffer, overhead)?;
    let values = match backend.check(&model, timeout) {
        Outcome::Sat(values) => values,
        Outcome::Unsat => return Ok(Outcome::Unsat),
        Outcome::TimedOut => return Ok(Outcome::TimedOut),
    };
    model.verify(&values)?;

    let sections = problem
        .iter()
        .enumerate()
        .map(|(i, desc)| {
            let (address, length, padding) = (values.address[i], values.length[i], values.padding[i]);
            let target = desc.jump_target_index.map(|t| values.address[t]);
            Section {
                address,
                length,
                padding,
                jump_target_address: target,
                jump_length: target.map(|_| length - desc.fixed_length - padding),
            }
        })
        .collect();

    Ok(Outcome::Sat(Solution {
        sections,
        buffer,
        start,
    }))
}

/// Solve with the escalation ladder configured in `config`.
pub fn find_addresses<B: Backend>(
    problem: &Problem,
    table: &ImmTable,
    config: &Config,
    backend: &B,
) -> Result<Solution, Error> {
    log::info!(
        "solving addresses of {} segments from 0x{:04X}",
        problem.len(),
        config.starting_address
    );
    let mut ladder = Ladder::new(config);

    while let State::Attempting(rung) = ladder.state() {
        let outcome = try_solve(
            problem,
            table,
            config.starting_address,
            rung.buffer,
            config.branch_overhead(),
            rung.timeout,
            backend,
        )?;
        match ladder.record(outcome.verdict()) {
            State::Attempting(next) => {
                log::warn!(
                    "buffer {}: {:?}, retrying with buffer {}{}",
                    rung.buffer,
                    outcome.verdict(),
                    next.buffer,
                    if next.timeout.is_none() { " and no timeout" } else { "" }
                );
            }
            State::Success | State::Exhausted => {}
        }
        if let Outcome::Sat(solution) = outcome {
            log::info!(
                "solved with buffer {}, program ends at 0x{:04X}",
                rung.buffer,
                solution.end()
            );
            return Ok(solution);
        }
    }

    Err(Error::LayoutInfeasible(ladder.into_history()))
}

/// Layout without solving: every jump reserves the longest sequence and pads
/// the difference. Always feasible while the table covers every target.
pub fn worst_case(problem: &Problem, table: &ImmTable, config: &Config) -> Result<Solution, Error> {
    let start = config.starting_address;
    let reserved = table.longest() + config.branch_overhead();
    problem.check_targets()?;

    let mut addresses = Vec::with_capacity(problem.len());
    let mut addr = start as u64;
    for desc in problem.iter() {
        addresses.push(addr as u32);
        addr += desc.fixed_length as u64;
        if desc.jump_target_index.is_some() {
            addr += reserved as u64;
        }
    }
    if addr > ADDRESS_LIMIT || (!problem.is_empty() && start as u64 > ADDRESS_LIMIT) {
        return Err(Error::AddressOverflow(addr));
    }

    let sections = problem
        .iter()
        .zip(&addresses)
        .map(|(desc, &address)| match desc.jump_target_index {
            None => Ok(Section {
                address,
                length: desc.fixed_length,
                padding: 0,
                jump_target_address: None,
                jump_length: None,
            }),
            Some(t) => {
                let target = addresses[t];
                let cost = u16::try_from(target)
                    .ok()
                    .and_then(|value| table.cost(value))
                    .ok_or(Error::ImmTableGap(target))?;
                let jump_length = cost + config.branch_overhead();
                Ok(Section {
                    address,
                    length: desc.fixed_length + reserved,
                    padding: reserved - jump_length,
                    jump_target_address: Some(target),
                    jump_length: Some(jump_length),
                })
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Solution {
        sections,
        buffer: table.longest() - table.shortest(),
        start,
    })
}
