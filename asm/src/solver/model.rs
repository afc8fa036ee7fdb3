//! Constraint model of one solver attempt.

use crate::error::Error;
use crate::layout::{Descriptor, Problem};
use arch::imm::{ImmTable, IMM_VALUES};
use std::collections::BTreeMap;
use std::ops::{Range, RangeInclusive};

/// Addresses must fit the 16-bit immediate space. The end of the program, and
/// an empty entry there, may sit at the limit itself.
pub const ADDRESS_LIMIT: u64 = IMM_VALUES as u64;

/// Length of a jump sequence as a function of the target address.
/// Precomputed over the whole address domain of an attempt.
#[derive(Debug, Clone)]
pub struct CostFn {
    base: u32,
    lens: Vec<Option<u32>>,
    by_len: BTreeMap<u32, Vec<u32>>,
    min: u32,
    max: u32,
}

impl CostFn {
    pub fn new(table: &ImmTable, overhead: u32, domain: Range<u32>) -> Self {
        let lens: Vec<Option<u32>> = domain
            .clone()
            .map(|addr| {
                u16::try_from(addr)
                    .ok()
                    .and_then(|value| table.cost(value))
                    .map(|cost| cost + overhead)
            })
            .collect();

        let mut by_len: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (addr, len) in domain.clone().zip(&lens) {
            if let Some(len) = len {
                by_len.entry(*len).or_default().push(addr);
            }
        }

        Self {
            base: domain.start,
            lens,
            by_len,
            min: table.shortest() + overhead,
            max: table.longest() + overhead,
        }
    }

    pub fn at(&self, addr: u32) -> Option<u32> {
        let idx = addr.checked_sub(self.base)? as usize;
        self.lens.get(idx).copied().flatten()
    }

    /// Shortest jump sequence.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Longest jump sequence.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Some address in `addrs` whose cost lies in `costs`.
    pub fn find(&self, addrs: RangeInclusive<u32>, costs: RangeInclusive<u32>) -> Option<u32> {
        self.by_len.range(costs).find_map(|(_, sorted)| {
            let idx = sorted.partition_point(|a| a < addrs.start());
            sorted.get(idx).copied().filter(|a| a <= addrs.end())
        })
    }
}

/// Address bounds of every entry, from forward scans with the shortest and
/// the longest possible jumps. The extra last element bounds the end address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub lower: Vec<u64>,
    pub upper: Vec<u64>,
}

impl Envelope {
    pub fn scan(entries: &[Descriptor], start: u32, min_jump: u32, max_jump: u32) -> Self {
        let accumulate = |jump: u32| {
            let mut addr = start as u64;
            let mut bounds = Vec::with_capacity(entries.len() + 1);
            bounds.push(addr);
            for entry in entries {
                addr += entry.fixed_length as u64;
                if entry.jump_target_index.is_some() {
                    addr += jump as u64;
                }
                bounds.push(addr);
            }
            bounds
        };
        Self {
            lower: accumulate(min_jump),
            upper: accumulate(max_jump),
        }
    }

    /// Admissible addresses of entry `i` (or the end when `i == len`).
    pub fn contains(&self, i: usize, addr: u32) -> bool {
        (self.lower[i]..=self.upper[i]).contains(&(addr as u64))
    }

    /// Fewest words entries `from..to` can take.
    pub fn min_span(&self, from: usize, to: usize) -> u64 {
        self.lower[to] - self.lower[from]
    }

    /// Most words entries `from..to` can take.
    pub fn max_span(&self, from: usize, to: usize) -> u64 {
        self.upper[to] - self.upper[from]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `address[0] == start`
    Start(u32),
    /// `address[i + 1] == address[i] + length[i]`
    Sequence(usize),
    /// `length[i] == fixed`
    Fixed { entry: usize, length: u32 },
    /// `length[i] == fixed + cost(address[target]) + padding[i]`
    Jump {
        entry: usize,
        fixed: u32,
        target: usize,
    },
    /// `address[last] + length[last] <= limit`
    End(u64),
}

/// Values of every variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub address: Vec<u32>,
    pub length: Vec<u32>,
    pub padding: Vec<u32>,
}

/// Variables, domains and constraints of one attempt.
#[derive(Debug, Clone)]
pub struct Model {
    pub start: u32,
    pub buffer: u32,
    pub entries: Vec<Descriptor>,
    /// `[min_address, max_address)`, shared by every address variable.
    pub domain: Range<u32>,
    pub envelope: Envelope,
    pub cost: CostFn,
    pub constraints: Vec<Constraint>,
}

impl Model {
    pub fn build(
        problem: &Problem,
        table: &ImmTable,
        start: u32,
        buffer: u32,
        overhead: u32,
    ) -> Result<Self, Error> {
        problem.check_targets()?;
        let entries = problem.0.clone();
        let min_jump = table.shortest() + overhead;
        let max_jump = table.longest() + overhead + buffer;
        let envelope = Envelope::scan(&entries, start, min_jump, max_jump);

        let lowest_end = envelope.lower[entries.len()];
        if lowest_end > ADDRESS_LIMIT || (!entries.is_empty() && start as u64 > ADDRESS_LIMIT) {
            return Err(Error::AddressOverflow(lowest_end));
        }
        let max_address = (envelope.upper[entries.len()] + 1).min(ADDRESS_LIMIT + 1) as u32;
        let domain = start..max_address.max(start);
        let cost = CostFn::new(table, overhead, domain.clone());

        let mut constraints = vec![];
        if !entries.is_empty() {
            constraints.push(Constraint::Start(start));
        }
        for (entry, desc) in entries.iter().enumerate() {
            constraints.push(match desc.jump_target_index {
                None => Constraint::Fixed {
                    entry,
                    length: desc.fixed_length,
                },
                Some(target) => Constraint::Jump {
                    entry,
                    fixed: desc.fixed_length,
                    target,
                },
            });
            if entry + 1 < entries.len() {
                constraints.push(Constraint::Sequence(entry));
            }
        }
        constraints.push(Constraint::End(ADDRESS_LIMIT));

        log::debug!(
            "model: {} entries, buffer {}, domain 0x{:04X}..0x{:04X}, jumps {}..={} words",
            entries.len(),
            buffer,
            domain.start,
            domain.end,
            min_jump,
            max_jump
        );

        Ok(Self {
            start,
            buffer,
            entries,
            domain,
            envelope,
            cost,
            constraints,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check `values` against every domain and constraint.
    pub fn verify(&self, values: &Assignment) -> Result<(), Error> {
        let n = self.len();
        if values.address.len() != n || values.length.len() != n || values.padding.len() != n {
            return Err(Error::SolverInconsistency {
                segment: n,
                expected: n as u32,
                actual: values.address.len() as u32,
            });
        }
        let mismatch = |entry: usize, expected: u64, actual: u64| Error::SolverInconsistency {
            segment: entry,
            expected: expected as u32,
            actual: actual as u32,
        };

        for i in 0..n {
            let addr = values.address[i];
            if !self.domain.contains(&addr) || !self.envelope.contains(i, addr) {
                return Err(mismatch(i, self.envelope.lower[i], addr as u64));
            }
            let pad = values.padding[i];
            let bound = match self.entries[i].jump_target_index {
                Some(_) => self.buffer,
                None => 0,
            };
            if pad > bound {
                return Err(mismatch(i, bound as u64, pad as u64));
            }
        }

        for constraint in &self.constraints {
            match *constraint {
                Constraint::Start(start) => {
                    if values.address[0] != start {
                        return Err(mismatch(0, start as u64, values.address[0] as u64));
                    }
                }
                Constraint::Sequence(i) => {
                    let next = values.address[i] as u64 + values.length[i] as u64;
                    if values.address[i + 1] as u64 != next {
                        return Err(mismatch(i + 1, next, values.address[i + 1] as u64));
                    }
                }
                Constraint::Fixed { entry, length } => {
                    if values.length[entry] != length {
                        return Err(mismatch(entry, length as u64, values.length[entry] as u64));
                    }
                }
                Constraint::Jump {
                    entry,
                    fixed,
                    target,
                } => {
                    let cost = self
                        .cost
                        .at(values.address[target])
                        .ok_or(Error::ImmTableGap(values.address[target]))?;
                    let expected = fixed as u64 + cost as u64 + values.padding[entry] as u64;
                    if values.length[entry] as u64 != expected {
                        return Err(mismatch(entry, expected, values.length[entry] as u64));
                    }
                }
                Constraint::End(limit) => {
                    if let (Some(addr), Some(len)) = (values.address.last(), values.length.last()) {
                        let end = *addr as u64 + *len as u64;
                        if end > limit {
                            return Err(Error::AddressOverflow(end));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
