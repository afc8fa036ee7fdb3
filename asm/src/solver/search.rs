//! Search backend.
//!
//! Two relaxation passes run first: every jump starts from the shortest, then
//! from the longest load, and each round moves its extra length into
//! `[cost, cost + buffer]` of the target's current address. Starting from the
//! longest load settles at once whenever the buffer covers the spread of the
//! cost table. When neither pass settles, an exhaustive depth-first search
//! decides the model.
//!
//! Entries are fixed in program order. A jump whose target is already placed
//! has a known cost and only branches on its padding. A forward jump branches
//! on its whole extra length `cost + padding`; the pair is split once the
//! target's address is reached. Open forward jumps prune every node whose
//! reachable target addresses contain no fitting cost.

use super::model::{Assignment, Constraint, Model, ADDRESS_LIMIT};
use super::{Backend, Outcome};
use std::time::{Duration, Instant};

/// Nodes between two clock reads.
const CLOCK_INTERVAL: u64 = 1024;

/// Maximum number of relaxation rounds before giving up.
const MAX_RELAXATION_ITERS: usize = 100;

#[derive(Debug, Clone, Copy)]
enum Rule {
    Fixed(u32),
    Jump { fixed: u32, target: usize },
}

/// Choice point of one jump entry.
#[derive(Debug, Clone, Copy)]
struct Frame {
    entry: usize,
    address: u32,
    /// Length when `choice == 0`.
    base: u32,
    choice: u32,
    last: u32,
    /// Target still unplaced; `choice` is `cost + padding`.
    forward: Option<usize>,
}

/// Open forward jump: `entry` bets on `extra == cost(address[target]) + padding`.
#[derive(Debug, Clone, Copy)]
struct Pending {
    entry: usize,
    target: usize,
    extra: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Search;

struct State<'a> {
    model: &'a Model,
    rules: Vec<Rule>,
    values: Assignment,
    pending: Vec<Pending>,
}

impl<'a> State<'a> {
    fn new(model: &'a Model) -> Self {
        let n = model.len();
        let mut rules = vec![Rule::Fixed(0); n];
        for constraint in &model.constraints {
            match *constraint {
                Constraint::Fixed { entry, length } => rules[entry] = Rule::Fixed(length),
                Constraint::Jump {
                    entry,
                    fixed,
                    target,
                } => rules[entry] = Rule::Jump { fixed, target },
                Constraint::Start(_) | Constraint::Sequence(_) | Constraint::End(_) => {}
            }
        }
        Self {
            model,
            rules,
            values: Assignment {
                address: vec![0; n],
                length: vec![0; n],
                padding: vec![0; n],
            },
            pending: vec![],
        }
    }

    /// Place entry `i` at `addr` if no constraint rules it out.
    fn admit(&mut self, i: usize, addr: u32) -> bool {
        let model = self.model;
        if !model.envelope.contains(i, addr) {
            return false;
        }
        if i == model.len() {
            return (addr as u64) <= ADDRESS_LIMIT;
        }
        if !model.domain.contains(&addr) {
            return false;
        }
        self.values.address[i] = addr;

        for p in &self.pending {
            if p.target == i {
                let Some(cost) = model.cost.at(addr) else {
                    return false;
                };
                if cost > p.extra || p.extra - cost > model.buffer {
                    return false;
                }
                self.values.padding[p.entry] = p.extra - cost;
            } else if p.target > i {
                let env = &model.envelope;
                let lo = (addr as u64 + env.min_span(i, p.target))
                    .max(env.lower[p.target])
                    .max(model.domain.start as u64);
                let hi = (addr as u64 + env.max_span(i, p.target))
                    .min(env.upper[p.target])
                    .min((model.domain.end as u64).saturating_sub(1));
                if lo > hi {
                    return false;
                }
                let costs = p.extra.saturating_sub(model.buffer)..=p.extra;
                if model.cost.find(lo as u32..=hi as u32, costs).is_none() {
                    return false;
                }
            }
        }
        true
    }

    /// Open a choice point for jump entry `i` placed at `addr`.
    fn frame(&self, i: usize, addr: u32, fixed: u32, target: usize) -> Option<Frame> {
        let model = self.model;
        if target <= i {
            let placed = if target == i {
                addr
            } else {
                self.values.address[target]
            };
            let cost = model.cost.at(placed)?;
            Some(Frame {
                entry: i,
                address: addr,
                base: fixed + cost,
                choice: 0,
                last: model.buffer,
                forward: None,
            })
        } else {
            Some(Frame {
                entry: i,
                address: addr,
                base: fixed,
                choice: model.cost.min(),
                last: model.cost.max() + model.buffer,
                forward: Some(target),
            })
        }
    }

    /// Apply the current choice of `frame`; returns the next entry and its address.
    fn apply(&mut self, frame: &Frame) -> (usize, u32) {
        let i = frame.entry;
        let length = frame.base + frame.choice;
        self.values.address[i] = frame.address;
        self.values.length[i] = length;
        match frame.forward {
            Some(target) => self.pending.push(Pending {
                entry: i,
                target,
                extra: frame.choice,
            }),
            None => self.values.padding[i] = frame.choice,
        }
        (i + 1, frame.address + length)
    }

    fn undo(&mut self, frame: &Frame) {
        if frame.forward.is_some() {
            self.pending.pop();
        }
    }
}

/// Fixed-point pass with every jump's extra length starting at `seed`.
fn relax(model: &Model, rules: &[Rule], seed: u32) -> Option<Assignment> {
    let n = model.len();
    let mut extra: Vec<u32> = rules
        .iter()
        .map(|rule| match rule {
            Rule::Jump { .. } => seed,
            Rule::Fixed(_) => 0,
        })
        .collect();
    let mut address = vec![0; n];

    for _ in 0..MAX_RELAXATION_ITERS {
        let mut addr = model.start as u64;
        for i in 0..n {
            if addr >= model.domain.end as u64 {
                return None;
            }
            address[i] = addr as u32;
            let length = match rules[i] {
                Rule::Fixed(length) => length,
                Rule::Jump { fixed, .. } => fixed + extra[i],
            };
            addr += length as u64;
        }
        if addr > ADDRESS_LIMIT {
            return None;
        }

        let mut settled = true;
        for i in 0..n {
            let Rule::Jump { target, .. } = rules[i] else {
                continue;
            };
            let cost = model.cost.at(address[target])?;
            let fit = extra[i].clamp(cost, cost + model.buffer);
            if fit != extra[i] {
                extra[i] = fit;
                settled = false;
            }
        }
        if !settled {
            continue;
        }

        let mut values = Assignment {
            address: address.clone(),
            length: vec![0; n],
            padding: vec![0; n],
        };
        for i in 0..n {
            match rules[i] {
                Rule::Fixed(length) => values.length[i] = length,
                Rule::Jump { fixed, target } => {
                    values.length[i] = fixed + extra[i];
                    values.padding[i] = extra[i] - model.cost.at(address[target])?;
                }
            }
        }
        return model.verify(&values).is_ok().then_some(values);
    }
    None
}

impl Backend for Search {
    fn check(&self, model: &Model, timeout: Option<Duration>) -> Outcome<Assignment> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let n = model.len();
        let mut state = State::new(model);

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Outcome::TimedOut;
        }
        for seed in [model.cost.min(), model.cost.max()] {
            if let Some(values) = relax(model, &state.rules, seed) {
                log::debug!("search: relaxation from {} words settled", seed);
                return Outcome::Sat(values);
            }
        }
        let mut frames: Vec<Frame> = vec![];
        let mut nodes: u64 = 0;

        let mut i = 0;
        let mut addr = model.start;

        'search: loop {
            // Walk forward until every entry is placed or a constraint fails.
            loop {
                if i == n && state.admit(i, addr) {
                    log::debug!("search: solved after {} nodes", nodes);
                    return Outcome::Sat(state.values);
                }
                if nodes % CLOCK_INTERVAL == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                    log::debug!("search: timed out after {} nodes", nodes);
                    return Outcome::TimedOut;
                }
                nodes += 1;

                if i == n || !state.admit(i, addr) {
                    break;
                }
                match state.rules[i] {
                    Rule::Fixed(length) => {
                        state.values.length[i] = length;
                        state.values.padding[i] = 0;
                        addr += length;
                        i += 1;
                    }
                    Rule::Jump { fixed, target } => match state.frame(i, addr, fixed, target) {
                        Some(frame) => {
                            (i, addr) = state.apply(&frame);
                            frames.push(frame);
                        }
                        None => break,
                    },
                }
            }

            // Backtrack to the deepest choice point with an untried value.
            while let Some(mut frame) = frames.pop() {
                state.undo(&frame);
                if frame.choice < frame.last {
                    frame.choice += 1;
                    (i, addr) = state.apply(&frame);
                    frames.push(frame);
                    continue 'search;
                }
            }
            log::debug!("search: exhausted after {} nodes", nodes);
            return Outcome::Unsat;
        }
    }
}
