//! Physical address materializer.
//!
//! Turns a solution back into an instruction stream: every segment's body,
//! then the immediate load of its jump target, the configured jump setup, the
//! branch and the padding. Every emitted line gets the next address.

use crate::config::Config;
use crate::error::Error;
use crate::label::LabelSegments;
use crate::line::{Line, Origin};
use crate::segment::Segments;
use crate::solver::Solution;
use arch::imm::ImmTable;
use bimap::BiMap;
use indexmap::IndexMap;

/// Addressed program.
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    /// Final stream, synthesized lines included, in address order.
    pub lines: Vec<Line>,
    /// Address <-> position in `lines`.
    pub used: BiMap<u32, usize>,
    /// Label -> address of the instruction it precedes.
    pub labels: IndexMap<String, u32>,
    /// First address after the program.
    pub end: u32,
}

impl Assembled {
    pub fn at(&self, address: u32) -> Option<&Line> {
        self.used
            .get_by_left(&address)
            .and_then(|&pos| self.lines.get(pos))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

struct Emitter {
    out: Assembled,
    cursor: u32,
}

impl Emitter {
    fn emit(&mut self, mut line: Line) -> Result<(), Error> {
        line.address = Some(self.cursor);
        let pos = self.out.lines.len();
        self.out
            .used
            .insert_no_overwrite(self.cursor, pos)
            .map_err(|(addr, _)| Error::AddressConflict(addr))?;
        self.out.lines.push(line);
        self.cursor += 1;
        Ok(())
    }

    fn check(&self, segment: usize, expected: u32) -> Result<(), Error> {
        if self.cursor != expected {
            return Err(Error::SolverInconsistency {
                segment,
                expected,
                actual: self.cursor,
            });
        }
        Ok(())
    }
}

pub fn materialize(
    lines: &[Line],
    segments: &Segments,
    labels: &LabelSegments,
    solution: &Solution,
    table: &ImmTable,
    config: &Config,
) -> Result<Assembled, Error> {
    if segments.len() != solution.sections.len() {
        return Err(Error::SolverInconsistency {
            segment: segments.len(),
            expected: segments.len() as u32,
            actual: solution.sections.len() as u32,
        });
    }

    let start = solution
        .sections
        .first()
        .map_or(config.starting_address, |s| s.address);
    let mut emitter = Emitter {
        out: Assembled::default(),
        cursor: start,
    };

    for (segment, section) in segments.iter().zip(&solution.sections) {
        emitter.check(segment.id, section.address)?;
        let body = &lines[segment.lines.clone()];

        match (body.split_last(), section.jump_target_address) {
            (Some((branch, rest)), Some(target)) if branch.is_branch() => {
                for line in rest {
                    emitter.emit(line.clone())?;
                }

                let sequence = u16::try_from(target)
                    .ok()
                    .and_then(|value| table.sequence(value))
                    .ok_or(Error::ImmTableGap(target))?;
                let synthesized = (sequence.len() + config.jump_setup.len()) as u32;
                let expected = section.jump_length.unwrap_or(0);
                if synthesized != expected {
                    return Err(Error::SolverInconsistency {
                        segment: segment.id,
                        expected,
                        actual: synthesized,
                    });
                }

                // Synthesized lines belong to the branch's segment.
                let synthesize = |text: &str, origin| Line {
                    segment: branch.segment,
                    ..Line::synthesized(branch.index, text, origin)
                };
                for op in sequence {
                    emitter.emit(synthesize(&op.to_string(), Origin::ImmLoad))?;
                }
                for text in &config.jump_setup {
                    emitter.emit(synthesize(text, Origin::JumpSetup))?;
                }
                emitter.emit(branch.clone())?;
                for _ in 0..section.padding {
                    emitter.emit(synthesize(&config.filler, Origin::Filler))?;
                }
            }
            (_, None) => {
                for line in body {
                    emitter.emit(line.clone())?;
                }
            }
            // A jump section for a segment without a branch, or the reverse.
            _ => {
                return Err(Error::SolverInconsistency {
                    segment: segment.id,
                    expected: segment.len(),
                    actual: section.length,
                })
            }
        }

        emitter.check(segment.id, section.end())?;
    }
    emitter.check(0, solution.end())?;

    for (name, id) in labels.iter() {
        let address = segments
            .position(*id)
            .and_then(|pos| solution.sections.get(pos))
            .map(|section| section.address);
        if let Some(address) = address {
            emitter.out.labels.insert(name.clone(), address);
        }
    }

    let mut out = emitter.out;
    out.end = emitter.cursor;
    log::debug!(
        "materialized {} lines at 0x{:04X}..0x{:04X}",
        out.lines.len(),
        start,
        out.end
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Section;
    use crate::{label, segment};
    use arch::op::MicroOp;

    fn table() -> ImmTable {
        // Every value costs one word except 0x0002, which costs two.
        let seqs = (0..arch::imm::IMM_VALUES)
            .map(|v| {
                Some(if v == 2 {
                    vec![MicroOp::Clear, MicroOp::AddImm(2)]
                } else {
                    vec![MicroOp::Clear]
                })
            })
            .collect();
        ImmTable::new(seqs).unwrap()
    }

    fn program() -> (Vec<Line>, Segments, LabelSegments) {
        let mut program = crate::line::Program::new();
        program.push(Line::body(0, "nop"));
        program.label("here");
        program.push(Line::branch(2, "brc true here", "here"));
        let segments = segment::mark(&mut program.lines, &program.labels);
        let labels = label::resolve(&program.lines, &program.labels, &segments).unwrap();
        (program.lines, segments, labels)
    }

    fn solution(jump_length: u32, padding: u32) -> Solution {
        let sections = vec![
            Section {
                address: 1,
                length: 1,
                padding: 0,
                jump_target_address: None,
                jump_length: None,
            },
            Section {
                address: 2,
                length: 1 + jump_length + padding,
                padding,
                jump_target_address: Some(2),
                jump_length: Some(jump_length),
            },
        ];
        Solution::new(sections, padding, 1)
    }

    #[test]
    fn emits_load_branch_and_padding() {
        let (lines, segments, labels) = program();
        let out = materialize(
            &lines,
            &segments,
            &labels,
            &solution(2, 1),
            &table(),
            &Config::default(),
        )
        .unwrap();

        let text: Vec<_> = out.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(text, vec!["nop", "lda 0", "addi 2", "brc true here", "nop"]);
        let origins: Vec<_> = out.lines.iter().map(|l| l.origin).collect();
        assert_eq!(
            origins,
            vec![
                Origin::Source,
                Origin::ImmLoad,
                Origin::ImmLoad,
                Origin::Source,
                Origin::Filler
            ]
        );
        assert_eq!(out.end, 6);
        assert_eq!(out.labels["here"], 2);
        assert_eq!(out.at(4).map(|l| l.text.as_str()), Some("brc true here"));
        assert_eq!(out.lines[2].index, 2);
        let segments: Vec<_> = out.lines.iter().map(|l| l.segment).collect();
        assert_eq!(segments, vec![Some(1), Some(0), Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn disagreeing_jump_length_is_fatal() {
        let (lines, segments, labels) = program();
        let err = materialize(
            &lines,
            &segments,
            &labels,
            &solution(1, 0),
            &table(),
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::SolverInconsistency {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }
}
