//! Segment builder.
//!
//! Splits the instruction stream into maximal runs that end at a branch or
//! right before a labelled instruction. Ids count from the end of the
//! program: segment 0 is the last one.

use crate::line::Line;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: usize,
    /// Indices into the instruction stream.
    pub lines: Range<usize>,
    /// Label of the terminal branch.
    pub branch: Option<String>,
}

impl Segment {
    /// Fixed body length, including a terminal branch.
    pub fn len(&self) -> u32 {
        self.lines.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Segments in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments(Vec<Segment>);

impl Segments {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    /// Program-order position of segment `id`.
    pub fn position(&self, id: usize) -> Option<usize> {
        (id < self.0.len()).then(|| self.0.len() - 1 - id)
    }

    pub fn get(&self, id: usize) -> Option<&Segment> {
        self.position(id).map(|pos| &self.0[pos])
    }
}

/// Assign a segment id to every line.
///
/// Stacked labels and a label right after a branch share one boundary, so no
/// empty segment appears inside the program. A label past the last
/// instruction gets a zero-length trailing segment.
pub fn mark(lines: &mut [Line], labels: &IndexMap<String, usize>) -> Segments {
    let len = lines.len();
    let mut starts = BTreeSet::new();
    let mut trailing = false;

    for &pos in labels.values() {
        let start = pos.saturating_sub(1);
        if start >= len {
            trailing = true;
        } else {
            starts.insert(start);
        }
    }
    for (idx, line) in lines.iter().enumerate() {
        if line.is_branch() && idx + 1 < len {
            starts.insert(idx + 1);
        }
    }
    if len > 0 {
        starts.insert(0);
    }

    let mut ranges: Vec<Range<usize>> = starts
        .iter()
        .zip(starts.iter().skip(1).chain(std::iter::once(&len)))
        .map(|(&begin, &end)| begin..end)
        .collect();
    if trailing {
        ranges.push(len..len);
    }

    let count = ranges.len();
    let segments = ranges
        .into_iter()
        .enumerate()
        .map(|(pos, range)| {
            let id = count - 1 - pos;
            for line in &mut lines[range.clone()] {
                line.segment = Some(id);
            }
            let branch = range
                .clone()
                .last()
                .and_then(|last| lines[last].label())
                .map(str::to_string);
            Segment {
                id,
                lines: range,
                branch,
            }
        })
        .collect();

    Segments(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Program;

    fn program(src: &[&str]) -> Program {
        let mut program = Program::new();
        for (idx, text) in src.iter().enumerate() {
            if let Some(label) = text.strip_suffix(':') {
                program.label(label);
            } else if let Some(target) = text.strip_prefix("brc true ") {
                program.push(Line::branch(idx, text, target));
            } else {
                program.push(Line::body(idx, text));
            }
        }
        program
    }

    fn shape(src: &[&str]) -> Vec<(usize, u32, Option<String>)> {
        let mut program = program(src);
        let segments = mark(&mut program.lines, &program.labels);
        segments
            .iter()
            .map(|s| (s.id, s.len(), s.branch.clone()))
            .collect()
    }

    #[test]
    fn empty_program_has_no_segments() {
        assert!(shape(&[]).is_empty());
    }

    #[test]
    fn branch_ends_segment() {
        let src = ["nop", "L:", "nop", "nop", "brc true L", "L2:", "nop", "nop"];
        assert_eq!(
            shape(&src),
            vec![(2, 1, None), (1, 3, Some("L".into())), (0, 2, None)]
        );
    }

    #[test]
    fn label_before_branch_splits_it_off() {
        let src = ["nop", "L:", "nop", "nop", "L2:", "brc true L", "nop"];
        assert_eq!(
            shape(&src),
            vec![(3, 1, None), (2, 2, None), (1, 1, Some("L".into())), (0, 1, None)]
        );
    }

    #[test]
    fn stacked_labels_share_a_boundary() {
        let src = ["nop", "L:", "L2:", "nop", "brc true L", "nop", "nop"];
        assert_eq!(
            shape(&src),
            vec![(2, 1, None), (1, 2, Some("L".into())), (0, 2, None)]
        );
    }

    #[test]
    fn label_at_start_and_end() {
        let src = ["top:", "nop", "brc true end", "end:"];
        assert_eq!(
            shape(&src),
            vec![(1, 2, Some("end".into())), (0, 0, None)]
        );
    }

    #[test]
    fn ids_are_written_back() {
        let mut program = program(&["nop", "brc true a", "a:", "nop"]);
        mark(&mut program.lines, &program.labels);
        let ids: Vec<_> = program.lines.iter().map(|l| l.segment).collect();
        assert_eq!(ids, vec![Some(1), Some(1), Some(0)]);
    }
}
