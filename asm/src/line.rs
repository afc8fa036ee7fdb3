use indexmap::IndexMap;

/// How a line takes part in layout. Decided once when the line is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Body,
    Branch { label: String },
}

/// Where a line in the final stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Source,
    /// Immediate load of a jump target
    ImmLoad,
    /// Configured instructions between the load and the branch
    JumpSetup,
    /// Padding
    Filler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Source line (0-based). Synthesized lines carry the index of their branch.
    pub index: usize,
    pub text: String,
    pub kind: LineKind,
    pub origin: Origin,
    pub segment: Option<usize>,
    pub address: Option<u32>,
}

impl Line {
    pub fn body(index: usize, text: &str) -> Self {
        Self::new(index, text, LineKind::Body, Origin::Source)
    }

    pub fn branch(index: usize, text: &str, label: &str) -> Self {
        Self::new(
            index,
            text,
            LineKind::Branch {
                label: label.to_string(),
            },
            Origin::Source,
        )
    }

    pub fn synthesized(index: usize, text: &str, origin: Origin) -> Self {
        Self::new(index, text, LineKind::Body, origin)
    }

    fn new(index: usize, text: &str, kind: LineKind, origin: Origin) -> Self {
        Self {
            index,
            text: text.to_string(),
            kind,
            origin,
            segment: None,
            address: None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, LineKind::Branch { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Branch { label } => Some(label),
            LineKind::Body => None,
        }
    }
}

/// Matched instruction stream handed to the layout stages.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub lines: Vec<Line>,
    /// Label -> 1-based position of the instruction it precedes.
    pub labels: IndexMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `label` before the next pushed instruction.
    pub fn label(&mut self, label: &str) -> Option<usize> {
        self.labels.insert(label.to_string(), self.lines.len() + 1)
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }
}
