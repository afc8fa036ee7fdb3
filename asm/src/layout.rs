use crate::error::Error;
use crate::label::LabelSegments;
use crate::line::Line;
use crate::segment::Segments;

/// One entry of the layout problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub fixed_length: u32,
    /// Position (in the same problem) of the segment this one jumps to.
    pub jump_target_index: Option<usize>,
}

impl Descriptor {
    pub fn body(fixed_length: u32) -> Self {
        Self {
            fixed_length,
            jump_target_index: None,
        }
    }

    pub fn jump(fixed_length: u32, target: usize) -> Self {
        Self {
            fixed_length,
            jump_target_index: Some(target),
        }
    }
}

/// Position-indexed layout problem, in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problem(pub Vec<Descriptor>);

impl Problem {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.0.iter()
    }

    /// Every jump must point at an entry of this problem.
    pub fn check_targets(&self) -> Result<(), Error> {
        for (entry, desc) in self.iter().enumerate() {
            if let Some(target) = desc.jump_target_index.filter(|&t| t >= self.len()) {
                return Err(Error::JumpTargetOutOfRange { entry, target });
            }
        }
        Ok(())
    }
}

/// Replace label references with problem positions.
pub fn translate(
    lines: &[Line],
    segments: &Segments,
    labels: &LabelSegments,
) -> Result<Problem, Error> {
    let problem = segments
        .iter()
        .map(|segment| {
            let target = match &segment.branch {
                None => None,
                Some(label) => {
                    let unresolved = || {
                        let line = segment
                            .lines
                            .clone()
                            .last()
                            .map_or(0, |idx| lines[idx].index);
                        Error::UnresolvedLabel(label.clone(), line)
                    };
                    let id = labels.get(label).ok_or_else(unresolved)?;
                    Some(segments.position(id).ok_or_else(unresolved)?)
                }
            };
            Ok(Descriptor {
                fixed_length: segment.len(),
                jump_target_index: target,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    log::debug!("layout problem: {:?}", problem);
    Ok(Problem(problem))
}
