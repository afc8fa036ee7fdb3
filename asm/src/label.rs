use crate::error::Error;
use crate::line::Line;
use crate::segment::Segments;
use indexmap::IndexMap;

/// Label -> id of the segment that starts right after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSegments(IndexMap<String, usize>);

impl LabelSegments {
    pub fn get(&self, label: &str) -> Option<usize> {
        self.0.get(label).copied()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, usize> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve every label to a segment id and check that every branch target exists.
/// `lines` must already carry their segment ids.
pub fn resolve(
    lines: &[Line],
    labels: &IndexMap<String, usize>,
    segments: &Segments,
) -> Result<LabelSegments, Error> {
    let mut resolved = IndexMap::new();
    for (name, &pos) in labels {
        let id = match lines.get(pos.saturating_sub(1)) {
            Some(line) => line.segment,
            // Past the last instruction: the trailing segment, which is always 0.
            None => (!segments.is_empty()).then_some(0),
        };
        if let Some(id) = id {
            resolved.insert(name.clone(), id);
        }
    }

    for line in lines {
        if let Some(label) = line.label() {
            if !resolved.contains_key(label) {
                return Err(Error::UnresolvedLabel(label.to_string(), line.index));
            }
        }
    }

    log::debug!("label segments: {:?}", resolved);
    Ok(LabelSegments(resolved))
}
