use crate::line::Origin;
use crate::materialize::Assembled;
use color_print::cprintln;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Labels grouped by the address they point at.
fn labels_at(assembled: &Assembled) -> HashMap<u32, Vec<&str>> {
    let mut map: HashMap<u32, Vec<&str>> = HashMap::new();
    for (name, addr) in &assembled.labels {
        map.entry(*addr).or_default().push(name);
    }
    map
}

/// Address-annotated listing, one instruction per line.
pub fn render(assembled: &Assembled) -> String {
    let labels = labels_at(assembled);
    let mut out = String::new();
    for line in &assembled.lines {
        let addr = line.address.unwrap_or_default();
        for name in labels.get(&addr).into_iter().flatten() {
            out.push_str(&format!("{}:\n", name));
        }
        out.push_str(&format!("{:04X}    {}\n", addr, line.text));
    }
    // Labels past the last instruction.
    for name in labels.get(&assembled.end).into_iter().flatten() {
        out.push_str(&format!("{}:\n", name));
    }
    out
}

/// Colored dump of the addressed stream.
pub fn dump(assembled: &Assembled) {
    let labels = labels_at(assembled);
    println!("+--[Addr]--+--[Line]--+------------------------------------------------------");
    for line in &assembled.lines {
        let addr = line.address.unwrap_or_default();
        for name in labels.get(&addr).into_iter().flatten() {
            cprintln!("|          |          | <g>{}:</>", name);
        }
        let seg = line.segment.map_or(String::new(), |s| format!("#{}", s));
        match line.origin {
            Origin::Source => cprintln!(
                "|  0x{:04X}  | {:>4} {:<3} |   {}",
                addr,
                line.index + 1,
                seg,
                line.text
            ),
            Origin::ImmLoad => cprintln!("|  0x{:04X}  |          |   <y>{}</>", addr, line.text),
            Origin::JumpSetup => cprintln!("|  0x{:04X}  |          |   <c>{}</>", addr, line.text),
            Origin::Filler => cprintln!("|  0x{:04X}  |          |   <dim>{}</>", addr, line.text),
        }
    }
    for name in labels.get(&assembled.end).into_iter().flatten() {
        cprintln!("|          |          | <g>{}:</>", name);
    }
    println!("+----------+----------+------------------------------------------------------");
    println!(
        "  {} words, 0x{:04X}..0x{:04X}",
        assembled.len(),
        assembled.lines.first().and_then(|l| l.address).unwrap_or(assembled.end),
        assembled.end
    );
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub address: u32,
}

/// Label -> address map written next to the listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct SymbolMap(pub BTreeMap<String, SymbolEntry>);

impl SymbolMap {
    pub fn new(assembled: &Assembled) -> Self {
        Self(
            assembled
                .labels
                .iter()
                .map(|(name, &address)| (name.clone(), SymbolEntry { address }))
                .collect(),
        )
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_else(|e| format!("# Error generating YAML: {}", e))
    }
}
