use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Smallest immediate accepted by `addi`.
pub const ADDI_MIN: i8 = -8;
/// Largest immediate accepted by `addi`.
pub const ADDI_MAX: i8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
pub enum OpKind {
    LDA,
    ADDI,
    ADD,
    NAND,
    STA,
}

impl OpKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }
}

/// Registers touched while materializing an immediate.
/// `acc` holds the low byte and `seg` the high byte of the loaded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Acc {
    pub acc: u8,
    pub seg: u8,
}

impl Acc {
    pub fn value(&self) -> u16 {
        (self.seg as u16) << 8 | self.acc as u16
    }
}

/// One word of an immediate-load sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MicroOp {
    /// `lda 0`
    Clear,
    /// `addi k`
    AddImm(i8),
    /// `add acc`, doubles the accumulator
    Double,
    /// `nand acc`, inverts the accumulator
    Invert,
    /// `sta seg`
    StoreSeg,
}

impl MicroOp {
    /// Every distinct operation, in the order the table generator tries them.
    pub fn all() -> Vec<MicroOp> {
        let mut ops = vec![MicroOp::Clear, MicroOp::Double, MicroOp::Invert, MicroOp::StoreSeg];
        ops.extend((ADDI_MIN..=ADDI_MAX).map(MicroOp::AddImm));
        ops
    }

    pub fn kind(&self) -> OpKind {
        match self {
            MicroOp::Clear => OpKind::LDA,
            MicroOp::AddImm(_) => OpKind::ADDI,
            MicroOp::Double => OpKind::ADD,
            MicroOp::Invert => OpKind::NAND,
            MicroOp::StoreSeg => OpKind::STA,
        }
    }

    pub fn apply(&self, state: Acc) -> Acc {
        match self {
            MicroOp::Clear => Acc { acc: 0, ..state },
            MicroOp::AddImm(k) => Acc {
                acc: state.acc.wrapping_add(*k as u8),
                ..state
            },
            MicroOp::Double => Acc {
                acc: state.acc << 1,
                ..state
            },
            MicroOp::Invert => Acc {
                acc: !state.acc,
                ..state
            },
            MicroOp::StoreSeg => Acc {
                seg: state.acc,
                ..state
            },
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let head = words.first().ok_or_else(|| format!("Empty operation"))?;
        let arg = words.get(1).copied();
        if words.len() > 2 {
            return Err(format!("Too many arguments: {s}"));
        }
        match (OpKind::parse(head)?, arg) {
            (OpKind::LDA, Some("0")) => Ok(MicroOp::Clear),
            (OpKind::ADDI, Some(imm)) => match imm.parse::<i8>() {
                Ok(k) if (ADDI_MIN..=ADDI_MAX).contains(&k) => Ok(MicroOp::AddImm(k)),
                _ => Err(format!("Immediate out of range: {imm}")),
            },
            (OpKind::ADD, Some("acc")) => Ok(MicroOp::Double),
            (OpKind::NAND, Some("acc")) => Ok(MicroOp::Invert),
            (OpKind::STA, Some("seg")) => Ok(MicroOp::StoreSeg),
            (kind, _) => Err(format!("Unsupported operand for {kind}: {s}")),
        }
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().to_string().to_lowercase();
        match self {
            MicroOp::Clear => write!(f, "{} 0", name),
            MicroOp::AddImm(k) => write!(f, "{} {}", name, k),
            MicroOp::Double | MicroOp::Invert => write!(f, "{} acc", name),
            MicroOp::StoreSeg => write!(f, "{} seg", name),
        }
    }
}

/// Run `ops` from the cleared register pair and return the loaded value.
pub fn replay(ops: &[MicroOp]) -> u16 {
    ops.iter()
        .fold(Acc::default(), |state, op| op.apply(state))
        .value()
}

#[test]
fn test() {
    assert_eq!(MicroOp::parse("lda 0"), Ok(MicroOp::Clear));
    assert_eq!(MicroOp::parse("ADDI -8"), Ok(MicroOp::AddImm(-8)));
    assert!(MicroOp::parse("addi 8").is_err());
    assert!(MicroOp::parse("hoge").is_err());
    for op in MicroOp::all() {
        assert_eq!(MicroOp::parse(&op.to_string()), Ok(op));
    }
    assert_eq!(
        replay(&[MicroOp::AddImm(3), MicroOp::StoreSeg, MicroOp::AddImm(-1)]),
        0x0302
    );
}
