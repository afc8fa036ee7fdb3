use arch::imm::{ImmError, ImmTable, IMM_VALUES};
use arch::op::{replay, MicroOp};
use once_cell::sync::Lazy;

static TABLE: Lazy<ImmTable> = Lazy::new(ImmTable::generate);

#[test]
fn generated_table_covers_every_value() {
    assert_eq!(TABLE.coverage(), IMM_VALUES);
    assert_eq!(TABLE.shortest(), 1);
    assert!(TABLE.longest() > TABLE.shortest());
    assert!(TABLE.longest() <= 16);
}

#[test]
fn generated_sequences_load_their_value() {
    for value in [0u16, 1, 7, 8, 0x00FF, 0x0100, 0x1234, 0x8000, 0xABCD, 0xFFFF] {
        let seq = TABLE.sequence(value).unwrap();
        assert_eq!(seq[0], MicroOp::Clear);
        assert_eq!(replay(seq), value, "{:?}", seq);
        assert_eq!(TABLE.cost(value), Some(seq.len() as u32));
    }
}

#[test]
fn generated_sequences_are_shortest() {
    // Zero is the cleared state, small values need exactly one addi.
    assert_eq!(TABLE.cost(0), Some(1));
    assert_eq!(TABLE.cost(5), Some(2));
    // addi -1, sta seg, addi -7
    assert_eq!(TABLE.cost(0xFFF8), Some(4));
}

#[test]
fn json_artifact_round_trips() {
    let json = r#"{ "0": ["lda 0"], "3": ["lda 0", "addi 3"], "771": ["lda 0", "addi 3", "sta seg"] }"#;
    let table = ImmTable::from_json(json).unwrap();
    assert_eq!(table.coverage(), 3);
    assert_eq!(table.cost(771), Some(3));
    assert_eq!(table.cost(4), None);
    assert_eq!(table.longest(), 3);
    assert_eq!(table.shortest(), 1);

    let again = ImmTable::from_json(&table.to_json().unwrap()).unwrap();
    assert_eq!(again.sequence(771), table.sequence(771));
}

#[test]
fn json_artifact_is_validated() {
    assert!(matches!(
        ImmTable::from_json(r#"{ "4": ["lda 0", "addi 3"] }"#),
        Err(ImmError::WrongValue(4, 3))
    ));
    assert!(matches!(
        ImmTable::from_json(r#"{ "4": ["lda 0", "jump 4"] }"#),
        Err(ImmError::InvalidSequence(4, _))
    ));
    assert!(matches!(
        ImmTable::from_json(r#"{ "x": ["lda 0"] }"#),
        Err(ImmError::InvalidKey(_))
    ));
    assert!(matches!(ImmTable::from_json("{}"), Err(ImmError::Empty)));
}
