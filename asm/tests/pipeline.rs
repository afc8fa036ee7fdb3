use arch::imm::ImmTable;
use arch::op::{replay, MicroOp};
use once_cell::sync::Lazy;
use wvasm::line::Origin;
use wvasm::{assemble, listing, source, Assembled, Config, Error};

static TABLE: Lazy<ImmTable> = Lazy::new(ImmTable::generate);

const COUNTDOWN: &str = "\
start:
    lda 0
    addi 7
loop:
    addi -1
    brc zero done   ; leave when acc hits zero
    nop
    brc true loop
done:
    nop
";

fn build(src: &str, config: &Config) -> Result<Assembled, Error> {
    let program = source::parse(src, config)?;
    assemble(program, &TABLE, config)
}

/// Every line sits at the next address and is registered in the address map.
fn check_addresses(assembled: &Assembled, start: u32) {
    for (pos, line) in assembled.lines.iter().enumerate() {
        let addr = start + pos as u32;
        assert_eq!(line.address, Some(addr));
        assert_eq!(assembled.used.get_by_left(&addr), Some(&pos));
    }
    assert_eq!(assembled.end, start + assembled.lines.len() as u32);
}

/// Value loaded right before every branch, paired with its label.
fn loaded_targets(assembled: &Assembled) -> Vec<(String, u16)> {
    let mut ops = vec![];
    let mut out = vec![];
    for line in &assembled.lines {
        match line.origin {
            Origin::ImmLoad => ops.push(MicroOp::parse(&line.text).unwrap()),
            Origin::Source if line.is_branch() => {
                out.push((line.label().unwrap().to_string(), replay(&ops)));
                ops.clear();
            }
            _ => {}
        }
    }
    out
}

#[test]
fn every_branch_loads_its_target() {
    let config = Config::default();
    let assembled = build(COUNTDOWN, &config).unwrap();
    check_addresses(&assembled, 0);

    let targets = loaded_targets(&assembled);
    assert_eq!(targets.len(), 2);
    for (label, value) in targets {
        assert_eq!(assembled.labels[&label], value as u32, "{label}");
    }
    assert_eq!(assembled.labels["start"], 0);
    assert_eq!(assembled.labels["loop"], 2);
    assert_eq!(assembled.at(2).map(|l| l.text.as_str()), Some("addi -1"));
}

#[test]
fn source_lines_keep_their_order() {
    let assembled = build(COUNTDOWN, &Config::default()).unwrap();
    let source: Vec<_> = assembled
        .lines
        .iter()
        .filter(|l| l.origin == Origin::Source)
        .map(|l| l.index)
        .collect();
    assert_eq!(source, vec![1, 2, 4, 5, 6, 7, 9]);
}

#[test]
fn starting_address_is_honored() {
    let config = Config {
        starting_address: 0x0200,
        ..Config::default()
    };
    let assembled = build(COUNTDOWN, &config).unwrap();
    check_addresses(&assembled, 0x0200);
    assert_eq!(assembled.labels["start"], 0x0200);
    for (label, value) in loaded_targets(&assembled) {
        assert_eq!(assembled.labels[&label], value as u32);
    }
}

#[test]
fn undefined_label_fails_before_layout() {
    let err = build("nop\n\nbrc zero nowhere\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::UnresolvedLabel(ref l, 2) if l == "nowhere"));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn empty_program_assembles_to_nothing() {
    let config = Config {
        starting_address: 0x10,
        ..Config::default()
    };
    let assembled = build("; nothing here\n", &config).unwrap();
    assert!(assembled.is_empty());
    assert!(assembled.labels.is_empty());
    assert_eq!(assembled.end, 0x10);
}

#[test]
fn trailing_label_points_past_the_program() {
    let assembled = build("nop\nbrc true end\nend:\n", &Config::default()).unwrap();
    check_addresses(&assembled, 0);
    assert_eq!(assembled.labels["end"], assembled.end);
    assert_eq!(
        loaded_targets(&assembled),
        vec![("end".to_string(), assembled.end as u16)]
    );
}

#[test]
fn jump_setup_sits_between_load_and_branch() {
    let config = Config {
        jump_setup: vec!["sta pc".to_string()],
        ..Config::default()
    };
    let assembled = build(COUNTDOWN, &config).unwrap();
    check_addresses(&assembled, 0);

    for (pos, line) in assembled.lines.iter().enumerate() {
        if line.is_branch() {
            let setup = &assembled.lines[pos - 1];
            assert_eq!(setup.origin, Origin::JumpSetup);
            assert_eq!(setup.text, "sta pc");
            assert_eq!(setup.index, line.index);
            assert_eq!(assembled.lines[pos - 2].origin, Origin::ImmLoad);
        }
    }
}

#[test]
fn unoptimized_jumps_reserve_the_longest_load() {
    let config = Config {
        optimize: false,
        filler: "add r0".to_string(),
        ..Config::default()
    };
    let assembled = build(COUNTDOWN, &config).unwrap();
    check_addresses(&assembled, 0);

    let synthesized = |index: usize| {
        assembled
            .lines
            .iter()
            .filter(|l| l.origin != Origin::Source && l.index == index)
            .count() as u32
    };
    // Both branches: `brc zero done` on line 5, `brc true loop` on line 7.
    assert_eq!(synthesized(5), TABLE.longest());
    assert_eq!(synthesized(7), TABLE.longest());
    assert!(assembled
        .lines
        .iter()
        .filter(|l| l.origin == Origin::Filler)
        .all(|l| l.text == "add r0"));
    for (label, value) in loaded_targets(&assembled) {
        assert_eq!(assembled.labels[&label], value as u32);
    }
}

/// `count` guarded exits, all to the same label.
fn exits(count: usize) -> String {
    let mut src = String::new();
    for k in 0..count {
        src += &format!("    addi {}\n    brc zero done\n", k + 1);
    }
    src + "done:\n    nop\n"
}

#[test]
fn many_exits_to_one_label_assemble() {
    let src = exits(24);
    for optimize in [true, false] {
        let config = Config {
            optimize,
            timeout_ms: Some(500),
            final_timeout_ms: Some(30_000),
            ..Config::default()
        };
        assert!(config.final_buffer >= TABLE.longest() - TABLE.shortest());
        let assembled = build(&src, &config).unwrap();
        check_addresses(&assembled, 0);

        let targets = loaded_targets(&assembled);
        assert_eq!(targets.len(), 24);
        for (label, value) in targets {
            assert_eq!(assembled.labels[&label], value as u32);
        }
    }
}

#[test]
fn trailing_label_may_sit_at_the_top_of_memory() {
    let src = "    nop\n".repeat(16) + "end:\n";
    for optimize in [true, false] {
        let config = Config {
            starting_address: 0xFFF0,
            optimize,
            ..Config::default()
        };
        let assembled = build(&src, &config).unwrap();
        assert_eq!(assembled.end, 0x10000);
        assert_eq!(assembled.labels["end"], 0x10000);
    }

    let src = "    nop\n".repeat(17) + "end:\n";
    for optimize in [true, false] {
        let config = Config {
            starting_address: 0xFFF0,
            optimize,
            ..Config::default()
        };
        let err = build(&src, &config).unwrap_err();
        assert!(matches!(err, Error::AddressOverflow(0x10001)));
    }
}

#[test]
fn synthesized_lines_belong_to_their_branch_segment() {
    let assembled = build(COUNTDOWN, &Config::default()).unwrap();
    for line in assembled.lines.iter().filter(|l| l.origin != Origin::Source) {
        let branch = assembled
            .lines
            .iter()
            .find(|l| l.origin == Origin::Source && l.index == line.index)
            .unwrap();
        assert!(line.segment.is_some());
        assert_eq!(line.segment, branch.segment);
    }
}

#[test]
fn listing_and_symbols_follow_the_layout() {
    let assembled = build(COUNTDOWN, &Config::default()).unwrap();
    let text = listing::render(&assembled);
    assert!(text.starts_with("start:\n0000    lda 0\n0001    addi 7\nloop:\n0002    addi -1\n"));
    assert_eq!(
        text.lines().filter(|l| !l.ends_with(':')).count(),
        assembled.len()
    );

    let yaml = listing::SymbolMap::new(&assembled).to_yaml();
    assert!(yaml.contains("loop:\n  address: 2\n"));
}
