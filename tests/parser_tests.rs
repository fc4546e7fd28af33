mod common;

use common::module_from_wat;
use ferrule::{parse, validate, ParseError};
use rstest::rstest;

#[rstest]
#[case::empty("(module)")]
#[case::memory_and_data(r#"(module (memory 1 2) (data (i32.const 8) "hello"))"#)]
#[case::table_and_elements("(module (table 2 funcref) (func $f) (elem (i32.const 0) $f $f))")]
#[case::globals("(module (global $g (mut i64) (i64.const -1)) (global i32 (i32.const 7)))")]
#[case::start("(module (func $init) (start $init))")]
#[case::imports(r#"(module (import "env" "log" (func (param i32))) (func (export "run") i32.const 1 call 0))"#)]
#[case::nested_control(
    "(module (func (param i32) (result i32)
        block (result i32)
            loop
                local.get 0
                br_if 0
            end
            local.get 0
            if (result i32) i32.const 1 else i32.const 2 end
        end))"
)]
fn valid_modules(#[case] wat: &str) {
    let bytes = wat::parse_str(wat).expect("Failed to parse WAT");
    assert!(validate(&bytes));
}

#[rstest]
#[case::empty(&[], ParseError::InvalidMagic)]
#[case::bad_magic(&[0x00, 0x61, 0x73, 0x6e, 0x01, 0x00, 0x00, 0x00], ParseError::InvalidMagic)]
#[case::bad_version(&[0x00, 0x61, 0x73, 0x6d, 0x02, 0x00, 0x00, 0x00], ParseError::UnsupportedVersion(2))]
#[case::unknown_section(&[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x0d, 0x00], ParseError::UnknownSection(13))]
fn malformed_binaries(#[case] bytes: &[u8], #[case] expected: ParseError) {
    assert_eq!(parse(bytes).err(), Some(expected));
    assert!(!validate(bytes));
}

#[test]
fn truncated_code_is_rejected() {
    // type () -> i32, one function, body i32.const 42
    let bytes = hex::decode("0061736d010000000105016000017f030201000a06010400412a0b").unwrap();
    let code_start = bytes.len() - 8;
    for len in code_start..bytes.len() {
        assert!(!validate(&bytes[..len]), "prefix of {} bytes accepted", len);
    }
    assert!(validate(&bytes));
}

#[test]
fn exports_are_indexed_by_name() {
    let module = module_from_wat(
        r#"(module
            (import "env" "f" (func))
            (func (export "first"))
            (func (export "second")))"#,
    );
    assert_eq!(module.imported_function_count(), 1);
    assert_eq!(module.function_count(), 3);
    assert_eq!(module.find_exported_function("second"), Some(2));
    assert_eq!(module.find_exported_function("missing"), None);
}

#[test]
fn data_count_must_match_data_section() {
    // header, then a memory section declaring one page
    let prefix = "0061736d010000000503010001";
    let matching = hex::decode(format!("{prefix}0c01010b07010041000b012a")).unwrap();
    assert!(validate(&matching));

    // count 1 with an empty data section, with no data section, and count 2
    // with a single segment
    for tail in ["0c01010b0100", "0c0101", "0c01020b07010041000b012a"] {
        let bytes = hex::decode(format!("{prefix}{tail}")).unwrap();
        assert_eq!(
            parse(&bytes).err(),
            Some(ParseError::Malformed("data count and data section have inconsistent lengths")),
            "{tail}"
        );
    }
}
