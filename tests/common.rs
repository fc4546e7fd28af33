//! Common test utilities shared between integration tests

#![allow(dead_code)]

use ferrule::{instantiate_with_config, parse, Config, ExternalFunction, Instance, Module};

/// Decode a module given as a hex string.
pub fn module_from_hex(hex_str: &str) -> Module {
    let bytes = hex::decode(hex_str).expect("Failed to decode hex");
    parse(&bytes).expect("Failed to parse module")
}

/// Assemble and decode a module written in the text format.
pub fn module_from_wat(wat: &str) -> Module {
    let bytes = wat::parse_str(wat).expect("Failed to parse WAT");
    parse(&bytes).expect("Failed to parse module")
}

pub fn instance_from_wat(wat: &str, imports: Vec<ExternalFunction>, config: Config) -> Instance {
    instantiate_with_config(module_from_wat(wat), imports, config).expect("Failed to instantiate")
}
