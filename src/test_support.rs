// src/test_support.rs
//
// Fixture helpers for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::table::ConversionTable;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The reference table (led/config, proximity/config, sensors/update)
pub fn reference_table() -> Arc<ConversionTable> {
    Arc::new(ConversionTable::load(&fixture("conv_ok.json")).expect("conv_ok.json"))
}

/// A valid led/config command
pub const LED_COMMAND: &str =
    r##"{"group_id":1,"intensity":128,"color":"#00FDFF","mode":"ON","interval":10}"##;
