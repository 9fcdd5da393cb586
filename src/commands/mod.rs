//! Command handlers: one function per CLI operation (spec §6). Each takes
//! already-parsed arguments plus the output `Format` and prints its own
//! result via [`crate::output::emit_ok`], mirroring how the teacher's
//! `commands::*::run` functions own their own output rather than returning a
//! value for `main` to render.

pub mod config_cmds;
pub mod epic;
pub mod query;
pub mod review_cmds;
pub mod task;

use std::io::Read;

use crate::error::{FlowError, Result};

/// Resolve a `--file`/`--description`/`--acceptance`/`--reason-file`-style
/// argument: `-` means "read from stdin" (spec §6's here-document carve-out),
/// anything else is a path read relative to the current directory.
pub fn read_input(value: &str) -> Result<String> {
    if value == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(FlowError::Io)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(value).map_err(FlowError::Io)
    }
}
