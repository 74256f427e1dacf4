//! GT1 program format and the serial-protocol loader that streams it
//! into a running Gigatron through the input port.

mod gt1;
mod loader;

pub use gt1::{parse_gt1, Gt1Program, Gt1Segment};
pub use loader::{Loader, LoaderState};

/// Parse a GT1 program from a file on disk.
pub fn load_gt1_file(path: &std::path::Path) -> std::io::Result<Option<Gt1Program>> {
    let bytes = std::fs::read(path)?;
    Ok(parse_gt1(&bytes))
}
