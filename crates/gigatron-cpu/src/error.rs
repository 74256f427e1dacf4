//! CPU construction and ROM-loading failures.

use std::fmt;

/// Failure modes for constructing or loading a [`crate::Cpu`].
///
/// Instruction execution itself has no error path — every opcode/mode
/// combination is total and every RAM access is masked into range — so
/// this only covers ROM I/O and sizing.
#[derive(Debug)]
pub enum CpuError {
    /// The requested ROM/RAM address width doesn't fit a `u32` mask.
    AddrWidthTooLarge { width: u32 },
    /// Reading the ROM file failed.
    Io(std::io::Error),
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuError::AddrWidthTooLarge { width } => {
                write!(f, "address width {width} exceeds 32 bits")
            }
            CpuError::Io(e) => write!(f, "ROM I/O error: {e}"),
        }
    }
}

impl std::error::Error for CpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CpuError::Io(e) => Some(e),
            CpuError::AddrWidthTooLarge { .. } => None,
        }
    }
}

impl From<std::io::Error> for CpuError {
    fn from(e: std::io::Error) -> Self {
        CpuError::Io(e)
    }
}
