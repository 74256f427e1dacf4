//! Composition-root failure modes.

use std::fmt;

use gigatron_cpu::CpuError;

#[derive(Debug)]
pub enum GigatronError {
    Cpu(CpuError),
    Io(std::io::Error),
    /// A GT1 file failed to parse (malformed segment stream or trailer).
    BadGt1,
}

impl fmt::Display for GigatronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GigatronError::Cpu(e) => write!(f, "{e}"),
            GigatronError::Io(e) => write!(f, "I/O error: {e}"),
            GigatronError::BadGt1 => write!(f, "malformed GT1 file"),
        }
    }
}

impl std::error::Error for GigatronError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GigatronError::Cpu(e) => Some(e),
            GigatronError::Io(e) => Some(e),
            GigatronError::BadGt1 => None,
        }
    }
}

impl From<CpuError> for GigatronError {
    fn from(e: CpuError) -> Self {
        GigatronError::Cpu(e)
    }
}

impl From<std::io::Error> for GigatronError {
    fn from(e: std::io::Error) -> Self {
        GigatronError::Io(e)
    }
}
