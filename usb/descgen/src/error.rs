use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::offsets::Target;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("a descriptor group is already open")]
    GroupAlreadyOpen,

    #[error("no descriptor group is open")]
    GroupNotOpen,

    #[error("a descriptor group was opened but never closed")]
    GroupNotClosed,

    #[error("descriptor group of {0} bytes does not fit wTotalLength")]
    GroupTooLong(usize),

    #[error("patch of {len} bytes at offset {offset} lies outside the {region}-byte region")]
    PatchOutOfRegion {
        offset: usize,
        len: usize,
        region: usize,
    },

    #[error("duplicate constant DESCR_{target}_{name}")]
    DuplicateConstant { target: Target, name: String },

    #[error("descriptor needs {len} bytes but the scratch buffer holds {capacity}")]
    ScratchOverflow { len: usize, capacity: usize },

    #[error("string descriptor {index} would be {len} bytes long (max 255)")]
    StringTooLong { index: u8, len: usize },

    #[error("string descriptor {index} contains non-ASCII text")]
    NonAsciiString { index: u8 },

    #[error("invalid {target} address bitwidth {bits}")]
    InvalidBitwidth { target: Target, bits: u8 },

    #[error("{target} image is {len} bytes but its memory only holds {capacity}")]
    RomOverflow {
        target: Target,
        len: usize,
        capacity: usize,
    },
}

impl Error {
    /// True for errors caused by driving the compiler incorrectly, as opposed to failing to
    /// create or write an artifact.
    pub fn is_misuse(&self) -> bool {
        !matches!(self, Self::Create { .. } | Self::Io(_))
    }
}
