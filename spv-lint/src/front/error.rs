use super::ModuleState;
use crate::Word;

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid header")]
    InvalidHeader,
    #[error("unsupported SPIR-V version {0}.{1} for the Vulkan 1.2 environment")]
    UnsupportedVersion(u8, u8),
    #[error("invalid word count")]
    InvalidWordCount,
    #[error("incomplete data")]
    IncompleteData,
    #[error("unknown instruction {0}")]
    UnknownInstruction(u16),
    #[error("unsupported instruction {1:?} at {0:?}")]
    UnsupportedInstruction(ModuleState, spirv::Op),
    #[error("invalid operand count {1} for {0:?}")]
    InvalidOperandCount(spirv::Op, u16),
    #[error("invalid id %{0}")]
    InvalidId(Word),
    #[error("bad string")]
    BadString,
    #[error("{0:?} outside of a function")]
    OutsideFunction(spirv::Op),
    #[error("{0:?} inside a function but outside a block")]
    OutsideBlock(spirv::Op),
    #[error("nested function definition")]
    NestedFunction,
    #[error("unterminated function")]
    UnterminatedFunction,
    #[error("unterminated block %{0}")]
    UnterminatedBlock(Word),
}
