//! Word-level SPIR-V assembly for scenario modules.
//!
//! The repo carries no assembler, so test modules are spelled out
//! instruction by instruction; the helpers here only handle the header
//! and the word-count packing.

use spv_lint::Word;

pub struct Assembler {
    words: Vec<u32>,
}

impl Assembler {
    /// Header for the given id bound, SPIR-V 1.0.
    pub fn new(bound: Word) -> Self {
        Assembler {
            words: vec![spirv::MAGIC_NUMBER, 0x0001_0000, 0, bound, 0],
        }
    }

    pub fn op(&mut self, op: spirv::Op, operands: &[u32]) -> &mut Self {
        self.words
            .push(((operands.len() as u32 + 1) << 16) | op as u32);
        self.words.extend_from_slice(operands);
        self
    }

    pub fn finish(&self) -> Vec<u32> {
        self.words.clone()
    }
}

/// Pack a string operand the way the binary form does: UTF-8, NUL
/// terminated, little-endian within each word.
pub fn string_words(text: &str) -> Vec<u32> {
    let mut bytes: Vec<u8> = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
