/*! SPIR-V binary front end.

Decodes a stream of 32-bit words into a [`Module`], accepting the
Vulkan 1.2 environment (SPIR-V 1.0 through 1.5). The decoder is
deliberately shallow: it splits every instruction into typed operands via
[`grammar`] and checks section ordering and basic structure, leaving full
validation to an upstream validator. Anything it cannot model is a decode
error rather than a guess.
!*/

mod error;
pub mod grammar;

pub use error::Error;

use crate::{BasicBlock, Function, Instruction, Module, ModuleHeader, Operand, Word};

use grammar::{Kind, Tail};

/// Highest SPIR-V minor version accepted for Vulkan 1.2.
const MAX_MINOR_VERSION: u8 = 5;

/// The section of the module the decoder is currently in.
///
/// Sections must appear in this order; seeing an instruction that belongs
/// to an earlier section is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModuleState {
    Empty,
    Capability,
    Extension,
    ExtInstImport,
    MemoryModel,
    EntryPoint,
    ExecutionMode,
    Debug,
    Annotation,
    Type,
    Function,
}

pub struct Frontend<I> {
    data: I,
    state: ModuleState,
    module: Module,
    function: Option<Function>,
    block: Option<BasicBlock>,
}

/// Decode a complete binary.
pub fn parse_words(words: &[u32]) -> Result<Module, Error> {
    Frontend::new(words.iter().cloned()).parse()
}

impl<I: Iterator<Item = u32>> Frontend<I> {
    pub fn new(data: I) -> Self {
        Frontend {
            data,
            state: ModuleState::Empty,
            module: Module::default(),
            function: None,
            block: None,
        }
    }

    fn next(&mut self) -> Result<u32, Error> {
        self.data.next().ok_or(Error::IncompleteData)
    }

    pub fn parse(mut self) -> Result<Module, Error> {
        self.parse_header()?;
        loop {
            let word0 = match self.data.next() {
                Some(word) => word,
                None => break,
            };
            let word_count = (word0 >> 16) as u16;
            let opcode = (word0 & 0xffff) as u16;
            if word_count == 0 {
                return Err(Error::InvalidWordCount);
            }
            let mut words = Vec::with_capacity(word_count as usize - 1);
            for _ in 1..word_count {
                words.push(self.next()?);
            }
            let op =
                spirv::Op::from_u32(opcode as u32).ok_or(Error::UnknownInstruction(opcode))?;
            self.process(op, &words)?;
        }
        if let Some(ref block) = self.block {
            return Err(Error::UnterminatedBlock(block.id()));
        }
        if self.function.is_some() {
            return Err(Error::UnterminatedFunction);
        }
        Ok(self.module)
    }

    fn parse_header(&mut self) -> Result<(), Error> {
        let magic = self.data.next().ok_or(Error::InvalidHeader)?;
        if magic != spirv::MAGIC_NUMBER {
            return Err(Error::InvalidHeader);
        }
        let version = self.data.next().ok_or(Error::InvalidHeader)?;
        let major = (version >> 16) as u8;
        let minor = (version >> 8) as u8;
        if major != 1 || minor > MAX_MINOR_VERSION {
            return Err(Error::UnsupportedVersion(major, minor));
        }
        let generator = self.data.next().ok_or(Error::InvalidHeader)?;
        let bound = self.data.next().ok_or(Error::InvalidHeader)?;
        let _schema = self.data.next().ok_or(Error::InvalidHeader)?;
        if bound == 0 {
            return Err(Error::InvalidHeader);
        }
        log::debug!("SPIR-V version {major}.{minor}, bound {bound}");
        self.module.header = ModuleHeader {
            version: (major, minor),
            generator,
            bound,
        };
        Ok(())
    }

    fn check_id(&self, id: Word) -> Result<Word, Error> {
        if id == 0 || id >= self.module.header.bound {
            return Err(Error::InvalidId(id));
        }
        Ok(id)
    }

    /// Split the raw operand words of `op` into typed operands.
    fn decode(&self, op: spirv::Op, words: &[Word]) -> Result<Instruction, Error> {
        let sig = grammar::signature(op)
            .ok_or(Error::UnsupportedInstruction(self.state, op))?;

        let mut cursor = 0;
        let result_type_id = if sig.result_type {
            Some(self.check_id(take_word(op, words, &mut cursor)?)?)
        } else {
            None
        };
        let result_id = if sig.result_id {
            Some(self.check_id(take_word(op, words, &mut cursor)?)?)
        } else {
            None
        };

        let mut operands = Vec::with_capacity(words.len() - cursor);
        for &kind in sig.prefix {
            match kind {
                Kind::Id => {
                    let word = take_word(op, words, &mut cursor)?;
                    operands.push(Operand::Id(self.check_id(word)?));
                }
                Kind::Literal => {
                    operands.push(Operand::Literal(take_word(op, words, &mut cursor)?));
                }
                Kind::String => {
                    let (string, consumed) = decode_string(&words[cursor..])?;
                    cursor += consumed;
                    operands.push(Operand::String(string));
                }
            }
        }
        match sig.tail {
            Tail::None => {
                if cursor != words.len() {
                    return Err(Error::InvalidOperandCount(op, words.len() as u16));
                }
            }
            Tail::Ids => {
                while cursor < words.len() {
                    let word = take_word(op, words, &mut cursor)?;
                    operands.push(Operand::Id(self.check_id(word)?));
                }
            }
            Tail::Literals => {
                while cursor < words.len() {
                    operands.push(Operand::Literal(take_word(op, words, &mut cursor)?));
                }
            }
            Tail::LiteralIdPairs => {
                if (words.len() - cursor) % 2 != 0 {
                    return Err(Error::InvalidOperandCount(op, words.len() as u16));
                }
                while cursor < words.len() {
                    operands.push(Operand::Literal(take_word(op, words, &mut cursor)?));
                    let label = take_word(op, words, &mut cursor)?;
                    operands.push(Operand::Id(self.check_id(label)?));
                }
            }
            Tail::ImageOperands => {
                if cursor < words.len() {
                    operands.push(Operand::Literal(take_word(op, words, &mut cursor)?));
                    while cursor < words.len() {
                        let word = take_word(op, words, &mut cursor)?;
                        operands.push(Operand::Id(self.check_id(word)?));
                    }
                }
            }
        }

        Ok(Instruction::new(op, result_type_id, result_id, operands))
    }

    fn process(&mut self, op: spirv::Op, words: &[Word]) -> Result<(), Error> {
        let inst = self.decode(op, words)?;
        log::trace!("\t{:?}", inst.op);

        match op {
            // Debug line markers are legal everywhere and carry nothing the
            // analyses or the printer need.
            spirv::Op::Line | spirv::Op::NoLine => Ok(()),
            spirv::Op::Function => {
                if self.function.is_some() {
                    return Err(Error::NestedFunction);
                }
                self.switch_state(ModuleState::Function, op)?;
                self.function = Some(Function {
                    def: inst,
                    parameters: Vec::new(),
                    blocks: Vec::new(),
                });
                Ok(())
            }
            spirv::Op::FunctionParameter => {
                if self.block.is_some() {
                    return Err(Error::UnsupportedInstruction(self.state, op));
                }
                let function = self.function.as_mut().ok_or(Error::OutsideFunction(op))?;
                function.parameters.push(inst);
                Ok(())
            }
            spirv::Op::Label => {
                if self.function.is_none() {
                    return Err(Error::OutsideFunction(op));
                }
                if let Some(ref block) = self.block {
                    return Err(Error::UnterminatedBlock(block.id()));
                }
                self.block = Some(BasicBlock {
                    label: inst,
                    instructions: Vec::new(),
                });
                Ok(())
            }
            spirv::Op::FunctionEnd => {
                if let Some(ref block) = self.block {
                    return Err(Error::UnterminatedBlock(block.id()));
                }
                let function = self.function.take().ok_or(Error::OutsideFunction(op))?;
                self.module.functions.push(function);
                Ok(())
            }
            _ if self.block.is_some() => {
                let ends_block = inst.is_block_terminator();
                let block = self.block.as_mut().unwrap();
                block.instructions.push(inst);
                if ends_block {
                    let block = self.block.take().unwrap();
                    self.function.as_mut().unwrap().blocks.push(block);
                }
                Ok(())
            }
            _ if self.function.is_some() => Err(Error::OutsideBlock(op)),
            _ => self.process_module_level(op, inst),
        }
    }

    fn process_module_level(&mut self, op: spirv::Op, inst: Instruction) -> Result<(), Error> {
        use spirv::Op;
        match op {
            Op::Capability => {
                self.switch_state(ModuleState::Capability, op)?;
                self.module.capabilities.push(inst);
            }
            Op::Extension => {
                self.switch_state(ModuleState::Extension, op)?;
                self.module.extensions.push(inst);
            }
            Op::ExtInstImport => {
                self.switch_state(ModuleState::ExtInstImport, op)?;
                self.module.ext_inst_imports.push(inst);
            }
            Op::MemoryModel => {
                self.switch_state(ModuleState::MemoryModel, op)?;
                self.module.memory_model = Some(inst);
            }
            Op::EntryPoint => {
                self.switch_state(ModuleState::EntryPoint, op)?;
                self.module.entry_points.push(inst);
            }
            Op::ExecutionMode | Op::ExecutionModeId => {
                self.switch_state(ModuleState::ExecutionMode, op)?;
                self.module.execution_modes.push(inst);
            }
            Op::Source
            | Op::SourceContinued
            | Op::SourceExtension
            | Op::String
            | Op::Name
            | Op::MemberName
            | Op::ModuleProcessed => {
                self.switch_state(ModuleState::Debug, op)?;
                if op == Op::Name {
                    if let (Some(target), Some(Operand::String(ref name))) =
                        (inst.operands[0].id(), inst.operands.get(1))
                    {
                        self.module.names.insert(target, name.clone());
                    }
                }
                self.module.debug.push(inst);
            }
            Op::Decorate
            | Op::MemberDecorate
            | Op::DecorationGroup
            | Op::GroupDecorate
            | Op::GroupMemberDecorate
            | Op::DecorateId
            | Op::DecorateString
            | Op::MemberDecorateString => {
                self.switch_state(ModuleState::Annotation, op)?;
                self.module.annotations.push(inst);
            }
            Op::TypeVoid
            | Op::TypeBool
            | Op::TypeInt
            | Op::TypeFloat
            | Op::TypeVector
            | Op::TypeMatrix
            | Op::TypeImage
            | Op::TypeSampler
            | Op::TypeSampledImage
            | Op::TypeArray
            | Op::TypeRuntimeArray
            | Op::TypeStruct
            | Op::TypePointer
            | Op::TypeFunction
            | Op::TypeForwardPointer
            | Op::ConstantTrue
            | Op::ConstantFalse
            | Op::Constant
            | Op::ConstantComposite
            | Op::ConstantSampler
            | Op::ConstantNull
            | Op::SpecConstantTrue
            | Op::SpecConstantFalse
            | Op::SpecConstant
            | Op::SpecConstantComposite
            | Op::SpecConstantOp
            | Op::Undef
            | Op::Variable => {
                self.switch_state(ModuleState::Type, op)?;
                self.module.types_global_values.push(inst);
            }
            _ => return Err(Error::UnsupportedInstruction(self.state, op)),
        }
        Ok(())
    }

    fn switch_state(&mut self, target: ModuleState, op: spirv::Op) -> Result<(), Error> {
        if target < self.state {
            return Err(Error::UnsupportedInstruction(self.state, op));
        }
        self.state = target;
        Ok(())
    }
}

fn take_word(op: spirv::Op, words: &[Word], cursor: &mut usize) -> Result<Word, Error> {
    match words.get(*cursor) {
        Some(&word) => {
            *cursor += 1;
            Ok(word)
        }
        None => Err(Error::InvalidOperandCount(op, words.len() as u16)),
    }
}

/// Decode a NUL-terminated, word-padded UTF-8 string; returns the string
/// and the number of words consumed.
fn decode_string(words: &[Word]) -> Result<(String, usize), Error> {
    let mut bytes = Vec::new();
    for (index, &word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                let string = String::from_utf8(bytes).map_err(|_| Error::BadString)?;
                return Ok((string, index + 1));
            }
            bytes.push(byte);
        }
    }
    Err(Error::BadString)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bound: Word) -> Vec<u32> {
        vec![spirv::MAGIC_NUMBER, 0x0001_0500, 0, bound, 0]
    }

    fn inst(op: spirv::Op, operands: &[u32]) -> Vec<u32> {
        let mut words = vec![((operands.len() as u32 + 1) << 16) | op as u32];
        words.extend_from_slice(operands);
        words
    }

    #[test]
    fn rejects_bad_magic() {
        let words = [0xdead_beef, 0x0001_0000, 0, 10, 0];
        assert!(matches!(
            parse_words(&words),
            Err(Error::InvalidHeader)
        ));
    }

    #[test]
    fn rejects_future_version() {
        let words = [spirv::MAGIC_NUMBER, 0x0001_0600, 0, 10, 0];
        assert!(matches!(
            parse_words(&words),
            Err(Error::UnsupportedVersion(1, 6))
        ));
    }

    #[test]
    fn rejects_truncated_instruction() {
        let mut words = header(10);
        words.push((3 << 16) | spirv::Op::TypeVoid as u32);
        assert!(matches!(parse_words(&words), Err(Error::IncompleteData)));
    }

    #[test]
    fn rejects_reserved_result_id() {
        let mut words = header(10);
        words.extend(inst(spirv::Op::TypeVoid, &[0]));
        assert!(matches!(parse_words(&words), Err(Error::InvalidId(0))));
    }

    #[test]
    fn decodes_switch_operands() {
        let mut words = header(20);
        words.extend(inst(spirv::Op::TypeVoid, &[2]));
        words.extend(inst(spirv::Op::TypeFunction, &[3, 2]));
        words.extend(inst(spirv::Op::TypeInt, &[5, 32, 0]));
        words.extend(inst(spirv::Op::Constant, &[5, 6, 0]));
        words.extend(inst(spirv::Op::Function, &[2, 1, 0, 3]));
        words.extend(inst(spirv::Op::Label, &[10]));
        words.extend(inst(spirv::Op::Switch, &[6, 11, 1, 12, 7, 12]));
        words.extend(inst(spirv::Op::Label, &[11]));
        words.extend(inst(spirv::Op::Return, &[]));
        words.extend(inst(spirv::Op::Label, &[12]));
        words.extend(inst(spirv::Op::Return, &[]));
        words.extend(inst(spirv::Op::FunctionEnd, &[]));

        let module = parse_words(&words).unwrap();
        let function = &module.functions[0];
        assert_eq!(function.blocks.len(), 3);
        let switch = function.blocks[0].terminator().unwrap();
        assert_eq!(
            switch.operands,
            vec![
                Operand::Id(6),
                Operand::Id(11),
                Operand::Literal(1),
                Operand::Id(12),
                Operand::Literal(7),
                Operand::Id(12),
            ]
        );
    }

    #[test]
    fn records_names() {
        let mut words = header(10);
        // "ab" packed with its NUL terminator and padding.
        let packed = u32::from_le_bytes([b'a', b'b', 0, 0]);
        words.extend(inst(spirv::Op::Name, &[4, packed]));
        let module = parse_words(&words).unwrap();
        assert_eq!(module.names.get(&4).map(String::as_str), Some("ab"));
    }
}
