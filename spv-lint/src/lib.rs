/*! Static analyzer for SPIR-V shader modules.

The one diagnostic this crate produces: an image-sampling or derivative
instruction is executed under non-uniform control flow. Such instructions
read neighboring invocations' values, so executing them from divergent
control flow yields undefined derivatives on real GPUs.

The pipeline: [`front`] decodes a binary into a [`Module`], [`proc`] derives
the def/use, type and decoration tables plus the per-function control-flow
and post-dominator structures, and [`lint`] builds the control dependence
graph, runs the divergence dataflow and reports each offending derivative
together with a provenance chain explaining *why* its block is divergent.

This crate never transforms or re-emits SPIR-V, and divergence is an
over-approximation: a value it leaves unmarked is guaranteed uniform under
the modeled rules, while a marked value may still be dynamically uniform.
!*/

pub mod front;
pub mod lint;
pub mod print;
pub mod proc;

pub use spirv::Word;

pub type FastHashMap<K, T> = rustc_hash::FxHashMap<K, T>;
pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;

/// A decoded instruction operand.
///
/// Which words of an instruction are ids is decided once, by
/// [`front::grammar`], so the analyses never have to re-derive it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// A reference to another result id (or a label id).
    Id(Word),
    /// A literal word: numbers, enumerant values, packed literals.
    Literal(Word),
    /// A literal string, already decoded from its NUL-terminated words.
    String(String),
}

impl Operand {
    pub const fn id(&self) -> Option<Word> {
        match *self {
            Operand::Id(id) => Some(id),
            Operand::Literal(_) | Operand::String(_) => None,
        }
    }
}

/// A single SPIR-V instruction.
///
/// `operands` holds the *in* operands only: the result type and result id
/// words are split off during decoding, mirroring how the ids are treated
/// by the analyses (a result type is not an input).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: spirv::Op,
    pub result_type_id: Option<Word>,
    pub result_id: Option<Word>,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(
        op: spirv::Op,
        result_type_id: Option<Word>,
        result_id: Option<Word>,
        operands: Vec<Operand>,
    ) -> Self {
        Instruction {
            op,
            result_type_id,
            result_id,
            operands,
        }
    }

    /// The id operands, in declaration order, skipping literals and strings.
    pub fn input_id_operands(&self) -> impl Iterator<Item = Word> + '_ {
        self.operands.iter().filter_map(Operand::id)
    }

    /// Shorthand for the id stored in operand `index`.
    ///
    /// Panics if the operand is missing or not an id; callers use this on
    /// operand positions fixed by the instruction's grammar.
    pub fn id_operand(&self, index: usize) -> Word {
        match self.operands[index] {
            Operand::Id(id) => id,
            ref other => panic!("operand {index} of {:?} is {other:?}, not an id", self.op),
        }
    }

    /// Whether this instruction ends a basic block.
    pub const fn is_block_terminator(&self) -> bool {
        matches!(
            self.op,
            spirv::Op::Branch
                | spirv::Op::BranchConditional
                | spirv::Op::Switch
                | spirv::Op::Return
                | spirv::Op::ReturnValue
                | spirv::Op::Kill
                | spirv::Op::Unreachable
                | spirv::Op::TerminateInvocation
        )
    }
}

/// A basic block: a materialized `OpLabel` plus its body.
///
/// The last body instruction is the terminator once the containing function
/// has been fully decoded.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub label: Instruction,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label_id: Word) -> Self {
        BasicBlock {
            label: Instruction::new(spirv::Op::Label, None, Some(label_id), Vec::new()),
            instructions: Vec::new(),
        }
    }

    /// The block's label id.
    pub fn id(&self) -> Word {
        self.label.result_id.unwrap()
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

/// A function definition: `OpFunction`, its parameters and its blocks.
#[derive(Clone, Debug)]
pub struct Function {
    pub def: Instruction,
    pub parameters: Vec<Instruction>,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn id(&self) -> Word {
        self.def.result_id.unwrap()
    }

    /// The entry block; `None` for a bodiless declaration.
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ModuleHeader {
    /// `(major, minor)` from the version word.
    pub version: (u8, u8),
    pub generator: Word,
    /// All result ids are strictly below this bound.
    pub bound: Word,
}

/// A decoded SPIR-V module, sections in binary order.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub header: ModuleHeader,
    pub capabilities: Vec<Instruction>,
    pub extensions: Vec<Instruction>,
    pub ext_inst_imports: Vec<Instruction>,
    pub memory_model: Option<Instruction>,
    pub entry_points: Vec<Instruction>,
    pub execution_modes: Vec<Instruction>,
    pub debug: Vec<Instruction>,
    pub annotations: Vec<Instruction>,
    /// Types, constants and module-scope variables, interleaved as declared.
    pub types_global_values: Vec<Instruction>,
    pub functions: Vec<Function>,
    /// `OpName` strings, keyed by target id.
    pub names: FastHashMap<Word, String>,
}

impl Default for ModuleHeader {
    fn default() -> Self {
        ModuleHeader {
            version: (1, 0),
            generator: 0,
            bound: 1,
        }
    }
}
