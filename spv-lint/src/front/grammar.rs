/*! Operand signatures for the instruction set.

SPIR-V mixes id and literal words freely within an instruction, and the
split is defined per opcode by the grammar. This module captures just
enough of that grammar to decode every operand into a typed
[`Operand`](crate::Operand): a fixed prefix of operand kinds followed by a
repeating tail. Analyses downstream then only ever ask "which operands are
ids", never "what does word 3 mean".

Opcodes absent from the table are rejected by the decoder, the same way
`naga`'s SPIR-V front end rejects instructions it does not model.
!*/

use spirv::Op;

/// Kind of a single operand slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Id,
    Literal,
    /// NUL-terminated string; consumes a variable number of words.
    String,
}

/// What follows the fixed operand prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tail {
    /// No further operands are allowed.
    None,
    /// Zero or more ids.
    Ids,
    /// Zero or more literal words.
    Literals,
    /// `OpSwitch` targets: repeated (literal value, label id) pairs.
    LiteralIdPairs,
    /// Optional `ImageOperands` mask word, then the ids its bits call for.
    ImageOperands,
}

/// Word layout of one opcode.
#[derive(Clone, Copy, Debug)]
pub struct Signature {
    pub result_type: bool,
    pub result_id: bool,
    pub prefix: &'static [Kind],
    pub tail: Tail,
}

const fn sig(
    result_type: bool,
    result_id: bool,
    prefix: &'static [Kind],
    tail: Tail,
) -> Signature {
    Signature {
        result_type,
        result_id,
        prefix,
        tail,
    }
}

use Kind::{Id, Literal, String};

/// The word layout of `op`, or `None` if the opcode is not modeled.
pub const fn signature(op: Op) -> Option<Signature> {
    Some(match op {
        // Mode setting and debug.
        Op::Capability => sig(false, false, &[Literal], Tail::None),
        Op::Extension | Op::SourceExtension | Op::ModuleProcessed => {
            sig(false, false, &[String], Tail::None)
        }
        Op::ExtInstImport => sig(false, true, &[String], Tail::None),
        Op::MemoryModel => sig(false, false, &[Literal, Literal], Tail::None),
        Op::EntryPoint => sig(false, false, &[Literal, Id, String], Tail::Ids),
        Op::ExecutionMode => sig(false, false, &[Id, Literal], Tail::Literals),
        Op::ExecutionModeId => sig(false, false, &[Id, Literal], Tail::Ids),
        // OpSource's optional file id is debug-only; its words are kept opaque.
        Op::Source => sig(false, false, &[Literal, Literal], Tail::Literals),
        Op::SourceContinued => sig(false, false, &[String], Tail::None),
        Op::String => sig(false, true, &[String], Tail::None),
        Op::Name => sig(false, false, &[Id, String], Tail::None),
        Op::MemberName => sig(false, false, &[Id, Literal, String], Tail::None),

        // Annotations.
        Op::Decorate => sig(false, false, &[Id, Literal], Tail::Literals),
        Op::MemberDecorate => sig(false, false, &[Id, Literal, Literal], Tail::Literals),
        Op::DecorationGroup => sig(false, true, &[], Tail::None),
        Op::GroupDecorate => sig(false, false, &[Id], Tail::Ids),
        Op::GroupMemberDecorate => sig(false, false, &[Id], Tail::Literals),
        Op::DecorateId => sig(false, false, &[Id, Literal], Tail::Ids),
        Op::DecorateString => sig(false, false, &[Id, Literal, String], Tail::None),
        Op::MemberDecorateString => {
            sig(false, false, &[Id, Literal, Literal, String], Tail::None)
        }

        // Types.
        Op::TypeVoid | Op::TypeBool | Op::TypeSampler => sig(false, true, &[], Tail::None),
        Op::TypeInt => sig(false, true, &[Literal, Literal], Tail::None),
        Op::TypeFloat => sig(false, true, &[Literal], Tail::Literals),
        Op::TypeVector | Op::TypeMatrix => sig(false, true, &[Id, Literal], Tail::None),
        Op::TypeImage => sig(false, true, &[Id], Tail::Literals),
        Op::TypeSampledImage | Op::TypeRuntimeArray => sig(false, true, &[Id], Tail::None),
        Op::TypeArray => sig(false, true, &[Id, Id], Tail::None),
        Op::TypeStruct | Op::TypeFunction => sig(false, true, &[], Tail::Ids),
        Op::TypePointer => sig(false, true, &[Literal, Id], Tail::None),
        Op::TypeForwardPointer => sig(false, false, &[Id, Literal], Tail::None),

        // Constants.
        Op::ConstantTrue | Op::ConstantFalse | Op::ConstantNull | Op::Undef => {
            sig(true, true, &[], Tail::None)
        }
        Op::SpecConstantTrue | Op::SpecConstantFalse => sig(true, true, &[], Tail::None),
        Op::Constant | Op::SpecConstant => sig(true, true, &[], Tail::Literals),
        Op::ConstantComposite | Op::SpecConstantComposite => sig(true, true, &[], Tail::Ids),
        Op::SpecConstantOp => sig(true, true, &[Literal], Tail::Ids),
        Op::ConstantSampler => sig(true, true, &[Literal, Literal, Literal], Tail::None),

        // Memory.
        Op::Variable => sig(true, true, &[Literal], Tail::Ids),
        Op::Load => sig(true, true, &[Id], Tail::Literals),
        Op::Store => sig(false, false, &[Id, Id], Tail::Literals),
        Op::CopyMemory => sig(false, false, &[Id, Id], Tail::Literals),
        Op::AccessChain | Op::InBoundsAccessChain | Op::PtrAccessChain => {
            sig(true, true, &[Id], Tail::Ids)
        }
        Op::ArrayLength => sig(true, true, &[Id, Literal], Tail::None),
        Op::ImageTexelPointer => sig(true, true, &[Id, Id, Id], Tail::None),

        // Functions and control flow.
        Op::Function => sig(true, true, &[Literal, Id], Tail::None),
        Op::FunctionParameter => sig(true, true, &[], Tail::None),
        Op::FunctionEnd | Op::Return | Op::Kill | Op::Unreachable | Op::TerminateInvocation => {
            sig(false, false, &[], Tail::None)
        }
        Op::FunctionCall => sig(true, true, &[Id], Tail::Ids),
        Op::Label => sig(false, true, &[], Tail::None),
        Op::Branch => sig(false, false, &[Id], Tail::None),
        Op::BranchConditional => sig(false, false, &[Id, Id, Id], Tail::Literals),
        Op::Switch => sig(false, false, &[Id, Id], Tail::LiteralIdPairs),
        Op::ReturnValue => sig(false, false, &[Id], Tail::None),
        Op::Phi => sig(true, true, &[], Tail::Ids),
        Op::SelectionMerge => sig(false, false, &[Id, Literal], Tail::None),
        Op::LoopMerge => sig(false, false, &[Id, Id, Literal], Tail::Literals),
        Op::Nop => sig(false, false, &[], Tail::None),

        // Composites.
        Op::CompositeConstruct => sig(true, true, &[], Tail::Ids),
        Op::CompositeExtract => sig(true, true, &[Id], Tail::Literals),
        Op::CompositeInsert => sig(true, true, &[Id, Id], Tail::Literals),
        Op::VectorShuffle => sig(true, true, &[Id, Id], Tail::Literals),
        Op::VectorExtractDynamic => sig(true, true, &[Id, Id], Tail::None),
        Op::VectorInsertDynamic => sig(true, true, &[Id, Id, Id], Tail::None),
        Op::CopyObject | Op::Transpose => sig(true, true, &[Id], Tail::None),

        // Image instructions. Sampling and fetch/gather/read share the
        // trailing ImageOperands layout.
        Op::SampledImage => sig(true, true, &[Id, Id], Tail::None),
        Op::Image => sig(true, true, &[Id], Tail::None),
        Op::ImageSampleImplicitLod
        | Op::ImageSampleExplicitLod
        | Op::ImageSampleProjImplicitLod
        | Op::ImageSampleProjExplicitLod
        | Op::ImageSparseSampleImplicitLod
        | Op::ImageSparseSampleExplicitLod
        | Op::ImageSparseSampleProjImplicitLod
        | Op::ImageSparseSampleProjExplicitLod
        | Op::ImageFetch
        | Op::ImageSparseFetch
        | Op::ImageRead
        | Op::ImageSparseRead => sig(true, true, &[Id, Id], Tail::ImageOperands),
        Op::ImageSampleDrefImplicitLod
        | Op::ImageSampleDrefExplicitLod
        | Op::ImageSampleProjDrefImplicitLod
        | Op::ImageSampleProjDrefExplicitLod
        | Op::ImageSparseSampleDrefImplicitLod
        | Op::ImageSparseSampleDrefExplicitLod
        | Op::ImageSparseSampleProjDrefImplicitLod
        | Op::ImageSparseSampleProjDrefExplicitLod
        | Op::ImageGather
        | Op::ImageDrefGather
        | Op::ImageSparseGather
        | Op::ImageSparseDrefGather => sig(true, true, &[Id, Id, Id], Tail::ImageOperands),
        Op::ImageWrite => sig(false, false, &[Id, Id, Id], Tail::ImageOperands),
        Op::ImageQuerySizeLod | Op::ImageQueryLod => sig(true, true, &[Id, Id], Tail::None),
        Op::ImageQuerySize | Op::ImageQueryLevels | Op::ImageQuerySamples => {
            sig(true, true, &[Id], Tail::None)
        }
        Op::ImageSparseTexelsResident => sig(true, true, &[Id], Tail::None),

        // Derivatives.
        Op::DPdx
        | Op::DPdy
        | Op::Fwidth
        | Op::DPdxFine
        | Op::DPdyFine
        | Op::FwidthFine
        | Op::DPdxCoarse
        | Op::DPdyCoarse
        | Op::FwidthCoarse => sig(true, true, &[Id], Tail::None),

        // Unary and binary ALU ops: every operand word is an id.
        Op::SNegate
        | Op::FNegate
        | Op::Not
        | Op::BitReverse
        | Op::BitCount
        | Op::Any
        | Op::All
        | Op::IsNan
        | Op::IsInf
        | Op::LogicalNot
        | Op::ConvertFToU
        | Op::ConvertFToS
        | Op::ConvertSToF
        | Op::ConvertUToF
        | Op::UConvert
        | Op::SConvert
        | Op::FConvert
        | Op::QuantizeToF16
        | Op::ConvertPtrToU
        | Op::ConvertUToPtr
        | Op::Bitcast
        | Op::IAdd
        | Op::FAdd
        | Op::ISub
        | Op::FSub
        | Op::IMul
        | Op::FMul
        | Op::UDiv
        | Op::SDiv
        | Op::FDiv
        | Op::UMod
        | Op::SRem
        | Op::SMod
        | Op::FRem
        | Op::FMod
        | Op::VectorTimesScalar
        | Op::MatrixTimesScalar
        | Op::VectorTimesMatrix
        | Op::MatrixTimesVector
        | Op::MatrixTimesMatrix
        | Op::OuterProduct
        | Op::Dot
        | Op::IAddCarry
        | Op::ISubBorrow
        | Op::UMulExtended
        | Op::SMulExtended
        | Op::ShiftRightLogical
        | Op::ShiftRightArithmetic
        | Op::ShiftLeftLogical
        | Op::BitwiseOr
        | Op::BitwiseXor
        | Op::BitwiseAnd
        | Op::BitFieldInsert
        | Op::BitFieldSExtract
        | Op::BitFieldUExtract
        | Op::LogicalEqual
        | Op::LogicalNotEqual
        | Op::LogicalOr
        | Op::LogicalAnd
        | Op::Select
        | Op::IEqual
        | Op::INotEqual
        | Op::UGreaterThan
        | Op::SGreaterThan
        | Op::UGreaterThanEqual
        | Op::SGreaterThanEqual
        | Op::ULessThan
        | Op::SLessThan
        | Op::ULessThanEqual
        | Op::SLessThanEqual
        | Op::FOrdEqual
        | Op::FUnordEqual
        | Op::FOrdNotEqual
        | Op::FUnordNotEqual
        | Op::FOrdLessThan
        | Op::FUnordLessThan
        | Op::FOrdGreaterThan
        | Op::FUnordGreaterThan
        | Op::FOrdLessThanEqual
        | Op::FUnordLessThanEqual
        | Op::FOrdGreaterThanEqual
        | Op::FUnordGreaterThanEqual => sig(true, true, &[], Tail::Ids),

        // Extended instruction sets: the set id and instruction number, then
        // the set-defined id operands.
        Op::ExtInst => sig(true, true, &[Id, Literal], Tail::Ids),

        // Barriers and atomics. Scope and semantics operands are ids of
        // constants, so the all-ids layout is exact.
        Op::ControlBarrier | Op::MemoryBarrier => sig(false, false, &[], Tail::Ids),
        Op::AtomicLoad
        | Op::AtomicExchange
        | Op::AtomicCompareExchange
        | Op::AtomicIIncrement
        | Op::AtomicIDecrement
        | Op::AtomicIAdd
        | Op::AtomicISub
        | Op::AtomicSMin
        | Op::AtomicUMin
        | Op::AtomicSMax
        | Op::AtomicUMax
        | Op::AtomicAnd
        | Op::AtomicOr
        | Op::AtomicXor => sig(true, true, &[], Tail::Ids),
        Op::AtomicStore => sig(false, false, &[], Tail::Ids),

        // Subgroup operations.
        Op::SubgroupBallotKHR
        | Op::SubgroupFirstInvocationKHR
        | Op::SubgroupAllKHR
        | Op::SubgroupAnyKHR
        | Op::SubgroupAllEqualKHR => sig(true, true, &[], Tail::Ids),
        Op::SubgroupReadInvocationKHR => sig(true, true, &[Id, Id], Tail::None),
        Op::GroupNonUniformElect => sig(true, true, &[Id], Tail::None),
        Op::GroupNonUniformAll
        | Op::GroupNonUniformAny
        | Op::GroupNonUniformAllEqual
        | Op::GroupNonUniformBallot
        | Op::GroupNonUniformBroadcastFirst
        | Op::GroupNonUniformInverseBallot
        | Op::GroupNonUniformBallotBitCount
        | Op::GroupNonUniformBallotFindLSB
        | Op::GroupNonUniformBallotFindMSB => sig(true, true, &[Id], Tail::Ids),
        Op::GroupNonUniformBroadcast
        | Op::GroupNonUniformShuffle
        | Op::GroupNonUniformShuffleXor
        | Op::GroupNonUniformShuffleUp
        | Op::GroupNonUniformShuffleDown
        | Op::GroupNonUniformQuadBroadcast
        | Op::GroupNonUniformQuadSwap => sig(true, true, &[Id, Id], Tail::Ids),
        // Group arithmetic: scope id, GroupOperation literal, value ids.
        Op::GroupNonUniformIAdd
        | Op::GroupNonUniformFAdd
        | Op::GroupNonUniformIMul
        | Op::GroupNonUniformFMul
        | Op::GroupNonUniformSMin
        | Op::GroupNonUniformUMin
        | Op::GroupNonUniformFMin
        | Op::GroupNonUniformSMax
        | Op::GroupNonUniformUMax
        | Op::GroupNonUniformFMax
        | Op::GroupNonUniformBitwiseAnd
        | Op::GroupNonUniformBitwiseOr
        | Op::GroupNonUniformBitwiseXor
        | Op::GroupNonUniformLogicalAnd
        | Op::GroupNonUniformLogicalOr
        | Op::GroupNonUniformLogicalXor => sig(true, true, &[Id, Literal], Tail::Ids),

        // Fragment-shader misc.
        Op::DemoteToHelperInvocation => sig(false, false, &[], Tail::None),
        Op::IsHelperInvocationEXT => sig(true, true, &[], Tail::None),

        // Debug line markers may appear in any section.
        Op::Line => sig(false, false, &[Id, Literal, Literal], Tail::None),
        Op::NoLine => sig(false, false, &[], Tail::None),

        _ => return None,
    })
}
