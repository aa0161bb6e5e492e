/*! The linter.

[`Linter`] drives the whole pipeline for one binary: decode, derive module
info, and per function build the CFG, post-dominator tree and control
dependence graph, run the divergence dataflow, and report every derivative
instruction sitting in a divergent block. Each report is followed by a
provenance chain that walks the divergence witness maps back to a root
cause, alternating block and value phases.

All findings are warnings; the only failure [`Linter::run`] knows is a
binary that does not decode.
!*/

pub mod control_dependence;
pub mod divergence;

use crate::front;
use crate::print::Disassembler;
use crate::proc::cfg::ControlFlowGraph;
use crate::proc::postdom::PostDominatorTree;
use crate::proc::ModuleInfo;
use crate::{Instruction, Module, Word};

use control_dependence::ControlDependenceGraph;
use divergence::{DivergenceAnalysis, DivergenceReason};

/// Diagnostic severity, covering the classic SPIR-V tools message levels.
/// The linter itself only ever emits [`Error`](Severity::Error) for decode
/// failures and [`Warning`](Severity::Warning) for findings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    InternalError,
    Error,
    Warning,
    Info,
    Debug,
}

/// Source position of a diagnostic. The linter works on a binary with no
/// source text, so positions are zero-filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub index: u32,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    /// Pretty-printed instruction the message is anchored at; empty for
    /// synthesized explanations.
    pub instruction: String,
    pub message: String,
}

/// Opcodes that read neighboring invocations' values: implicit-lod
/// sampling and the explicit derivative instructions.
const DERIVATIVE_OPS: &[spirv::Op] = &[
    spirv::Op::ImageSampleImplicitLod,
    spirv::Op::ImageSampleDrefImplicitLod,
    spirv::Op::ImageSampleProjImplicitLod,
    spirv::Op::ImageSampleProjDrefImplicitLod,
    spirv::Op::ImageSparseSampleImplicitLod,
    spirv::Op::ImageSparseSampleDrefImplicitLod,
    spirv::Op::ImageSparseSampleProjImplicitLod,
    spirv::Op::ImageSparseSampleProjDrefImplicitLod,
    spirv::Op::DPdx,
    spirv::Op::DPdy,
    spirv::Op::Fwidth,
    spirv::Op::DPdxFine,
    spirv::Op::DPdyFine,
    spirv::Op::FwidthFine,
    spirv::Op::DPdxCoarse,
    spirv::Op::DPdyCoarse,
    spirv::Op::FwidthCoarse,
];

pub fn instruction_has_derivative(inst: &Instruction) -> bool {
    DERIVATIVE_OPS.contains(&inst.op)
}

/// The linter entry point. Owns the diagnostic consumer for its lifetime;
/// the consumer runs synchronously on the caller's stack.
pub struct Linter<'a> {
    consumer: Box<dyn FnMut(Diagnostic) + 'a>,
}

impl<'a> Linter<'a> {
    pub fn new(consumer: impl FnMut(Diagnostic) + 'a) -> Self {
        Linter {
            consumer: Box::new(consumer),
        }
    }

    /// Lint a binary. Returns `false` only when the binary fails to
    /// decode; findings are reported through the consumer and do not fail
    /// the run.
    pub fn run(&mut self, binary: &[u32]) -> bool {
        let module = match front::parse_words(binary) {
            Ok(module) => module,
            Err(error) => {
                log::error!("decode failed: {error}");
                self.emit(Severity::Error, String::new(), error.to_string());
                return false;
            }
        };
        let info = ModuleInfo::new(&module);
        let printer = Disassembler::new(&module);

        for (index, function) in module.functions.iter().enumerate() {
            if function.entry().is_none() {
                continue;
            }
            log::debug!("linting function %{}", function.id());
            let cfg = ControlFlowGraph::new(function);
            let pdt = PostDominatorTree::new(&cfg);
            let cdg = ControlDependenceGraph::build(&cfg, &pdt);
            let mut analysis = DivergenceAnalysis::new(&module, &info, &cdg);
            analysis.run(index, &cfg);

            for block in &function.blocks {
                for inst in &block.instructions {
                    if instruction_has_derivative(inst) && analysis.is_block_divergent(block.id())
                    {
                        self.emit(
                            Severity::Warning,
                            printer.instruction(inst),
                            format!(
                                "derivative with non-uniform control flow located in block %{}",
                                block.id()
                            ),
                        );
                        self.report_divergence_flow(
                            &module, &info, &cfg, &printer, &analysis,
                            block.id(),
                        );
                    }
                }
            }
        }
        true
    }

    /// Walk the witness maps from a divergent block back to a root cause,
    /// emitting one diagnostic per causal step.
    fn report_divergence_flow(
        &mut self,
        module: &Module,
        info: &ModuleInfo,
        cfg: &ControlFlowGraph<'_>,
        printer: &Disassembler<'_>,
        analysis: &DivergenceAnalysis<'_>,
        start: Word,
    ) {
        enum Phase {
            Block(Word),
            Value(Word),
        }

        let mut phase = Phase::Block(start);
        loop {
            match phase {
                Phase::Block(mut block) => loop {
                    let reason = analysis
                        .block_reason(block)
                        .expect("provenance walk entered a uniform block");
                    match reason {
                        DivergenceReason::BlockBecauseBlock { dependee } => block = dependee,
                        DivergenceReason::BlockBecauseValue {
                            value,
                            branch_block,
                        } => {
                            let branch = cfg.block(branch_block).terminator().unwrap();
                            self.emit(
                                Severity::Warning,
                                printer.instruction(branch),
                                format!(
                                    "block %{block} is non-uniform because it depends on a \
                                     conditional branch on non-uniform value %{value}"
                                ),
                            );
                            phase = Phase::Value(value);
                            break;
                        }
                        _ => unreachable!("block %{block} carries a value reason {reason:?}"),
                    }
                },
                Phase::Value(mut value) => loop {
                    let definition = info
                        .def_use()
                        .def(value)
                        .map(|def| printer.instruction(info.instruction(module, def)))
                        .unwrap_or_default();
                    let reason = analysis
                        .value_reason(value)
                        .expect("provenance walk entered a uniform value");
                    match reason {
                        DivergenceReason::ValueBecauseValue { input } => {
                            self.emit(
                                Severity::Warning,
                                definition,
                                format!("because %{value} uses %{input} in its definition"),
                            );
                            value = input;
                        }
                        DivergenceReason::ValueBecauseBlock { block } => {
                            self.emit(
                                Severity::Warning,
                                definition,
                                format!(
                                    "because %{value} is conditionally set in block %{block}, \
                                     which is non-uniform"
                                ),
                            );
                            phase = Phase::Block(block);
                            break;
                        }
                        DivergenceReason::Root => {
                            self.emit(
                                Severity::Warning,
                                definition,
                                "because it has a non-uniform definition".to_string(),
                            );
                            return;
                        }
                        _ => unreachable!("value %{value} carries a block reason {reason:?}"),
                    }
                },
            }
        }
    }

    fn emit(&mut self, severity: Severity, instruction: String, message: String) {
        (self.consumer)(Diagnostic {
            severity,
            position: Position::default(),
            instruction,
            message,
        });
    }
}
