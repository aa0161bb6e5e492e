/*! Divergence classification and dataflow.

A value is divergent when its bits may differ between invocations of a
subgroup at the same program point; a block is divergent when whether it
executes may differ. The analysis computes both sets as a single forward
fixed point over the def/use graph and the control dependence graph,
recording for every divergent id the first witness of *why* it diverged.
The two reason maps are insert-only, so the fixed point is monotone and
the final key sets do not depend on worklist order (the stored witnesses
may).
!*/

use std::collections::VecDeque;

use bit_set::BitSet;

use super::control_dependence::ControlDependenceGraph;
use crate::proc::{cfg::ControlFlowGraph, InstId, ModuleInfo};
use crate::{FastHashMap, Instruction, Module, Word};

/// Why a block or value is divergent.
///
/// The recursive references are by id into the two flat maps of
/// [`DivergenceAnalysis`]; chains of reasons always bottom out at [`Root`]
/// or at a branch on a value that does.
///
/// [`Root`]: DivergenceReason::Root
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivergenceReason {
    /// The block is control dependent on a block that is itself divergent.
    BlockBecauseBlock { dependee: Word },
    /// `branch_block`'s terminator branches on the divergent `value`.
    BlockBecauseValue { value: Word, branch_block: Word },
    /// An input operand is divergent.
    ValueBecauseValue { input: Word },
    /// The value is produced in a divergent block (phi-like).
    ValueBecauseBlock { block: Word },
    /// Intrinsically divergent: a non-`Flat` input, a function parameter,
    /// a load from divergent storage.
    Root,
}

/// Storage classes whose loads may observe a different value per
/// invocation.
const DIVERGENT_STORAGE_CLASSES: &[spirv::StorageClass] = &[
    spirv::StorageClass::Function,
    spirv::StorageClass::Generic,
    spirv::StorageClass::AtomicCounter,
    spirv::StorageClass::StorageBuffer,
    spirv::StorageClass::PhysicalStorageBuffer,
    spirv::StorageClass::Output,
];

/// Operations whose results are uniform across the subgroup by
/// definition. Extend as the target environment grows more of them.
pub const NEVER_DIVERGENT_OPS: &[spirv::Op] = &[
    spirv::Op::SubgroupBallotKHR,
    spirv::Op::SubgroupAllKHR,
    spirv::Op::SubgroupAnyKHR,
    spirv::Op::SubgroupAllEqualKHR,
    spirv::Op::GroupNonUniformAll,
    spirv::Op::GroupNonUniformAny,
    spirv::Op::GroupNonUniformAllEqual,
    spirv::Op::GroupNonUniformBallot,
    spirv::Op::GroupNonUniformBroadcastFirst,
];

/// Is this instruction divergent regardless of its inputs?
pub fn is_divergence_root(inst: &Instruction, module: &Module, info: &ModuleInfo) -> bool {
    match inst.op {
        spirv::Op::FunctionParameter => true,
        spirv::Op::Load => {
            let pointer = inst.id_operand(0);
            let class = info
                .def_use()
                .def(pointer)
                .and_then(|def| info.instruction(module, def).result_type_id)
                .and_then(|type_id| info.types().pointee_storage_class(type_id));
            match class {
                Some(class) if DIVERGENT_STORAGE_CLASSES.contains(&class) => true,
                Some(spirv::StorageClass::Input) => {
                    let result_id = inst.result_id.unwrap();
                    !info
                        .decorations()
                        .has_decoration(result_id, spirv::Decoration::Flat)
                }
                // Uniform, UniformConstant, Workgroup, CrossWorkgroup,
                // Private, PushConstant, Image: uniform at the load.
                _ => false,
            }
        }
        _ => false,
    }
}

enum VisitResult {
    Changed,
    Fixed,
}

/// The divergence fixed point of one function.
pub struct DivergenceAnalysis<'a> {
    module: &'a Module,
    info: &'a ModuleInfo,
    cdg: &'a ControlDependenceGraph,
    blocks: FastHashMap<Word, DivergenceReason>,
    values: FastHashMap<Word, DivergenceReason>,
    worklist: VecDeque<InstId>,
    on_worklist: BitSet,
}

impl<'a> DivergenceAnalysis<'a> {
    pub fn new(module: &'a Module, info: &'a ModuleInfo, cdg: &'a ControlDependenceGraph) -> Self {
        DivergenceAnalysis {
            module,
            info,
            cdg,
            blocks: FastHashMap::default(),
            values: FastHashMap::default(),
            worklist: VecDeque::new(),
            on_worklist: BitSet::with_capacity(info.unit_count()),
        }
    }

    /// Run to the fixed point for the function at `function_index`, whose
    /// CFG (and the analysis' CDG) is `cfg`.
    pub fn run(&mut self, function_index: usize, cfg: &ControlFlowGraph<'_>) {
        let info = self.info;
        for unit in info.module_units() {
            self.enqueue(unit);
        }
        for unit in info.parameter_units(function_index) {
            self.enqueue(unit);
        }
        for label in cfg.reverse_post_order() {
            for unit in info.block_units(label) {
                self.enqueue(unit);
            }
        }

        while let Some(unit) = self.worklist.pop_front() {
            self.on_worklist.remove(unit.index());
            if let VisitResult::Changed = self.visit(unit) {
                self.enqueue_successors(unit);
            }
        }
        log::debug!(
            "divergence fixed point: {} blocks, {} values",
            self.blocks.len(),
            self.values.len()
        );
    }

    pub fn is_block_divergent(&self, label: Word) -> bool {
        self.blocks.contains_key(&label)
    }

    pub fn is_value_divergent(&self, id: Word) -> bool {
        self.values.contains_key(&id)
    }

    pub fn block_reason(&self, label: Word) -> Option<DivergenceReason> {
        self.blocks.get(&label).copied()
    }

    pub fn value_reason(&self, id: Word) -> Option<DivergenceReason> {
        self.values.get(&id).copied()
    }

    pub const fn divergent_blocks(&self) -> &FastHashMap<Word, DivergenceReason> {
        &self.blocks
    }

    pub const fn divergent_values(&self) -> &FastHashMap<Word, DivergenceReason> {
        &self.values
    }

    fn enqueue(&mut self, unit: InstId) {
        if self.on_worklist.insert(unit.index()) {
            self.worklist.push_back(unit);
        }
    }

    fn visit(&mut self, unit: InstId) -> VisitResult {
        let inst = self.info.instruction(self.module, unit);
        if inst.op == spirv::Op::Label {
            self.visit_block(inst.result_id.unwrap())
        } else {
            self.visit_instruction(inst)
        }
    }

    fn visit_block(&mut self, label: Word) -> VisitResult {
        if self.blocks.contains_key(&label) {
            return VisitResult::Fixed;
        }
        // A label with no CDG node (it never reaches an exit, or it belongs
        // to another function dragged in through a module-scope use chain)
        // has nothing to inherit from.
        let cdg = self.cdg;
        let Some(dependees) = cdg.get_dependees(label) else {
            return VisitResult::Fixed;
        };
        for dep in dependees {
            if self.blocks.contains_key(&dep.source) {
                let reason = DivergenceReason::BlockBecauseBlock {
                    dependee: dep.source,
                };
                log::trace!("block %{label} divergent: {reason:?}");
                self.blocks.insert(label, reason);
                return VisitResult::Changed;
            }
            if let Some(value) = dep.dependent_value() {
                if self.values.contains_key(&value) {
                    let reason = DivergenceReason::BlockBecauseValue {
                        value,
                        branch_block: dep.source,
                    };
                    log::trace!("block %{label} divergent: {reason:?}");
                    self.blocks.insert(label, reason);
                    return VisitResult::Changed;
                }
            }
        }
        VisitResult::Fixed
    }

    fn visit_instruction(&mut self, inst: &Instruction) -> VisitResult {
        if inst.is_block_terminator() {
            // Always revisit the enclosing block: its divergence may hinge
            // on this terminator's condition.
            return VisitResult::Changed;
        }
        let result_id = match inst.result_id {
            Some(id) => id,
            None => return VisitResult::Fixed,
        };
        if self.values.contains_key(&result_id) {
            return VisitResult::Fixed;
        }
        if is_divergence_root(inst, self.module, self.info) {
            log::trace!("value %{result_id} divergent at its definition");
            self.values.insert(result_id, DivergenceReason::Root);
            return VisitResult::Changed;
        }
        if NEVER_DIVERGENT_OPS.contains(&inst.op) {
            return VisitResult::Fixed;
        }
        for input in inst.input_id_operands() {
            if self.values.contains_key(&input) {
                self.values
                    .insert(result_id, DivergenceReason::ValueBecauseValue { input });
                return VisitResult::Changed;
            }
            if self.blocks.contains_key(&input) {
                self.values
                    .insert(result_id, DivergenceReason::ValueBecauseBlock { block: input });
                return VisitResult::Changed;
            }
        }
        VisitResult::Fixed
    }

    fn enqueue_successors(&mut self, unit: InstId) {
        let info = self.info;
        let cdg = self.cdg;
        let inst = info.instruction(self.module, unit);
        if let Some(result_id) = inst.result_id {
            for &user in info.def_use().users(result_id) {
                self.enqueue(user);
            }
        }
        if inst.is_block_terminator() {
            if let Some(block) = info.enclosing_block(unit) {
                self.enqueue(info.label_unit(block));
            }
        } else if inst.op == spirv::Op::Label {
            let label = inst.result_id.unwrap();
            if let Some(dependents) = cdg.get_dependents(label) {
                for dep in dependents {
                    self.enqueue(info.label_unit(dep.target));
                }
            }
        }
    }
}
