/*! Per-function control flow graph.

Nodes are block labels, edges come from the block terminators. Edge lists
are deduplicated (a switch with several cases to one label contributes a
single edge) and preserve declaration order, so traversals are
deterministic for a given module.
!*/

use crate::{BasicBlock, FastHashMap, FastHashSet, Function, Instruction, Word};

pub struct ControlFlowGraph<'f> {
    function: &'f Function,
    entry: Word,
    blocks: FastHashMap<Word, usize>,
    succs: FastHashMap<Word, Vec<Word>>,
    preds: FastHashMap<Word, Vec<Word>>,
}

impl<'f> ControlFlowGraph<'f> {
    /// Panics if the function has no blocks; bodiless declarations have no
    /// control flow to analyze.
    pub fn new(function: &'f Function) -> Self {
        let entry = function
            .entry()
            .expect("control flow graph of a bodiless function")
            .id();
        let mut blocks = FastHashMap::default();
        let mut succs: FastHashMap<Word, Vec<Word>> = FastHashMap::default();
        let mut preds: FastHashMap<Word, Vec<Word>> = FastHashMap::default();
        for (index, block) in function.blocks.iter().enumerate() {
            blocks.insert(block.id(), index);
            succs.entry(block.id()).or_default();
            preds.entry(block.id()).or_default();
        }
        for block in &function.blocks {
            let terminator = block
                .terminator()
                .expect("decoded blocks always carry a terminator");
            for target in branch_targets(terminator) {
                let list = succs.get_mut(&block.id()).unwrap();
                if !list.contains(&target) {
                    list.push(target);
                    preds.entry(target).or_default().push(block.id());
                }
            }
        }
        ControlFlowGraph {
            function,
            entry,
            blocks,
            succs,
            preds,
        }
    }

    pub const fn entry(&self) -> Word {
        self.entry
    }

    /// Block labels in declaration order.
    pub fn block_ids(&self) -> impl Iterator<Item = Word> + '_ {
        self.function.blocks.iter().map(BasicBlock::id)
    }

    /// Panics on a label that is not a block of this function.
    pub fn block(&self, label: Word) -> &'f BasicBlock {
        &self.function.blocks[self.blocks[&label]]
    }

    pub fn preds(&self, label: Word) -> &[Word] {
        &self.preds[&label]
    }

    pub fn succs(&self, label: Word) -> &[Word] {
        &self.succs[&label]
    }

    /// Reverse post-order from the entry; unreachable blocks are absent.
    pub fn reverse_post_order(&self) -> Vec<Word> {
        let mut visited = FastHashSet::default();
        let mut order = Vec::with_capacity(self.function.blocks.len());
        let mut stack = vec![(self.entry, 0usize)];
        visited.insert(self.entry);
        while let Some(&mut (label, ref mut next)) = stack.last_mut() {
            let succs = self.succs(label);
            if *next < succs.len() {
                let target = succs[*next];
                *next += 1;
                if visited.insert(target) {
                    stack.push((target, 0));
                }
            } else {
                order.push(label);
                stack.pop();
            }
        }
        order.reverse();
        order
    }
}

/// The labels a terminator can transfer control to, deduplicated in
/// declaration order.
fn branch_targets(terminator: &Instruction) -> Vec<Word> {
    let mut targets = Vec::new();
    let skip = match terminator.op {
        spirv::Op::Branch => 0,
        // Skip the condition, or the selector (the default label and every
        // case label remain).
        spirv::Op::BranchConditional | spirv::Op::Switch => 1,
        _ => return targets,
    };
    for target in terminator.input_id_operands().skip(skip) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}
