/*! Control dependence graph.

A block `A` is control dependent on a block `B` when `B`'s branch decision
determines whether `A` executes: `B` has one successor that post-dominates
`A` and another that does not. Equivalently, the dependees of `A` are
exactly `A`'s post-dominance frontier, which is how the graph is built
here: one pass through a post-order traversal of the post-dominator tree,
per Cytron et al. 1991, §4.2, applied to the reverse CFG.

Following the paper (and unlike some other implementations), the
construction keeps the edge from the entry to the exit of the reverse CFG,
which surfaces as `Entry` edges out of a pseudo-entry block: a dependence
on the program being executed at all.
!*/

use std::collections::BTreeMap;

use crate::proc::cfg::ControlFlowGraph;
use crate::proc::postdom::PostDominatorTree;
use crate::{Operand, Word};

/// Label of the pseudo-entry block. The decoder rejects result id 0, so
/// the sentinel can never collide with a real block.
pub const PSEUDO_ENTRY_BLOCK: Word = 0;

/// How a control dependence edge arises from its source's terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependenceKind {
    ConditionalBranch {
        /// The branch condition value.
        condition: Word,
        /// The condition value for which the dependence is taken.
        taken_when_true: bool,
    },
    SwitchCase {
        /// The value being switched on.
        selector: Word,
        /// Case values leading to the target, in declaration order.
        case_values: Vec<u32>,
        /// Whether the default branch leads to the target.
        is_default: bool,
    },
    /// Dependence on the program being executed; the source is always the
    /// pseudo-entry.
    Entry,
}

/// An edge in the control dependence graph: `target` executes or not
/// depending on a decision made in `source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlDependence {
    pub source: Word,
    pub target: Word,
    pub kind: DependenceKind,
}

impl ControlDependence {
    /// The branch condition or switch selector; `None` for entry edges.
    pub fn dependent_value(&self) -> Option<Word> {
        match self.kind {
            DependenceKind::ConditionalBranch { condition, .. } => Some(condition),
            DependenceKind::SwitchCase { selector, .. } => Some(selector),
            DependenceKind::Entry => None,
        }
    }

    /// Lexicographic key on `(source, target)`, the order tests compare in.
    pub const fn sort_key(&self) -> (Word, Word) {
        (self.source, self.target)
    }
}

/// The control dependence graph of one function, adjacency in both
/// directions.
///
/// Lookups panic on labels that are not in the graph; blocks that cannot
/// reach the function's exit have no post-dominator and therefore no node
/// here.
pub struct ControlDependenceGraph {
    forward: BTreeMap<Word, Vec<ControlDependence>>,
    reverse: BTreeMap<Word, Vec<ControlDependence>>,
}

impl ControlDependenceGraph {
    pub fn build(cfg: &ControlFlowGraph<'_>, pdt: &PostDominatorTree) -> Self {
        // The post-dominance frontier of X is (Cytron, Equation 4)
        //   DF_local(X) U { e in DF_up(Z) | X = ipdom(Z) }
        // where
        //   DF_local(X) = { P | P -> X in CFG, X does not strictly pdom P }
        //   DF_up(Z)    = { e in DF(Z) | ipdom(Z) does not strictly pdom e }
        // computed in one pass since the traversal visits children first.
        let mut reverse: BTreeMap<Word, Vec<ControlDependence>> = BTreeMap::new();
        let mut degree: BTreeMap<Word, usize> = BTreeMap::new();
        // The seeded pseudo-entry edge is the one edge not tallied below.
        degree.insert(PSEUDO_ENTRY_BLOCK, 1);
        reverse.entry(PSEUDO_ENTRY_BLOCK).or_default();

        let entry = cfg.entry();
        for &label in pdt.post_order() {
            degree.entry(label).or_insert(0);
            let mut capacity = cfg.preds(label).len() + usize::from(label == entry);
            for &child in pdt.children(label) {
                capacity += reverse[&child].len();
            }
            let mut edges = Vec::with_capacity(capacity);
            for &pred in cfg.preds(label) {
                if !pdt.strictly_post_dominates(label, pred) {
                    edges.push(classify_edge(cfg, pred, label));
                    *degree.entry(pred).or_insert(0) += 1;
                }
            }
            if label == entry {
                // Only the exit can post-dominate the entry, so this edge
                // is never pruned further up the tree.
                edges.push(classify_edge(cfg, PSEUDO_ENTRY_BLOCK, label));
            }
            for &child in pdt.children(label) {
                for dep in &reverse[&child] {
                    if dep.source == PSEUDO_ENTRY_BLOCK
                        || !pdt.strictly_post_dominates(label, dep.source)
                    {
                        let mut dep = dep.clone();
                        dep.target = label;
                        *degree.entry(dep.source).or_insert(0) += 1;
                        edges.push(dep);
                    }
                }
            }
            reverse.insert(label, edges);
        }

        let mut forward: BTreeMap<Word, Vec<ControlDependence>> = degree
            .iter()
            .map(|(&label, &count)| (label, Vec::with_capacity(count)))
            .collect();
        for edges in reverse.values() {
            for dep in edges {
                forward.get_mut(&dep.source).unwrap().push(dep.clone());
            }
        }

        ControlDependenceGraph { forward, reverse }
    }

    /// The blocks that depend on `label`.
    pub fn dependents(&self, label: Word) -> &[ControlDependence] {
        &self.forward[&label]
    }

    /// The blocks `label` depends on.
    pub fn dependees(&self, label: Word) -> &[ControlDependence] {
        &self.reverse[&label]
    }

    /// Like [`dependents`](Self::dependents), but `None` for labels outside
    /// the graph (blocks that never reach an exit).
    pub fn get_dependents(&self, label: Word) -> Option<&[ControlDependence]> {
        self.forward.get(&label).map(Vec::as_slice)
    }

    /// Like [`dependees`](Self::dependees), but `None` for labels outside
    /// the graph.
    pub fn get_dependees(&self, label: Word) -> Option<&[ControlDependence]> {
        self.reverse.get(&label).map(Vec::as_slice)
    }

    /// Is block `a` directly dependent on block `b`?
    pub fn is_dependent(&self, a: Word, b: Word) -> bool {
        if !self.forward.contains_key(&a) {
            return false;
        }
        // Blocks tend to have more dependents than dependees, so search
        // the dependees.
        self.dependees(a).iter().any(|dep| dep.source == b)
    }

    /// Every block label in the graph, ascending.
    pub fn block_labels(&self) -> impl Iterator<Item = Word> + '_ {
        self.forward.keys().copied()
    }
}

/// Classify the CFG edge `source -> target` from the source's terminator.
fn classify_edge(cfg: &ControlFlowGraph<'_>, source: Word, target: Word) -> ControlDependence {
    if source == PSEUDO_ENTRY_BLOCK {
        return ControlDependence {
            source,
            target,
            kind: DependenceKind::Entry,
        };
    }
    let terminator = cfg.block(source).terminator().unwrap();
    let kind = match terminator.op {
        spirv::Op::BranchConditional => {
            let condition = terminator.id_operand(0);
            let label_true = terminator.id_operand(1);
            let label_false = terminator.id_operand(2);
            let taken_when_true = if target == label_true {
                assert!(
                    target != label_false,
                    "true and false labels are the same; control dependence impossible"
                );
                true
            } else if target == label_false {
                false
            } else {
                unreachable!("impossible control dependence; non-existent edge");
            };
            DependenceKind::ConditionalBranch {
                condition,
                taken_when_true,
            }
        }
        spirv::Op::Switch => {
            let selector = terminator.id_operand(0);
            let default_label = terminator.id_operand(1);
            let mut case_values = Vec::new();
            for pair in terminator.operands[2..].chunks_exact(2) {
                if let [Operand::Literal(value), Operand::Id(label)] = pair {
                    if *label == target {
                        case_values.push(*value);
                    }
                }
            }
            let is_default = target == default_label;
            assert!(
                is_default || !case_values.is_empty(),
                "impossible control dependence; non-existent edge"
            );
            DependenceKind::SwitchCase {
                selector,
                case_values,
                is_default,
            }
        }
        // An unconditional branch means the target post-dominates the
        // source, which strict post-dominance already pruned.
        _ => unreachable!(
            "control dependence source {source} does not end in a conditional branch"
        ),
    };
    ControlDependence {
        source,
        target,
        kind,
    }
}
