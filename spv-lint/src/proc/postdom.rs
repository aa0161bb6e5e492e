/*! Post-dominator tree.

Built with the Cooper–Harvey–Kennedy iterative dominance algorithm run on
the reverse CFG, rooted at a virtual exit that fans in from every block
without successors. Blocks that cannot reach an exit (infinite loops) have
no post-dominator and are simply absent from the tree.

The tree answers the two queries control dependence construction needs:
strict post-dominance (via DFS intervals) and a children-before-parents
traversal of the real blocks.
!*/

use super::cfg::ControlFlowGraph;
use crate::{FastHashMap, Word};

pub struct PostDominatorTree {
    /// Immediate post-dominator; `None` when it is the virtual exit.
    ipdom: FastHashMap<Word, Option<Word>>,
    /// Real-block children in the tree, in block declaration order.
    children: FastHashMap<Word, Vec<Word>>,
    /// DFS entry/exit intervals over the tree, for ancestor queries.
    intervals: FastHashMap<Word, (u32, u32)>,
    /// Tree post-order (children before parents), real blocks only.
    post_order: Vec<Word>,
}

impl PostDominatorTree {
    pub fn new(cfg: &ControlFlowGraph<'_>) -> Self {
        let labels: Vec<Word> = cfg.block_ids().collect();
        let index_of: FastHashMap<Word, usize> =
            labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let n = labels.len();
        let root = n;

        // Reverse-CFG successors: the virtual exit leads to every block
        // without successors, and each block leads to its CFG predecessors.
        let mut rsuccs: Vec<Vec<usize>> = Vec::with_capacity(n + 1);
        for &label in &labels {
            rsuccs.push(cfg.preds(label).iter().map(|p| index_of[p]).collect());
        }
        rsuccs.push(
            labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| cfg.succs(label).is_empty())
                .map(|(index, _)| index)
                .collect(),
        );

        // Post-order of the reverse CFG from the virtual exit.
        let mut po_number = vec![usize::MAX; n + 1];
        let mut post_order_nodes = Vec::with_capacity(n + 1);
        {
            let mut visited = vec![false; n + 1];
            let mut stack = vec![(root, 0usize)];
            visited[root] = true;
            while let Some(&mut (node, ref mut next)) = stack.last_mut() {
                if *next < rsuccs[node].len() {
                    let target = rsuccs[node][*next];
                    *next += 1;
                    if !visited[target] {
                        visited[target] = true;
                        stack.push((target, 0));
                    }
                } else {
                    po_number[node] = post_order_nodes.len();
                    post_order_nodes.push(node);
                    stack.pop();
                }
            }
        }

        // Cooper-Harvey-Kennedy fixed point over reverse post-order.
        let mut idom = vec![usize::MAX; n + 1];
        idom[root] = root;
        let mut changed = true;
        while changed {
            changed = false;
            for &node in post_order_nodes.iter().rev() {
                if node == root {
                    continue;
                }
                let mut new_idom = usize::MAX;
                let is_exit = cfg.succs(labels[node]).is_empty();
                let rpreds = cfg
                    .succs(labels[node])
                    .iter()
                    .map(|s| index_of[s])
                    .chain(is_exit.then_some(root));
                for pred in rpreds {
                    if idom[pred] == usize::MAX {
                        continue;
                    }
                    new_idom = if new_idom == usize::MAX {
                        pred
                    } else {
                        intersect(&idom, &po_number, pred, new_idom)
                    };
                }
                if new_idom != usize::MAX && idom[node] != new_idom {
                    idom[node] = new_idom;
                    changed = true;
                }
            }
        }

        // Materialize the tree, keyed by label.
        let mut ipdom = FastHashMap::default();
        let mut children: FastHashMap<Word, Vec<Word>> = FastHashMap::default();
        let mut root_children = Vec::new();
        for (node, &label) in labels.iter().enumerate() {
            if idom[node] == usize::MAX {
                continue;
            }
            children.entry(label).or_default();
            if idom[node] == root {
                ipdom.insert(label, None);
                root_children.push(label);
            } else {
                let parent = labels[idom[node]];
                ipdom.insert(label, Some(parent));
                children.entry(parent).or_default().push(label);
            }
        }

        // One DFS for both the interval numbering and the tree post-order.
        let mut intervals = FastHashMap::default();
        let mut post_order = Vec::with_capacity(ipdom.len());
        let mut clock = 0u32;
        let mut dfs = Vec::new();
        for &top in &root_children {
            dfs.push((top, 0usize));
            intervals.insert(top, (clock, 0));
            clock += 1;
            while let Some(&mut (label, ref mut next)) = dfs.last_mut() {
                let kids = &children[&label];
                if *next < kids.len() {
                    let child = kids[*next];
                    *next += 1;
                    intervals.insert(child, (clock, 0));
                    clock += 1;
                    dfs.push((child, 0));
                } else {
                    intervals.get_mut(&label).unwrap().1 = clock;
                    clock += 1;
                    post_order.push(label);
                    dfs.pop();
                }
            }
        }

        PostDominatorTree {
            ipdom,
            children,
            intervals,
            post_order,
        }
    }

    /// The immediate post-dominator, `None` when it is the virtual exit.
    ///
    /// Panics on a block that cannot reach an exit.
    pub fn ipdom(&self, label: Word) -> Option<Word> {
        self.ipdom[&label]
    }

    /// Whether the block participates in the tree at all.
    pub fn contains(&self, label: Word) -> bool {
        self.ipdom.contains_key(&label)
    }

    /// Does `a` strictly post-dominate `b`?
    pub fn strictly_post_dominates(&self, a: Word, b: Word) -> bool {
        if a == b {
            return false;
        }
        match (self.intervals.get(&a), self.intervals.get(&b)) {
            (Some(&(a_in, a_out)), Some(&(b_in, b_out))) => a_in < b_in && b_out < a_out,
            _ => false,
        }
    }

    /// Real-block tree children of `label`.
    pub fn children(&self, label: Word) -> &[Word] {
        self.children.get(&label).map_or(&[], Vec::as_slice)
    }

    /// Tree post-order over real blocks: children before parents.
    pub fn post_order(&self) -> &[Word] {
        &self.post_order
    }
}

fn intersect(idom: &[usize], po_number: &[usize], a: usize, b: usize) -> usize {
    let (mut a, mut b) = (a, b);
    while a != b {
        while po_number[a] < po_number[b] {
            a = idom[a];
        }
        while po_number[b] < po_number[a] {
            b = idom[b];
        }
    }
    a
}
