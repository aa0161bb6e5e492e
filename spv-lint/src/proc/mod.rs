/*! Derived module information.

[`ModuleInfo`] gives every analysis-relevant instruction a dense [`InstId`]
and builds the three lookup tables the linter consumes: def/use chains,
pointer pointee storage classes, and per-id decorations. The instruction
universe covers the types/constants/globals section plus, for each
function, its parameters and its blocks (each block's `OpLabel` followed by
its body), which is exactly the set the divergence worklist visits.

Everything here is read-only after construction; the graphs the analyses
build refer back to instructions by `InstId` rather than by pointer.
!*/

pub mod cfg;
pub mod postdom;

use crate::{FastHashMap, Instruction, Module, Word};

/// Dense index of an instruction in a [`ModuleInfo`] universe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstId(u32);

impl InstId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug)]
enum InstKey {
    TypeGlobal(usize),
    Parameter { function: usize, index: usize },
    Label { function: usize, block: usize },
    Body { function: usize, block: usize, index: usize },
}

#[derive(Clone, Copy, Debug)]
struct Unit {
    key: InstKey,
    /// Label of the enclosing block, for labels the block itself.
    block: Option<Word>,
}

struct FunctionUnits {
    params_start: u32,
    params_len: u32,
}

struct BlockUnits {
    /// Unit of the `OpLabel`; the body follows contiguously.
    start: u32,
    body_len: u32,
}

pub struct ModuleInfo {
    units: Vec<Unit>,
    module_units: u32,
    functions: Vec<FunctionUnits>,
    blocks: FastHashMap<Word, BlockUnits>,
    def_use: DefUseManager,
    types: TypeManager,
    decorations: DecorationManager,
}

impl ModuleInfo {
    pub fn new(module: &Module) -> Self {
        let mut info = ModuleInfo {
            units: Vec::new(),
            module_units: 0,
            functions: Vec::new(),
            blocks: FastHashMap::default(),
            def_use: DefUseManager::default(),
            types: TypeManager::new(module),
            decorations: DecorationManager::new(module),
        };

        for index in 0..module.types_global_values.len() {
            info.push_unit(module, InstKey::TypeGlobal(index), None);
        }
        info.module_units = info.units.len() as u32;

        for (f, function) in module.functions.iter().enumerate() {
            let params_start = info.units.len() as u32;
            for index in 0..function.parameters.len() {
                info.push_unit(module, InstKey::Parameter { function: f, index }, None);
            }
            info.functions.push(FunctionUnits {
                params_start,
                params_len: function.parameters.len() as u32,
            });
            for (b, block) in function.blocks.iter().enumerate() {
                let label = block.id();
                let start = info.units.len() as u32;
                info.push_unit(module, InstKey::Label { function: f, block: b }, Some(label));
                for index in 0..block.instructions.len() {
                    info.push_unit(
                        module,
                        InstKey::Body { function: f, block: b, index },
                        Some(label),
                    );
                }
                info.blocks.insert(
                    label,
                    BlockUnits {
                        start,
                        body_len: block.instructions.len() as u32,
                    },
                );
            }
        }
        info
    }

    fn push_unit(&mut self, module: &Module, key: InstKey, block: Option<Word>) {
        let id = InstId(self.units.len() as u32);
        self.units.push(Unit { key, block });
        let inst = resolve(module, key);
        if let Some(result_id) = inst.result_id {
            self.def_use.defs.insert(result_id, id);
        }
        for operand_id in inst.input_id_operands() {
            self.def_use.users.entry(operand_id).or_default().push(id);
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn instruction<'m>(&self, module: &'m Module, id: InstId) -> &'m Instruction {
        resolve(module, self.units[id.index()].key)
    }

    /// The label of the block holding this instruction; for an `OpLabel`
    /// unit, the block itself. `None` for module-level instructions and
    /// function parameters.
    pub fn enclosing_block(&self, id: InstId) -> Option<Word> {
        self.units[id.index()].block
    }

    /// Units of the types/constants/globals section, in declaration order.
    pub fn module_units(&self) -> impl Iterator<Item = InstId> {
        (0..self.module_units).map(InstId)
    }

    /// Parameter units of the given function, in declaration order.
    pub fn parameter_units(&self, function: usize) -> impl Iterator<Item = InstId> {
        let units = &self.functions[function];
        (units.params_start..units.params_start + units.params_len).map(InstId)
    }

    /// The unit of the block's `OpLabel` followed by its body units.
    ///
    /// Panics on a label that is not a block of this module.
    pub fn block_units(&self, label: Word) -> impl Iterator<Item = InstId> {
        let units = &self.blocks[&label];
        (units.start..units.start + 1 + units.body_len).map(InstId)
    }

    /// The unit of the block's `OpLabel`.
    pub fn label_unit(&self, label: Word) -> InstId {
        InstId(self.blocks[&label].start)
    }

    pub const fn def_use(&self) -> &DefUseManager {
        &self.def_use
    }

    pub const fn types(&self) -> &TypeManager {
        &self.types
    }

    pub const fn decorations(&self) -> &DecorationManager {
        &self.decorations
    }
}

fn resolve(module: &Module, key: InstKey) -> &Instruction {
    match key {
        InstKey::TypeGlobal(index) => &module.types_global_values[index],
        InstKey::Parameter { function, index } => &module.functions[function].parameters[index],
        InstKey::Label { function, block } => &module.functions[function].blocks[block].label,
        InstKey::Body { function, block, index } => {
            &module.functions[function].blocks[block].instructions[index]
        }
    }
}

/// Definitions and uses, by result id.
#[derive(Default)]
pub struct DefUseManager {
    defs: FastHashMap<Word, InstId>,
    users: FastHashMap<Word, Vec<InstId>>,
}

impl DefUseManager {
    pub fn def(&self, id: Word) -> Option<InstId> {
        self.defs.get(&id).copied()
    }

    /// Every instruction using `id` as an input operand.
    pub fn users(&self, id: Word) -> &[InstId] {
        self.users.get(&id).map_or(&[], Vec::as_slice)
    }
}

/// Pointer pointee storage classes, by type id.
pub struct TypeManager {
    pointer_storage: FastHashMap<Word, spirv::StorageClass>,
}

impl TypeManager {
    fn new(module: &Module) -> Self {
        let mut pointer_storage = FastHashMap::default();
        for inst in &module.types_global_values {
            if inst.op != spirv::Op::TypePointer {
                continue;
            }
            let storage_word = match inst.operands[0] {
                crate::Operand::Literal(word) => word,
                _ => continue,
            };
            if let (Some(result_id), Some(class)) =
                (inst.result_id, spirv::StorageClass::from_u32(storage_word))
            {
                pointer_storage.insert(result_id, class);
            }
        }
        TypeManager { pointer_storage }
    }

    /// The storage class behind a pointer type id, if it is one.
    pub fn pointee_storage_class(&self, type_id: Word) -> Option<spirv::StorageClass> {
        self.pointer_storage.get(&type_id).copied()
    }
}

/// `OpDecorate` decorations, by target id.
pub struct DecorationManager {
    decorations: FastHashMap<Word, Vec<spirv::Decoration>>,
}

impl DecorationManager {
    fn new(module: &Module) -> Self {
        let mut decorations: FastHashMap<Word, Vec<spirv::Decoration>> = FastHashMap::default();
        for inst in &module.annotations {
            if inst.op != spirv::Op::Decorate {
                continue;
            }
            let target = match inst.operands[0].id() {
                Some(id) => id,
                None => continue,
            };
            let decoration_word = match inst.operands[1] {
                crate::Operand::Literal(word) => word,
                _ => continue,
            };
            if let Some(decoration) = spirv::Decoration::from_u32(decoration_word) {
                decorations.entry(target).or_default().push(decoration);
            }
        }
        DecorationManager { decorations }
    }

    pub fn decorations(&self, target: Word) -> &[spirv::Decoration] {
        self.decorations.get(&target).map_or(&[], Vec::as_slice)
    }

    pub fn has_decoration(&self, target: Word, decoration: spirv::Decoration) -> bool {
        self.decorations(target).contains(&decoration)
    }
}
