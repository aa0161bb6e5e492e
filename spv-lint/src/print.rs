/*! Instruction pretty-printing for diagnostics.

Renders a single instruction in disassembly style, substituting friendly
names from the module's `OpName` strings where they exist:

```text
%loaded = OpLoad %float %gl_FragCoord
```

Names are sanitized to the identifier characters the textual form allows;
ids without a name print as `%<id>`.
!*/

use crate::{Instruction, Module, Operand, Word};

pub struct Disassembler<'m> {
    module: &'m Module,
}

impl<'m> Disassembler<'m> {
    pub const fn new(module: &'m Module) -> Self {
        Disassembler { module }
    }

    /// `%name` when the id carries a usable `OpName`, `%<id>` otherwise.
    pub fn id(&self, id: Word) -> String {
        match self.module.names.get(&id) {
            Some(name) if !name.is_empty() => format!("%{}", sanitize(name)),
            _ => format!("%{id}"),
        }
    }

    pub fn instruction(&self, inst: &Instruction) -> String {
        let mut out = String::new();
        if let Some(result_id) = inst.result_id {
            out.push_str(&self.id(result_id));
            out.push_str(" = ");
        }
        out.push_str("Op");
        out.push_str(&format!("{:?}", inst.op));
        if let Some(type_id) = inst.result_type_id {
            out.push(' ');
            out.push_str(&self.id(type_id));
        }
        for operand in &inst.operands {
            out.push(' ');
            match *operand {
                Operand::Id(id) => out.push_str(&self.id(id)),
                Operand::Literal(word) => out.push_str(&word.to_string()),
                Operand::String(ref string) => {
                    out.push('"');
                    out.push_str(string);
                    out.push('"');
                }
            }
        }
        out
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Instruction;

    #[test]
    fn friendly_names_and_fallbacks() {
        let mut module = Module::default();
        module.names.insert(7, "coord in".to_string());
        let printer = Disassembler::new(&module);

        let inst = Instruction::new(
            spirv::Op::Load,
            Some(3),
            Some(8),
            vec![Operand::Id(7)],
        );
        assert_eq!(printer.instruction(&inst), "%8 = OpLoad %3 %coord_in");
    }

    #[test]
    fn literals_and_strings() {
        let module = Module::default();
        let printer = Disassembler::new(&module);
        let inst = Instruction::new(
            spirv::Op::Name,
            None,
            None,
            vec![Operand::Id(4), Operand::String("main".to_string())],
        );
        assert_eq!(printer.instruction(&inst), "OpName %4 \"main\"");
    }
}
