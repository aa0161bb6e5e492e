//! End-to-end linting scenarios: derivatives in uniform and divergent
//! control flow, plus the soundness and monotonicity bounds of the
//! dataflow itself.

mod support;

use support::{string_words, Assembler};

use spv_lint::front::parse_words;
use spv_lint::lint::control_dependence::ControlDependenceGraph;
use spv_lint::lint::divergence::DivergenceAnalysis;
use spv_lint::lint::{Diagnostic, Linter, Severity};
use spv_lint::proc::cfg::ControlFlowGraph;
use spv_lint::proc::postdom::PostDominatorTree;
use spv_lint::proc::ModuleInfo;
use spv_lint::Word;

fn lint(words: &[u32]) -> (bool, Vec<Diagnostic>) {
    support::init_logger();
    let mut diagnostics = Vec::new();
    let ok = Linter::new(|diagnostic| diagnostics.push(diagnostic)).run(words);
    (ok, diagnostics)
}

fn fragment_header(asm: &mut Assembler) {
    asm.op(spirv::Op::Capability, &[spirv::Capability::Shader as u32]);
    asm.op(
        spirv::Op::MemoryModel,
        &[
            spirv::AddressingModel::Logical as u32,
            spirv::MemoryModel::GLSL450 as u32,
        ],
    );
    let mut entry = vec![spirv::ExecutionModel::Fragment as u32, 1];
    entry.extend(string_words("main"));
    asm.op(spirv::Op::EntryPoint, &entry);
    asm.op(
        spirv::Op::ExecutionMode,
        &[1, spirv::ExecutionMode::OriginUpperLeft as u32],
    );
}

/// Shared types, constants and globals:
/// %2 void, %3 fn() -> void, %4 f32, %5 vec4, %6 vec2, %13 bool,
/// %7..%10 sampled image chain with %10 the UniformConstant variable,
/// %11 = 0.0, %12 = vec2(0.0, 0.0), %14/%15 Input float variable,
/// %16 fn(f32) -> void.
fn fragment_types(asm: &mut Assembler) {
    asm.op(spirv::Op::TypeVoid, &[2]);
    asm.op(spirv::Op::TypeFunction, &[3, 2]);
    asm.op(spirv::Op::TypeFloat, &[4, 32]);
    asm.op(spirv::Op::TypeVector, &[5, 4, 4]);
    asm.op(spirv::Op::TypeVector, &[6, 4, 2]);
    asm.op(spirv::Op::TypeBool, &[13]);
    asm.op(
        spirv::Op::TypeImage,
        &[7, 4, spirv::Dim::Dim2D as u32, 0, 0, 0, 1, 0],
    );
    asm.op(spirv::Op::TypeSampledImage, &[8, 7]);
    asm.op(
        spirv::Op::TypePointer,
        &[9, spirv::StorageClass::UniformConstant as u32, 8],
    );
    asm.op(
        spirv::Op::Variable,
        &[9, 10, spirv::StorageClass::UniformConstant as u32],
    );
    asm.op(spirv::Op::Constant, &[4, 11, 0]);
    asm.op(spirv::Op::ConstantComposite, &[6, 12, 11, 11]);
    asm.op(
        spirv::Op::TypePointer,
        &[14, spirv::StorageClass::Input as u32, 4],
    );
    asm.op(
        spirv::Op::Variable,
        &[14, 15, spirv::StorageClass::Input as u32],
    );
    asm.op(spirv::Op::TypeFunction, &[16, 2, 4]);
}

#[test]
fn derivative_in_uniform_flow_is_silent() {
    let mut asm = Assembler::new(50);
    fragment_header(&mut asm);
    fragment_types(&mut asm);
    asm.op(
        spirv::Op::Function,
        &[2, 1, spirv::FunctionControl::NONE.bits(), 3],
    );
    asm.op(spirv::Op::Label, &[20]);
    asm.op(spirv::Op::Load, &[8, 21, 10]);
    asm.op(spirv::Op::ImageSampleImplicitLod, &[5, 22, 21, 12]);
    asm.op(spirv::Op::Return, &[]);
    asm.op(spirv::Op::FunctionEnd, &[]);

    let (ok, diagnostics) = lint(&asm.finish());
    assert!(ok);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:#?}");
}

/// Entry block loads a non-`Flat` input, branches on it, and one side
/// samples with an implicit LOD.
fn divergent_sample_module(flat: bool) -> Vec<u32> {
    let mut asm = Assembler::new(50);
    fragment_header(&mut asm);
    if flat {
        asm.op(
            spirv::Op::Decorate,
            &[21, spirv::Decoration::Flat as u32],
        );
    }
    fragment_types(&mut asm);
    asm.op(
        spirv::Op::Function,
        &[2, 1, spirv::FunctionControl::NONE.bits(), 3],
    );
    asm.op(spirv::Op::Label, &[20]);
    asm.op(spirv::Op::Load, &[4, 21, 15]);
    asm.op(spirv::Op::FOrdGreaterThan, &[13, 22, 21, 11]);
    asm.op(spirv::Op::BranchConditional, &[22, 23, 24]);
    asm.op(spirv::Op::Label, &[23]);
    asm.op(spirv::Op::Load, &[8, 25, 10]);
    asm.op(spirv::Op::ImageSampleImplicitLod, &[5, 26, 25, 12]);
    asm.op(spirv::Op::Branch, &[24]);
    asm.op(spirv::Op::Label, &[24]);
    asm.op(spirv::Op::Return, &[]);
    asm.op(spirv::Op::FunctionEnd, &[]);
    asm.finish()
}

#[test]
fn derivative_under_divergent_branch_is_reported() {
    let (ok, diagnostics) = lint(&divergent_sample_module(false));
    assert!(ok);

    assert_eq!(diagnostics.len(), 4, "unexpected: {diagnostics:#?}");
    assert!(diagnostics
        .iter()
        .all(|d| d.severity == Severity::Warning));

    assert_eq!(
        diagnostics[0].message,
        "derivative with non-uniform control flow located in block %23"
    );
    assert!(diagnostics[0].instruction.contains("OpImageSampleImplicitLod"));

    // The provenance chain: branch -> condition -> input load root.
    assert_eq!(
        diagnostics[1].message,
        "block %23 is non-uniform because it depends on a conditional branch \
         on non-uniform value %22"
    );
    assert!(diagnostics[1].instruction.contains("OpBranchConditional"));
    assert_eq!(
        diagnostics[2].message,
        "because %22 uses %21 in its definition"
    );
    assert_eq!(
        diagnostics[3].message,
        "because it has a non-uniform definition"
    );
    assert!(diagnostics[3].instruction.contains("OpLoad"));
}

#[test]
fn flat_decoration_suppresses_the_warning() {
    let (ok, diagnostics) = lint(&divergent_sample_module(true));
    assert!(ok);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:#?}");
}

#[test]
fn transitive_divergence_through_a_parameter() {
    let mut asm = Assembler::new(50);
    fragment_header(&mut asm);
    fragment_types(&mut asm);
    asm.op(
        spirv::Op::Function,
        &[2, 1, spirv::FunctionControl::NONE.bits(), 3],
    );
    asm.op(spirv::Op::Label, &[20]);
    asm.op(spirv::Op::Return, &[]);
    asm.op(spirv::Op::FunctionEnd, &[]);
    asm.op(
        spirv::Op::Function,
        &[2, 30, spirv::FunctionControl::NONE.bits(), 16],
    );
    asm.op(spirv::Op::FunctionParameter, &[4, 31]);
    asm.op(spirv::Op::Label, &[40]);
    asm.op(spirv::Op::FOrdGreaterThan, &[13, 41, 31, 11]);
    asm.op(spirv::Op::BranchConditional, &[41, 42, 43]);
    asm.op(spirv::Op::Label, &[42]);
    asm.op(spirv::Op::Load, &[8, 44, 10]);
    asm.op(spirv::Op::ImageSampleImplicitLod, &[5, 45, 44, 12]);
    asm.op(spirv::Op::Branch, &[43]);
    asm.op(spirv::Op::Label, &[43]);
    asm.op(spirv::Op::Return, &[]);
    asm.op(spirv::Op::FunctionEnd, &[]);

    let (ok, diagnostics) = lint(&asm.finish());
    assert!(ok);

    // Block -> Value -> Value -> Root.
    assert_eq!(diagnostics.len(), 4, "unexpected: {diagnostics:#?}");
    assert_eq!(
        diagnostics[0].message,
        "derivative with non-uniform control flow located in block %42"
    );
    assert_eq!(
        diagnostics[1].message,
        "block %42 is non-uniform because it depends on a conditional branch \
         on non-uniform value %41"
    );
    assert_eq!(
        diagnostics[2].message,
        "because %41 uses %31 in its definition"
    );
    assert_eq!(
        diagnostics[3].message,
        "because it has a non-uniform definition"
    );
}

#[test]
fn decode_failure_reports_an_error_and_fails() {
    let (ok, diagnostics) = lint(&[0xdead_beef, 0, 0, 0, 0]);
    assert!(!ok);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
}

/// Loads from per-invocation storage classes and function parameters must
/// land in `divergent_values`; uniform-at-load classes must not.
#[test]
fn divergence_soundness_bound() {
    support::init_logger();
    let mut asm = Assembler::new(60);
    fragment_header(&mut asm);
    fragment_types(&mut asm);
    asm.op(
        spirv::Op::TypePointer,
        &[17, spirv::StorageClass::Output as u32, 4],
    );
    asm.op(
        spirv::Op::Variable,
        &[17, 18, spirv::StorageClass::Output as u32],
    );
    asm.op(
        spirv::Op::TypePointer,
        &[19, spirv::StorageClass::StorageBuffer as u32, 4],
    );
    asm.op(
        spirv::Op::Variable,
        &[19, 24, spirv::StorageClass::StorageBuffer as u32],
    );
    asm.op(
        spirv::Op::TypePointer,
        &[25, spirv::StorageClass::Function as u32, 4],
    );
    asm.op(
        spirv::Op::TypePointer,
        &[26, spirv::StorageClass::UniformConstant as u32, 4],
    );
    asm.op(
        spirv::Op::Variable,
        &[26, 27, spirv::StorageClass::UniformConstant as u32],
    );
    asm.op(
        spirv::Op::Function,
        &[2, 30, spirv::FunctionControl::NONE.bits(), 16],
    );
    asm.op(spirv::Op::FunctionParameter, &[4, 31]);
    asm.op(spirv::Op::Label, &[40]);
    asm.op(
        spirv::Op::Variable,
        &[25, 32, spirv::StorageClass::Function as u32],
    );
    asm.op(spirv::Op::Load, &[4, 33, 15]);
    asm.op(spirv::Op::Load, &[4, 34, 18]);
    asm.op(spirv::Op::Load, &[4, 35, 24]);
    asm.op(spirv::Op::Load, &[4, 36, 32]);
    asm.op(spirv::Op::Load, &[4, 37, 27]);
    asm.op(spirv::Op::Return, &[]);
    asm.op(spirv::Op::FunctionEnd, &[]);
    let words = asm.finish();

    let module = parse_words(&words).unwrap();
    let info = ModuleInfo::new(&module);
    let function = &module.functions[0];
    let cfg = ControlFlowGraph::new(function);
    let pdt = PostDominatorTree::new(&cfg);
    let cdg = ControlDependenceGraph::build(&cfg, &pdt);

    let mut analysis = DivergenceAnalysis::new(&module, &info, &cdg);
    analysis.run(0, &cfg);

    for id in [31, 33, 34, 35, 36] {
        assert!(analysis.is_value_divergent(id), "%{id} should be divergent");
    }
    assert!(
        !analysis.is_value_divergent(37),
        "a UniformConstant load is uniform at the load"
    );

    // Re-running on the same input reproduces the same key sets.
    let mut again = DivergenceAnalysis::new(&module, &info, &cdg);
    again.run(0, &cfg);
    let keys = |map: &spv_lint::FastHashMap<Word, _>| {
        let mut keys: Vec<Word> = map.keys().copied().collect();
        keys.sort_unstable();
        keys
    };
    assert_eq!(
        keys(analysis.divergent_values()),
        keys(again.divergent_values())
    );
    assert_eq!(
        keys(analysis.divergent_blocks()),
        keys(again.divergent_blocks())
    );
}
