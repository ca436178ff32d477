//! Compiler output verification: exact instruction sequences for the
//! core statement and expression forms, plus the static error set.

use std::rc::Rc;

use itertools::Itertools;
use rill_asm::{Opcode, NO_REGISTER};
use rill_vm::error::ErrorKind;
use rill_vm::module::{Module, ModuleSource};
use rill_vm::prelude::Vm;
use rill_vm::value::{FunctionProto, Value};

fn compile(source: &str) -> Module {
    let mut vm = Vm::new();
    vm.compile(&ModuleSource {
        name: "test",
        source: source.as_bytes(),
    })
    .expect("source should compile")
}

fn compile_err(source: &str) -> ErrorKind {
    let mut vm = Vm::new();
    vm.compile(&ModuleSource {
        name: "test",
        source: source.as_bytes(),
    })
    .expect_err("source should fail to compile")
    .kind()
}

fn ops(proto: &FunctionProto) -> Vec<Opcode> {
    proto
        .chunk
        .iter()
        .map(|&word| Opcode::decode(word).expect("compiled chunks hold valid opcodes"))
        .collect()
}

fn module_ops(module: &Module) -> Vec<Opcode> {
    ops(module.module_init.as_ref().expect("module init exists"))
}

/// The prototype of the first function defined by the module, assuming
/// the source defines exactly one `fn` at the top level.
fn only_fn(module: &Module) -> Rc<FunctionProto> {
    let mut protos = Vec::new();
    for index in 0..module.constants.len() {
        if let Some(Value::Proto(proto)) = module.constants.get(index as u16) {
            protos.push(proto.clone());
        }
    }
    assert_eq!(protos.len(), 1, "expected exactly one function constant");
    protos.remove(0)
}

/* Declarations */

#[test]
fn module_declaration_stores_through_module_var() {
    let module = compile("x := 42");

    assert_eq!(
        module_ops(&module),
        vec![
            Opcode::LoadInlineInteger(0, 42, true, true),
            Opcode::SetModuleVar(0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn local_declaration_is_one_load() {
    let module = compile("fn t() { x := 42 }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadInlineInteger(0, 42, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn constant_folding_eliminates_code() {
    let module = compile("x := 2 + 3 * 4");

    assert_eq!(
        module_ops(&module),
        vec![
            Opcode::LoadInlineInteger(0, 14, true, true),
            Opcode::SetModuleVar(0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
    assert_eq!(module.constants.len(), 0);
}

#[test]
fn float_constants_go_through_the_pool() {
    let module = compile("y := 3.14");

    let ops = module_ops(&module);
    assert!(matches!(ops[0], Opcode::LoadConstant(0, 0, false, false)));
    assert!(matches!(
        module.constants.get(0),
        Some(Value::Float(f)) if (f - 3.14).abs() < 1e-12
    ));
}

#[test]
fn negative_integers_use_the_sign_flag() {
    let module = compile("fn t() { x := -7 }");

    assert_eq!(
        ops(&only_fn(&module))[0],
        Opcode::LoadInlineInteger(0, 7, true, false)
    );
}

#[test]
fn short_strings_load_inline_with_length_in_flags() {
    let module = compile("fn t() { s := \"ab\" }");

    let first = ops(&only_fn(&module))[0];
    let Opcode::LoadInlineString(0, k, i, s) = first else {
        panic!("expected inline string load, got {first:?}");
    };
    assert_eq!(k & 0xff, u16::from(b'a'));
    assert_eq!(k >> 8, u16::from(b'b'));
    assert!(i, "length 2 sets the high length bit");
    assert!(!s);
}

#[test]
fn long_strings_are_pooled_and_deduplicated() {
    let module = compile("a := \"hello\"\nb := \"hello\"");

    assert_eq!(module.constants.len(), 1);
    let pooled = module.constants.get(0).unwrap();
    assert_eq!(pooled.as_str_bytes(), Some(b"hello" as &[u8]));
}

/* Assignment */

#[test]
fn local_assignment_reuses_the_home_register() {
    let module = compile("fn t() { x := 5\nx = 10 }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadInlineInteger(0, 5, true, true),
            Opcode::LoadInlineInteger(0, 10, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn copying_a_local_moves_between_registers() {
    let module = compile("fn t() { x := 5\ny := x }");

    assert_eq!(
        ops(&only_fn(&module))[1],
        Opcode::Move(1, 0, 0, false, false)
    );
}

#[test]
fn assignment_to_unbound_name_is_a_binding_error() {
    assert_eq!(compile_err("fn t() { x = 5 }"), ErrorKind::BindingError);
}

#[test]
fn assignment_to_a_call_result_needs_an_lvalue() {
    assert_eq!(
        compile_err("fn t() { f := 1\nf() = 5 }"),
        ErrorKind::ExpectLvalue
    );
}

/* If statements */

#[test]
fn simple_if_emits_cond_jump_and_close() {
    let module = compile("fn t() { if true { } }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadBool(0, 0, true, false),
            Opcode::CJump(0, 1, false, true),
            Opcode::CloseUpvalues(0, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn if_else_adds_one_exit_jump() {
    let module = compile("fn t() { if true { } else { } }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadBool(0, 0, true, false),
            Opcode::CJump(0, 2, false, true),
            Opcode::Jump(1, true),
            Opcode::CloseUpvalues(0, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn if_elif_else_chains_forward_jumps() {
    let module = compile("fn t() { if false { } elif false { } else { } }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadBool(0, 0, false, false),
            Opcode::CJump(0, 2, false, true),
            Opcode::Jump(4, true),
            Opcode::LoadBool(0, 0, false, false),
            Opcode::CJump(0, 2, false, true),
            Opcode::Jump(1, true),
            Opcode::CloseUpvalues(0, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn variable_condition_jumps_on_its_own_register() {
    let module = compile("fn t() { x := 1\nif x { } }");

    assert_eq!(
        ops(&only_fn(&module))[1..],
        [
            Opcode::CJump(0, 1, false, true),
            Opcode::CloseUpvalues(1, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn comparison_condition_uses_inline_constant_operand() {
    let module = compile("fn t() { x := 6\nif x > 5 { } }");

    assert_eq!(
        ops(&only_fn(&module))[1],
        Opcode::Gt(1, 0, 5 + 128, false, true)
    );
}

#[test]
fn branch_scopes_free_registers_for_reuse() {
    let module = compile("fn t() { if true { x := 2 }\nx := 3 }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadBool(0, 0, true, false),
            Opcode::CJump(0, 2, false, true),
            Opcode::LoadInlineInteger(0, 2, true, true),
            Opcode::CloseUpvalues(0, 0, 0, false, false),
            Opcode::LoadInlineInteger(0, 3, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn shadowing_a_visible_local_is_rejected() {
    assert_eq!(
        compile_err("fn t() { x := 1\nif true { x := 2 } }"),
        ErrorKind::VariableAlreadyDefined
    );
}

#[test]
fn block_locals_do_not_escape_their_block() {
    assert_eq!(
        compile_err("fn t() { if true { x := 5 }\nx = 5 }"),
        ErrorKind::BindingError
    );
}

/* For loops */

#[test]
fn constant_range_loop_loads_from_the_pool() {
    let module = compile("fn t() { for i in 0..10 { } }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadConstant(0, 0, false, false),
            Opcode::IterNext(NO_REGISTER, 1, 0, false, false),
            Opcode::Jump(2, true),
            Opcode::Jump(2, false),
            Opcode::CloseUpvalues(0, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );

    assert!(matches!(
        module.constants.get(0),
        Some(Value::InlineRange(r)) if r.start == 0 && r.end == 10
    ));
}

#[test]
fn stepped_range_is_pooled_as_a_heap_range() {
    let module = compile("fn t() { for i in 10..0 step -1 { } }");

    let Some(Value::Range(range)) = module.constants.get(0) else {
        panic!("stepped range should be pooled as a heap range");
    };
    let range = range.borrow();
    assert!(matches!(range.start, Value::Int(10)));
    assert!(matches!(range.end, Value::Int(0)));
    assert!(matches!(range.step, Value::Int(-1)));
}

#[test]
fn two_induction_variables_use_index_and_value_registers() {
    let module = compile("fn t() { for i, item in 0..5 { } }");

    assert_eq!(
        ops(&only_fn(&module))[1],
        Opcode::IterNext(2, 1, 0, false, false)
    );
}

#[test]
fn variable_range_builds_with_make_range() {
    let module = compile("fn t() { lo := 0\nhi := 4\nfor i in lo..hi { } }");

    assert_eq!(
        ops(&only_fn(&module))[2..5],
        [
            Opcode::Move(2, 0, 0, false, false),
            Opcode::MakeRange(2, 1, 1 + 128, false, true),
            Opcode::IterNext(NO_REGISTER, 3, 2, false, false),
        ]
    );
}

#[test]
fn break_and_continue_jump_to_loop_edges() {
    let module = compile("fn t() { for i in 0..10 { break } }");
    assert_eq!(
        ops(&only_fn(&module))[2..5],
        [
            Opcode::Jump(3, true),
            Opcode::Jump(2, true),
            Opcode::Jump(3, false),
        ]
    );

    let module = compile("fn t() { for i in 0..10 { continue } }");
    assert_eq!(
        ops(&only_fn(&module))[2..5],
        [
            Opcode::Jump(3, true),
            Opcode::Jump(2, false),
            Opcode::Jump(3, false),
        ]
    );
}

#[test]
fn loop_statement_errors() {
    assert_eq!(compile_err("fn t() { break }"), ErrorKind::UnexpectedToken);
    assert_eq!(
        compile_err("fn t() { continue }"),
        ErrorKind::UnexpectedToken
    );
    assert_eq!(
        compile_err("fn t() { for i, i in 0..5 { } }"),
        ErrorKind::VariableAlreadyDefined
    );
    assert_eq!(
        compile_err("fn t() { for i, j, k in 0..5 { } }"),
        ErrorKind::UnexpectedToken
    );
    assert_eq!(
        compile_err("fn t() { for i 0..5 { } }"),
        ErrorKind::UnexpectedToken
    );
}

/* Boolean and ternary lowering */

#[test]
fn short_circuit_on_register_operand_emits_three_instructions() {
    let module = compile("fn t() { x := 1\ny := x and 3 }");

    assert_eq!(
        ops(&only_fn(&module))[1..4],
        [
            Opcode::Move(1, 0, 0, false, false),
            Opcode::CJump(1, 2, false, true),
            Opcode::LoadInlineInteger(1, 3, true, true),
        ]
    );
}

#[test]
fn or_jumps_on_truthiness() {
    let module = compile("fn t() { x := 0\ny := x or 9 }");

    assert_eq!(
        ops(&only_fn(&module))[2],
        Opcode::CJump(1, 2, true, true)
    );
}

#[test]
fn constant_boolean_operands_fold_without_code() {
    // `0 and x` folds to 0, `3 and 5` to 5; either way a single load
    // feeds the declaration.
    let module = compile("fn t() { x := 1\ny := 0 and x\nz := 3 and 5 }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadInlineInteger(0, 1, true, true),
            Opcode::LoadInlineInteger(1, 0, true, true),
            Opcode::LoadInlineInteger(2, 5, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn constant_ternary_folds_to_the_chosen_branch() {
    let module = compile("fn t() { y := true ? 1 : 2\nz := false ? 1 : 2 }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::LoadInlineInteger(0, 1, true, true),
            Opcode::LoadInlineInteger(1, 2, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn dynamic_ternary_emits_both_branches() {
    let module = compile("fn t() { x := 1\ny := x ? 2 : 3 }");

    assert_eq!(
        ops(&only_fn(&module))[1..6],
        [
            Opcode::CJump(0, 3, false, true),
            Opcode::LoadInlineInteger(1, 2, true, true),
            Opcode::Jump(2, true),
            Opcode::LoadInlineInteger(1, 3, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

/* Calls */

#[test]
fn call_reserves_contiguous_registers() {
    let module = compile("fn t() { f := 1\na := 2\nf(42, a, 3 + 4) }");

    assert_eq!(
        ops(&only_fn(&module))[2..7],
        [
            Opcode::Move(2, 0, 0, false, false),
            Opcode::LoadInlineInteger(3, 42, true, true),
            Opcode::Move(4, 1, 0, false, false),
            Opcode::LoadInlineInteger(5, 7, true, true),
            Opcode::Call(2, 3, 3, false, false),
        ]
    );
}

#[test]
fn zero_argument_call_is_move_plus_call() {
    let module = compile("fn t() { f := 1\nf() }");

    assert_eq!(
        ops(&only_fn(&module))[1..3],
        [
            Opcode::Move(1, 0, 0, false, false),
            Opcode::Call(1, 2, 0, false, false),
        ]
    );
}

/* Collection initializers */

#[test]
fn list_initializer_batches_appends() {
    let module = compile("fn t() { xs := List[1, 2, 3] }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::NewCollection(0, 6, 3, true, false),
            Opcode::LoadInlineInteger(1, 1, true, true),
            Opcode::LoadInlineInteger(2, 2, true, true),
            Opcode::LoadInlineInteger(3, 3, true, true),
            Opcode::AppendList(0, 3, 1, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn seventeen_elements_split_into_two_batches() {
    let elements = (1..=17).map(|i| i.to_string()).join(", ");
    let source = format!("fn t() {{ xs := List[{elements}] }}");
    let module = compile(&source);

    let ops = ops(&only_fn(&module));
    assert_eq!(ops.len(), 1 + 16 + 1 + 1 + 1 + 1);
    assert_eq!(ops[17], Opcode::AppendList(0, 16, 1, false, false));
    assert_eq!(ops[19], Opcode::AppendList(0, 1, 1, false, false));
}

#[test]
fn dict_initializer_loads_interleaved_pairs() {
    let module = compile("fn t() { d := Dict[1: 10, 2: 20] }");

    assert_eq!(
        ops(&only_fn(&module)),
        vec![
            Opcode::NewCollection(0, 7, 2, true, false),
            Opcode::LoadInlineInteger(1, 1, true, true),
            Opcode::LoadInlineInteger(2, 10, true, true),
            Opcode::LoadInlineInteger(3, 2, true, true),
            Opcode::LoadInlineInteger(4, 20, true, true),
            Opcode::AppendMap(0, 2, 1, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn nine_pairs_split_into_two_batches() {
    let pairs = (1..=9).map(|i| format!("{i}: {}", i * 10)).join(", ");
    let source = format!("fn t() {{ d := Dict[{pairs}] }}");
    let module = compile(&source);

    let ops = ops(&only_fn(&module));
    assert_eq!(ops[17], Opcode::AppendMap(0, 8, 1, false, false));
    assert_eq!(ops[20], Opcode::AppendMap(0, 1, 1, false, false));
}

#[test]
fn mixing_pairs_into_a_list_literal_is_rejected() {
    assert_eq!(
        compile_err("fn t() { xs := List[1: 2] }"),
        ErrorKind::UnexpectedToken
    );
}

/* Defer */

#[test]
fn defer_block_becomes_an_anonymous_prototype() {
    let module = compile("defer { a := 1 }");

    assert_eq!(
        module_ops(&module),
        vec![
            Opcode::DeferCall(0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );

    let Some(Value::Proto(deferred)) = module.constants.get(0) else {
        panic!("defer body should be pooled as a prototype");
    };
    assert_eq!(deferred.arity, 0);
    assert_eq!(deferred.coarity, 0);
    assert_eq!(
        ops(deferred),
        vec![
            Opcode::LoadInlineInteger(0, 1, true, true),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn defer_restrictions() {
    assert_eq!(
        compile_err("defer { defer { } }"),
        ErrorKind::NestedDefer
    );
    assert_eq!(
        compile_err("defer { return 5 }"),
        ErrorKind::ReturnValueInDefer
    );
}

#[test]
fn bare_return_inside_defer_is_allowed() {
    let module = compile("defer { return }");
    assert_eq!(module.constants.len(), 1);
}

/* Functions */

#[test]
fn module_function_declaration_binds_a_module_var() {
    let module = compile("fn t() { defer { cleanup := true } }");

    assert_eq!(
        module_ops(&module),
        vec![
            Opcode::LoadConstant(0, 1, false, false),
            Opcode::SetModuleVar(0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn returns_must_agree_on_coarity() {
    assert_eq!(
        compile_err("fn t() { return 1\nreturn }"),
        ErrorKind::InconsistentReturnCount
    );
}

#[test]
fn return_at_module_scope_is_rejected() {
    assert_eq!(compile_err("return"), ErrorKind::UnexpectedToken);
}

#[test]
fn nested_function_captures_record_upvalue_descriptors() {
    let module = compile("fn outer() { x := 1\nfn inner() { x = x + 1 } }");

    let mut protos = Vec::new();
    for index in 0..module.constants.len() {
        if let Some(Value::Proto(proto)) = module.constants.get(index as u16) {
            protos.push(proto.clone());
        }
    }
    assert_eq!(protos.len(), 2);

    let inner = protos
        .iter()
        .find(|p| !p.upvalues.is_empty())
        .expect("inner prototype captures x");
    assert_eq!(inner.upvalues.len(), 1);
    assert_eq!(inner.upvalues[0].index, 0);
    assert!(inner.upvalues[0].is_local);

    assert_eq!(
        ops(inner),
        vec![
            Opcode::GetUpvalue(0, 0, 0, false, false),
            Opcode::Add(0, 0, 1 + 128, false, true),
            Opcode::SetUpvalue(0, 0, 0, false, false),
            Opcode::Return(NO_REGISTER, 0, 0, false, false),
        ]
    );
}

#[test]
fn export_targets_the_exports_table() {
    let module = compile("export x := 1");

    assert_eq!(
        module_ops(&module)[1],
        Opcode::SetModuleVar(0, 0, false, true)
    );
    assert_eq!(module.exports.len(), 1);
    assert_eq!(module.globals.len(), 0);
}

/* Misc static errors */

#[test]
fn folded_type_errors_surface_at_compile_time() {
    assert_eq!(compile_err("x := -true"), ErrorKind::UnexpectedType);
    assert_eq!(compile_err("x := ~3.14"), ErrorKind::UnexpectedType);
    assert_eq!(compile_err("x := 1 / 0"), ErrorKind::DivideByZero);
}

#[test]
fn reading_an_unknown_name_is_reported() {
    assert_eq!(
        compile_err("x := missing"),
        ErrorKind::UninitializedVariable
    );
}

#[test]
fn redeclaring_a_module_variable_is_rejected() {
    assert_eq!(
        compile_err("x := 1\nx := 2"),
        ErrorKind::VariableAlreadyDefined
    );
}

#[test]
fn bracket_depth_is_capped() {
    let depth = 128;
    let source = format!("x := {}42{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(compile_err(&source), ErrorKind::MaxmumBracketReached);

    let ok_depth = 120;
    let source = format!("x := {}42{}", "(".repeat(ok_depth), ")".repeat(ok_depth));
    let module = compile(&source);
    assert!(matches!(
        module_ops(&module)[0],
        Opcode::LoadInlineInteger(0, 42, true, true)
    ));
}

#[test]
fn reserved_statements_are_reported_as_unimplemented() {
    assert_eq!(compile_err("import foo"), ErrorKind::UnimplementedFeature);
    assert_eq!(compile_err("raise 1"), ErrorKind::UnimplementedFeature);
}

#[test]
fn struct_declarations_register_a_named_type() {
    let module = compile("struct Point { x\ny }");

    assert_eq!(module.types.len(), 1);
    assert_eq!(module_ops(&module).len(), 1); // just the return
}

#[test]
fn truncated_input_reports_end_of_file() {
    assert_eq!(compile_err("x := "), ErrorKind::UnexpectedEndOfFile);
    assert_eq!(
        compile_err("fn t() { if true { }"),
        ErrorKind::UnexpectedToken
    );
}
