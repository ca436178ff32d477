//! Property-style invariants: hashing, constant-pool dedup, and
//! structural properties of every compiled chunk.

use quickcheck_macros::quickcheck;

use rill_asm::{Opcode, NO_REGISTER};
use rill_vm::constants::ConstantTable;
use rill_vm::module::{Module, ModuleSource};
use rill_vm::prelude::Vm;
use rill_vm::value::{builtin_equals, builtin_hash, FunctionProto, Value};

#[quickcheck]
fn integer_hashing_is_deterministic(value: i64) -> bool {
    builtin_hash(&Value::Int(value)).unwrap() == builtin_hash(&Value::Int(value)).unwrap()
}

#[quickcheck]
fn equal_integers_hash_equal(value: i64) -> bool {
    let a = Value::Int(value);
    let b = Value::Int(value);
    builtin_equals(&a, &b) && builtin_hash(&a).unwrap() == builtin_hash(&b).unwrap()
}

#[quickcheck]
fn string_forms_hash_identically(content: String) -> bool {
    let bytes = content.as_bytes();
    let canonical = Value::string(bytes);
    let heap = Value::String(std::rc::Rc::new(rill_vm::value::StringObject::new(bytes)));

    builtin_equals(&canonical, &heap)
        && builtin_hash(&canonical).unwrap() == builtin_hash(&heap).unwrap()
}

#[quickcheck]
fn float_hashing_follows_bit_patterns(bits: u64) -> bool {
    let value = f64::from_bits(bits);
    builtin_hash(&Value::Float(value)).unwrap() == builtin_hash(&Value::Float(value)).unwrap()
}

#[quickcheck]
fn constant_pool_insertion_is_idempotent(value: i64) -> bool {
    let mut pool = ConstantTable::new();
    pool.insert(Value::string(b"occupant")).unwrap();

    let before = pool.len();
    let first = pool.insert(Value::Int(value)).unwrap();
    let grown = pool.len();
    let second = pool.insert(Value::Int(value)).unwrap();

    first == second && grown <= before + 1 && pool.len() == grown
}

/* Structural properties over a compilation corpus */

const CORPUS: &[&str] = &[
    "x := 42",
    "x := 2 + 3 * 4",
    "fn t() { if true { x := 1 } else { y := 2 } }",
    "fn t() { x := 1\nif x > 5 { x = 0 } elif x < 2 { x = 9 } else { x = 1 } }",
    "fn t() { for i in 0..10 { if i == 3 { break }\nif i == 1 { continue } } }",
    "fn t() { for i, v in 0..4 step 2 { x := v } }",
    "fn outer() { x := 1\nfn inner() { x = x + 1 }\ninner() }",
    "defer { a := 1 }\ndefer { b := 2 }",
    "fn t() { xs := List[1, 2, 3, 4, 5]\nd := Dict[1: 2]\nv := xs[0] }",
    "fn f(a, b) { return a ? b : a }\nr := f(true, false)",
    "s := \"hello\"\nb := \"ell\" in s",
];

fn compile(source: &str) -> Module {
    let mut vm = Vm::new();
    vm.compile(&ModuleSource {
        name: "prop",
        source: source.as_bytes(),
    })
    .expect("corpus sources compile")
}

fn all_protos(module: &Module) -> Vec<std::rc::Rc<FunctionProto>> {
    let mut protos = vec![module.module_init.clone().expect("module init exists")];
    for index in 0..module.constants.len() {
        if let Some(Value::Proto(proto)) = module.constants.get(index as u16) {
            protos.push(proto.clone());
        }
    }
    protos
}

/// Registers an instruction writes, if any.
fn written_register(op: &Opcode) -> Option<u8> {
    use Opcode::*;

    match *op {
        LoadConstant(a, ..) | LoadBool(a, ..) | LoadInlineInteger(a, ..)
        | LoadInlineString(a, ..) | GetModuleVar(a, ..) => Some(a),
        Move(a, ..) | GetUpvalue(a, ..) | Add(a, ..) | Subtract(a, ..) | Multiply(a, ..)
        | Divide(a, ..) | FloorDivide(a, ..) | Modulo(a, ..) | Power(a, ..) | Negate(a, ..)
        | Gt(a, ..) | Ge(a, ..) | Eq(a, ..) | Neq(a, ..) | Lt(a, ..) | Le(a, ..)
        | BitwiseAnd(a, ..) | BitwiseOr(a, ..) | BitwiseXor(a, ..) | BitwiseLShift(a, ..)
        | BitwiseRShift(a, ..) | BitwiseInvert(a, ..) | BoolNot(a, ..) | MakeRange(a, ..)
        | GetAttr(a, ..) | GetItem(a, ..) | DelItem(a, ..) | Contain(a, ..)
        | NewCollection(a, ..) | Call(a, ..) | CheckType(a, ..) => Some(a),
        IterNext(a, b, _, _, _) => {
            if a == NO_REGISTER {
                Some(b)
            } else {
                Some(a.max(b))
            }
        }
        _ => None,
    }
}

/// Jump target of an instruction relative to its own index, if any.
fn jump_target(op: &Opcode, index: usize) -> Option<isize> {
    use Opcode::*;

    let (distance, forward) = match *op {
        Jump(j, s) => (j as isize, s),
        CJump(_, k, _, s) if k != 0 => (k as isize, s),
        LoadBool(_, k, _, s) if k != 0 => (k as isize, s),
        Move(_, _, c, _, kc) if c != 0 => (c as isize, kc),
        _ => return None,
    };

    Some(if forward {
        index as isize + distance
    } else {
        index as isize - distance
    })
}

#[test]
fn max_stack_size_bounds_every_written_register() {
    for source in CORPUS {
        let module = compile(source);
        for proto in all_protos(&module) {
            for &word in &proto.chunk {
                let op = Opcode::decode(word).expect("valid opcode");
                if let Some(register) = written_register(&op) {
                    assert!(
                        u16::from(register) < u16::from(proto.max_stack_size),
                        "{source}: {op:?} writes past max_stack_size {}",
                        proto.max_stack_size
                    );
                }
            }
        }
    }
}

#[test]
fn every_jump_lands_inside_its_chunk() {
    for source in CORPUS {
        let module = compile(source);
        for proto in all_protos(&module) {
            for (index, &word) in proto.chunk.iter().enumerate() {
                let op = Opcode::decode(word).expect("valid opcode");
                if let Some(target) = jump_target(&op, index) {
                    assert!(
                        target >= 0 && (target as usize) < proto.chunk.len(),
                        "{source}: jump at {index} targets {target}, chunk len {}",
                        proto.chunk.len()
                    );
                }
            }
        }
    }
}

#[test]
fn every_chunk_ends_with_a_return() {
    for source in CORPUS {
        let module = compile(source);
        for proto in all_protos(&module) {
            let last = proto.chunk.last().copied().expect("chunks are non-empty");
            assert!(matches!(
                Opcode::decode(last),
                Some(Opcode::Return(_, _, _, _, _))
            ));
        }
    }
}

#[test]
fn iter_next_is_always_followed_by_a_forward_jump() {
    // The exhaustion path falls through to the next instruction; the
    // compiler must pair every IterNext with a forward Jump there.
    for source in CORPUS {
        let module = compile(source);
        for proto in all_protos(&module) {
            for (index, &word) in proto.chunk.iter().enumerate() {
                if matches!(Opcode::decode(word), Some(Opcode::IterNext(..))) {
                    let next = proto.chunk.get(index + 1).copied().expect("trailing jump");
                    assert!(matches!(Opcode::decode(next), Some(Opcode::Jump(_, true))));
                }
            }
        }
    }
}
