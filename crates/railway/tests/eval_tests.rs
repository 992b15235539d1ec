use std::sync::Arc;

use parking_lot::Mutex;
use railway::{parse_program, EvalError};

// Parse a source file, run `main`, and capture its output.
fn run(src: &str) -> Result<String, EvalError> {
    let program = parse_program(src).expect("parse failed");
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    program.run_with_output(buffer.clone())?;
    let bytes = buffer.lock().clone();
    Ok(String::from_utf8(bytes).expect("output was not utf-8"))
}

fn run_ok(src: &str) -> String {
    run(src).expect("program failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Let / Unlet
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_let_modify_unlet() {
    // let x = 6; x += 5; unlet x = 11 — succeeds, final scope empty
    let out = run_ok(
        "func main()()\n\
         \tlet x = 6\n\
         \tx += 5\n\
         \tprint (x)\n\
         \tunlet x = 11\n\
         return ()\n",
    );
    assert_eq!(out, "11\n");
}

#[test]
fn test_unlet_value_mismatch() {
    // let x = 6; x += 5; unlet x = 10 — fails with unlet-error
    let err = run(
        "func main()()\n\
         \tlet x = 6\n\
         \tx += 5\n\
         \tunlet x = 10\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::UnletMismatch { .. }));
}

#[test]
fn test_let_without_rhs_defaults_to_zero() {
    let out = run_ok(
        "func main()()\n\
         \tlet x\n\
         \tprint (x)\n\
         \tunlet x\n\
         return ()\n",
    );
    assert_eq!(out, "0\n");
}

#[test]
fn test_let_into_occupied_name() {
    let err = run(
        "func main()()\n\
         \tlet x = 1\n\
         \tlet x = 2\n\
         \tunlet x = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::AlreadyExists { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Modifications
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_modification_operators() {
    let out = run_ok(
        "func main()()\n\
         \tlet x = 12\n\
         \tx -= 2\n\
         \tx *= 3\n\
         \tx /= 5\n\
         \tprint (x)\n\
         \tunlet x = 6\n\
         return ()\n",
    );
    assert_eq!(out, "6\n");
}

#[test]
fn test_multiply_by_zero_is_rejected() {
    let err = run(
        "func main()()\n\
         \tlet x = 4\n\
         \tlet y = 0\n\
         \tx *= y\n\
         \tunlet y = 0\n\
         \tunlet x = 0\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(err, EvalError::ZeroMultiplication { name: "x".into() });
}

#[test]
fn test_divide_by_zero_is_rejected() {
    let err = run(
        "func main()()\n\
         \tlet x = 4\n\
         \tlet y = 0\n\
         \tx /= y\n\
         \tunlet y = 0\n\
         \tunlet x = 0\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(err, EvalError::DivisionByZero);
}

#[test]
fn test_indexed_modification() {
    let out = run_ok(
        "func main()()\n\
         \tlet a = [1, 2, 3]\n\
         \ta[1] += 10\n\
         \tprint (a)\n\
         \tunlet a = [1, 12, 3]\n\
         return ()\n",
    );
    assert_eq!(out, "[1, 12, 3]\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Exact rationals
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_thirds_sum_exactly_to_one() {
    let out = run_ok(
        "func main()()\n\
         \tlet x = 1/3\n\
         \tx += 1/3\n\
         \tx += 1/3\n\
         \tprint (x)\n\
         \tunlet x = 1\n\
         return ()\n",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn test_fraction_output_form() {
    let out = run_ok(
        "func main()()\n\
         \tlet x = 10/8\n\
         \tprint (x)\n\
         \tunlet x = 5/4\n\
         return ()\n",
    );
    assert_eq!(out, "5/4\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Swap
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_swap_scalars() {
    let out = run_ok(
        "func main()()\n\
         \tlet a = 1\n\
         \tlet b = 2\n\
         \tswap a <=> b\n\
         \tprint (a, b)\n\
         \tunlet a = 2\n\
         \tunlet b = 1\n\
         return ()\n",
    );
    assert_eq!(out, "2 1\n");
}

#[test]
fn test_swap_within_one_array() {
    let out = run_ok(
        "func main()()\n\
         \tlet a = [1, 2, 3]\n\
         \tswap a[0] <=> a[2]\n\
         \tprint (a)\n\
         \tunlet a = [3, 2, 1]\n\
         return ()\n",
    );
    assert_eq!(out, "[3, 2, 1]\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Push / Pop
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_push_moves_binding_into_array() {
    let out = run_ok(
        "func main()()\n\
         \tlet a = [1]\n\
         \tlet x = 9\n\
         \tpush x => a\n\
         \tprint (a)\n\
         \tunlet a = [1, 9]\n\
         return ()\n",
    );
    // x is gone from the scope, so main ends clean without unletting it
    assert_eq!(out, "[1, 9]\n");
}

#[test]
fn test_pop_binds_tail_element() {
    let out = run_ok(
        "func main()()\n\
         \tlet a = [1, 9]\n\
         \tpop a => x\n\
         \tprint (x, a)\n\
         \tunlet x = 9\n\
         \tunlet a = [1]\n\
         return ()\n",
    );
    assert_eq!(out, "9 [1]\n");
}

#[test]
fn test_pop_from_empty_array() {
    let err = run(
        "func main()()\n\
         \tlet a = []\n\
         \tpop a => x\n\
         \tunlet a = []\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::MemAccess { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Arrays, ranges, tensors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_range_and_length() {
    let out = run_ok(
        "func main()()\n\
         \tlet r = [0 to 5]\n\
         \tprint (r, #r)\n\
         \tunlet r = [0, 1, 2, 3, 4]\n\
         return ()\n",
    );
    assert_eq!(out, "[0, 1, 2, 3, 4] 5\n");
}

#[test]
fn test_range_with_step() {
    let out = run_ok(
        "func main()()\n\
         \tlet r = [0 to 5 by 2]\n\
         \tprint (r)\n\
         \tunlet r = [0, 2, 4]\n\
         return ()\n",
    );
    assert_eq!(out, "[0, 2, 4]\n");
}

#[test]
fn test_tensor_literal() {
    let out = run_ok(
        "func main()()\n\
         \tlet t = [0 tensor [2, 3]]\n\
         \tprint (t)\n\
         \tunlet t = [[0, 0, 0], [0, 0, 0]]\n\
         return ()\n",
    );
    assert_eq!(out, "[[0, 0, 0], [0, 0, 0]]\n");
}

#[test]
fn test_index_out_of_bounds() {
    let err = run(
        "func main()()\n\
         \tlet a = [1, 2]\n\
         \tlet x = a[5]\n\
         \tunlet a = [1, 2]\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::MemAccess { .. }));
}

#[test]
fn test_comparing_array_with_number_is_a_type_error() {
    let err = run(
        "func main()()\n\
         \tlet a = [1, 2]\n\
         \tlet x = a < 3\n\
         \tunlet a = [1, 2]\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Type { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Globals
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_globals_are_readable_everywhere() {
    let out = run_ok(
        "global base = 10\n\
         global scaled = base * 2\n\
         func main()()\n\
         \tlet x = scaled + 1\n\
         \tprint (x)\n\
         \tunlet x = 21\n\
         return ()\n",
    );
    assert_eq!(out, "21\n");
}

#[test]
fn test_local_shadows_global_while_it_lives() {
    let out = run_ok(
        "global g = 7\n\
         func main()()\n\
         \tlet g = 1\n\
         \tprint (g)\n\
         \tunlet g = 1\n\
         \tlet x = g\n\
         \tprint (x)\n\
         \tunlet x = 7\n\
         return ()\n",
    );
    assert_eq!(out, "1\n7\n");
}

#[test]
fn test_globals_are_not_mutable() {
    let err = run(
        "global g = 7\n\
         func main()()\n\
         \tlet q = 1\n\
         \tg += 1\n\
         \tunlet q = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Undefined { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Print
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_print_mixes_strings_and_values() {
    let out = run_ok(
        "func main()()\n\
         \tlet x = 1/2\n\
         \tprint (\"x is\", x)\n\
         \tunlet x = 1/2\n\
         return ()\n",
    );
    assert_eq!(out, "x is 1/2\n");
}

#[test]
fn test_undefined_variable() {
    let err = run(
        "func main()()\n\
         \tlet q = 1\n\
         \tq += missing\n\
         \tunlet q = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(
        err,
        EvalError::Undefined {
            name: "missing".into()
        }
    );
}
