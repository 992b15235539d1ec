use std::sync::Arc;

use parking_lot::Mutex;
use railway::{parse_program, EvalError};

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
// Borrowed and stolen parameters
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_borrowed_parameter_shares_the_cell() {
    let out = run_ok(
        "func bump(x)()\n\
         \tx += 1\n\
         return ()\n\
         func main()()\n\
         \tlet x = 41\n\
         \tcall bump(x)\n\
         \tprint (x)\n\
         \tunlet x = 42\n\
         return ()\n",
    );
    assert_eq!(out, "42\n");
}

#[test]
fn test_stolen_parameter_leaves_the_caller() {
    let out = run_ok(
        "func consume()(x)\n\
         \tx += 1\n\
         return (x)\n\
         func main()()\n\
         \tlet a = 1\n\
         \t(a) => call consume() => (b)\n\
         \tprint (b)\n\
         \tunlet b = 2\n\
         return ()\n",
    );
    // `a` no longer exists in main, so main ends clean without it
    assert_eq!(out, "2\n");
}

#[test]
fn test_stolen_argument_really_moves() {
    let err = run(
        "func consume()(x)\n\
         \tx += 1\n\
         return (x)\n\
         func main()()\n\
         \tlet a = 1\n\
         \t(a) => call consume() => (b)\n\
         \ta += 1\n\
         \tunlet b = 2\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(err, EvalError::Undefined { name: "a".into() });
}

#[test]
fn test_borrowed_reference_cannot_be_unlet() {
    let err = run(
        "func thief(x)()\n\
         \tlet q = 1\n\
         \tunlet x = 1\n\
         \tunlet q = 1\n\
         return ()\n\
         func main()()\n\
         \tlet x = 1\n\
         \tcall thief(x)\n\
         \tunlet x = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Ownership { .. }));
}

#[test]
fn test_call_arity_mismatch() {
    let err = run(
        "func pair()(x, y)\n\
         \tx += y\n\
         return (x, y)\n\
         func main()()\n\
         \tlet a = 1\n\
         \t(a) => call pair() => (p, q)\n\
         \tunlet p = 1\n\
         \tunlet q = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Call { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// The leak check
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_information_leak_names_the_binding() {
    let err = run(
        "func bad()()\n\
         \tlet x = 1\n\
         \tlet y = 2\n\
         \tunlet y = 2\n\
         return ()\n\
         func main()()\n\
         \tlet q = 1\n\
         \tcall bad()\n\
         \tunlet q = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(
        err,
        EvalError::InformationLeak {
            name: "x".into(),
            func: "bad".into()
        }
    );
}

#[test]
fn test_clean_return_passes_the_leak_check() {
    let out = run_ok(
        "func tidy(shared)()\n\
         \tlet x = shared + 1\n\
         return (x)\n\
         func main()()\n\
         \tlet s = 9\n\
         \tcall tidy(s) => (x)\n\
         \tprint (x)\n\
         \tunlet x = 10\n\
         \tunlet s = 9\n\
         return ()\n",
    );
    assert_eq!(out, "10\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Call / Uncall inverse pairs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_call_then_uncall_is_identity() {
    let out = run_ok(
        "func step(base)(x)\n\
         \tx += base\n\
         \tx *= 2\n\
         return (x)\n\
         func main()()\n\
         \tlet base = 3\n\
         \tlet a = 4\n\
         \t(a) => call step(base) => (b)\n\
         \tprint (b)\n\
         \t(a) => uncall step(base) => (b)\n\
         \tprint (a)\n\
         \tunlet a = 4\n\
         \tunlet base = 3\n\
         return ()\n",
    );
    assert_eq!(out, "14\n4\n");
}

#[test]
fn test_uncall_inverts_a_known_result() {
    // uncalling with a hand-written result recovers the input
    let out = run_ok(
        "func step()(x)\n\
         \tx *= 2\n\
         return (x)\n\
         func main()()\n\
         \tlet b = 14\n\
         \t(a) => uncall step() => (b)\n\
         \tprint (a)\n\
         \tunlet a = 7\n\
         return ()\n",
    );
    assert_eq!(out, "7\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Undoreturn
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_undoreturn_copies_and_undoes() {
    let out = run_ok(
        "func total(data)()\n\
         \tlet sum = 0\n\
         \tfor (i in data)\n\
         \t\tsum += i\n\
         \trof\n\
         undoreturn (sum)\n\
         func main()()\n\
         \tlet data = [1, 2, 3]\n\
         \tcall total(data) => (sum)\n\
         \tprint (sum)\n\
         \tunlet sum = 6\n\
         \tunlet data = [1, 2, 3]\n\
         return ()\n",
    );
    assert_eq!(out, "6\n");
}

#[test]
fn test_undoreturn_backward_destroys_the_copy() {
    let out = run_ok(
        "func total(data)()\n\
         \tlet sum = 0\n\
         \tfor (i in data)\n\
         \t\tsum += i\n\
         \trof\n\
         undoreturn (sum)\n\
         func main()()\n\
         \tlet data = [1, 2, 3]\n\
         \tcall total(data) => (sum)\n\
         \tuncall total(data) => (sum)\n\
         \tprint (data)\n\
         \tunlet data = [1, 2, 3]\n\
         return ()\n",
    );
    assert_eq!(out, "[1, 2, 3]\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Mono functions and promote: argmax
// ═══════════════════════════════════════════════════════════════════════

const ARGMAX: &str = "func argmax(list)()\n\
                      \tlet .m = 0\n\
                      \tfor (.i in [1 to #list])\n\
                      \t\tif (list[.i] > list[.m])\n\
                      \t\t\tunlet .m\n\
                      \t\t\tlet .m = .i\n\
                      \t\tfi ()\n\
                      \trof\n\
                      \tpromote .m => m\n\
                      return (m)\n";

#[test]
fn test_argmax_via_mono_scratch_state() {
    let src = format!(
        "{}\
         func main()()\n\
         \tlet data = [2, 3, 91, 5, 4]\n\
         \tcall argmax(data) => (m)\n\
         \tprint (m)\n\
         \tunlet m = 2\n\
         \tunlet data = [2, 3, 91, 5, 4]\n\
         return ()\n",
        ARGMAX
    );
    assert_eq!(run_ok(&src), "2\n");
}

#[test]
fn test_argmax_uncall_consumes_the_result() {
    let src = format!(
        "{}\
         func main()()\n\
         \tlet data = [2, 3, 91, 5, 4]\n\
         \tcall argmax(data) => (m)\n\
         \tuncall argmax(data) => (m)\n\
         \tprint (data)\n\
         \tunlet data = [2, 3, 91, 5, 4]\n\
         return ()\n",
        ARGMAX
    );
    assert_eq!(run_ok(&src), "[2, 3, 91, 5, 4]\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Mono argument discipline
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_mono_argument_for_non_mono_parameter() {
    let err = run(
        "func id()(x)\n\
         \tx += 0\n\
         return (x)\n\
         func main()()\n\
         \tlet q = 1\n\
         \tlet .a = 1\n\
         \t(.a) => call id() => (b)\n\
         \tunlet b = 1\n\
         \tunlet q = 1\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::IllegalMono { .. }));
}
