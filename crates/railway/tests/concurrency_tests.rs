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
// Parallel calls
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_lanes_receive_their_slice_and_tid() {
    let out = run_ok(
        "func shift()(x)\n\
         \tx += TID * 10\n\
         return (x)\n\
         func main()()\n\
         \tlet xs = [1, 2, 3]\n\
         \t(xs) => call shift{3}() => (ys)\n\
         \tprint (ys)\n\
         \tunlet ys = [1, 12, 23]\n\
         return ()\n",
    );
    assert_eq!(out, "[1, 12, 23]\n");
}

#[test]
fn test_num_threads_inside_and_outside_lanes() {
    let out = run_ok(
        "func count()(x)\n\
         \tx += #TID\n\
         return (x)\n\
         func main()()\n\
         \tlet seq = 0\n\
         \tseq += #TID\n\
         \tlet xs = [0, 0]\n\
         \t(xs) => call count{2}() => (ys)\n\
         \tprint (seq, ys)\n\
         \tunlet ys = [2, 2]\n\
         \tunlet seq = 1\n\
         return ()\n",
    );
    assert_eq!(out, "1 [2, 2]\n");
}

#[test]
fn test_mutex_serialises_shared_mutation() {
    let out = run_ok(
        "func add(acc)(x)\n\
         \tmutex \"m\"\n\
         \t\tacc += x\n\
         \txetum\n\
         return (x)\n\
         func main()()\n\
         \tlet acc = 0\n\
         \tlet xs = [1, 2, 3, 4]\n\
         \t(xs) => call add{4}(acc) => (ys)\n\
         \tprint (acc)\n\
         \tunlet ys = [1, 2, 3, 4]\n\
         \tunlet acc = 10\n\
         return ()\n",
    );
    assert_eq!(out, "10\n");
}

#[test]
fn test_barrier_separates_phases() {
    // both increments happen before either doubling, so the result is
    // deterministic: (0 + 1 + 1) * 2 * 2 = 8
    let out = run_ok(
        "func phases(acc)()\n\
         \tmutex \"a\"\n\
         \t\tacc += 1\n\
         \txetum\n\
         \tbarrier \"sync\"\n\
         \tmutex \"b\"\n\
         \t\tacc *= 2\n\
         \txetum\n\
         return ()\n\
         func main()()\n\
         \tlet acc = 0\n\
         \tcall phases{2}(acc)\n\
         \tprint (acc)\n\
         \tunlet acc = 8\n\
         return ()\n",
    );
    assert_eq!(out, "8\n");
}

#[test]
fn test_parallel_call_then_uncall_is_identity() {
    let out = run_ok(
        "func phases(acc)()\n\
         \tmutex \"a\"\n\
         \t\tacc += 1\n\
         \txetum\n\
         \tbarrier \"sync\"\n\
         \tmutex \"b\"\n\
         \t\tacc *= 2\n\
         \txetum\n\
         return ()\n\
         func main()()\n\
         \tlet acc = 0\n\
         \tcall phases{2}(acc)\n\
         \tuncall phases{2}(acc)\n\
         \tprint (acc)\n\
         \tunlet acc = 0\n\
         return ()\n",
    );
    assert_eq!(out, "0\n");
}

#[test]
fn test_backward_mutex_passes_lanes_in_descending_tid_order() {
    // forward from acc = 2 the lanes weave ascending:
    //   lane 0: 2*2+1 = 5, lane 1: 5*2+2 = 12.
    // uncalling from 12 restores 2 only if the lanes pass the mutex in
    // descending order (lane 1: (12-2)/2 = 5, lane 0: (5-1)/2 = 2);
    // ascending passage would produce 7/4 and fail the unlet.
    let out = run_ok(
        "func weave(acc)(x)\n\
         \tmutex \"m\"\n\
         \t\tacc *= 2\n\
         \t\tacc += x\n\
         \txetum\n\
         return (x)\n\
         func main()()\n\
         \tlet acc = 12\n\
         \tlet ys = [1, 2]\n\
         \t(xs) => uncall weave{2}(acc) => (ys)\n\
         \tprint (acc, xs)\n\
         \tunlet xs = [1, 2]\n\
         \tunlet acc = 2\n\
         return ()\n",
    );
    assert_eq!(out, "2 [1, 2]\n");
}

#[test]
fn test_lane_slices_must_match_the_lane_count() {
    let err = run(
        "func id()(x)\n\
         \tx += 0\n\
         return (x)\n\
         func main()()\n\
         \tlet xs = [1, 2]\n\
         \t(xs) => call id{3}() => (ys)\n\
         \tunlet ys = [1, 2]\n\
         return ()\n",
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Call { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Failure propagation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_lane_failure_cancels_siblings() {
    // lane 1 divides by zero; lane 0 blocks at a barrier no sibling will
    // reach and must be cancelled rather than deadlock. The originating
    // error is the one surfaced.
    let err = run(
        "func crashy()(x)\n\
         \tif (TID = 1)\n\
         \t\tx /= 0\n\
         \telse\n\
         \t\tbarrier \"nowhere\"\n\
         \tfi (TID = 1)\n\
         return (x)\n\
         func main()()\n\
         \tlet xs = [1, 2]\n\
         \t(xs) => call crashy{2}() => (ys)\n\
         \tunlet ys = [1, 2]\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(err, EvalError::DivisionByZero);
}

#[test]
fn test_lane_leak_is_reported() {
    let err = run(
        "func sloppy()(x)\n\
         \tlet stray = TID\n\
         \tx += 0\n\
         return (x)\n\
         func main()()\n\
         \tlet xs = [1, 2]\n\
         \t(xs) => call sloppy{2}() => (ys)\n\
         \tunlet ys = [1, 2]\n\
         return ()\n",
    )
    .unwrap_err();
    assert_eq!(
        err,
        EvalError::InformationLeak {
            name: "stray".into(),
            func: "sloppy".into()
        }
    );
}
