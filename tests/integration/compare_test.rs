use snipeq::compare::{
    BlockComparator, CompareConfig, SmtBlockComparator, StructuralComparator, Verdict,
};
use snipeq::error::{CompareError, SolverError};
use snipeq::ir::Function;
use snipeq::parser::parse_function_str;
use snipeq::semantics::smt::{SatResult, SmtBackend, SolverConfig};
use snipeq::semantics::SmtScript;
use std::time::Duration;

fn parse(text: &str) -> Function {
    parse_function_str(text, "test".to_string()).expect("test input should parse")
}

fn compare_with_smt(left: &str, right: &str) -> Result<Verdict, CompareError> {
    let (left, right) = (parse(left), parse(right));
    let mut smt = SmtBlockComparator::new(CompareConfig::new(SolverConfig::with_timeout_secs(10)));
    StructuralComparator::new().compare_functions(&left, &right, Some(&mut smt))
}

/// Structural comparator with parameters mapped and the first instruction
/// pair already compared (and found unequal)
fn diverged(left: &Function, right: &Function) -> StructuralComparator {
    let mut outer = StructuralComparator::new();
    for (l, r) in left.params.iter().zip(&right.params) {
        outer.mapping_mut().map_pair(l, r);
    }
    assert!(!outer.cmp_instructions(&left.block.instructions[0], &right.block.instructions[0]));
    outer
}

const SCENARIO_B_LEFT: &str = "\
define i32 @f(i32 %a, i32 %b) {
entry:
  %c = sub i32 %a, %b
  %d = mul i32 %c, 2
  ret i32 %d
}
";

const SCENARIO_B_RIGHT: &str = "\
define i32 @f(i32 %a, i32 %b) {
entry:
  %x = shl i32 %a, 1
  %y = shl i32 %b, 1
  %e = sub i32 %x, %y
  ret i32 %e
}
";

#[test_log::test]
fn test_commuted_add_is_equivalent() {
    let left = "define i32 @f(i32 %a, i32 %b) {\n  %r = add i32 %a, %b\n  ret i32 %r\n}\n";
    let right = "define i32 @f(i32 %a, i32 %b) {\n  %s = add i32 %b, %a\n  ret i32 %s\n}\n";
    assert_eq!(compare_with_smt(left, right), Ok(Verdict::Equivalent));
}

#[test_log::test]
fn test_scenario_b_realigns_and_proves() {
    assert_eq!(
        compare_with_smt(SCENARIO_B_LEFT, SCENARIO_B_RIGHT),
        Ok(Verdict::Equivalent)
    );
}

#[test_log::test]
fn test_scenario_b_cursors_and_determinism() {
    let (left, right) = (parse(SCENARIO_B_LEFT), parse(SCENARIO_B_RIGHT));
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let mut outer = diverged(&left, &right);
        let mut smt = SmtBlockComparator::new(CompareConfig::default());
        let (mut inst_l, mut inst_r) = (0, 0);
        let verdict = smt
            .compare(&mut outer, &left.block, &right.block, &mut inst_l, &mut inst_r)
            .unwrap();
        outcomes.push((verdict, inst_l, inst_r));
    }
    // One before the `ret` instructions
    assert_eq!(outcomes[0], (Verdict::Equivalent, 1, 2));
    assert_eq!(outcomes[0], outcomes[1]);
}

#[test_log::test]
fn test_wrong_rewrite_is_not_equivalent() {
    let right = SCENARIO_B_RIGHT.replace("%e = sub i32 %x, %y", "%e = sub i32 %y, %x");
    assert_eq!(
        compare_with_smt(SCENARIO_B_LEFT, &right),
        Ok(Verdict::NotEquivalent)
    );
}

#[test_log::test]
fn test_unmodeled_call_is_unsupported() {
    let left = "define i32 @f(i32 %a) {\n  %r = call i32 @compute(i32 %a)\n  ret i32 %r\n}\n";
    let right = "define i32 @f(i32 %a) {\n  %r = add i32 %a, 1\n  ret i32 %r\n}\n";
    let (left, right) = (parse(left), parse(right));

    let mut outer = diverged(&left, &right);
    let before = outer.mapping().clone();
    let mut smt = SmtBlockComparator::new(CompareConfig::default());
    let (mut inst_l, mut inst_r) = (0, 0);
    let result = smt.compare(&mut outer, &left.block, &right.block, &mut inst_l, &mut inst_r);

    match result {
        Err(CompareError::UnsupportedOperation(msg)) => assert!(msg.contains("compute")),
        other => panic!("expected an unsupported operation, got {:?}", other),
    }
    assert_eq!(outer.mapping(), &before);
    assert_eq!((inst_l, inst_r), (0, 0));
}

#[test_log::test]
fn test_nsw_overflow_leaves_result_unconstrained() {
    let left = "define i8 @f() {\n  %c = add nsw i8 100, 100\n  ret i8 %c\n}\n";
    let right = "define i8 @f() {\n  %c = add i8 -56, 0\n  ret i8 %c\n}\n";
    assert_eq!(compare_with_smt(left, right), Ok(Verdict::NotEquivalent));

    let left = "define i8 @f() {\n  %c = add nsw i8 1, 2\n  ret i8 %c\n}\n";
    let right = "define i8 @f() {\n  %c = add i8 3, 0\n  ret i8 %c\n}\n";
    assert_eq!(compare_with_smt(left, right), Ok(Verdict::Equivalent));
}

#[test_log::test]
fn test_ordered_vs_unordered_nan_compare() {
    let right = "define i1 @f(double %x) {\n  %p = fcmp true double %x, %x\n  ret i1 %p\n}\n";

    let unordered =
        "define i1 @f(double %x) {\n  %p = fcmp ueq double %x, 0x7FF8000000000000\n  ret i1 %p\n}\n";
    assert_eq!(compare_with_smt(unordered, right), Ok(Verdict::Equivalent));

    let ordered =
        "define i1 @f(double %x) {\n  %p = fcmp oeq double %x, 0x7FF8000000000000\n  ret i1 %p\n}\n";
    assert_eq!(compare_with_smt(ordered, right), Ok(Verdict::NotEquivalent));
}

#[test_log::test]
fn test_not_equal_restores_mapping() {
    let right = SCENARIO_B_RIGHT.replace("%e = sub i32 %x, %y", "%e = add i32 %x, %y");
    let (left, right) = (parse(SCENARIO_B_LEFT), parse(&right));

    let mut outer = diverged(&left, &right);
    let before = outer.mapping().clone();
    let mut smt = SmtBlockComparator::new(CompareConfig::default());
    let (mut inst_l, mut inst_r) = (0, 0);
    let verdict = smt
        .compare(&mut outer, &left.block, &right.block, &mut inst_l, &mut inst_r)
        .unwrap();
    assert_eq!(verdict, Verdict::NotEquivalent);
    assert_eq!(outer.mapping(), &before);
}

#[test_log::test]
fn test_no_sync_point_restores_mapping() {
    let left = parse("define i32 @f(i32 %a, i32 %b) {\n  ret i32 %a\n}\n");
    let right = parse("define i32 @f(i32 %a, i32 %b) {\n  ret i32 %b\n}\n");

    let mut outer = diverged(&left, &right);
    let before = outer.mapping().clone();
    let mut smt = SmtBlockComparator::new(CompareConfig::default());
    let (mut inst_l, mut inst_r) = (0, 0);
    let result = smt.compare(&mut outer, &left.block, &right.block, &mut inst_l, &mut inst_r);
    assert_eq!(result, Err(CompareError::NoSynchronizationPoint));
    assert_eq!(outer.mapping(), &before);
    assert_eq!(smt.statistics().solver_calls, 0);
}

#[test_log::test]
fn test_debug_info_inside_snippet_is_ignored() {
    let left = "\
define i32 @f(i32 %a, i32 %b) {
  %c = sub i32 %a, %b
  call void @llvm.dbg.value(metadata i32 %c, metadata !10, metadata !DIExpression())
  %d = mul i32 %c, 2
  ret i32 %d
}
";
    assert_eq!(
        compare_with_smt(left, SCENARIO_B_RIGHT),
        Ok(Verdict::Equivalent)
    );
}

/// Backend that never decides and takes a fixed time per query
struct SlowBackend {
    delay: Duration,
    calls: usize,
}

impl SmtBackend for SlowBackend {
    fn check(&mut self, _: &SmtScript, _: Option<Duration>) -> Result<SatResult, SolverError> {
        self.calls += 1;
        std::thread::sleep(self.delay);
        Ok(SatResult::Unknown)
    }
}

#[test_log::test]
fn test_budget_exhausted_across_retries() {
    let left = parse(
        "define i32 @f(i32 %a, i32 %b) {\n  %c = sub i32 %a, %b\n  %u = add i32 %c, 1\n  ret i32 %u\n}\n",
    );
    let right = parse(
        "define i32 @f(i32 %a, i32 %b) {\n  %d = sub i32 %b, %a\n  %u = add i32 %d, 1\n  ret i32 %u\n}\n",
    );

    let backend = SlowBackend {
        delay: Duration::from_millis(60),
        calls: 0,
    };
    let config = CompareConfig::new(SolverConfig::with_timeout(Duration::from_millis(100)));
    let mut smt = SmtBlockComparator::with_backend(backend, config);
    let result = StructuralComparator::new().compare_functions(&left, &right, Some(&mut smt));

    assert_eq!(result, Err(CompareError::OutOfTime));
    assert_eq!(smt.statistics().solver_calls, 2);
    assert_eq!(smt.statistics().unknown_results, 2);
}

/// Single-instruction functions returning `%c`, the left one defined by
/// `left` and the right one by `right`
fn compare_defs(ret: &str, left: &str, right: &str) -> Result<Verdict, CompareError> {
    let func = |def: &str| format!("define {ret} @f() {{\n  %c = {def}\n  ret {ret} %c\n}}\n");
    compare_with_smt(&func(left), &func(right))
}

#[test_log::test]
fn test_shl_flags_hold_only_without_lost_bits() {
    let eq = Ok(Verdict::Equivalent);
    let ne = Ok(Verdict::NotEquivalent);
    assert_eq!(compare_defs("i8", "shl nuw i8 3, 1", "add i8 3, 3"), eq);
    // 200 << 1 drops a set bit
    assert_eq!(compare_defs("i8", "shl nuw i8 200, 1", "add i8 144, 0"), ne);
    // 64 << 1 flips the sign
    assert_eq!(compare_defs("i8", "shl nsw i8 64, 1", "add i8 -128, 0"), ne);
    assert_eq!(compare_defs("i8", "shl nsw i8 -64, 1", "add i8 -128, 0"), eq);
    // Shifting by the full width is never defined
    assert_eq!(compare_defs("i8", "shl nuw i8 0, 8", "add i8 0, 0"), ne);
}

#[test_log::test]
fn test_exact_requires_no_remainder() {
    let eq = Ok(Verdict::Equivalent);
    let ne = Ok(Verdict::NotEquivalent);
    assert_eq!(compare_defs("i8", "lshr exact i8 12, 2", "add i8 3, 0"), eq);
    assert_eq!(compare_defs("i8", "lshr exact i8 13, 2", "add i8 3, 0"), ne);
    assert_eq!(compare_defs("i8", "ashr exact i8 -8, 2", "add i8 -2, 0"), eq);
    assert_eq!(compare_defs("i8", "ashr exact i8 -7, 2", "add i8 -2, 0"), ne);
    assert_eq!(compare_defs("i8", "sdiv exact i8 -12, 4", "add i8 -3, 0"), eq);
    assert_eq!(compare_defs("i8", "sdiv exact i8 -13, 4", "add i8 -3, 0"), ne);
}

#[test_log::test]
fn test_sub_nuw_and_mul_nsw_wrap() {
    let eq = Ok(Verdict::Equivalent);
    let ne = Ok(Verdict::NotEquivalent);
    assert_eq!(compare_defs("i8", "sub nuw i8 5, 3", "add i8 2, 0"), eq);
    assert_eq!(compare_defs("i8", "sub nuw i8 3, 5", "add i8 -2, 0"), ne);
    assert_eq!(compare_defs("i8", "mul nsw i8 -64, 2", "add i8 -128, 0"), eq);
    assert_eq!(compare_defs("i8", "mul nsw i8 64, 2", "add i8 -128, 0"), ne);
}

#[test_log::test]
fn test_fneg_matches_subtraction_from_negative_zero() {
    let left = "define double @f(double %x) {\n  %n = fneg double %x\n  ret double %n\n}\n";
    let right = "define double @f(double %x) {\n  %n = fsub double -0.0, %x\n  ret double %n\n}\n";
    assert_eq!(compare_with_smt(left, right), Ok(Verdict::Equivalent));

    let wrong = "define double @f(double %x) {\n  %n = fsub double 1.0, %x\n  ret double %n\n}\n";
    assert_eq!(compare_with_smt(left, wrong), Ok(Verdict::NotEquivalent));
}

#[test_log::test]
fn test_frem_and_float_conversions() {
    let eq = Ok(Verdict::Equivalent);
    let ne = Ok(Verdict::NotEquivalent);
    assert_eq!(compare_defs("double", "frem double 5.0, 4.0", "fadd double 1.0, 0.0"), eq);
    assert_eq!(compare_defs("double", "sitofp i8 -3 to double", "fadd double -3.0, 0.0"), eq);
    assert_eq!(compare_defs("double", "uitofp i8 -3 to double", "fadd double -3.0, 0.0"), ne);
    assert_eq!(compare_defs("double", "fpext float 1.5 to double", "fadd double 1.5, 0.0"), eq);
}

#[test_log::test]
fn test_trunc_to_bool_keeps_low_bit() {
    assert_eq!(
        compare_defs("i1", "trunc i8 3 to i1", "icmp eq i8 1, 1"),
        Ok(Verdict::Equivalent)
    );
    assert_eq!(
        compare_defs("i1", "trunc i8 2 to i1", "icmp eq i8 1, 1"),
        Ok(Verdict::NotEquivalent)
    );
}

#[test_log::test]
fn test_budget_restarts_for_each_comparison() {
    let (left, right) = (parse(SCENARIO_B_LEFT), parse(SCENARIO_B_RIGHT));
    let backend = SlowBackend {
        delay: Duration::from_millis(60),
        calls: 0,
    };
    let config = CompareConfig::new(SolverConfig::with_timeout(Duration::from_millis(100)));
    let mut smt = SmtBlockComparator::with_backend(backend, config);

    // Each comparison spends 60ms of its own 100ms; a budget carried over
    // would run out in the second one
    for _ in 0..2 {
        let mut outer = diverged(&left, &right);
        let (mut inst_l, mut inst_r) = (0, 0);
        let verdict = smt.compare(&mut outer, &left.block, &right.block, &mut inst_l, &mut inst_r);
        assert_eq!(verdict, Ok(Verdict::NotEquivalent));
    }
    assert_eq!(smt.statistics().solver_calls, 2);
    assert_eq!(smt.statistics().unknown_results, 2);
}
