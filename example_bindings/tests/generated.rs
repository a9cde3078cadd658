// Generated bindings driven against a hand-written stand-in for the native
// module. Plain functions are exported under their C names; shims take the
// names the generator gave them, read back from its export list.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use example_bindings::{
    Color, NodePtr, Unary, add, add_i64, apply, bad_color, echo, list_sum, make_version,
    next_color, sum3,
};
use swab_runtime::{Aggregate, LoadOptions, Native, Runtime, SwabError};

const EXPORTS: &str = include_str!(concat!(env!("OUT_DIR"), "/exports.txt"));

/// The generated export whose name is `prefix` plus its counter.
fn shim(prefix: &str) -> &'static str {
    EXPORTS
        .lines()
        .find(|name| {
            name.strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .unwrap_or_else(|| panic!("no generated export starting with {prefix}"))
}

fn native() -> String {
    format!(
        r#"
(module
  (import "env" "__swab_compose_wide" (func $compose (param i32 i32) (result i32)))
  (import "env" "__swab_wide_high" (func $high (param i32) (result i32)))
  (import "env" "__swab_wide_low" (func $low (param i32) (result i32)))
  (import "env" "memory" (memory 1))
  (import "env" "__indirect_function_table" (table 1 funcref))

  (global $heap (mut i32) (i32.const 1024))

  (func $malloc (export "malloc") (param $size i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $heap))
    (global.set $heap
      (i32.and (i32.add (i32.add (global.get $heap) (local.get $size)) (i32.const 7))
               (i32.const -8)))
    (local.get $p))
  (func $free (export "free") (param i32))

  (func (export "add") (param i32 i32) (result i32)
    (i32.add (local.get 0) (local.get 1)))
  (func (export "echo") (param i32) (result i32)
    (local.get 0))
  (func (export "apply") (param $f i32) (param $x i32) (result i32)
    (call_indirect (param i32) (result i32) (local.get $x) (local.get $f)))
  (func (export "next_color") (param i32) (result i32)
    (i32.rem_u (i32.add (local.get 0) (i32.const 1)) (i32.const 3)))
  (func (export "bad_color") (result i32)
    (i32.const 7))
  (func (export "sum3") (param $p i32) (result i32)
    (i32.add
      (i32.add (i32.load offset=0 (local.get $p)) (i32.load offset=4 (local.get $p)))
      (i32.load offset=8 (local.get $p))))

  (func (export "make_version") (param i32 i32 i32) (result i32)
    (local $p i32)
    (local.set $p (call $malloc (i32.const 12)))
    (i32.store offset=0 (local.get $p) (local.get 0))
    (i32.store offset=4 (local.get $p) (local.get 1))
    (i32.store offset=8 (local.get $p) (local.get 2))
    (local.get $p))
  (func (export "{get_major}") (param i32) (result i32)
    (i32.load offset=0 (local.get 0)))
  (func (export "{set_major}") (param i32 i32)
    (i32.store offset=0 (local.get 0) (local.get 1)))
  (func (export "{delete_version}") (param i32)
    (call $free (local.get 0)))

  (func $unwrap (param $h i32) (result i64)
    (i64.or
      (i64.shl (i64.extend_i32_s (call $high (local.get $h))) (i64.const 32))
      (i64.extend_i32_u (call $low (local.get $h)))))
  (func $wrap (param $v i64) (result i32)
    (call $compose
      (i32.wrap_i64 (i64.shr_s (local.get $v) (i64.const 32)))
      (i32.wrap_i64 (local.get $v))))
  (func (export "{add_i64}") (param i32 i32) (result i32)
    (call $wrap (i64.add (call $unwrap (local.get 0)) (call $unwrap (local.get 1)))))
  (func (export "{list_sum}") (param $n i32) (result i32)
    (local $sum i64)
    (block $done
      (loop $next
        (br_if $done (i32.eqz (local.get $n)))
        (local.set $sum
          (i64.add (local.get $sum) (i64.extend_i32_s (i32.load offset=0 (local.get $n)))))
        (local.set $n (i32.load offset=4 (local.get $n)))
        (br $next)))
    (call $wrap (local.get $sum)))
)
"#,
        get_major = shim("__version_get_major_"),
        set_major = shim("__version_set_major_"),
        delete_version = shim("__delete_version_ptr_"),
        add_i64 = shim("__wrap_addI64_"),
        list_sum = shim("__wrap_list_sum_"),
    )
}

fn runtime() -> Runtime {
    Runtime::new(native().as_bytes(), LoadOptions::default()).unwrap()
}

#[test]
fn plain_function() {
    let mut rt = runtime();
    assert_eq!(add(&mut rt, 2, 3).unwrap(), 5);
    assert_eq!(add(&mut rt, i32::MAX, 1).unwrap(), i32::MIN);
}

#[test]
fn strings_round_trip() {
    let mut rt = runtime();
    assert_eq!(echo(&mut rt, "hello").unwrap(), "hello");
    assert_eq!(echo(&mut rt, "").unwrap(), "");
}

#[test]
fn enums_convert_both_ways() {
    let mut rt = runtime();
    assert_eq!(next_color(&mut rt, Color::Red).unwrap(), Color::Green);
    assert_eq!(next_color(&mut rt, Color::Blue).unwrap(), Color::Red);
    assert!(matches!(
        bad_color(&mut rt),
        Err(SwabError::UnknownEnumValue { value: 7, .. })
    ));

    assert_eq!(Color::from_value(2), Some(Color::Blue));
    assert_eq!(Color::from_value(3), None);
    assert_eq!(Color::Green.name(), "GREEN");
    assert_eq!(Color::Green.value(), 1);
}

#[test]
fn arrays_are_copied_in() {
    let mut rt = runtime();
    assert_eq!(sum3(&mut rt, vec![1, 2, 3]).unwrap(), 6);
    assert!(matches!(
        sum3(&mut rt, vec![1, 2]),
        Err(SwabError::LengthMismatch { expected: 3, actual: 2 })
    ));
}

#[test]
fn host_closure_runs_once_per_native_call() {
    let mut rt = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let double = Unary::host(move |_rt, x| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(x * 2)
    });

    assert_eq!(apply(&mut rt, double.clone(), 21).unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(apply(&mut rt, double, 5).unwrap(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn installed_callback_is_callable_from_the_host() {
    let mut rt = runtime();
    let negate = Unary::host(|_rt, x| Ok(-x)).install(&mut rt).unwrap();
    let slot = negate.slot().unwrap();
    assert_ne!(slot, 0);

    assert_eq!(negate.call(&mut rt, 5).unwrap(), -5);
    assert_eq!(apply(&mut rt, negate.clone(), 8).unwrap(), -8);
    negate.release(&mut rt).unwrap();
}

#[test]
fn null_callback_is_refused() {
    let mut rt = runtime();
    assert!(matches!(
        Unary::Native(0).call(&mut rt, 1),
        Err(SwabError::NullPointer)
    ));
}

#[test]
fn host_errors_reach_the_caller() {
    let mut rt = runtime();
    let failing = Unary::host(|_rt, _x| Err(SwabError::NullPointer));
    assert!(apply(&mut rt, failing, 1).is_err());
}

#[test]
fn struct_fields_through_pointer_view() {
    let mut rt = runtime();
    let version = make_version(&mut rt, 1, 2, 3).unwrap();
    assert!(!version.is_null());
    assert_eq!(version.get_major(&mut rt).unwrap(), 1);

    version.set_major(&mut rt, 9).unwrap();
    assert_eq!(version.get_major(&mut rt).unwrap(), 9);
    version.destroy(&mut rt).unwrap();
}

#[test]
fn wide_integers_cross_through_the_adapter() {
    let mut rt = runtime();
    assert_eq!(add_i64(&mut rt, 5, 6).unwrap(), 11);
    assert_eq!(add_i64(&mut rt, 1 << 40, -3).unwrap(), (1 << 40) - 3);
    assert_eq!(add_i64(&mut rt, i64::MIN, -1).unwrap(), i64::MAX);
    assert_eq!(rt.live_wide_handles(), 0);
}

fn push_node(rt: &mut Runtime, value: i32, next: u32) -> u32 {
    let address = rt.malloc(8).unwrap();
    let mut bytes = value.to_le_bytes().to_vec();
    bytes.extend_from_slice(&next.to_le_bytes());
    rt.write_bytes(address, &bytes).unwrap();
    address
}

#[test]
fn wide_result_leaves_no_live_handle() {
    let mut rt = runtime();
    let third = push_node(&mut rt, 1 << 30, 0);
    let second = push_node(&mut rt, 1 << 30, third);
    let head = push_node(&mut rt, 1 << 30, second);

    assert_eq!(list_sum(&mut rt, NodePtr::from_address(head)).unwrap(), 3 << 30);
    assert_eq!(list_sum(&mut rt, NodePtr::from_address(0)).unwrap(), 0);
    assert_eq!(rt.live_wide_handles(), 0);
}
