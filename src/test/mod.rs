mod object;

use crate::prelude::*;
use crate::{
    Heap,
    PropertyKey,
};

/// Calls `$this.$method(...$args)` on a heap, then compares the result to
/// the first argument (anything that `serde_json::json!` understands).
/// ```ignored
/// assert_call!("b", heap, "abc", "charAt", [1]);
/// ```
macro_rules! assert_call {
    ($json:tt, $heap:expr, $this:expr, $method:expr, [$($arg:expr),*]) => {
        let want = serde_json::json!($json);
        let this = JSValue::from($this);
        let arguments = vec![$(JSValue::from($arg)),*];
        let result = match $heap.execute_method(this, $method, arguments) {
            Ok(r) => r,
            Err(exc) => panic!("{}\n  error: {}\n    want: {}", $method, &exc, &want),
        };
        let got = result.to_json(&$heap).expect("json");
        if got != want {
            panic!("{}\n     got: {}\n    want: {}", $method, &got, &want);
        }
    };
}

pub(crate) use assert_call;

/// Expects a `JSResult` to fail with an exception of the given [`crate::ErrorKind`]:
/// ```ignored
/// assert_exception!(ErrorKind::RangeError, heap.construct_global("Array", vec![JSValue::from(-1)]));
/// ```
macro_rules! assert_exception {
    ($kind:expr, $result:expr) => {
        match $result {
            Err(exc) => assert_eq!(exc.kind(), $kind, "{}", exc),
            Ok(value) => panic!("expected {:?}, got {:?}", $kind, value),
        }
    };
}

pub(crate) use assert_exception;

/// A global binding, e.g. a constructor.
pub(crate) fn global(heap: &mut Heap, name: &str) -> JSValue {
    heap.get_property(Heap::GLOBAL, &PropertyKey::from(name))
        .expect("global")
}

/// Builds heap objects from a JSON literal.
pub(crate) fn fixture(heap: &mut Heap, json: JSON) -> JSValue {
    heap.object_from_json(&json)
}

/// ```sh
/// $ cargo -q test --lib sizes -- --nocapture
/// ```
#[test]
fn test_sizes() {
    use crate::object::*;
    use crate::*;
    use std::mem::size_of;

    println!("============================");
    println!("size_of JSRef:  \t{}", size_of::<heap::JSRef>());
    println!("size_of JSValue:\t{}", size_of::<JSValue>());
    println!("size_of JSObject:\t{}", size_of::<JSObject>());
    println!("size_of   PropertyStore:\t{}", size_of::<PropertyStore>());
    println!("size_of   ObjectValue:\t{}", size_of::<ObjectValue>());
    println!("size_of     JSArray:\t{}", size_of::<JSArray>());
    println!("size_of     NativeFunc:\t{}", size_of::<function::NativeFunction>());
    println!("size_of Property:\t{}", size_of::<Property>());
    println!("size_of   Access:\t{}", size_of::<Access>());
    println!("size_of   Content:\t{}", size_of::<Content>());
    println!("============================");
}
