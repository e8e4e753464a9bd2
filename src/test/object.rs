use serde_json::json;

use crate::prelude::*;
use crate::{
    CallContext,
    ErrorKind,
    Heap,
    JSObject,
    JSResult,
    Options,
    PropertyKey,
};

use super::{
    assert_call,
    assert_exception,
    fixture,
    global,
};

fn get_double(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let x = heap.get_property(call.this_ref()?, &PropertyKey::from("_x"))?;
    Ok(JSValue::from(2.0 * x.numberify(heap)?))
}

fn set_half(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let x = call.arg_value(0).numberify(heap)?;
    heap.set(call.this_ref()?, PropertyKey::from("_x"), JSValue::from(x / 2.0))?;
    Ok(JSValue::Undefined)
}

#[test]
fn object_keys_order() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");

    let object = fixture(&mut heap, json!({"b": 1, "2": 2, "a": 3, "1": 4, "4294967295": 5, "-1": 6}));
    // integer keys go first even when they are too large to be array indices
    assert_call!(["1", "2", "4294967295", "b", "a", "-1"], heap, the_object.clone(), "keys", [object.clone()]);
    assert_call!([4, 2, 5, 1, 3, 6], heap, the_object, "values", [object]);
}

#[test]
fn object_create_and_prototypes() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");

    let proto = fixture(&mut heap, json!({"inherited": true}));
    let child = heap.execute_method(the_object.clone(), "create", vec![proto.clone()]).unwrap();
    let childref = child.to_ref().unwrap();
    assert_eq!(heap.get_prototype_of(childref), proto);
    assert_eq!(heap.get_property(childref, &PropertyKey::from("inherited")).unwrap(), JSValue::from(true));
    assert_call!([], heap, the_object.clone(), "keys", [child.clone()]);
    assert_call!(false, heap, child.clone(), "hasOwnProperty", ["inherited"]);
    assert_call!(true, heap, proto.clone(), "isPrototypeOf", [child.clone()]);

    // Object.create(null) has no toString
    let bare = heap.execute_method(the_object.clone(), "create", vec![JSValue::NULL]).unwrap();
    assert_exception!(ErrorKind::TypeMismatch, heap.execute_method(bare, "toString", vec![]));
    assert_exception!(ErrorKind::TypeMismatch, heap.execute_method(the_object.clone(), "create", vec![JSValue::from(1)]));

    // a cycle through setPrototypeOf is rejected
    let result = heap.execute_method(the_object, "setPrototypeOf", vec![proto, child]);
    assert_exception!(ErrorKind::InvariantViolation, result);
}

#[test]
fn object_accessors() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");
    let object = fixture(&mut heap, json!({"_x": 1}));
    let objref = object.to_ref().unwrap();

    let mut desc = JSObject::new();
    desc.set_property("get", heap.alloc_func(get_double)).unwrap();
    desc.set_property("set", heap.alloc_func(set_half)).unwrap();
    desc.set_property("configurable", true).unwrap();
    let desc = JSValue::from(heap.alloc(desc));
    heap.execute_method(the_object.clone(), "defineProperty", vec![object.clone(), JSValue::from("x"), desc])
        .unwrap();

    let x = PropertyKey::from("x");
    assert_eq!(heap.get_property(objref, &x).unwrap(), JSValue::from(2.0));
    heap.put(objref, x.clone(), JSValue::from(10)).unwrap();
    assert_eq!(heap.get(objref).get_value(&PropertyKey::from("_x")), Some(JSValue::from(5.0)));
    assert_eq!(heap.get_property(objref, &x).unwrap(), JSValue::from(10.0));

    // an inherited setter runs on the receiver and does not create `x` on it
    let child = heap.execute_method(the_object.clone(), "create", vec![object.clone()]).unwrap();
    let childref = child.to_ref().unwrap();
    heap.put(childref, x.clone(), JSValue::from(8)).unwrap();
    assert_call!(["_x"], heap, the_object.clone(), "getOwnPropertyNames", [child.clone()]);
    assert_eq!(heap.get_property(childref, &x).unwrap(), JSValue::from(8.0));
    assert_eq!(heap.get_property(objref, &x).unwrap(), JSValue::from(10.0));

    assert_call!({"get": {}, "set": {}, "enumerable": false, "configurable": true}, heap, the_object.clone(), "getOwnPropertyDescriptor", [object.clone(), "x"]);
    assert_call!(false, heap, object.clone(), "propertyIsEnumerable", ["x"]);
    assert_call!(["_x"], heap, the_object, "keys", [object]);
}

#[test]
fn object_define_property_rules() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");
    let object = fixture(&mut heap, json!({}));
    let define = |heap: &mut Heap, desc: serde_json::Value| {
        let desc = heap.object_from_json(&desc);
        let arguments = vec![object.clone(), JSValue::from("p"), desc];
        heap.execute_method(the_object.clone(), "defineProperty", arguments)
    };

    define(&mut heap, json!({"value": 1})).unwrap();
    assert_call!({"value": 1, "writable": false, "enumerable": false, "configurable": false},
        heap, the_object.clone(), "getOwnPropertyDescriptor", [object.clone(), "p"]);

    // same value is fine, anything else is not
    define(&mut heap, json!({"value": 1, "writable": false})).unwrap();
    assert_exception!(ErrorKind::InvariantViolation, define(&mut heap, json!({"value": 2})));
    assert_exception!(ErrorKind::InvariantViolation, define(&mut heap, json!({"enumerable": true})));
    assert_exception!(ErrorKind::InvariantViolation, define(&mut heap, json!({"writable": true})));
    assert_exception!(ErrorKind::TypeMismatch, define(&mut heap, json!({"value": 1, "get": 1})));

    let objref = object.to_ref().unwrap();
    assert_eq!(heap.get_property(objref, &PropertyKey::from("p")).unwrap(), JSValue::from(1));
    assert_exception!(ErrorKind::InvariantViolation, heap.set(objref, PropertyKey::from("p"), JSValue::from(3)));
    heap.put(objref, PropertyKey::from("p"), JSValue::from(3)).unwrap();
    heap.remove(objref, &PropertyKey::from("p")).unwrap();
    assert_eq!(heap.get_property(objref, &PropertyKey::from("p")).unwrap(), JSValue::from(1));
}

#[test]
fn object_extensibility() {
    let mut strict = Heap::with_options(Options { strict: true, ..Options::default() });
    let the_object = global(&mut strict, "Object");
    let object = fixture(&mut strict, json!({"a": 1}));
    let objref = object.to_ref().unwrap();

    assert_call!(true, strict, the_object.clone(), "isExtensible", [object.clone()]);
    strict.execute_method(the_object.clone(), "preventExtensions", vec![object.clone()]).unwrap();
    assert_call!(false, strict, the_object.clone(), "isExtensible", [object.clone()]);
    assert_exception!(ErrorKind::InvariantViolation, strict.put(objref, PropertyKey::from("b"), JSValue::from(2)));
    strict.put(objref, PropertyKey::from("a"), JSValue::from(2)).unwrap();
    assert_call!(false, strict, the_object.clone(), "isFrozen", [object.clone()]);

    strict.execute_method(the_object.clone(), "freeze", vec![object.clone()]).unwrap();
    assert_call!(true, strict, the_object, "isFrozen", [object]);
    assert_exception!(ErrorKind::InvariantViolation, strict.put(objref, PropertyKey::from("a"), JSValue::from(3)));
    assert_exception!(ErrorKind::InvariantViolation, strict.remove(objref, &PropertyKey::from("a")));
    assert_eq!(strict.get(objref).to_json(&strict).unwrap(), json!({"a": 2}));

    let mut sloppy = Heap::new();
    let the_object = global(&mut sloppy, "Object");
    let object = fixture(&mut sloppy, json!({}));
    let objref = object.to_ref().unwrap();
    sloppy.execute_method(the_object, "preventExtensions", vec![object]).unwrap();
    sloppy.put(objref, PropertyKey::from("b"), JSValue::from(2)).unwrap();
    assert_eq!(sloppy.get(objref).to_json(&sloppy).unwrap(), json!({}));
}

#[test]
fn object_to_string_tags() {
    let mut heap = Heap::new();
    let to_string = heap.get_property(Heap::OBJECT_PROTO, &PropertyKey::from("toString")).unwrap();
    let to_string = to_string.to_ref().unwrap();

    let array = JSValue::from(heap.alloc_array(vec![]));
    let date = heap.construct_global("Date", vec![JSValue::from(0)]).unwrap();
    let regexp = heap.construct_global("RegExp", vec![JSValue::from("a")]).unwrap();
    let error = heap.construct_global("Error", vec![JSValue::from("oops")]).unwrap();
    let object = fixture(&mut heap, json!({}));
    let cases = [
        (array, "[object Array]"),
        (date, "[object Date]"),
        (regexp, "[object RegExp]"),
        (error.clone(), "[object Error]"),
        (object, "[object Object]"),
        (JSValue::from(Heap::GLOBAL), "[object Object]"),
    ];
    for (value, expected) in cases {
        let call = CallContext::method(value, "toString", vec![]);
        assert_eq!(heap.execute(to_string, call).unwrap(), JSValue::from(expected));
    }

    assert_call!("Error: oops", heap, error, "toString", []);
    let error = heap.construct_global("Error", vec![]).unwrap();
    assert_call!("Error", heap, error.clone(), "toString", []);
    assert_eq!(heap.get(error.to_ref().unwrap()).own_keys(), Vec::<PropertyKey>::new());
}

#[test]
fn object_is() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");
    assert_call!(true, heap, the_object.clone(), "is", [f64::NAN, f64::NAN]);
    assert_call!(false, heap, the_object.clone(), "is", [0.0, -0.0]);
    assert_call!(true, heap, the_object.clone(), "is", ["a", "a"]);
    assert_call!(false, heap, the_object, "is", [JSValue::NULL, JSValue::Undefined]);
}
