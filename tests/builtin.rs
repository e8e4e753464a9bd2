//! The builtin scenarios of the QuickJS `test_builtin.js`, driven from Rust.

use serde_json::json;

use slothjs_core::{
    CallContext,
    ErrorKind,
    Heap,
    JSObject,
    JSResult,
    JSValue,
    Options,
    PropertyKey,
    JSON,
};

fn global(heap: &mut Heap, name: &str) -> JSValue {
    heap.get_property(Heap::GLOBAL, &PropertyKey::from(name)).expect("global")
}

fn call(heap: &mut Heap, this: impl Into<JSValue>, method: &str, arguments: Vec<JSValue>) -> JSON {
    let result = (heap.execute_method(this.into(), method, arguments))
        .unwrap_or_else(|exc| panic!("{}: {}", method, exc));
    result.to_json(heap).expect("to_json")
}

fn get(heap: &mut Heap, this: &JSValue, name: &str) -> JSON {
    let value = heap.get_value(this, &PropertyKey::from(name)).expect("get");
    value.to_json(heap).expect("to_json")
}

fn args<const N: usize>(values: [JSON; N]) -> Vec<JSValue> {
    values.iter().map(|v| match v {
        JSON::String(s) => JSValue::from(s.as_str()),
        JSON::Number(n) => JSValue::from(n.as_f64().unwrap_or(f64::NAN)),
        JSON::Bool(b) => JSValue::from(*b),
        _ => JSValue::Undefined,
    }).collect()
}

fn regexp(heap: &mut Heap, source: &str) -> JSValue {
    heap.construct_global("RegExp", vec![JSValue::from(source)]).expect("RegExp")
}

fn get_four(_call: CallContext, _heap: &mut Heap) -> JSResult<JSValue> {
    Ok(JSValue::from(4))
}

fn set_z_val(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    heap.set(call.this_ref()?, PropertyKey::from("z_val"), call.arg_value(0))?;
    Ok(JSValue::Undefined)
}

#[test]
fn test_objects() {
    let mut heap = Heap::with_options(Options { strict: true, ..Options::default() });
    let the_object = global(&mut heap, "Object");

    let error_ctor = global(&mut heap, "Error").to_ref().unwrap();
    let call_error = CallContext::method(JSValue::Undefined, "Error", vec![JSValue::from("hello")]);
    let r = heap.execute(error_ctor, call_error).unwrap();
    assert_eq!(get(&mut heap, &r, "message"), json!("hello"));

    let a = heap.construct_global("Object", vec![]).unwrap();
    let aref = a.to_ref().unwrap();
    heap.put(aref, PropertyKey::from("x"), JSValue::from(1)).unwrap();
    assert_eq!(get(&mut heap, &a, "x"), json!(1));
    let proto = heap.execute_method(the_object.clone(), "getPrototypeOf", vec![a.clone()]).unwrap();
    assert_eq!(proto, JSValue::from(Heap::OBJECT_PROTO));

    let desc = heap.object_from_json(&json!({"value": 3, "writable": true, "configurable": true, "enumerable": true}));
    heap.execute_method(the_object.clone(), "defineProperty", vec![a.clone(), JSValue::from("y"), desc]).unwrap();
    assert_eq!(get(&mut heap, &a, "y"), json!(3));

    let mut desc = JSObject::new();
    desc.set_property("get", heap.alloc_func(get_four)).unwrap();
    desc.set_property("set", heap.alloc_func(set_z_val)).unwrap();
    desc.set_property("configurable", true).unwrap();
    desc.set_property("enumerable", true).unwrap();
    let desc = JSValue::from(heap.alloc(desc));
    heap.execute_method(the_object.clone(), "defineProperty", vec![a.clone(), JSValue::from("z"), desc]).unwrap();
    assert_eq!(get(&mut heap, &a, "z"), json!(4));
    heap.put(aref, PropertyKey::from("z"), JSValue::from(5)).unwrap();
    assert_eq!(get(&mut heap, &a, "z_val"), json!(5));

    let b = heap.execute_method(the_object.clone(), "create", vec![a.clone()]).unwrap();
    assert_eq!(heap.execute_method(the_object.clone(), "getPrototypeOf", vec![b]).unwrap(), a);
    let c = heap.object_from_json(&json!({"u": 2}));
    heap.execute_method(the_object.clone(), "setPrototypeOf", vec![a.clone(), c.clone()]).unwrap();
    assert_eq!(heap.execute_method(the_object.clone(), "getPrototypeOf", vec![a.clone()]).unwrap(), c);
    assert_eq!(get(&mut heap, &a, "u"), json!(2));

    let empty = heap.object_from_json(&json!({}));
    assert_eq!(call(&mut heap, empty, "toString", vec![]), json!("[object Object]"));

    let a = heap.object_from_json(&json!({"x": 1}));
    assert_eq!(call(&mut heap, the_object.clone(), "isExtensible", vec![a.clone()]), json!(true));
    heap.execute_method(the_object.clone(), "preventExtensions", vec![a.clone()]).unwrap();
    let err = heap.put(a.to_ref().unwrap(), PropertyKey::from("y"), JSValue::from(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(call(&mut heap, the_object, "isExtensible", vec![a.clone()]), json!(false));
    assert_eq!(heap.get_value(&a, &PropertyKey::from("y")).unwrap(), JSValue::Undefined);
}

#[test]
fn test_enum() {
    let mut heap = Heap::new();
    let the_object = global(&mut heap, "Object");
    let a = heap.object_from_json(&json!({
        "x": 1,
        "18014398509481984": 1,
        "9007199254740992": 1,
        "9007199254740991": 1,
        "4294967296": 1,
        "4294967295": 1,
        "y": 1,
        "4294967294": 1,
        "1": 2,
    }));
    assert_eq!(
        call(&mut heap, the_object, "keys", vec![a]),
        json!(["1", "4294967294", "4294967295", "4294967296", "9007199254740991", "9007199254740992", "18014398509481984", "x", "y"])
    );
}

#[test]
fn test_array() {
    let mut heap = Heap::with_options(Options { strict: true, ..Options::default() });
    let the_object = global(&mut heap, "Object");
    let length = PropertyKey::length();

    let a = heap.object_from_json(&json!([1, 2, 3]));
    assert_eq!(get(&mut heap, &a, "length"), json!(3));
    assert_eq!(get(&mut heap, &a, "2"), json!(3));

    let a = heap.construct_global("Array", vec![JSValue::from(10)]).unwrap();
    assert_eq!(get(&mut heap, &a, "length"), json!(10));

    let a = heap.construct_global("Array", vec![JSValue::from(1), JSValue::from(2)]).unwrap();
    assert_eq!(a.to_json(&heap).unwrap(), json!([1, 2]));

    let a = heap.object_from_json(&json!([1, 2, 3]));
    heap.put(a.to_ref().unwrap(), length.clone(), JSValue::from(2)).unwrap();
    assert_eq!(a.to_json(&heap).unwrap(), json!([1, 2]));

    let a = heap.object_from_json(&json!([]));
    let aref = a.to_ref().unwrap();
    heap.put(aref, PropertyKey::from(1u32), JSValue::from(10)).unwrap();
    heap.put(aref, PropertyKey::from(4u32), JSValue::from(3)).unwrap();
    assert_eq!(get(&mut heap, &a, "length"), json!(5));

    let a = heap.object_from_json(&json!([1, 2]));
    let aref = a.to_ref().unwrap();
    heap.put(aref, length.clone(), JSValue::from(5)).unwrap();
    heap.put(aref, PropertyKey::from(4u32), JSValue::from(1)).unwrap();
    heap.put(aref, length.clone(), JSValue::from(4)).unwrap();
    assert_eq!(get(&mut heap, &a, "4"), json!(null));
    assert_eq!(heap.get_value(&a, &PropertyKey::from(4u32)).unwrap(), JSValue::Undefined);

    let a = heap.object_from_json(&json!([1, 2]));
    assert_eq!(call(&mut heap, a.clone(), "push", vec![JSValue::from(3), JSValue::from(4)]), json!(4));
    assert_eq!(call(&mut heap, a, "join", vec![]), json!("1,2,3,4"));

    let a = heap.object_from_json(&json!([1, 2, 3, 4, 5]));
    let desc = heap.object_from_json(&json!({"configurable": false}));
    heap.execute_method(the_object, "defineProperty", vec![a.clone(), JSValue::from("3"), desc]).unwrap();
    let err = heap.put(a.to_ref().unwrap(), length, JSValue::from(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(call(&mut heap, a, "toString", vec![]), json!("1,2,3,4"));
}

#[test]
fn test_string() {
    let mut heap = Heap::new();
    let the_string = global(&mut heap, "String");
    let inf = f64::INFINITY;

    let string_ctor = the_string.to_ref().unwrap();
    let a = heap.execute(string_ctor, CallContext::method(JSValue::Undefined, "String", vec![JSValue::from("abc")])).unwrap();
    assert_eq!(get(&mut heap, &a, "length"), json!(3));
    assert_eq!(get(&mut heap, &a, "1"), json!("b"));
    assert_eq!(call(&mut heap, a.clone(), "charCodeAt", vec![JSValue::from(1)]), json!(0x62));
    assert_eq!(call(&mut heap, the_string.clone(), "fromCharCode", vec![JSValue::from(65)]), json!("A"));
    assert_eq!(call(&mut heap, the_string.clone(), "fromCharCode", args([json!(65), json!(66), json!(67)])), json!("ABC"));
    assert_eq!(call(&mut heap, a.clone(), "charAt", vec![JSValue::from(1)]), json!("b"));
    assert_eq!(call(&mut heap, a.clone(), "charAt", vec![JSValue::from(-1)]), json!(""));
    assert_eq!(call(&mut heap, a, "charAt", vec![JSValue::from(3)]), json!(""));

    assert_eq!(call(&mut heap, "abcd", "substring", vec![JSValue::from(1), JSValue::from(3)]), json!("bc"));
    let euro = heap.execute_method(the_string, "fromCharCode", vec![JSValue::from(0x20ac)]).unwrap();
    assert_eq!(call(&mut heap, euro.clone(), "charCodeAt", vec![JSValue::from(0)]), json!(0x20ac));
    assert_eq!(euro, JSValue::from("€"));
    assert_eq!(call(&mut heap, "a", "concat", args([json!("b"), json!("c")])), json!("abc"));

    assert_eq!(call(&mut heap, "abcabc", "indexOf", args([json!("cab")])), json!(2));
    assert_eq!(call(&mut heap, "abcabc", "indexOf", args([json!("cab2")])), json!(-1));
    assert_eq!(call(&mut heap, "abc", "indexOf", args([json!("c")])), json!(2));

    let index_of = [
        ("a", f64::NAN, 0, 2),
        ("a", -inf, 0, 0),
        ("a", -1.0, 0, 0),
        ("a", -0.0, 0, 0),
        ("a", 0.0, 0, 0),
        ("a", 1.0, 1, 1),
        ("a", 2.0, 2, 2),
        ("a", 3.0, -1, 2),
        ("a", 4.0, -1, 2),
        ("a", inf, -1, 2),
        ("", f64::NAN, 0, 3),
        ("", -inf, 0, 0),
        ("", -1.0, 0, 0),
        ("", -0.0, 0, 0),
        ("", 0.0, 0, 0),
        ("", 1.0, 1, 1),
        ("", 2.0, 2, 2),
        ("", 3.0, 3, 3),
        ("", 4.0, 3, 3),
        ("", inf, 3, 3),
    ];
    for (needle, from, first, last) in index_of {
        let arguments = vec![JSValue::from(needle), JSValue::from(from)];
        assert_eq!(call(&mut heap, "aaa", "indexOf", arguments.clone()), json!(first), "{:?} from {}", needle, from);
        assert_eq!(call(&mut heap, "aaa", "lastIndexOf", arguments), json!(last), "{:?} from {}", needle, from);
    }
    assert_eq!(call(&mut heap, "aaa", "indexOf", args([json!("a")])), json!(0));
    assert_eq!(call(&mut heap, "aaa", "lastIndexOf", args([json!("a")])), json!(2));
    assert_eq!(call(&mut heap, "aaa", "lastIndexOf", args([json!("")])), json!(3));

    assert_eq!(call(&mut heap, "Abc123!", "toLowerCase", vec![]), json!("abc123!"));
    assert_eq!(call(&mut heap, "Abc123!", "toUpperCase", vec![]), json!("ABC123!"));

    let splits = [
        ("a,b,c", json!([","]), json!(["a", "b", "c"])),
        (",b,c", json!([","]), json!(["", "b", "c"])),
        ("a,b,", json!([","]), json!(["a", "b", ""])),
        ("aaaa", json!([]), json!(["aaaa"])),
        ("aaaa", json!([""]), json!(["a", "a", "a", "a"])),
        ("aaaa", json!(["", 0]), json!([])),
        ("aaaa", json!(["", 1]), json!(["a"])),
        ("aaaa", json!(["", 2]), json!(["a", "a"])),
        ("aaaa", json!(["a"]), json!(["", "", "", "", ""])),
        ("aaaa", json!(["a", 2]), json!(["", ""])),
        ("aaaa", json!(["aa"]), json!(["", "", ""])),
        ("aaaa", json!(["aa", 0]), json!([])),
        ("aaaa", json!(["aa", 1]), json!([""])),
        ("aaaa", json!(["aa", 2]), json!(["", ""])),
        ("aaaa", json!(["aaa"]), json!(["", "a"])),
        ("aaaa", json!(["aaaa"]), json!(["", ""])),
        ("aaaa", json!(["aaaaa"]), json!(["aaaa"])),
        ("aaaa", json!(["aaaaa", 0]), json!([])),
        ("aaaa", json!(["aaaaa", 1]), json!(["aaaa"])),
    ];
    for (s, arguments, want) in splits {
        let arguments = match arguments {
            JSON::Array(items) => items.iter().map(|a| heap.object_from_json(a)).collect(),
            _ => vec![],
        };
        assert_eq!(call(&mut heap, s, "split", arguments), want, "{:?}", s);
    }
}

#[test]
fn test_json() {
    let mut heap = Heap::new();
    let the_json = global(&mut heap, "JSON");

    let s = r#"{"x":1,"y":true,"z":null,"a":[1,2,3],"s":"str"}"#;
    let a = heap.execute_method(the_json.clone(), "parse", vec![JSValue::from(s)]).unwrap();
    assert_eq!(get(&mut heap, &a, "x"), json!(1));
    assert_eq!(get(&mut heap, &a, "y"), json!(true));
    assert_eq!(heap.get_value(&a, &PropertyKey::from("z")).unwrap(), JSValue::NULL);
    assert_eq!(call(&mut heap, the_json.clone(), "stringify", vec![a]), json!(s));

    let nested = heap.object_from_json(&json!([[{"x": 1, "y": {}, "z": []}, 2, 3]]));
    let arguments = vec![nested, JSValue::Undefined, JSValue::from(1)];
    let want = "[\n [\n  {\n   \"x\": 1,\n   \"y\": {},\n   \"z\": []\n  },\n  2,\n  3\n ]\n]";
    assert_eq!(call(&mut heap, the_json, "stringify", arguments), json!(want));
}

#[test]
fn test_date() {
    let mut heap = Heap::new();

    let d = heap.construct_global("Date", vec![JSValue::from(1506098258091i64)]).unwrap();
    assert_eq!(call(&mut heap, d.clone(), "toISOString", vec![]), json!("2017-09-22T16:37:38.091Z"));
    heap.execute_method(d.clone(), "setUTCHours", args([json!(18), json!(10), json!(11)])).unwrap();
    let iso = heap.execute_method(d, "toISOString", vec![]).unwrap();
    assert_eq!(iso, JSValue::from("2017-09-22T18:10:11.091Z"));

    let the_date = global(&mut heap, "Date");
    let a = heap.execute_method(the_date, "parse", vec![iso.clone()]).unwrap();
    let again = heap.construct_global("Date", vec![a]).unwrap();
    assert_eq!(heap.execute_method(again, "toISOString", vec![]).unwrap(), iso);

    let fractions = [
        ("2020-01-01T01:01:01.1Z", "2020-01-01T01:01:01.100Z"),
        ("2020-01-01T01:01:01.12Z", "2020-01-01T01:01:01.120Z"),
        ("2020-01-01T01:01:01.123Z", "2020-01-01T01:01:01.123Z"),
        ("2020-01-01T01:01:01.1234Z", "2020-01-01T01:01:01.123Z"),
        ("2020-01-01T01:01:01.12345Z", "2020-01-01T01:01:01.123Z"),
        ("2020-01-01T01:01:01.1235Z", "2020-01-01T01:01:01.124Z"),
        ("2020-01-01T01:01:01.9999Z", "2020-01-01T01:01:02.000Z"),
    ];
    for (text, want) in fractions {
        let d = heap.construct_global("Date", vec![JSValue::from(text)]).unwrap();
        assert_eq!(call(&mut heap, d, "toISOString", vec![]), json!(want), "{}", text);
    }
}

#[test]
fn test_regexp() {
    let mut heap = Heap::new();

    let str = "abbbbbc";
    let re = regexp(&mut heap, "(b+)c");
    let a = heap.execute_method(re.clone(), "exec", vec![JSValue::from(str)]).unwrap();
    assert_eq!(a.to_json(&heap).unwrap(), json!(["bbbbbc", "bbbbb"]));
    assert_eq!(get(&mut heap, &a, "index"), json!(1));
    assert_eq!(get(&mut heap, &a, "input"), json!(str));
    assert_eq!(call(&mut heap, re, "test", vec![JSValue::from(str)]), json!(true));

    let first_match = [
        ("\\x61", "a", "a"),
        ("\\u0061", "a", "a"),
        ("\\ca", "\x01", "\x01"),
        ("\\\\a", "\\a", "\\a"),
        ("\\c0", "\\c0", "\\c0"),
        ("\0a", "\0a", "\0a"),
        ("a{1+", "a{11", "a{11"),
    ];
    for (source, input, want) in first_match {
        let re = regexp(&mut heap, source);
        let a = call(&mut heap, re, "exec", vec![JSValue::from(input)]);
        assert_eq!(a[0], json!(want), "/{}/", source);
    }

    let re = regexp(&mut heap, "(\\.(?=com|org)|\\/)");
    let a = heap.execute_method(re, "exec", vec![JSValue::from("ah.com")]).unwrap();
    assert_eq!(get(&mut heap, &a, "index"), json!(2));
    assert_eq!(get(&mut heap, &a, "0"), json!("."));

    let re = regexp(&mut heap, "(\\.(?!com|org)|\\/)");
    assert_eq!(heap.execute_method(re, "exec", vec![JSValue::from("ah.com")]).unwrap(), JSValue::NULL);

    let re = regexp(&mut heap, "(?=(a+))");
    let a = heap.execute_method(re, "exec", vec![JSValue::from("baaabac")]).unwrap();
    assert_eq!(get(&mut heap, &a, "index"), json!(1));
    assert_eq!(a.to_json(&heap).unwrap(), json!(["", "aaa"]));

    let re = regexp(&mut heap, "(z)((a+)?(b+)?(c))*");
    let a = heap.execute_method(re, "exec", vec![JSValue::from("zaacbbbcac")]).unwrap();
    assert_eq!(a.to_json(&heap).unwrap(), json!(["zaacbbbcac", "z", "ac", "a", null, "c"]));
    assert_eq!(heap.get_value(&a, &PropertyKey::from(4u32)).unwrap(), JSValue::Undefined);

    let re = regexp(&mut heap, "\0a");
    assert_eq!(call(&mut heap, re, "toString", vec![]), json!("/\0a/"));
    let re = regexp(&mut heap, "{1a}");
    assert_eq!(call(&mut heap, re, "toString", vec![]), json!("/{1a}/"));
}
