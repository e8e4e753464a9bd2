use crate::object::{
    Access,
    Content,
    ObjectValue,
};
use crate::prelude::*;
use crate::regexp::{
    Flags,
    Match,
    RegExp,
};
use crate::value::to_integer_or_infinity;
use crate::{
    builtin::construct_into,
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    NativeFunction,
    PropertyKey,
};

/// The compiled pattern behind a `RegExp` object.
pub(crate) fn regexp_of(value: &JSValue, heap: &Heap) -> Option<Rc<RegExp>> {
    match &heap.get(value.as_object()?).value {
        ObjectValue::RegExp(regexp) => Some(Rc::clone(regexp)),
        _ => None,
    }
}

fn this_regexp(call: &CallContext, heap: &Heap) -> JSResult<Rc<RegExp>> {
    regexp_of(&call.this, heap).ok_or_else(|| Exception::instance_required(call.this.clone(), "RegExp"))
}

fn regexp_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let pattern = call.arg_value(0);
    let flags = call.arg_value(1);

    let (source, flags) = match regexp_of(&pattern, heap) {
        Some(_) if !call.new_target && flags.is_undefined() => return Ok(pattern),
        Some(regexp) => {
            let flags = match flags {
                JSValue::Undefined => JSString::from(regexp.flags.to_string()),
                flags => flags.stringify(heap)?,
            };
            (regexp.source(), flags)
        }
        None => {
            let source = call.arg_as_string(0, heap)?.unwrap_or_default();
            let flags = call.arg_as_string(1, heap)?.unwrap_or_default();
            (source, flags)
        }
    };
    let regexp = RegExp::new(source, &flags)?;

    let mut object = JSObject::with_proto(Heap::REGEXP_PROTO);
    object.value = ObjectValue::RegExp(Rc::new(regexp));
    object.set("lastIndex", 0, Access::WRITE)?;
    construct_into(&call, heap, object)
}

/// RegExpBuiltinExec: runs the pattern from `lastIndex` for global and sticky
/// patterns (from 0 otherwise) and updates `lastIndex`.
fn builtin_exec(call: &CallContext, heap: &mut Heap) -> JSResult<Option<(JSString, Match)>> {
    let regexp = this_regexp(call, heap)?;
    let objref = call.this_ref()?;
    let input = call.arg_value(0).stringify(heap)?;
    let last_index_key = PropertyKey::from("lastIndex");

    let uses_last_index = regexp.flags.global() || regexp.flags.sticky();
    let start = if uses_last_index {
        let last_index = heap.get_property(objref, &last_index_key)?.numberify(heap)?;
        to_integer_or_infinity(last_index).max(0.0)
    } else {
        0.0
    };

    let found = if start > input.len() as f64 {
        None
    } else {
        regexp.find_from(input.as_units(), start as usize)
    };
    if uses_last_index {
        let last_index = found.as_ref().map_or(0, |found| found.end());
        heap.set(objref, last_index_key, JSValue::from(last_index))?;
    }
    Ok(found.map(|found| (input, found)))
}

fn regexp_proto_exec(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let (input, found) = match builtin_exec(&call, heap)? {
        Some(result) => result,
        None => return Ok(JSValue::NULL),
    };
    let captures = (found.texts(&input).into_iter())
        .map(JSValue::from)
        .collect();
    let result = heap.alloc_array(captures);
    let array = heap.get_mut(result);
    array.set_property("index", found.start())?;
    array.set_property("input", input)?;
    Ok(JSValue::from(result))
}

fn regexp_proto_test(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let found = builtin_exec(&call, heap)?;
    Ok(JSValue::from(found.is_some()))
}

#[allow(non_snake_case)]
fn regexp_proto_toString(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    if call.this == JSValue::from(Heap::REGEXP_PROTO) {
        return Ok(JSValue::from("/(?:)/"));
    }
    let regexp = this_regexp(&call, heap)?;
    Ok(JSValue::from(regexp.to_string()))
}

/// Getters on `RegExp.prototype` answer `undefined` for the prototype itself.
fn flag_getter(call: &CallContext, heap: &Heap, flag: fn(&RegExp) -> bool) -> JSResult<JSValue> {
    if call.this == JSValue::from(Heap::REGEXP_PROTO) {
        return Ok(JSValue::Undefined);
    }
    let regexp = this_regexp(call, heap)?;
    Ok(JSValue::from(flag(&regexp)))
}

fn regexp_proto_source(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    if call.this == JSValue::from(Heap::REGEXP_PROTO) {
        return Ok(JSValue::from("(?:)"));
    }
    Ok(JSValue::from(this_regexp(&call, heap)?.source()))
}

fn regexp_proto_flags(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    if call.this == JSValue::from(Heap::REGEXP_PROTO) {
        return Ok(JSValue::from(""));
    }
    Ok(JSValue::from(this_regexp(&call, heap)?.flags.to_string()))
}

fn regexp_proto_global(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::GLOBAL))
}

#[allow(non_snake_case)]
fn regexp_proto_ignoreCase(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::IGNORE_CASE))
}

fn regexp_proto_multiline(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::MULTILINE))
}

#[allow(non_snake_case)]
fn regexp_proto_dotAll(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::DOT_ALL))
}

fn regexp_proto_sticky(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::STICKY))
}

fn regexp_proto_unicode(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    flag_getter(&call, heap, |re| re.flags.contains(Flags::UNICODE))
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut regexp_proto = JSObject::new();

    regexp_proto.set_hidden("exec", heap.alloc_func(regexp_proto_exec))?;
    regexp_proto.set_hidden("test", heap.alloc_func(regexp_proto_test))?;
    regexp_proto.set_hidden("toString", heap.alloc_func(regexp_proto_toString))?;

    let getters: [(&str, NativeFunction); 8] = [
        ("dotAll", regexp_proto_dotAll),
        ("flags", regexp_proto_flags),
        ("global", regexp_proto_global),
        ("ignoreCase", regexp_proto_ignoreCase),
        ("multiline", regexp_proto_multiline),
        ("source", regexp_proto_source),
        ("sticky", regexp_proto_sticky),
        ("unicode", regexp_proto_unicode),
    ];
    for (name, getter) in getters {
        let get = Some(heap.alloc_func(getter));
        regexp_proto.set(name, Content::Accessor { get, set: None }, Access::CONF)?;
    }

    *heap.get_mut(Heap::REGEXP_PROTO) = regexp_proto;

    let mut the_regexp = JSObject::from_func(regexp_constructor);
    the_regexp.set_system("prototype", Heap::REGEXP_PROTO)?;

    let the_regexp_ref = heap.alloc(the_regexp);
    heap.get_mut(Heap::REGEXP_PROTO)
        .set_hidden("constructor", the_regexp_ref)?;

    Ok(the_regexp_ref)
}
