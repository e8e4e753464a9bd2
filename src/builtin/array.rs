use crate::prelude::*;
use crate::value::to_uint32;
use crate::{
    builtin::{
        construct_into,
        index_key,
        length_of,
        to_object,
    },
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    PropertyKey,
};

fn array_object_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let array = match call.arguments.as_slice() {
        [JSValue::Number(n)] => {
            let length = to_uint32(*n);
            if length as f64 != *n {
                return Err(Exception::RangeErrorInvalidLength(*n));
            }
            let mut array = JSObject::from_array(vec![]);
            array.set_length(length)?;
            array
        }
        _ => JSObject::from_array(call.arguments.clone()),
    };
    construct_into(&call, heap, array)
}

#[allow(non_snake_case)]
fn array_object_isArray(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let is_array = match call.arg_value(0).as_object() {
        Some(objref) => heap.get(objref).as_array().is_some(),
        None => false,
    };
    Ok(JSValue::from(is_array))
}

fn array_proto_push(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.this, heap)?;
    let mut length = length_of(objref, heap)?;
    for value in call.arguments.into_iter() {
        heap.set(objref, index_key(length), value)?;
        length += 1;
    }
    heap.set(objref, PropertyKey::length(), JSValue::from(length as f64))?;
    Ok(JSValue::from(length as f64))
}

fn array_proto_pop(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.this, heap)?;
    let length = length_of(objref, heap)?;
    if length == 0 {
        heap.set(objref, PropertyKey::length(), JSValue::from(0))?;
        return Ok(JSValue::Undefined);
    }
    let key = index_key(length - 1);
    let value = heap.get_property(objref, &key)?;
    heap.get_mut(objref).delete(&key)?;
    heap.set(objref, PropertyKey::length(), JSValue::from((length - 1) as f64))?;
    Ok(value)
}

fn array_proto_join(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.this, heap)?;
    let length = length_of(objref, heap)?;
    let separator = (call.arg_as_string(0, heap)?).unwrap_or_else(|| JSString::from(","));

    let mut units: Vec<u16> = Vec::new();
    for i in 0..length {
        if i > 0 {
            units.extend_from_slice(separator.as_units());
        }
        let element = heap.get_property(objref, &index_key(i))?;
        if !element.is_nullish() {
            units.extend_from_slice(element.stringify(heap)?.as_units());
        }
    }
    Ok(JSValue::from(JSString::from(units)))
}

#[allow(non_snake_case)]
fn array_proto_toString(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    array_proto_join(CallContext { arguments: vec![], ..call }, heap)
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut array_proto = JSObject::from_array(vec![]);
    array_proto.proto = Heap::OBJECT_PROTO;

    array_proto.set_hidden("push", heap.alloc_func(array_proto_push))?;
    array_proto.set_hidden("pop", heap.alloc_func(array_proto_pop))?;
    array_proto.set_hidden("join", heap.alloc_func(array_proto_join))?;
    array_proto.set_hidden("toString", heap.alloc_func(array_proto_toString))?;

    *heap.get_mut(Heap::ARRAY_PROTO) = array_proto;

    let mut array_object = JSObject::from_func(array_object_constructor);

    // Array.prototype
    array_object.set_system("prototype", Heap::ARRAY_PROTO)?;
    array_object.set_hidden("isArray", heap.alloc_func(array_object_isArray))?;

    let array_ref = heap.alloc(array_object);
    heap.get_mut(Heap::ARRAY_PROTO)
        .set_hidden("constructor", array_ref)?;

    Ok(array_ref)
}
