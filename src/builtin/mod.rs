mod array;
mod date;
mod error;
mod global;
mod json;
mod object;
mod regexp;
mod string;

pub use self::date::{
    format_iso,
    parse_iso,
    time_clip,
};
pub use self::json::{
    json_parse,
    json_stringify,
};
pub use self::string::{
    index_of,
    last_index_of,
    split,
};

use crate::prelude::*;
use crate::{
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    PropertyKey,
};

pub fn init(heap: &mut Heap) -> JSResult<()> {
    global::init(heap)?;

    let the_object = object::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("Object", the_object)?;

    *heap.get_mut(Heap::FUNCTION_PROTO) = JSObject::new();

    let the_error = error::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("Error", the_error)?;

    let the_array = array::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("Array", the_array)?;

    let the_string = string::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("String", the_string)?;

    let the_regexp = regexp::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("RegExp", the_regexp)?;

    let the_date = date::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("Date", the_date)?;

    let the_json = json::init(heap)?;
    heap.get_mut(Heap::GLOBAL).set_hidden("JSON", the_json)?;

    log::trace!("builtins take {} heap objects", heap.len());
    Ok(())
}

/// Finishes a constructor call: `new` fills the preallocated `this`
/// (keeping its prototype), a plain call allocates `object` as is.
pub(crate) fn construct_into(call: &CallContext, heap: &mut Heap, mut object: JSObject) -> JSResult<JSValue> {
    match call.this.as_object() {
        Some(this) if call.new_target => {
            object.proto = heap.get(this).proto;
            *heap.get_mut(this) = object;
            Ok(JSValue::from(this))
        }
        _ => Ok(JSValue::from(heap.alloc(object))),
    }
}

/// ToObject
pub(crate) fn to_object(value: &JSValue, heap: &mut Heap) -> JSResult<JSRef> {
    match value {
        JSValue::Undefined | JSValue::Ref(Heap::NULL) => Err(Exception::ReferenceNotAnObject(value.clone())),
        JSValue::Ref(r) => Ok(*r),
        JSValue::String(s) => Ok(heap.alloc(JSObject::from_string(s.clone()))),
        JSValue::Bool(_) | JSValue::Number(_) => Ok(heap.alloc(JSObject::new())),
    }
}

/// LengthOfArrayLike
pub(crate) fn length_of(objref: JSRef, heap: &mut Heap) -> JSResult<u64> {
    let length = heap.get_property(objref, &PropertyKey::length())?.numberify(heap)?;
    let length = crate::value::to_integer_or_infinity(length);
    Ok(length.clamp(0.0, 9007199254740991.0) as u64)
}

/// The key of an index that may be past the array index range.
pub(crate) fn index_key(index: u64) -> PropertyKey {
    PropertyKey::from(index as f64)
}
