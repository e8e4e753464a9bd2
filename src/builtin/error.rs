use crate::object::ObjectValue;
use crate::prelude::*;
use crate::{
    builtin::construct_into,
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    PropertyKey,
};

/// `Error(message)` and `new Error(message)` do the same.
pub fn error_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let mut error_object = JSObject::with_proto(Heap::ERROR_PROTO);
    error_object.value = ObjectValue::Error;

    if let Some(message) = call.arg_as_string(0, heap)? {
        error_object.set_hidden("message", message)?;
    }
    construct_into(&call, heap, error_object)
}

#[allow(non_snake_case)]
fn error_proto_toString(call: CallContext, heap: &'_ mut Heap) -> JSResult<JSValue> {
    let this_ref = call.this.as_object()
        .ok_or_else(|| Exception::instance_required(call.this.clone(), "Error"))?;

    let name = match heap.get_property(this_ref, &PropertyKey::from("name"))? {
        JSValue::Undefined => JSString::from("Error"),
        name => name.stringify(heap)?,
    };
    let message = match heap.get_property(this_ref, &PropertyKey::from("message"))? {
        JSValue::Undefined => JSString::default(),
        message => message.stringify(heap)?,
    };

    let description = if message.is_empty() {
        name
    } else if name.is_empty() {
        message
    } else {
        name.concat(&JSString::from(": ")).concat(&message)
    };
    Ok(JSValue::from(description))
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut error_proto = JSObject::new();
    error_proto.set_hidden("name", "Error")?;
    error_proto.set_hidden("message", "")?;
    error_proto.set_hidden("toString", heap.alloc_func(error_proto_toString))?;

    *heap.get_mut(Heap::ERROR_PROTO) = error_proto;

    let mut the_error = JSObject::from_func(error_constructor);
    the_error.set_system("prototype", Heap::ERROR_PROTO)?;

    let the_error_ref = heap.alloc(the_error);
    heap.get_mut(Heap::ERROR_PROTO)
        .set_hidden("constructor", the_error_ref)?;

    Ok(the_error_ref)
}
