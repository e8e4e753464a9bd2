/// The implementation of the Object object
use crate::object::PropertyDescriptor;
use crate::prelude::*;
use crate::value::same_value;
use crate::{
    builtin::{
        construct_into,
        to_object,
    },
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    NativeFunction,
    PropertyKey,
};

fn descriptor_field(objref: JSRef, name: &str, heap: &mut Heap) -> JSResult<Option<JSValue>> {
    let key = PropertyKey::from(name);
    if heap.lookup_protochain(objref, &key).is_none() {
        return Ok(None);
    }
    heap.get_property(objref, &key).map(Some)
}

fn descriptor_accessor(func: JSValue, heap: &Heap) -> JSResult<Option<JSRef>> {
    match func {
        JSValue::Undefined => Ok(None),
        JSValue::Ref(f) if f != Heap::NULL && heap.get(f).is_callable() => Ok(Some(f)),
        other => Err(Exception::TypeErrorNotCallable(other)),
    }
}

/// ToPropertyDescriptor
pub fn to_property_descriptor(value: &JSValue, heap: &mut Heap) -> JSResult<PropertyDescriptor> {
    let objref = value
        .as_object()
        .ok_or_else(|| Exception::TypeErrorInvalidDescriptor(value.clone()))?;

    let flag = |value: Option<JSValue>| value.map(|v| v.boolify());
    let mut desc = PropertyDescriptor {
        enumerable: flag(descriptor_field(objref, "enumerable", heap)?),
        configurable: flag(descriptor_field(objref, "configurable", heap)?),
        value: descriptor_field(objref, "value", heap)?,
        writable: flag(descriptor_field(objref, "writable", heap)?),
        ..Default::default()
    };
    if let Some(getter) = descriptor_field(objref, "get", heap)? {
        desc.get = Some(descriptor_accessor(getter, heap)?);
    }
    if let Some(setter) = descriptor_field(objref, "set", heap)? {
        desc.set = Some(descriptor_accessor(setter, heap)?);
    }
    if desc.is_accessor() && desc.is_data() {
        return Err(Exception::TypeErrorInvalidDescriptor(value.clone()));
    }
    Ok(desc)
}

/// FromPropertyDescriptor
pub fn from_property_descriptor(desc: &PropertyDescriptor, heap: &mut Heap) -> JSResult<JSRef> {
    let mut object = JSObject::new();
    if let Some(value) = &desc.value {
        object.set_property("value", value.clone())?;
    }
    if let Some(writable) = desc.writable {
        object.set_property("writable", writable)?;
    }
    if let Some(get) = desc.get {
        object.set_property("get", get.map_or(JSValue::Undefined, JSValue::from))?;
    }
    if let Some(set) = desc.set {
        object.set_property("set", set.map_or(JSValue::Undefined, JSValue::from))?;
    }
    if let Some(enumerable) = desc.enumerable {
        object.set_property("enumerable", enumerable)?;
    }
    if let Some(configurable) = desc.configurable {
        object.set_property("configurable", configurable)?;
    }
    Ok(heap.alloc(object))
}

fn keys_to_array(keys: Vec<PropertyKey>, heap: &mut Heap) -> JSValue {
    let names = keys.into_iter().map(|key| JSValue::from(key.to_jsstring())).collect();
    JSValue::from(heap.alloc_array(names))
}

fn object_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    match call.arg_value(0) {
        JSValue::Undefined | JSValue::Ref(Heap::NULL) => construct_into(&call, heap, JSObject::new()),
        value => to_object(&value, heap).map(JSValue::from),
    }
}

fn object_object_create(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let proto = match call.arg_value(0) {
        JSValue::Ref(r) => r,
        other => return Err(Exception::TypeErrorInvalidPrototype(other)),
    };
    let objref = heap.alloc(JSObject::with_proto(proto));
    let properties = call.arg_value(1);
    if !properties.is_undefined() {
        define_properties(objref, &properties, heap)?;
    }
    Ok(JSValue::from(objref))
}

#[allow(non_snake_case)]
fn object_object_getPrototypeOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = match call.arg_value(0) {
        JSValue::String(_) => return Ok(JSValue::from(Heap::STRING_PROTO)),
        JSValue::Bool(_) | JSValue::Number(_) => return Ok(JSValue::from(Heap::OBJECT_PROTO)),
        other => other.to_ref()?,
    };
    Ok(heap.get_prototype_of(objref))
}

#[allow(non_snake_case)]
fn object_object_setPrototypeOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let target = call.arg_value(0);
    if target.is_nullish() {
        return Err(Exception::ReferenceNotAnObject(target));
    }
    let proto = match call.arg_value(1) {
        JSValue::Ref(r) => r,
        other => return Err(Exception::TypeErrorInvalidPrototype(other)),
    };
    if let Some(objref) = target.as_object() {
        heap.set_prototype_of(objref, proto)?;
    }
    Ok(target)
}

#[allow(non_snake_case)]
fn object_object_defineProperty(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let target = call.arg_value(0);
    let objref = target.to_ref()?;
    let key = call.arg_value(1).to_property_key(heap)?;
    let desc = to_property_descriptor(&call.arg_value(2), heap)?;
    heap.define_property(objref, key, desc)?;
    Ok(target)
}

fn define_properties(objref: JSRef, properties: &JSValue, heap: &mut Heap) -> JSResult<()> {
    let props = to_object(properties, heap)?;
    let mut descriptors = Vec::new();
    for key in heap.enumerable_own_keys(props) {
        let desc = heap.get_property(props, &key)?;
        descriptors.push((key, to_property_descriptor(&desc, heap)?));
    }
    for (key, desc) in descriptors {
        heap.define_property(objref, key, desc)?;
    }
    Ok(())
}

#[allow(non_snake_case)]
fn object_object_defineProperties(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let target = call.arg_value(0);
    let objref = target.to_ref()?;
    define_properties(objref, &call.arg_value(1), heap)?;
    Ok(target)
}

#[allow(non_snake_case)]
fn object_object_getOwnPropertyDescriptor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.arg_value(0), heap)?;
    let key = call.arg_value(1).to_property_key(heap)?;
    match heap.get(objref).get_own_property(&key) {
        None => Ok(JSValue::Undefined),
        Some(prop) => {
            let desc = PropertyDescriptor::from(&prop);
            from_property_descriptor(&desc, heap).map(JSValue::from)
        }
    }
}

#[allow(non_snake_case)]
fn object_object_getOwnPropertyNames(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.arg_value(0), heap)?;
    let keys = heap.own_keys(objref);
    Ok(keys_to_array(keys, heap))
}

fn object_object_keys(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.arg_value(0), heap)?;
    let keys = heap.enumerable_own_keys(objref);
    Ok(keys_to_array(keys, heap))
}

fn object_object_values(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let objref = to_object(&call.arg_value(0), heap)?;
    let mut values = Vec::new();
    for key in heap.enumerable_own_keys(objref) {
        // a getter may have deleted or hidden it
        let still_enumerable = (heap.get(objref).get_own_property(&key)).map_or(false, |p| p.enumerable());
        if still_enumerable {
            values.push(heap.get_property(objref, &key)?);
        }
    }
    Ok(JSValue::from(heap.alloc_array(values)))
}

#[allow(non_snake_case)]
fn object_object_preventExtensions(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let target = call.arg_value(0);
    if let Some(objref) = target.as_object() {
        heap.prevent_extensions(objref);
    }
    Ok(target)
}

#[allow(non_snake_case)]
fn object_object_isExtensible(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let extensible = match call.arg_value(0).as_object() {
        Some(objref) => heap.is_extensible(objref),
        None => false,
    };
    Ok(JSValue::from(extensible))
}

fn object_object_freeze(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let target = call.arg_value(0);
    if let Some(objref) = target.as_object() {
        heap.get_mut(objref).freeze();
    }
    Ok(target)
}

#[allow(non_snake_case)]
fn object_object_isFrozen(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let frozen = match call.arg_value(0).as_object() {
        Some(objref) => heap.get(objref).is_frozen(),
        None => true,
    };
    Ok(JSValue::from(frozen))
}

fn object_object_is(call: CallContext, _heap: &mut Heap) -> JSResult<JSValue> {
    let answer = same_value(&call.arg_value(0), &call.arg_value(1));
    Ok(JSValue::from(answer))
}

#[allow(non_snake_case)]
fn object_proto_toString(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let tag = match &call.this {
        JSValue::Undefined => "Undefined",
        JSValue::Ref(Heap::NULL) => "Null",
        JSValue::Bool(_) => "Boolean",
        JSValue::Number(_) => "Number",
        JSValue::String(_) => "String",
        JSValue::Ref(r) => heap.get(*r).class_name(),
    };
    Ok(JSValue::from(format!("[object {}]", tag)))
}

#[allow(non_snake_case)]
fn object_proto_valueOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    to_object(&call.this, heap).map(JSValue::from)
}

#[allow(non_snake_case)]
fn object_proto_hasOwnProperty(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let key = call.arg_value(0).to_property_key(heap)?;
    let objref = to_object(&call.this, heap)?;
    let found = heap.get(objref).get_own_property(&key).is_some();
    Ok(JSValue::from(found))
}

#[allow(non_snake_case)]
fn object_proto_propertyIsEnumerable(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let key = call.arg_value(0).to_property_key(heap)?;
    let objref = to_object(&call.this, heap)?;
    let enumerable = (heap.get(objref).get_own_property(&key)).map_or(false, |p| p.enumerable());
    Ok(JSValue::from(enumerable))
}

#[allow(non_snake_case)]
fn object_proto_isPrototypeOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let mut current = match call.arg_value(0).as_object() {
        Some(objref) => objref,
        None => return Ok(JSValue::from(false)),
    };
    let this_ref = to_object(&call.this, heap)?;
    let mut visited = HashSet::new();
    while visited.insert(current) {
        current = heap.get(current).proto;
        if current == Heap::NULL {
            break;
        }
        if current == this_ref {
            return Ok(JSValue::from(true));
        }
    }
    Ok(JSValue::from(false))
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut object_proto = JSObject::with_proto(Heap::NULL);
    object_proto.set_hidden("hasOwnProperty", heap.alloc_func(object_proto_hasOwnProperty))?;
    object_proto.set_hidden("isPrototypeOf", heap.alloc_func(object_proto_isPrototypeOf))?;
    object_proto.set_hidden("propertyIsEnumerable", heap.alloc_func(object_proto_propertyIsEnumerable))?;
    object_proto.set_hidden("toString", heap.alloc_func(object_proto_toString))?;
    object_proto.set_hidden("valueOf", heap.alloc_func(object_proto_valueOf))?;

    *heap.get_mut(Heap::OBJECT_PROTO) = object_proto;

    let mut the_object = JSObject::from_func(object_constructor);
    the_object.set_system("prototype", Heap::OBJECT_PROTO)?;

    let statics: [(&str, NativeFunction); 14] = [
        ("create", object_object_create),
        ("defineProperties", object_object_defineProperties),
        ("defineProperty", object_object_defineProperty),
        ("freeze", object_object_freeze),
        ("getOwnPropertyDescriptor", object_object_getOwnPropertyDescriptor),
        ("getOwnPropertyNames", object_object_getOwnPropertyNames),
        ("getPrototypeOf", object_object_getPrototypeOf),
        ("is", object_object_is),
        ("isExtensible", object_object_isExtensible),
        ("isFrozen", object_object_isFrozen),
        ("keys", object_object_keys),
        ("preventExtensions", object_object_preventExtensions),
        ("setPrototypeOf", object_object_setPrototypeOf),
        ("values", object_object_values),
    ];
    for (name, func) in statics {
        the_object.set_hidden(name, heap.alloc_func(func))?;
    }

    let the_object_ref = heap.alloc(the_object);
    heap.get_mut(Heap::OBJECT_PROTO)
        .set_hidden("constructor", the_object_ref)?;

    Ok(the_object_ref)
}
