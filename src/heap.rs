use serde::{
    Deserialize,
    Serialize,
};

use crate::builtin;
use crate::error::{
    ignore_in_sloppy_mode,
    Exception,
};
use crate::function::NativeFunction;
use crate::object::{
    Access,
    Content,
    JSObject,
    ObjectValue,
    Property,
    PropertyDescriptor,
    PropertyKey,
};
use crate::prelude::*;
use crate::{
    CallContext,
    JSResult,
};

/// A heap reference: a Heap index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JSRef(usize);

impl JSRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Strict code sees property model violations of `put`/`remove` as errors.
    pub strict: bool,
    /// The deepest nesting of arrays and objects `JSON.parse` accepts.
    pub json_max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            strict: false,
            json_max_depth: 512,
        }
    }
}

/// Runtime heap
pub struct Heap {
    objects: Vec<JSObject>,
    pub options: Options,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub const NULL: JSRef = JSRef(0);
    pub const GLOBAL: JSRef = JSRef(1);
    pub const OBJECT_PROTO: JSRef = JSRef(2);
    pub const FUNCTION_PROTO: JSRef = JSRef(3);
    pub const ARRAY_PROTO: JSRef = JSRef(4);
    pub const STRING_PROTO: JSRef = JSRef(5);
    pub const ERROR_PROTO: JSRef = JSRef(6);
    pub const REGEXP_PROTO: JSRef = JSRef(7);
    pub const DATE_PROTO: JSRef = JSRef(8);

    const USERSTART: usize = 9;

    pub fn new() -> Self {
        Heap::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let objects = (0..Self::USERSTART).map(|_| JSObject::new()).collect();
        let mut heap = Heap { objects, options };
        builtin::init(&mut heap).expect("failed to initialize builtin objects");
        heap
    }

    pub fn get(&self, objref: JSRef) -> &JSObject {
        self.objects
            .get(objref.0)
            .unwrap_or_else(|| panic!("{:?} is invalid", objref))
    }

    pub fn get_mut(&mut self, objref: JSRef) -> &mut JSObject {
        self.objects
            .get_mut(objref.0)
            .unwrap_or_else(|| panic!("{:?} is invalid", objref))
    }

    pub fn alloc(&mut self, object: JSObject) -> JSRef {
        let ind = self.objects.len();
        self.objects.push(object);
        JSRef(ind)
    }

    pub fn alloc_func(&mut self, func: NativeFunction) -> JSRef {
        self.alloc(JSObject::from_func(func))
    }

    pub fn alloc_array(&mut self, values: Vec<JSValue>) -> JSRef {
        self.alloc(JSObject::from_array(values))
    }

    /// The number of allocated objects, builtins included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /*
     *  Prototype resolution
     */

    /// Finds the first object on the prototype chain of `objref` that has
    /// `key` as an own property. A cyclic chain ends the walk.
    pub fn lookup_protochain(&self, objref: JSRef, key: &PropertyKey) -> Option<(JSRef, Property)> {
        let mut visited = HashSet::new();
        let mut current = objref;
        while current != Heap::NULL {
            if !visited.insert(current) {
                log::warn!("prototype chain of {:?} has a cycle at {:?}", objref, current);
                return None;
            }
            let object = self.get(current);
            if let Some(prop) = object.get_own_property(key) {
                return Some((current, prop));
            }
            current = object.proto;
        }
        None
    }

    /// `[[Get]]` on any value: primitive strings expose `length` and their
    /// code units, other primitives resolve through their prototype.
    /// Getters are called with `this` bound to `this`.
    pub fn get_value(&mut self, this: &JSValue, key: &PropertyKey) -> JSResult<JSValue> {
        let objref = match this {
            JSValue::Undefined | JSValue::Ref(Heap::NULL) => {
                return Err(Exception::TypeErrorGetProperty(this.clone(), key.clone()))
            }
            JSValue::Ref(r) => *r,
            JSValue::String(s) => {
                if key.is_length() {
                    return Ok(JSValue::from(s.len()));
                }
                match key.array_index() {
                    Some(i) if (i as usize) < s.len() => {
                        return Ok(JSValue::from(s.slice(i as usize, i as usize + 1)));
                    }
                    _ => Heap::STRING_PROTO,
                }
            }
            JSValue::Bool(_) | JSValue::Number(_) => Heap::OBJECT_PROTO,
        };
        match self.lookup_protochain(objref, key) {
            None => Ok(JSValue::Undefined),
            Some((_, prop)) => match prop.content {
                Content::Value(value) => Ok(value),
                Content::Accessor { get: None, .. } => Ok(JSValue::Undefined),
                Content::Accessor { get: Some(getter), .. } => {
                    let call = CallContext::method(this.clone(), &key.to_string(), vec![]);
                    self.execute(getter, call)
                }
            },
        }
    }

    pub fn get_property(&mut self, objref: JSRef, key: &PropertyKey) -> JSResult<JSValue> {
        self.get_value(&JSValue::from(objref), key)
    }

    /// OrdinarySet: always reports failures.
    ///
    /// An accessor found on the chain has its setter called with `this`
    /// bound to `objref` and nothing is created on `objref`.
    pub fn set(&mut self, objref: JSRef, key: PropertyKey, value: JSValue) -> JSResult<()> {
        if let Some((owner, prop)) = self.lookup_protochain(objref, &key) {
            match prop.content {
                Content::Accessor { set: Some(setter), .. } => {
                    let call = CallContext::method(JSValue::from(objref), &key.to_string(), vec![value]);
                    self.execute(setter, call)?;
                    return Ok(());
                }
                Content::Accessor { set: None, .. } => {
                    log::debug!("{:?}.{} has no setter", objref, key);
                    return Err(Exception::TypeErrorSetReadonly(key));
                }
                Content::Value(_) if !prop.writable() => {
                    log::debug!("{:?}.{} is read-only", owner, key);
                    return Err(Exception::TypeErrorSetReadonly(key));
                }
                Content::Value(_) if owner == objref => {
                    return self.define_property(objref, key, PropertyDescriptor::value(value));
                }
                Content::Value(_) => {}
            }
        }
        let desc = PropertyDescriptor::data(value, Access::all());
        self.define_property(objref, key, desc)
    }

    /// Assignment: like [`Heap::set`], but violations are ignored unless
    /// `options.strict` is set.
    pub fn put(&mut self, objref: JSRef, key: PropertyKey, value: JSValue) -> JSResult<()> {
        let result = self.set(objref, key, value);
        self.apply_strictness(result)
    }

    /// `[[DefineOwnProperty]]`; array `length` values are converted to numbers first.
    pub fn define_property(&mut self, objref: JSRef, key: PropertyKey, mut desc: PropertyDescriptor) -> JSResult<()> {
        if key.is_length() && self.get(objref).as_array().is_some() {
            if let Some(value) = desc.value.take() {
                desc.value = Some(JSValue::from(value.numberify(self)?));
            }
        }
        self.get_mut(objref).define_own_property(key, desc)
    }

    /// `delete objref[key]`; violations are ignored unless `options.strict` is set.
    pub fn remove(&mut self, objref: JSRef, key: &PropertyKey) -> JSResult<()> {
        let result = self.get_mut(objref).delete(key);
        self.apply_strictness(result)
    }

    fn apply_strictness(&self, result: JSResult<()>) -> JSResult<()> {
        if self.options.strict {
            result
        } else {
            ignore_in_sloppy_mode(result)
        }
    }

    pub fn get_prototype_of(&self, objref: JSRef) -> JSValue {
        JSValue::Ref(self.get(objref).proto)
    }

    /// Fails on non-extensible objects and on chains that would loop back to `objref`.
    pub fn set_prototype_of(&mut self, objref: JSRef, proto: JSRef) -> JSResult<()> {
        if self.get(objref).proto == proto {
            return Ok(());
        }
        if !self.get(objref).extensible {
            return Err(Exception::TypeErrorNotExtensible(PropertyKey::from("__proto__")));
        }
        let mut visited = HashSet::new();
        let mut current = proto;
        while current != Heap::NULL && visited.insert(current) {
            if current == objref {
                return Err(Exception::TypeErrorCyclicPrototype(objref));
            }
            current = self.get(current).proto;
        }
        self.get_mut(objref).proto = proto;
        Ok(())
    }

    pub fn prevent_extensions(&mut self, objref: JSRef) {
        self.get_mut(objref).extensible = false;
    }

    pub fn is_extensible(&self, objref: JSRef) -> bool {
        self.get(objref).extensible
    }

    pub fn own_keys(&self, objref: JSRef) -> Vec<PropertyKey> {
        self.get(objref).own_keys()
    }

    /// A snapshot of enumerable own keys: getters called while iterating it
    /// may change the object freely.
    pub fn enumerable_own_keys(&self, objref: JSRef) -> Vec<PropertyKey> {
        let object = self.get(objref);
        (object.own_keys().into_iter())
            .filter(|key| object.get_own_property(key).map_or(false, |p| p.enumerable()))
            .collect()
    }

    /*
     *  Calls
     */

    /// Given a `funcref` to a native call, executes the function.
    pub fn execute(&mut self, funcref: JSRef, call: CallContext) -> JSResult<JSValue> {
        let vmcall = match &self.get(funcref).value {
            ObjectValue::VMCall(vmcall) => vmcall.clone(),
            _ => return Err(Exception::TypeErrorNotCallable(JSValue::from(funcref))),
        };
        vmcall.call(call, self)
    }

    /// Looks up `method_name` on `this` and its prototype chain,
    /// then runs it with `this` bound.
    pub fn execute_method(&mut self, this: JSValue, method_name: &str, arguments: Vec<JSValue>) -> JSResult<JSValue> {
        let func = self.get_value(&this, &PropertyKey::from(method_name))?;
        let funcref = match func.as_object() {
            Some(f) if self.get(f).is_callable() => f,
            _ => return Err(Exception::TypeErrorNotCallable(func)),
        };
        let call = CallContext::method(this, method_name, arguments);
        self.execute(funcref, call)
    }

    /// `new ctor(...arguments)`
    pub fn construct(&mut self, ctor: JSRef, arguments: Vec<JSValue>) -> JSResult<JSValue> {
        if !self.get(ctor).is_callable() {
            return Err(Exception::TypeErrorNotCallable(JSValue::from(ctor)));
        }
        let proto = (self.get_property(ctor, &PropertyKey::from("prototype"))?)
            .as_object()
            .unwrap_or(Heap::OBJECT_PROTO);
        let this = self.alloc(JSObject::with_proto(proto));
        let call = CallContext {
            this: JSValue::from(this),
            method_name: "constructor".to_string(),
            arguments,
            new_target: true,
        };
        let result = self.execute(ctor, call)?;
        match result {
            JSValue::Ref(r) if r != Heap::NULL => Ok(result),
            _ => Ok(JSValue::from(this)),
        }
    }

    /// Looks up a global constructor by name and constructs an instance.
    pub fn construct_global(&mut self, name: &str, arguments: Vec<JSValue>) -> JSResult<JSValue> {
        let ctor = self.get_property(Heap::GLOBAL, &PropertyKey::from(name))?;
        let ctor = ctor.as_object().ok_or(Exception::TypeErrorNotCallable(ctor))?;
        self.construct(ctor, arguments)
    }

    /// Deserializes JSON into objects on the heap
    pub fn object_from_json(&mut self, json: &JSON) -> JSValue {
        match json {
            JSON::Object(jobj) => {
                let mut object = JSObject::new();
                for (key, jval) in jobj.iter() {
                    let value = self.object_from_json(jval);
                    object.properties.insert(PropertyKey::from(key.as_str()), Property::from_value(value));
                }
                JSValue::from(self.alloc(object))
            }
            JSON::Array(jarray) => {
                let storage = jarray.iter().map(|jval| self.object_from_json(jval)).collect();
                JSValue::from(self.alloc_array(storage))
            }
            JSON::Null => JSValue::NULL,
            JSON::Bool(b) => JSValue::from(*b),
            JSON::Number(n) => JSValue::from(n.as_f64().unwrap_or(f64::NAN)),
            JSON::String(s) => JSValue::from(s.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn protochain_lookup() {
        let mut heap = Heap::new();
        let parent = heap.alloc(JSObject::new());
        heap.put(parent, key("x"), JSValue::from(1.0)).unwrap();
        let child = heap.alloc(JSObject::with_proto(parent));

        assert_eq!(heap.get_property(child, &key("x")), Ok(JSValue::from(1.0)));
        assert_eq!(heap.get_property(child, &key("nope")), Ok(JSValue::Undefined));

        // shadowing
        heap.put(child, key("x"), JSValue::from(2.0)).unwrap();
        assert_eq!(heap.get_property(child, &key("x")), Ok(JSValue::from(2.0)));
        assert_eq!(heap.get_property(parent, &key("x")), Ok(JSValue::from(1.0)));
    }

    #[test]
    fn protochain_cycles_terminate() {
        let mut heap = Heap::new();
        let a = heap.alloc(JSObject::new());
        let b = heap.alloc(JSObject::with_proto(a));
        // bypass the checks of set_prototype_of
        heap.get_mut(a).proto = b;
        assert_eq!(heap.get_property(a, &key("missing")), Ok(JSValue::Undefined));
    }

    #[test]
    fn set_prototype_of() {
        let mut heap = Heap::new();
        let a = heap.alloc(JSObject::new());
        let b = heap.alloc(JSObject::with_proto(a));
        let c = heap.alloc(JSObject::new());

        assert_eq!(heap.set_prototype_of(a, b), Err(Exception::TypeErrorCyclicPrototype(a)));
        assert_eq!(heap.set_prototype_of(a, c), Ok(()));
        assert_eq!(heap.get_prototype_of(a), JSValue::from(c));

        heap.prevent_extensions(a);
        assert!(heap.set_prototype_of(a, Heap::NULL).is_err());
        assert_eq!(heap.set_prototype_of(a, c), Ok(()));
    }

    #[test]
    fn readonly_in_sloppy_and_strict_modes() {
        let mut heap = Heap::new();
        let obj = heap.alloc(JSObject::new());
        heap.get_mut(obj).set("ro", 1.0, Access::READONLY).unwrap();

        assert_eq!(heap.put(obj, key("ro"), JSValue::from(2.0)), Ok(()));
        assert_eq!(heap.get_property(obj, &key("ro")), Ok(JSValue::from(1.0)));

        heap.options.strict = true;
        assert_eq!(
            heap.put(obj, key("ro"), JSValue::from(2.0)),
            Err(Exception::TypeErrorSetReadonly(key("ro")))
        );

        // inherited read-only properties block creation of own ones
        let child = heap.alloc(JSObject::with_proto(obj));
        assert!(heap.put(child, key("ro"), JSValue::from(2.0)).is_err());
        assert!(heap.get(child).get_own_property(&key("ro")).is_none());
    }

    #[test]
    fn non_extensible_put() {
        let mut heap = Heap::with_options(Options { strict: true, ..Options::default() });
        let obj = heap.alloc(JSObject::new());
        heap.put(obj, key("x"), JSValue::from(1.0)).unwrap();
        heap.prevent_extensions(obj);

        assert!(!heap.is_extensible(obj));
        assert_eq!(
            heap.put(obj, key("y"), JSValue::from(2.0)),
            Err(Exception::TypeErrorNotExtensible(key("y")))
        );
        assert_eq!(heap.put(obj, key("x"), JSValue::from(3.0)), Ok(()));
        assert_eq!(heap.get_property(obj, &key("x")), Ok(JSValue::from(3.0)));
    }

    #[test]
    fn primitive_string_access() {
        let mut heap = Heap::new();
        let s = JSValue::from("abc");
        assert_eq!(heap.get_value(&s, &key("length")), Ok(JSValue::from(3.0)));
        assert_eq!(heap.get_value(&s, &key("2")), Ok(JSValue::from("c")));
        assert_eq!(heap.get_value(&s, &key("3")), Ok(JSValue::Undefined));
        assert!(heap.get_value(&JSValue::Undefined, &key("x")).is_err());
        assert!(heap.get_value(&JSValue::NULL, &key("x")).is_err());
    }

    #[test]
    fn options_from_json() {
        let options: Options = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert_eq!(options, Options { strict: true, json_max_depth: 512 });
    }
}
