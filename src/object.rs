use bitflags::bitflags;

use crate::error::Exception;
use crate::function::{
    NativeFunction,
    VMCall,
};
use crate::heap::{
    Heap,
    JSRef,
};
use crate::prelude::*;
use crate::regexp::RegExp;
use crate::value::{
    number_to_string,
    same_value,
    to_uint32,
};
use crate::JSResult;

/// An object property name.
///
/// Canonical non-negative integer numerals (those that survive a round trip
/// through `Number::toString`) are stored as numbers: they are enumerated
/// before string keys, in ascending numeric order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Integer(u64),
    String(JSString),
}

impl PropertyKey {
    /// The largest index that an array element can have: 2^32 - 2.
    pub const MAX_ARRAY_INDEX: u64 = 4294967294;

    pub fn length() -> PropertyKey {
        PropertyKey::from("length")
    }

    pub fn is_length(&self) -> bool {
        matches!(self, PropertyKey::String(s) if *s == "length")
    }

    /// Some(index) if the key is an array index (an integer below 2^32 - 1).
    pub fn array_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Integer(n) if *n <= Self::MAX_ARRAY_INDEX => Some(*n as u32),
            _ => None,
        }
    }

    pub fn to_jsstring(&self) -> JSString {
        match self {
            PropertyKey::Integer(n) => JSString::from(n.to_string()),
            PropertyKey::String(s) => s.clone(),
        }
    }

    fn canonical_integer(units: &[u16]) -> Option<u64> {
        if units.is_empty() || units.len() > 20 {
            return None;
        }
        if !units.iter().all(|&c| (b'0' as u16..=b'9' as u16).contains(&c)) {
            return None;
        }
        if units.len() > 1 && units[0] == b'0' as u16 {
            return None;
        }
        let digits: String = units.iter().map(|&c| c as u8 as char).collect();
        let n = u64::from_str(&digits).ok()?;
        if number_to_string(n as f64) == digits {
            Some(n)
        } else {
            None
        }
    }
}

impl From<JSString> for PropertyKey {
    fn from(s: JSString) -> Self {
        match PropertyKey::canonical_integer(s.as_units()) {
            Some(n) => PropertyKey::Integer(n),
            None => PropertyKey::String(s),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from(JSString::from(s))
    }
}

impl From<JSNumber> for PropertyKey {
    fn from(n: JSNumber) -> Self {
        PropertyKey::from(JSString::from(number_to_string(n)))
    }
}

impl From<u32> for PropertyKey {
    fn from(n: u32) -> Self {
        PropertyKey::Integer(n as u64)
    }
}

impl From<usize> for PropertyKey {
    fn from(n: usize) -> Self {
        PropertyKey::Integer(n as u64)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Integer(n) => write!(f, "{}", n),
            PropertyKey::String(s) => write!(f, "{}", s),
        }
    }
}

bitflags! {
    pub struct Access: u8 {
        const ENUM = 0b001;
        const CONF = 0b010;
        const WRITE = 0b100;

        const HIDDEN = Self::CONF.bits | Self::WRITE.bits;
        const READONLY = Self::ENUM.bits | Self::CONF.bits;
        const NONCONF = Self::ENUM.bits | Self::WRITE.bits;
    }
}

impl Access {
    pub fn enumerable(&self) -> bool {
        self.contains(Access::ENUM)
    }
    pub fn configurable(&self) -> bool {
        self.contains(Access::CONF)
    }
    pub fn writable(&self) -> bool {
        self.contains(Access::WRITE)
    }
}

/// Content of a Property
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Value(JSValue),
    Accessor {
        get: Option<JSRef>,
        set: Option<JSRef>,
    },
}

impl<T> From<T> for Content
where
    JSValue: From<T>,
{
    fn from(x: T) -> Content {
        Content::Value(JSValue::from(x))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub content: Content,
    pub access: Access,
}

impl Property {
    pub fn from_value(value: JSValue) -> Property {
        Property::data(value, Access::all())
    }

    pub fn data(value: JSValue, access: Access) -> Property {
        Property {
            content: Content::Value(value),
            access,
        }
    }

    pub fn enumerable(&self) -> bool {
        self.access.enumerable()
    }

    pub fn configurable(&self) -> bool {
        self.access.configurable()
    }

    /// Accessor properties are never writable.
    pub fn writable(&self) -> bool {
        matches!(self.content, Content::Value(_)) && self.access.writable()
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.content, Content::Accessor { .. })
    }
}

/// A (possibly partial) property descriptor, as given to `defineProperty`.
///
/// `get`/`set` are doubly optional: `Some(None)` is an explicit `undefined`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDescriptor {
    pub value: Option<JSValue>,
    pub writable: Option<bool>,
    pub get: Option<Option<JSRef>>,
    pub set: Option<Option<JSRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// A complete data descriptor.
    pub fn data(value: JSValue, access: Access) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(access.writable()),
            enumerable: Some(access.enumerable()),
            configurable: Some(access.configurable()),
            ..Default::default()
        }
    }

    /// A complete accessor descriptor; the WRITE bit of `access` is ignored.
    pub fn accessor(get: Option<JSRef>, set: Option<JSRef>, access: Access) -> Self {
        PropertyDescriptor {
            get: Some(get),
            set: Some(set),
            enumerable: Some(access.enumerable()),
            configurable: Some(access.configurable()),
            ..Default::default()
        }
    }

    /// A descriptor that only changes the value.
    pub fn value(value: JSValue) -> Self {
        PropertyDescriptor {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.is_accessor() && !self.is_data()
    }
}

impl From<&Property> for PropertyDescriptor {
    fn from(prop: &Property) -> Self {
        match &prop.content {
            Content::Value(value) => PropertyDescriptor::data(value.clone(), prop.access),
            Content::Accessor { get, set } => PropertyDescriptor::accessor(*get, *set, prop.access),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    order: u64,
    property: Property,
}

/// Own properties of an object.
///
/// Keeps insertion order of string keys: redefinition of an existing key
/// does not move it.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    slots: HashMap<PropertyKey, Slot>,
    inserted: u64,
}

impl PropertyStore {
    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.slots.get(key).map(|slot| &slot.property)
    }

    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        self.slots.get_mut(key).map(|slot| &mut slot.property)
    }

    pub fn contains_key(&self, key: &PropertyKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn insert(&mut self, key: PropertyKey, property: Property) {
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.property = property;
            return;
        }
        let order = self.inserted;
        self.inserted += 1;
        self.slots.insert(key, Slot { order, property });
    }

    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        self.slots.remove(key).map(|slot| slot.property)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Integer keys in ascending order.
    pub fn integer_keys(&self) -> Vec<u64> {
        let mut keys: Vec<u64> = (self.slots.keys())
            .filter_map(|key| match key {
                PropertyKey::Integer(n) => Some(*n),
                PropertyKey::String(_) => None,
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    /// String keys in insertion order.
    pub fn string_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<(u64, &PropertyKey)> = (self.slots.iter())
            .filter(|(key, _)| matches!(key, PropertyKey::String(_)))
            .map(|(key, slot)| (slot.order, key))
            .collect();
        keys.sort_unstable_by_key(|(order, _)| *order);
        keys.into_iter().map(|(_, key)| key.clone()).collect()
    }

    /// All keys: integers ascending, then strings in insertion order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = (self.integer_keys().into_iter())
            .map(PropertyKey::Integer)
            .collect();
        keys.extend(self.string_keys());
        keys
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.slots.values_mut().map(|slot| &mut slot.property)
    }

    fn values(&self) -> impl Iterator<Item = &Property> {
        self.slots.values().map(|slot| &slot.property)
    }
}

/// The `length` of an Array lives here rather than in its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct JSArray {
    pub length: u32,
    pub length_writable: bool,
}

/// This is used:
/// - as the primitive value of a `String` object;
/// - as the function entry in a `Function`;
/// - as the synthetic `length` of an `Array`;
/// - as the time value of a `Date` and the compiled pattern of a `RegExp`.
#[derive(Debug, Clone)]
pub enum ObjectValue {
    None,
    String(JSString),
    VMCall(VMCall),
    Array(JSArray),
    Date(JSNumber),
    RegExp(Rc<RegExp>),
    Error,
}

/// Javascript objects
#[derive(Debug, Clone)]
pub struct JSObject {
    pub proto: JSRef,
    pub value: ObjectValue,
    pub properties: PropertyStore,
    pub extensible: bool,
}

impl Default for JSObject {
    fn default() -> Self {
        JSObject::new()
    }
}

impl JSObject {
    pub fn new() -> JSObject {
        JSObject::with_proto(Heap::OBJECT_PROTO)
    }

    pub fn with_proto(proto: JSRef) -> JSObject {
        JSObject {
            proto,
            value: ObjectValue::None,
            properties: PropertyStore::default(),
            extensible: true,
        }
    }

    pub fn from_func(f: NativeFunction) -> JSObject {
        JSObject {
            value: ObjectValue::VMCall(VMCall::from_func(f)),
            ..JSObject::with_proto(Heap::FUNCTION_PROTO)
        }
    }

    pub fn from_array(values: Vec<JSValue>) -> JSObject {
        let mut object = JSObject {
            value: ObjectValue::Array(JSArray {
                length: values.len() as u32,
                length_writable: true,
            }),
            ..JSObject::with_proto(Heap::ARRAY_PROTO)
        };
        for (i, value) in values.into_iter().enumerate() {
            object.properties.insert(PropertyKey::from(i), Property::from_value(value));
        }
        object
    }

    pub fn from_string(s: JSString) -> JSObject {
        JSObject {
            value: ObjectValue::String(s),
            ..JSObject::with_proto(Heap::STRING_PROTO)
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.value, ObjectValue::VMCall(_))
    }

    pub fn as_array(&self) -> Option<&JSArray> {
        match &self.value {
            ObjectValue::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut JSArray> {
        match &mut self.value {
            ObjectValue::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The primitive value of a `String` object.
    pub fn as_str(&self) -> Option<&JSString> {
        match &self.value {
            ObjectValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The `Object.prototype.toString` tag.
    pub fn class_name(&self) -> &'static str {
        match &self.value {
            ObjectValue::None => "Object",
            ObjectValue::String(_) => "String",
            ObjectValue::VMCall(_) => "Function",
            ObjectValue::Array(_) => "Array",
            ObjectValue::Date(_) => "Date",
            ObjectValue::RegExp(_) => "RegExp",
            ObjectValue::Error => "Error",
        }
    }

    /// `[[GetOwnProperty]]`: includes the synthetic `length` of arrays and
    /// strings and the index properties of `String` objects.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Property> {
        match &self.value {
            ObjectValue::Array(array) if key.is_length() => {
                let access = if array.length_writable { Access::WRITE } else { Access::empty() };
                return Some(Property::data(JSValue::from(array.length), access));
            }
            ObjectValue::String(s) => {
                if key.is_length() {
                    return Some(Property::data(JSValue::from(s.len()), Access::empty()));
                }
                if let Some(index) = key.array_index() {
                    if (index as usize) < s.len() {
                        let unit = s.slice(index as usize, index as usize + 1);
                        return Some(Property::data(JSValue::from(unit), Access::ENUM));
                    }
                }
            }
            _ => {}
        }
        self.properties.get(key).cloned()
    }

    fn is_synthetic(&self, key: &PropertyKey) -> bool {
        match &self.value {
            ObjectValue::Array(_) => key.is_length(),
            ObjectValue::String(s) => {
                key.is_length() || key.array_index().map_or(false, |i| (i as usize) < s.len())
            }
            _ => false,
        }
    }

    /// `[[OwnPropertyKeys]]`: integer keys ascending, then string keys in
    /// insertion order (the synthetic `length` goes first among them).
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        if let Some(s) = self.as_str() {
            keys.extend((0..s.len()).map(PropertyKey::from));
        }
        keys.extend(self.properties.integer_keys().into_iter().map(PropertyKey::Integer));
        if matches!(self.value, ObjectValue::Array(_) | ObjectValue::String(_)) {
            keys.push(PropertyKey::length());
        }
        keys.extend(self.properties.string_keys());
        keys
    }

    /// `[[DefineOwnProperty]]`
    pub fn define_own_property(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> JSResult<()> {
        let (length, length_writable) = match self.as_array() {
            Some(array) => (array.length, array.length_writable),
            None => return self.define_ordinary(key, desc),
        };
        if key.is_length() {
            return self.define_array_length(desc);
        }
        let index = match key.array_index() {
            Some(index) => index,
            None => return self.define_ordinary(key, desc),
        };
        if index >= length && !length_writable {
            log::debug!("array index {} is beyond the frozen length {}", index, length);
            return Err(Exception::TypeErrorSetReadonly(PropertyKey::length()));
        }
        self.define_ordinary(key, desc)?;
        if index >= length {
            if let Some(array) = self.as_array_mut() {
                array.length = index + 1;
            }
        }
        Ok(())
    }

    /// ValidateAndApplyPropertyDescriptor
    fn define_ordinary(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> JSResult<()> {
        let current = match self.get_own_property(&key) {
            Some(current) => current,
            None => {
                if !self.extensible {
                    return Err(Exception::TypeErrorNotExtensible(key));
                }
                let mut access = Access::empty();
                access.set(Access::ENUM, desc.enumerable.unwrap_or(false));
                access.set(Access::CONF, desc.configurable.unwrap_or(false));
                let content = if desc.is_accessor() {
                    Content::Accessor {
                        get: desc.get.flatten(),
                        set: desc.set.flatten(),
                    }
                } else {
                    access.set(Access::WRITE, desc.writable.unwrap_or(false));
                    Content::Value(desc.value.unwrap_or(JSValue::Undefined))
                };
                self.properties.insert(key, Property { content, access });
                return Ok(());
            }
        };

        if !current.configurable() {
            let rejected = desc.configurable == Some(true)
                || desc.enumerable.map_or(false, |e| e != current.enumerable())
                || match &current.content {
                    _ if desc.is_generic() => false,
                    Content::Value(_) if desc.is_accessor() => true,
                    Content::Accessor { .. } if desc.is_data() => true,
                    Content::Value(value) => {
                        !current.writable()
                            && (desc.writable == Some(true)
                                || desc.value.as_ref().map_or(false, |v| !same_value(v, value)))
                    }
                    Content::Accessor { get, set } => {
                        desc.get.map_or(false, |g| g != *get) || desc.set.map_or(false, |s| s != *set)
                    }
                };
            if rejected {
                log::debug!("cannot redefine non-configurable '{}' with {:?}", key, desc);
                return Err(Exception::TypeErrorNotConfigurable(key));
            }
        }

        if self.is_synthetic(&key) {
            return Ok(());
        }

        let mut access = current.access;
        if let Some(enumerable) = desc.enumerable {
            access.set(Access::ENUM, enumerable);
        }
        if let Some(configurable) = desc.configurable {
            access.set(Access::CONF, configurable);
        }
        let content = match current.content {
            Content::Value(_) if desc.is_accessor() => {
                access.remove(Access::WRITE);
                Content::Accessor {
                    get: desc.get.flatten(),
                    set: desc.set.flatten(),
                }
            }
            Content::Accessor { .. } if desc.is_data() => {
                access.set(Access::WRITE, desc.writable.unwrap_or(false));
                Content::Value(desc.value.unwrap_or(JSValue::Undefined))
            }
            Content::Value(value) => {
                if let Some(writable) = desc.writable {
                    access.set(Access::WRITE, writable);
                }
                Content::Value(desc.value.unwrap_or(value))
            }
            Content::Accessor { get, set } => Content::Accessor {
                get: desc.get.unwrap_or(get),
                set: desc.set.unwrap_or(set),
            },
        };
        self.properties.insert(key, Property { content, access });
        Ok(())
    }

    /// ArraySetLength: the value in `desc` must already be a Number.
    ///
    /// Shrinking deletes elements from the highest index down. The first
    /// non-configurable element stops it: `length` is left just above that
    /// element and the error is reported, nothing is rolled back.
    fn define_array_length(&mut self, desc: PropertyDescriptor) -> JSResult<()> {
        let key = PropertyKey::length();
        let (old_len, writable) = match self.as_array() {
            Some(array) => (array.length, array.length_writable),
            None => return self.define_ordinary(key, desc),
        };
        if desc.is_accessor() || desc.configurable == Some(true) || desc.enumerable == Some(true) {
            return Err(Exception::TypeErrorNotConfigurable(key));
        }
        if desc.writable == Some(true) && !writable {
            return Err(Exception::TypeErrorNotConfigurable(key));
        }
        let freeze = desc.writable == Some(false);

        let new_len = match &desc.value {
            None => {
                self.finish_array_length(old_len, freeze);
                return Ok(());
            }
            Some(JSValue::Number(n)) if to_uint32(*n) as f64 == *n => to_uint32(*n),
            Some(JSValue::Number(n)) => return Err(Exception::RangeErrorInvalidLength(*n)),
            Some(other) => return Err(Exception::TypeErrorInvalidDescriptor(other.clone())),
        };
        if new_len == old_len {
            self.finish_array_length(old_len, freeze);
            return Ok(());
        }
        if !writable {
            return Err(Exception::TypeErrorSetReadonly(key));
        }

        let doomed = (self.properties.integer_keys().into_iter())
            .filter(|&index| index >= new_len as u64 && index <= PropertyKey::MAX_ARRAY_INDEX)
            .rev();
        for index in doomed {
            let element = PropertyKey::Integer(index);
            let configurable = self.properties.get(&element).map_or(true, |p| p.configurable());
            if !configurable {
                log::debug!("array truncation to {} stopped at index {}", new_len, index);
                self.finish_array_length(index as u32 + 1, freeze);
                return Err(Exception::TypeErrorNotConfigurable(element));
            }
            log::trace!("array truncation removes index {}", index);
            self.properties.remove(&element);
        }
        self.finish_array_length(new_len, freeze);
        Ok(())
    }

    fn finish_array_length(&mut self, length: u32, freeze: bool) {
        if let Some(array) = self.as_array_mut() {
            array.length = length;
            if freeze {
                array.length_writable = false;
            }
        }
    }

    /// Sets the array `length`, see [`JSObject::define_own_property`].
    pub fn set_length(&mut self, length: u32) -> JSResult<()> {
        let desc = PropertyDescriptor::value(JSValue::from(length));
        self.define_own_property(PropertyKey::length(), desc)
    }

    /// `[[Delete]]`: non-configurable properties stay.
    pub fn delete(&mut self, key: &PropertyKey) -> JSResult<()> {
        match self.get_own_property(key) {
            None => Ok(()),
            Some(prop) if !prop.configurable() => Err(Exception::TypeErrorNotConfigurable(key.clone())),
            Some(_) => {
                self.properties.remove(key);
                Ok(())
            }
        }
    }

    pub fn freeze(&mut self) {
        self.extensible = false;
        for prop in self.properties.values_mut() {
            prop.access.remove(Access::CONF);
            if !prop.is_accessor() {
                prop.access.remove(Access::WRITE);
            }
        }
        if let Some(array) = self.as_array_mut() {
            array.length_writable = false;
        }
    }

    pub fn is_frozen(&self) -> bool {
        let length_frozen = self.as_array().map_or(true, |array| !array.length_writable);
        !self.extensible
            && length_frozen
            && (self.properties.values()).all(|prop| !prop.configurable() && !prop.writable())
    }

    /*
     *  Helpers to set up builtin objects.
     */

    pub fn set<V>(&mut self, name: &str, value: V, access: Access) -> JSResult<()>
    where
        Content: From<V>,
    {
        let desc = match Content::from(value) {
            Content::Value(value) => PropertyDescriptor::data(value, access),
            Content::Accessor { get, set } => PropertyDescriptor::accessor(get, set, access),
        };
        self.define_own_property(PropertyKey::from(name), desc)
    }

    pub fn set_property<V>(&mut self, name: &str, value: V) -> JSResult<()>
    where
        Content: From<V>,
    {
        self.set(name, value, Access::all())
    }

    pub fn set_system<V>(&mut self, name: &str, value: V) -> JSResult<()>
    where
        Content: From<V>,
    {
        self.set(name, value, Access::empty())
    }

    pub fn set_hidden<V>(&mut self, name: &str, value: V) -> JSResult<()>
    where
        Content: From<V>,
    {
        self.set(name, value, Access::HIDDEN)
    }

    pub fn set_readonly<V>(&mut self, name: &str, value: V) -> JSResult<()>
    where
        Content: From<V>,
    {
        self.set(name, value, Access::READONLY)
    }

    pub fn set_nonconf<V>(&mut self, name: &str, value: V) -> JSResult<()>
    where
        Content: From<V>,
    {
        self.set(name, value, Access::NONCONF)
    }

    /// Reads an own data property without invoking accessors.
    pub fn get_value(&self, key: &PropertyKey) -> Option<JSValue> {
        match self.get_own_property(key)?.content {
            Content::Value(value) => Some(value),
            Content::Accessor { .. } => None,
        }
    }

    /// Converts an acyclic object graph to [`JSON`], skipping accessors.
    pub fn to_json(&self, heap: &Heap) -> JSResult<JSON> {
        if let Some(array) = self.as_array() {
            let jvals = (0..array.length)
                .map(|i| match self.get_value(&PropertyKey::from(i)) {
                    Some(value) => value.to_json(heap),
                    None => Ok(JSON::Null),
                })
                .collect::<JSResult<Vec<_>>>()?;
            return Ok(JSON::Array(jvals));
        }

        let mut json = serde_json::Map::new();
        for key in self.own_keys() {
            let prop = match self.get_own_property(&key) {
                Some(prop) if prop.enumerable() => prop,
                _ => continue,
            };
            let jvalue = match prop.content {
                Content::Value(value) => value.to_json(heap)?,
                Content::Accessor { .. } => JSON::Null,
            };
            json.insert(key.to_string(), jvalue);
        }
        Ok(JSON::Object(json))
    }
}
