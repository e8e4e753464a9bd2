use crate::heap::{
    Heap,
    JSRef,
};
use crate::prelude::*;
use crate::JSResult;

/// The receiver and the arguments of a native call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub this: JSValue,
    pub method_name: String,
    pub arguments: Vec<JSValue>,
    /// True when called via `new`: `this` is then a freshly allocated object.
    pub new_target: bool,
}

impl CallContext {
    pub fn method(this: JSValue, method_name: &str, arguments: Vec<JSValue>) -> CallContext {
        CallContext {
            this,
            method_name: method_name.to_string(),
            arguments,
            new_target: false,
        }
    }

    pub fn arg_value(&self, index: usize) -> JSValue {
        self.arguments.get(index).cloned().unwrap_or(JSValue::Undefined)
    }

    pub fn arg_as_number(&self, index: usize, heap: &mut Heap) -> JSResult<Option<JSNumber>> {
        match self.arguments.get(index) {
            None | Some(JSValue::Undefined) => Ok(None),
            Some(value) => value.numberify(heap).map(Some),
        }
    }

    pub fn arg_as_string(&self, index: usize, heap: &mut Heap) -> JSResult<Option<JSString>> {
        match self.arguments.get(index) {
            None | Some(JSValue::Undefined) => Ok(None),
            Some(value) => value.stringify(heap).map(Some),
        }
    }

    pub fn this_ref(&self) -> JSResult<JSRef> {
        self.this.to_ref()
    }
}

/// A wrapper for NativeFunction to give it `fmt::Debug`.
#[derive(Clone)]
pub struct VMCall(NativeFunction);

impl VMCall {
    pub fn from_func(f: NativeFunction) -> VMCall {
        VMCall(f)
    }

    pub fn call(&self, call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
        (self.0)(call, heap)
    }

    pub fn ptr(&self) -> usize {
        self.0 as *const () as usize
    }
}

impl fmt::Debug for VMCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VMCall(*{:x})", self.ptr())
    }
}

pub type NativeFunction = fn(call: CallContext, heap: &'_ mut Heap) -> JSResult<JSValue>;
