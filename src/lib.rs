//! The builtin object runtime of slothjs: objects and their prototype
//! chains, arrays, strings, regular expressions, dates and JSON, on an
//! arena heap.

pub mod builtin;
pub mod error;
pub mod function;
pub mod heap;
pub mod object;
mod prelude;
pub mod regexp;
pub mod value;

#[cfg(test)]
mod test;

pub use error::{
    ErrorKind,
    Exception,
    JSResult,
    ParseError,
};
pub use function::{
    CallContext,
    NativeFunction,
};
pub use heap::{
    Heap,
    JSRef,
    Options,
};
pub use object::{
    Access,
    JSObject,
    PropertyDescriptor,
    PropertyKey,
};
pub use value::{
    JSNumber,
    JSString,
    JSValue,
};

pub type JSON = serde_json::Value;
