pub use core::{
    cmp::Ordering,
    convert::TryFrom,
    fmt,
    fmt::Write,
    str::FromStr,
};

pub use std::{
    collections::{
        HashMap,
        HashSet,
    },
    rc::Rc,
};

pub use crate::{
    JSNumber,
    JSString,
    JSValue,
    JSON,
};
