use crate::prelude::*;
use crate::{
    error::Exception,
    heap::{
        Heap,
        JSRef,
    },
    object::PropertyKey,
    CallContext,
    JSResult,
};

pub type JSNumber = f64;

/// JavaScript string: an immutable sequence of UTF-16 code units.
///
/// Lone surrogates are allowed; conversion to a Rust `String` is lossy.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct JSString(Rc<[u16]>);

impl JSString {
    pub fn new(units: Vec<u16>) -> Self {
        JSString(Rc::from(units))
    }

    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A substring of code units `[begin, end)`, clamped to the string length.
    pub fn slice(&self, begin: usize, end: usize) -> JSString {
        let end = usize::min(end, self.len());
        let begin = usize::min(begin, end);
        JSString::from(&self.0[begin..end])
    }

    pub fn concat(&self, other: &JSString) -> JSString {
        let mut units = Vec::with_capacity(self.len() + other.len());
        units.extend_from_slice(&self.0);
        units.extend_from_slice(&other.0);
        JSString::new(units)
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for JSString {
    fn from(s: &str) -> Self {
        JSString::new(s.encode_utf16().collect())
    }
}

impl From<String> for JSString {
    fn from(s: String) -> Self {
        JSString::from(s.as_str())
    }
}

impl From<Vec<u16>> for JSString {
    fn from(units: Vec<u16>) -> Self {
        JSString::new(units)
    }
}

impl From<&[u16]> for JSString {
    fn from(units: &[u16]) -> Self {
        JSString(Rc::from(units))
    }
}

impl fmt::Display for JSString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for JSString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl PartialEq<&str> for JSString {
    fn eq(&self, other: &&str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

/// A `JSValue` is either a primitive value or a reference to an object.
#[derive(Debug, Clone, PartialEq)]
pub enum JSValue {
    Undefined,
    Bool(bool),
    Number(JSNumber),
    String(JSString),
    Ref(JSRef),
}

/// The preferred type for [`JSValue::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

impl JSValue {
    pub const NULL: JSValue = JSValue::Ref(Heap::NULL);

    /// to_ref() tries to return the underlying object reference, if any.
    /// It's useful for checking if a value points to an object.
    pub fn to_ref(&self) -> JSResult<JSRef> {
        match self {
            JSValue::Ref(objref) if *objref != Heap::NULL => Ok(*objref),
            _ => Err(Exception::ReferenceNotAnObject(self.clone())),
        }
    }

    /// Like `to_ref()`, but without an error.
    pub fn as_object(&self) -> Option<JSRef> {
        self.to_ref().ok()
    }

    pub fn is_null(&self) -> bool {
        *self == JSValue::NULL
    }

    pub fn is_undefined(&self) -> bool {
        *self == JSValue::Undefined
    }

    pub fn is_nullish(&self) -> bool {
        self.is_null() || self.is_undefined()
    }

    pub fn as_str(&self) -> Option<&JSString> {
        match self {
            JSValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<JSNumber> {
        match self {
            JSValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts the value to [`JSON`], mostly useful for checking results.
    /// Integral numbers become JSON integers, accessors become `null`.
    pub fn to_json(&self, heap: &Heap) -> JSResult<JSON> {
        match self {
            JSValue::Undefined => Ok(JSON::Null),
            JSValue::Bool(b) => Ok(JSON::from(*b)),
            JSValue::Number(n) => Ok(number_to_json(*n)),
            JSValue::String(s) => Ok(JSON::from(s.to_string_lossy())),
            JSValue::Ref(Heap::NULL) => Ok(JSON::Null),
            JSValue::Ref(href) => heap.get(*href).to_json(heap),
        }
    }

    /// ToBoolean
    pub fn boolify(&self) -> bool {
        match self {
            JSValue::Undefined => false,
            JSValue::Bool(b) => *b,
            JSValue::Number(n) => !(*n == 0.0 || n.is_nan()),
            JSValue::String(s) => !s.is_empty(),
            JSValue::Ref(r) => *r != Heap::NULL,
        }
    }

    pub fn type_of(&self, heap: &Heap) -> &'static str {
        match self {
            JSValue::Undefined => "undefined",
            JSValue::Bool(_) => "boolean",
            JSValue::Number(_) => "number",
            JSValue::String(_) => "string",
            JSValue::Ref(Heap::NULL) => "object",
            JSValue::Ref(r) if heap.get(*r).is_callable() => "function",
            JSValue::Ref(_) => "object",
        }
    }

    /// ToPrimitive: calls `valueOf`/`toString` on objects in the order of `hint`.
    pub fn to_primitive(&self, hint: Hint, heap: &mut Heap) -> JSResult<JSValue> {
        let objref = match self {
            JSValue::Ref(r) if *r != Heap::NULL => *r,
            _ => return Ok(self.clone()),
        };
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            Hint::Number => ["valueOf", "toString"],
        };
        for method in order {
            let func = heap.get_value(&JSValue::from(objref), &PropertyKey::from(method))?;
            let funcref = match func.as_object() {
                Some(f) if heap.get(f).is_callable() => f,
                _ => continue,
            };
            let call = CallContext::method(JSValue::from(objref), method, vec![]);
            let result = heap.execute(funcref, call)?;
            if result.as_object().is_none() {
                return Ok(result);
            }
        }
        Err(Exception::TypeErrorNoPrimitive(self.clone()))
    }

    /// stringify() makes everything into a string,
    /// it corresponds to `String(value)` in JavaScript.
    pub fn stringify(&self, heap: &mut Heap) -> JSResult<JSString> {
        match self {
            JSValue::Undefined => Ok(JSString::from("undefined")),
            JSValue::Bool(b) => Ok(JSString::from(if *b { "true" } else { "false" })),
            JSValue::Number(n) => Ok(JSString::from(number_to_string(*n))),
            JSValue::String(s) => Ok(s.clone()),
            JSValue::Ref(Heap::NULL) => Ok(JSString::from("null")),
            JSValue::Ref(_) => self.to_primitive(Hint::String, heap)?.stringify(heap),
        }
    }

    /// numberify() corresponds to `+value` in JavaScript.
    pub fn numberify(&self, heap: &mut Heap) -> JSResult<JSNumber> {
        match self {
            JSValue::Undefined => Ok(f64::NAN),
            JSValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            JSValue::Number(n) => Ok(*n),
            JSValue::String(s) => Ok(string_to_number(s.as_units())),
            JSValue::Ref(Heap::NULL) => Ok(0.0),
            JSValue::Ref(_) => self.to_primitive(Hint::Number, heap)?.numberify(heap),
        }
    }

    pub fn to_property_key(&self, heap: &mut Heap) -> JSResult<PropertyKey> {
        match self {
            JSValue::String(s) => Ok(PropertyKey::from(s.clone())),
            JSValue::Number(n) => Ok(PropertyKey::from(*n)),
            _ => Ok(PropertyKey::from(self.stringify(heap)?)),
        }
    }

    /// Strict Equality Comparison (`===`)
    pub fn strict_eq(&self, other: &JSValue) -> bool {
        self == other
    }
}

impl From<bool> for JSValue {
    fn from(b: bool) -> Self {
        JSValue::Bool(b)
    }
}

impl From<JSNumber> for JSValue {
    fn from(number: JSNumber) -> Self {
        JSValue::Number(number)
    }
}

impl From<i64> for JSValue {
    fn from(number: i64) -> Self {
        JSValue::Number(number as JSNumber)
    }
}

impl From<i32> for JSValue {
    fn from(number: i32) -> Self {
        JSValue::Number(number as JSNumber)
    }
}

impl From<u32> for JSValue {
    fn from(number: u32) -> Self {
        JSValue::Number(number as JSNumber)
    }
}

impl From<usize> for JSValue {
    fn from(number: usize) -> Self {
        JSValue::Number(number as JSNumber)
    }
}

impl From<JSString> for JSValue {
    fn from(s: JSString) -> Self {
        JSValue::String(s)
    }
}

impl From<String> for JSValue {
    fn from(s: String) -> Self {
        JSValue::String(JSString::from(s))
    }
}

impl From<&str> for JSValue {
    fn from(s: &str) -> Self {
        JSValue::String(JSString::from(s))
    }
}

impl From<JSRef> for JSValue {
    fn from(r: JSRef) -> Self {
        JSValue::Ref(r)
    }
}

impl From<Option<JSString>> for JSValue {
    fn from(opt: Option<JSString>) -> Self {
        opt.map(JSValue::String).unwrap_or(JSValue::Undefined)
    }
}

impl TryFrom<&JSON> for JSValue {
    type Error = ();

    /// Constructs a pure value (without references), if possible.
    /// Excludes objects and arrays.
    fn try_from(json: &JSON) -> Result<JSValue, Self::Error> {
        let value = if json.is_null() {
            JSValue::NULL
        } else if let Some(b) = json.as_bool() {
            JSValue::Bool(b)
        } else if let Some(n) = json.as_f64() {
            JSValue::Number(n)
        } else if let Some(s) = json.as_str() {
            JSValue::from(s)
        } else {
            return Err(());
        };
        Ok(value)
    }
}

fn number_to_json(n: JSNumber) -> JSON {
    const SAFE_INTEGER: f64 = 9007199254740991.0;
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.fract() == 0.0 && n.abs() <= SAFE_INTEGER && !negative_zero {
        JSON::from(n as i64)
    } else {
        JSON::from(n)
    }
}

/*
 *  Shared numeric coercions
 */

/// Number::toString(10)
pub fn number_to_string(n: JSNumber) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else {
        let mut buffer = ryu_js::Buffer::new();
        buffer.format_finite(n).to_string()
    }
}

/// StrWhiteSpaceChar, including line terminators.
pub fn is_whitespace(c: u16) -> bool {
    matches!(
        c,
        0x09 | 0x0B | 0x0C | 0x20 | 0xA0 | 0xFEFF | 0x0A | 0x0D | 0x2028 | 0x2029
            | 0x1680 | 0x2000..=0x200A | 0x202F | 0x205F | 0x3000
    )
}

pub fn trim_whitespace(units: &[u16]) -> &[u16] {
    let start = units.iter().position(|&c| !is_whitespace(c)).unwrap_or(units.len());
    let end = units.iter().rposition(|&c| !is_whitespace(c)).map_or(start, |i| i + 1);
    &units[start..end]
}

/// The length of the longest prefix of `s` that is a StrDecimalLiteral
/// (without sign and without `Infinity`). Zero if there is none.
pub(crate) fn decimal_prefix_len(s: &[u8]) -> usize {
    let digits = |from: usize| s[from..].iter().take_while(|c| c.is_ascii_digit()).count();

    let int_digits = digits(0);
    let mut end = int_digits;
    let mut frac_digits = 0;
    if s.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0;
    }
    if let Some(b'e' | b'E') = s.get(end) {
        let mut exp = end + 1;
        if let Some(b'+' | b'-') = s.get(exp) {
            exp += 1;
        }
        let exp_digits = digits(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    end
}

/// StringToNumber
pub fn string_to_number(units: &[u16]) -> JSNumber {
    let trimmed = trim_whitespace(units);
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed.iter().any(|&c| c > 0x7f) {
        return f64::NAN;
    }
    let s: Vec<u8> = trimmed.iter().map(|&c| c as u8).collect();

    let radix = match s.get(0..2) {
        Some(b"0x" | b"0X") => Some(16),
        Some(b"0o" | b"0O") => Some(8),
        Some(b"0b" | b"0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        let mut result = 0.0;
        for &c in digits {
            match (c as char).to_digit(radix) {
                Some(d) => result = result * radix as f64 + d as f64,
                None => return f64::NAN,
            }
        }
        return result;
    }

    let (sign, unsigned) = match s[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, &s[..]),
    };
    if unsigned == b"Infinity" {
        return sign * f64::INFINITY;
    }
    if decimal_prefix_len(unsigned) != unsigned.len() {
        return f64::NAN;
    }
    match core::str::from_utf8(unsigned).ok().and_then(|u| f64::from_str(u).ok()) {
        Some(n) => sign * n,
        None => f64::NAN,
    }
}

/// ToIntegerOrInfinity: `NaN` and `-0` become `0`, the rest is truncated.
pub fn to_integer_or_infinity(n: JSNumber) -> JSNumber {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc() + 0.0
    }
}

/// ToUint32
pub fn to_uint32(n: JSNumber) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4294967296.0) as u32
}

/// ToInt32
pub fn to_int32(n: JSNumber) -> i32 {
    to_uint32(n) as i32
}

/// Clamps a relative position (e.g. `slice()` arguments) into `0..=len`.
pub fn relative_index(n: JSNumber, len: usize) -> usize {
    let n = to_integer_or_infinity(n);
    let len_f = len as f64;
    let idx = if n < 0.0 { f64::max(len_f + n, 0.0) } else { f64::min(n, len_f) };
    idx as usize
}

/// SameValue: like `===`, but `NaN` is equal to itself and `+0` differs from `-0`.
pub fn same_value(left: &JSValue, right: &JSValue) -> bool {
    match (left, right) {
        (JSValue::Number(l), JSValue::Number(r)) => {
            if l.is_nan() && r.is_nan() {
                true
            } else if *l == 0.0 && *r == 0.0 {
                l.is_sign_negative() == r.is_sign_negative()
            } else {
                l == r
            }
        }
        _ => left == right,
    }
}

#[test]
fn test_number_to_string() {
    assert_eq!(number_to_string(1.0), "1");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(0.1), "0.1");
    assert_eq!(number_to_string(123.2), "123.2");
    assert_eq!(number_to_string(1e21), "1e+21");
    assert_eq!(number_to_string(f64::NAN), "NaN");
    assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    assert_eq!(number_to_string(18014398509481984.0), "18014398509481984");
}

#[test]
fn test_string_to_number() {
    let num = |s: &str| string_to_number(JSString::from(s).as_units());
    assert_eq!(num(""), 0.0);
    assert_eq!(num("  42\n"), 42.0);
    assert_eq!(num("-1.5e3"), -1500.0);
    assert_eq!(num(".5"), 0.5);
    assert_eq!(num("5."), 5.0);
    assert_eq!(num("0x1f"), 31.0);
    assert_eq!(num("-Infinity"), f64::NEG_INFINITY);
    assert!(num("inf").is_nan());
    assert!(num("1e").is_nan());
    assert!(num("12px").is_nan());
    assert!(num("-0x10").is_nan());
}

#[test]
fn test_integer_coercions() {
    assert_eq!(to_integer_or_infinity(f64::NAN), 0.0);
    assert!(to_integer_or_infinity(-0.0).is_sign_positive());
    assert!(to_integer_or_infinity(-0.5).is_sign_positive());
    assert_eq!(to_integer_or_infinity(-2.7), -2.0);
    assert_eq!(to_integer_or_infinity(f64::NEG_INFINITY), f64::NEG_INFINITY);

    assert_eq!(to_uint32(-1.0), 4294967295);
    assert_eq!(to_uint32(4294967296.0), 0);
    assert_eq!(to_uint32(f64::INFINITY), 0);
    assert_eq!(to_int32(4294967295.0), -1);

    assert_eq!(relative_index(-1.0, 3), 2);
    assert_eq!(relative_index(-10.0, 3), 0);
    assert_eq!(relative_index(f64::INFINITY, 3), 3);
}

#[test]
fn test_boolify() {
    // true
    assert!(JSValue::from(true).boolify());
    assert!(JSValue::from(1).boolify());
    assert!(JSValue::from("0").boolify());

    // false
    assert!(!JSValue::from(false).boolify());
    assert!(!JSValue::from(0).boolify());
    assert!(!JSValue::from(f64::NAN).boolify());
    assert!(!JSValue::from("").boolify());
    assert!(!JSValue::NULL.boolify());
    assert!(!JSValue::Undefined.boolify());
}

#[test]
fn test_same_value() {
    assert!(same_value(&JSValue::from(f64::NAN), &JSValue::from(f64::NAN)));
    assert!(!same_value(&JSValue::from(0.0), &JSValue::from(-0.0)));
    assert!(same_value(&JSValue::from("a"), &JSValue::from("a")));
    assert!(!same_value(&JSValue::from(1), &JSValue::from("1")));
}
