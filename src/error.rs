use std::error::Error;

use crate::heap::JSRef;
use crate::object::PropertyKey;
use crate::prelude::*;

pub type JSResult<T> = Result<T, Exception>;

/// What kind of text failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    JSON,
    RegExp,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Grammar::JSON => f.write_str("JSON"),
            Grammar::RegExp => f.write_str("RegExp"),
        }
    }
}

/// A syntax error in JSON text or in a regular expression pattern.
/// Positions count UTF-16 code units from the start of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken { grammar: Grammar, token: char, position: usize },
    UnexpectedEnd { grammar: Grammar, position: usize },
    Invalid { grammar: Grammar, reason: &'static str, position: usize },
}

impl ParseError {
    pub fn unexpected(grammar: Grammar, unit: u16, position: usize) -> Self {
        let token = char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        ParseError::UnexpectedToken { grammar, token, position }
    }

    pub fn position(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEnd { position, .. }
            | ParseError::Invalid { position, .. } => *position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { grammar, token, position } => {
                write!(f, "{}: unexpected token {:?} at position {}", grammar, token, position)
            }
            ParseError::UnexpectedEnd { grammar, position } => {
                write!(f, "{}: unexpected end of input at position {}", grammar, position)
            }
            ParseError::Invalid { grammar, reason, position } => {
                write!(f, "{}: {} at position {}", grammar, reason, position)
            }
        }
    }
}

/// The error taxonomy every [`Exception`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A wrong kind of value for an operation.
    TypeMismatch,
    /// A property model invariant would be broken.
    InvariantViolation,
    /// Malformed RegExp or JSON text.
    SyntaxError,
    /// A length or an index out of its representable bounds.
    RangeError,
    /// A value thrown by JavaScript code.
    Thrown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    SyntaxError(ParseError),
    SyntaxErrorInvalidFlags(JSString),

    ReferenceNotAnObject(JSValue),
    TypeErrorGetProperty(JSValue, PropertyKey),
    TypeErrorNotCallable(JSValue),
    TypeErrorNoPrimitive(JSValue),
    TypeErrorInstanceRequired(JSValue, &'static str),
    TypeErrorInvalidDescriptor(JSValue),
    TypeErrorInvalidPrototype(JSValue),

    TypeErrorSetReadonly(PropertyKey),
    TypeErrorNotConfigurable(PropertyKey),
    TypeErrorNotExtensible(PropertyKey),
    TypeErrorCyclicPrototype(JSRef),
    TypeErrorCircularJSON(JSRef),

    RangeErrorInvalidLength(JSNumber),
    RangeErrorInvalidDate,

    UserThrown(JSValue),
}

impl Exception {
    pub fn instance_required<V>(arg: V, of: &'static str) -> Exception
    where
        JSValue: From<V>,
    {
        Exception::TypeErrorInstanceRequired(JSValue::from(arg), of)
    }

    pub fn kind(&self) -> ErrorKind {
        use Exception::*;
        match self {
            SyntaxError(_) | SyntaxErrorInvalidFlags(_) => ErrorKind::SyntaxError,
            ReferenceNotAnObject(_)
            | TypeErrorGetProperty(_, _)
            | TypeErrorNotCallable(_)
            | TypeErrorNoPrimitive(_)
            | TypeErrorInstanceRequired(_, _)
            | TypeErrorInvalidDescriptor(_)
            | TypeErrorInvalidPrototype(_)
            | TypeErrorCircularJSON(_) => ErrorKind::TypeMismatch,
            TypeErrorSetReadonly(_)
            | TypeErrorNotConfigurable(_)
            | TypeErrorNotExtensible(_)
            | TypeErrorCyclicPrototype(_) => ErrorKind::InvariantViolation,
            RangeErrorInvalidLength(_) | RangeErrorInvalidDate => ErrorKind::RangeError,
            UserThrown(_) => ErrorKind::Thrown,
        }
    }

    /// The name of the JavaScript error constructor for this exception.
    pub fn error_name(&self) -> &'static str {
        match self.kind() {
            ErrorKind::TypeMismatch | ErrorKind::InvariantViolation => "TypeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::Thrown => "Error",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Exception::*;
        let name = self.error_name();
        match self {
            SyntaxError(err) => write!(f, "{}: {}", name, err),
            SyntaxErrorInvalidFlags(flags) => write!(f, "{}: invalid regular expression flags '{}'", name, flags),
            ReferenceNotAnObject(what) => write!(f, "{}: {:?} is not an object", name, what),
            TypeErrorGetProperty(what, key) => write!(f, "{}: cannot read property '{}' of {:?}", name, key, what),
            TypeErrorNotCallable(what) => write!(f, "{}: {:?} is not a function", name, what),
            TypeErrorNoPrimitive(what) => write!(f, "{}: cannot convert {:?} to a primitive", name, what),
            TypeErrorInstanceRequired(what, of) => write!(f, "{}: {:?} is not an instance of {}", name, what, of),
            TypeErrorInvalidDescriptor(what) => write!(f, "{}: invalid property descriptor {:?}", name, what),
            TypeErrorInvalidPrototype(what) => write!(f, "{}: {:?} is not a valid prototype", name, what),
            TypeErrorSetReadonly(key) => write!(f, "{}: '{}' is read-only", name, key),
            TypeErrorNotConfigurable(key) => write!(f, "{}: cannot redefine property '{}'", name, key),
            TypeErrorNotExtensible(key) => write!(f, "{}: cannot add property '{}', object is not extensible", name, key),
            TypeErrorCyclicPrototype(objref) => write!(f, "{}: cyclic __proto__ value for {:?}", name, objref),
            TypeErrorCircularJSON(objref) => write!(f, "{}: converting circular structure to JSON at {:?}", name, objref),
            RangeErrorInvalidLength(len) => write!(f, "{}: invalid array length {}", name, len),
            RangeErrorInvalidDate => write!(f, "{}: invalid time value", name),
            UserThrown(value) => write!(f, "Uncaught {:?}", value),
        }
    }
}

impl Error for Exception {}

impl From<ParseError> for Exception {
    fn from(err: ParseError) -> Self {
        Self::SyntaxError(err)
    }
}

/// Non-strict code does not see property model violations:
/// writes to read-only properties, extensions of non-extensible objects
/// and deletions of non-configurable properties silently do nothing.
pub fn ignore_in_sloppy_mode(result: JSResult<()>) -> JSResult<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::InvariantViolation => {
            log::debug!("ignored in sloppy mode: {}", e);
            Ok(())
        }
        other => other,
    }
}

#[test]
fn test_parse_error_display() {
    let err = ParseError::unexpected(Grammar::JSON, b'}' as u16, 7);
    assert_eq!(err.to_string(), "JSON: unexpected token '}' at position 7");
    assert_eq!(err.position(), 7);

    let exc = Exception::from(err);
    assert_eq!(exc.kind(), ErrorKind::SyntaxError);
    assert_eq!(exc.error_name(), "SyntaxError");
}

#[test]
fn test_sloppy_mode() {
    let readonly = Exception::TypeErrorSetReadonly(PropertyKey::from("x"));
    assert_eq!(ignore_in_sloppy_mode(Err(readonly)), Ok(()));

    let range = Exception::RangeErrorInvalidLength(-1.0);
    assert_eq!(ignore_in_sloppy_mode(Err(range.clone())), Err(range));
}
