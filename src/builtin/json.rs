use crate::error::{
    Grammar,
    ParseError,
};
use crate::object::{
    Access,
    ObjectValue,
    PropertyDescriptor,
};
use crate::prelude::*;
use crate::value::{
    number_to_string,
    to_integer_or_infinity,
};
use crate::{
    builtin::{
        index_key,
        length_of,
    },
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    PropertyKey,
};

/*
 *  JSON.parse
 */

struct JsonParser<'a, 'h> {
    text: &'a [u16],
    pos: usize,
    depth: usize,
    heap: &'h mut Heap,
}

fn is_json_whitespace(c: u16) -> bool {
    matches!(c, 0x09 | 0x0A | 0x0D | 0x20)
}

impl<'a, 'h> JsonParser<'a, 'h> {
    fn peek(&self) -> Option<u16> {
        self.text.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, is_json_whitespace) {
            self.pos += 1;
        }
    }

    /// The error for whatever is at the current position.
    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(c) => ParseError::unexpected(Grammar::JSON, c, self.pos),
            None => ParseError::UnexpectedEnd { grammar: Grammar::JSON, position: self.pos },
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), ParseError> {
        if self.peek() != Some(c as u16) {
            return Err(self.unexpected());
        }
        self.pos += 1;
        Ok(())
    }

    fn eat(&mut self, c: u8) -> bool {
        let found = self.peek() == Some(c as u16);
        if found {
            self.pos += 1;
        }
        found
    }

    fn parse(&mut self) -> JSResult<JSValue> {
        let value = self.value()?;
        self.skip_whitespace();
        if self.pos != self.text.len() {
            return Err(Exception::from(self.unexpected()));
        }
        Ok(value)
    }

    fn value(&mut self) -> JSResult<JSValue> {
        self.skip_whitespace();
        let c = self.peek().ok_or_else(|| self.unexpected())?;
        match char::from_u32(c as u32) {
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(Self::array),
            Some('"') => Ok(JSValue::from(self.string()?)),
            Some('t') => self.literal("true", JSValue::from(true)),
            Some('f') => self.literal("false", JSValue::from(false)),
            Some('n') => self.literal("null", JSValue::NULL),
            Some('-' | '0'..='9') => Ok(JSValue::from(self.number()?)),
            _ => Err(Exception::from(self.unexpected())),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> JSResult<JSValue>) -> JSResult<JSValue> {
        if self.depth >= self.heap.options.json_max_depth {
            let reason = "nesting too deep";
            return Err(Exception::from(ParseError::Invalid { grammar: Grammar::JSON, reason, position: self.pos }));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn literal(&mut self, word: &str, value: JSValue) -> JSResult<JSValue> {
        for c in word.bytes() {
            self.expect(c)?;
        }
        Ok(value)
    }

    fn object(&mut self) -> JSResult<JSValue> {
        self.expect(b'{')?;
        let mut object = JSObject::new();
        self.skip_whitespace();
        if !self.eat(b'}') {
            loop {
                self.skip_whitespace();
                if self.peek() != Some(b'"' as u16) {
                    return Err(Exception::from(self.unexpected()));
                }
                let key = self.string()?;
                self.skip_whitespace();
                self.expect(b':')?;
                let value = self.value()?;
                let desc = PropertyDescriptor::data(value, Access::all());
                object.define_own_property(PropertyKey::from(key), desc)?;

                self.skip_whitespace();
                if self.eat(b'}') {
                    break;
                }
                self.expect(b',')?;
            }
        }
        Ok(JSValue::from(self.heap.alloc(object)))
    }

    fn array(&mut self) -> JSResult<JSValue> {
        self.expect(b'[')?;
        let mut values = Vec::new();
        self.skip_whitespace();
        if !self.eat(b']') {
            loop {
                values.push(self.value()?);
                self.skip_whitespace();
                if self.eat(b']') {
                    break;
                }
                self.expect(b',')?;
            }
        }
        Ok(JSValue::from(self.heap.alloc_array(values)))
    }

    fn string(&mut self) -> Result<JSString, ParseError> {
        self.expect(b'"')?;
        let mut units = Vec::new();
        loop {
            let c = self.peek().ok_or_else(|| self.unexpected())?;
            if c < 0x20 {
                return Err(self.unexpected());
            }
            self.pos += 1;
            match c {
                0x22 => break,
                0x5C => units.push(self.escape()?),
                _ => units.push(c),
            }
        }
        Ok(JSString::from(units))
    }

    fn escape(&mut self) -> Result<u16, ParseError> {
        let c = self.peek().ok_or_else(|| self.unexpected())?;
        let unit = match char::from_u32(c as u32) {
            Some('"') => 0x22,
            Some('\\') => 0x5C,
            Some('/') => 0x2F,
            Some('b') => 0x08,
            Some('f') => 0x0C,
            Some('n') => 0x0A,
            Some('r') => 0x0D,
            Some('t') => 0x09,
            Some('u') => {
                self.pos += 1;
                let mut unit = 0u16;
                for _ in 0..4 {
                    let digit = (self.peek())
                        .and_then(|c| char::from_u32(c as u32)?.to_digit(16))
                        .ok_or_else(|| self.unexpected())?;
                    unit = unit * 16 + digit as u16;
                    self.pos += 1;
                }
                return Ok(unit);
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(unit)
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek().map_or(false, |c| (b'0' as u16..=b'9' as u16).contains(&c)) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Result<JSNumber, ParseError> {
        let start = self.pos;
        self.eat(b'-');
        if !self.eat(b'0') && self.digits() == 0 {
            return Err(self.unexpected());
        }
        if self.eat(b'.') && self.digits() == 0 {
            return Err(self.unexpected());
        }
        if self.eat(b'e') || self.eat(b'E') {
            if !self.eat(b'+') {
                self.eat(b'-');
            }
            if self.digits() == 0 {
                return Err(self.unexpected());
            }
        }
        let literal = String::from_utf16_lossy(&self.text[start..self.pos]);
        f64::from_str(&literal).map_err(|_| {
            let reason = "invalid number";
            ParseError::Invalid { grammar: Grammar::JSON, reason, position: start }
        })
    }
}

/// `JSON.parse(text)`: objects and arrays are allocated on `heap`.
pub fn json_parse(heap: &mut Heap, text: &JSString) -> JSResult<JSValue> {
    let mut parser = JsonParser {
        text: text.as_units(),
        pos: 0,
        depth: 0,
        heap,
    };
    parser.parse()
}

/*
 *  JSON.stringify
 */

struct JsonWriter<'h> {
    heap: &'h mut Heap,
    gap: Vec<u16>,
    indent: Vec<u16>,
    stack: Vec<JSRef>,
}

/// QuoteJSONString
fn quote(s: &JSString, out: &mut Vec<u16>) {
    let units = s.as_units();
    out.push(b'"' as u16);
    for (i, &c) in units.iter().enumerate() {
        let escaped = match c {
            0x22 => Some('"'),
            0x5C => Some('\\'),
            0x08 => Some('b'),
            0x0C => Some('f'),
            0x0A => Some('n'),
            0x0D => Some('r'),
            0x09 => Some('t'),
            _ => None,
        };
        if let Some(e) = escaped {
            out.extend_from_slice(&[0x5C, e as u16]);
            continue;
        }
        let lone_surrogate = match c {
            0xD800..=0xDBFF => !matches!(units.get(i + 1), Some(0xDC00..=0xDFFF)),
            0xDC00..=0xDFFF => i == 0 || !matches!(units[i - 1], 0xD800..=0xDBFF),
            _ => false,
        };
        if c < 0x20 || lone_surrogate {
            out.extend(format!("\\u{:04x}", c).encode_utf16());
        } else {
            out.push(c);
        }
    }
    out.push(b'"' as u16);
}

impl<'h> JsonWriter<'h> {
    fn new(heap: &'h mut Heap, indent: &JSValue) -> Self {
        let gap = match indent {
            JSValue::Number(n) => {
                let width = to_integer_or_infinity(*n).clamp(0.0, 10.0) as usize;
                vec![b' ' as u16; width]
            }
            JSValue::String(s) => s.as_units().iter().take(10).copied().collect(),
            JSValue::Ref(r) => match &heap.get(*r).value {
                ObjectValue::String(s) => s.as_units().iter().take(10).copied().collect(),
                _ => vec![],
            },
            _ => vec![],
        };
        JsonWriter { heap, gap, indent: vec![], stack: vec![] }
    }

    /// SerializeJSONProperty: `None` for values that have no JSON form.
    fn serialize(&mut self, key: &PropertyKey, value: JSValue) -> JSResult<Option<Vec<u16>>> {
        let mut value = value;
        if let Some(objref) = value.as_object() {
            let to_json = self.heap.get_property(objref, &PropertyKey::from("toJSON"))?;
            if let Some(funcref) = to_json.as_object().filter(|&f| self.heap.get(f).is_callable()) {
                let call = CallContext::method(value.clone(), "toJSON", vec![JSValue::from(key.to_jsstring())]);
                value = self.heap.execute(funcref, call)?;
            }
        }
        if let Some(objref) = value.as_object() {
            if let Some(s) = self.heap.get(objref).as_str() {
                value = JSValue::from(s.clone());
            }
        }

        let mut out = Vec::new();
        match value {
            JSValue::Undefined => return Ok(None),
            JSValue::Ref(Heap::NULL) => out.extend("null".encode_utf16()),
            JSValue::Bool(b) => out.extend((if b { "true" } else { "false" }).encode_utf16()),
            JSValue::Number(n) if n.is_finite() => out.extend(number_to_string(n).encode_utf16()),
            JSValue::Number(_) => out.extend("null".encode_utf16()),
            JSValue::String(s) => quote(&s, &mut out),
            JSValue::Ref(objref) if self.heap.get(objref).is_callable() => return Ok(None),
            JSValue::Ref(objref) => {
                if self.stack.contains(&objref) {
                    return Err(Exception::TypeErrorCircularJSON(objref));
                }
                self.stack.push(objref);
                let stepback = self.indent.len();
                self.indent.extend_from_slice(&self.gap);

                let result = if self.heap.get(objref).as_array().is_some() {
                    self.array(objref)
                } else {
                    self.object(objref)
                };

                self.indent.truncate(stepback);
                self.stack.pop();
                let items = result?;
                let (open, close) = if self.heap.get(objref).as_array().is_some() { (b'[', b']') } else { (b'{', b'}') };
                self.wrap(items, open, close, &mut out);
            }
        }
        Ok(Some(out))
    }

    fn array(&mut self, objref: JSRef) -> JSResult<Vec<Vec<u16>>> {
        let length = length_of(objref, self.heap)?;
        let mut items = Vec::new();
        for i in 0..length {
            let key = index_key(i);
            let element = self.heap.get_property(objref, &key)?;
            let item = self.serialize(&key, element)?;
            items.push(item.unwrap_or_else(|| "null".encode_utf16().collect()));
        }
        Ok(items)
    }

    fn object(&mut self, objref: JSRef) -> JSResult<Vec<Vec<u16>>> {
        let mut items = Vec::new();
        for key in self.heap.enumerable_own_keys(objref) {
            let value = self.heap.get_property(objref, &key)?;
            if let Some(serialized) = self.serialize(&key, value)? {
                let mut item = Vec::new();
                quote(&key.to_jsstring(), &mut item);
                item.push(b':' as u16);
                if !self.gap.is_empty() {
                    item.push(b' ' as u16);
                }
                item.extend(serialized);
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Joins `items` in brackets; with a gap every item goes on its own line.
    fn wrap(&self, items: Vec<Vec<u16>>, open: u8, close: u8, out: &mut Vec<u16>) {
        out.push(open as u16);
        if !items.is_empty() {
            let mut separator = vec![b',' as u16];
            let mut inner = self.indent.clone();
            inner.extend_from_slice(&self.gap);
            if !self.gap.is_empty() {
                separator.push(b'\n' as u16);
                separator.extend_from_slice(&inner);
                out.push(b'\n' as u16);
                out.extend_from_slice(&inner);
            }
            out.extend(items.join(separator.as_slice()));
            if !self.gap.is_empty() {
                out.push(b'\n' as u16);
                out.extend_from_slice(&self.indent);
            }
        }
        out.push(close as u16);
    }
}

/// `JSON.stringify(value, null, indent)`: `None` when `value` has no JSON form.
pub fn json_stringify(heap: &mut Heap, value: &JSValue, indent: &JSValue) -> JSResult<Option<JSString>> {
    let mut writer = JsonWriter::new(heap, indent);
    let serialized = writer.serialize(&PropertyKey::from(""), value.clone())?;
    Ok(serialized.map(JSString::from))
}

fn json_object_parse(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let text = call.arg_value(0).stringify(heap)?;
    json_parse(heap, &text)
}

fn json_object_stringify(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let serialized = json_stringify(heap, &call.arg_value(0), &call.arg_value(2))?;
    Ok(JSValue::from(serialized))
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut json_object = JSObject::new();
    json_object.set_hidden("parse", heap.alloc_func(json_object_parse))?;
    json_object.set_hidden("stringify", heap.alloc_func(json_object_stringify))?;
    Ok(heap.alloc(json_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn roundtrip(text: &str, indent: JSValue) -> String {
        let mut heap = Heap::new();
        let value = json_parse(&mut heap, &JSString::from(text)).unwrap();
        let result = json_stringify(&mut heap, &value, &indent).unwrap();
        result.unwrap().to_string()
    }

    fn parse_error(text: &str) -> ParseError {
        let mut heap = Heap::new();
        match json_parse(&mut heap, &JSString::from(text)) {
            Err(Exception::SyntaxError(err)) => err,
            other => panic!("{:?} must fail, got {:?}", text, other),
        }
    }

    #[test]
    fn test_parse_values() {
        let mut heap = Heap::new();
        let mut parse = |text: &str| json_parse(&mut heap, &JSString::from(text)).unwrap();
        assert_eq!(parse(" true "), JSValue::from(true));
        assert_eq!(parse("null"), JSValue::NULL);
        assert_eq!(parse("-1.5e2"), JSValue::from(-150.0));
        assert_eq!(parse("\"a\\u0062\\n\\/\""), JSValue::from("ab\n/"));
        assert_eq!(parse("\"\\ud800\""), JSValue::from(JSString::from(vec![0xD800])));

        let value = json_parse(&mut heap, &JSString::from("{\"b\":1,\"a\":[1,{}],\"b\":2}")).unwrap();
        assert_eq!(value.to_json(&heap).unwrap(), serde_json::json!({"b": 2, "a": [1, {}]}));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_error("{\"x\":1,}");
        assert_eq!(err.to_string(), "JSON: unexpected token '}' at position 7");
        assert_eq!(parse_error("[1, 2").position(), 5);
        assert!(matches!(parse_error("[1, 2"), ParseError::UnexpectedEnd { .. }));
        assert_eq!(parse_error("01").position(), 1);
        assert_eq!(parse_error("-").position(), 1);
        assert_eq!(parse_error("1.").position(), 2);
        assert_eq!(parse_error("tru").position(), 3);
        assert_eq!(parse_error("\"\n\"").position(), 1);
        assert_eq!(parse_error("\"\\x\"").position(), 2);
        assert_eq!(parse_error("{1:2}").position(), 1);
        assert_eq!(parse_error("").position(), 0);
    }

    #[test]
    fn test_max_depth() {
        let mut heap = Heap::new();
        heap.options.json_max_depth = 3;
        assert!(json_parse(&mut heap, &JSString::from("[[[1]]]")).is_ok());
        let err = json_parse(&mut heap, &JSString::from("[[[[1]]]]")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }

    #[test]
    fn test_roundtrip() {
        let text = r#"{"x":1,"y":true,"z":null,"a":[1,2,3],"s":"str"}"#;
        assert_eq!(roundtrip(text, JSValue::Undefined), text);
        assert_eq!(roundtrip(r#"{"2":1,"1":2,"b":3}"#, JSValue::Undefined), r#"{"1":2,"2":1,"b":3}"#);
        assert_eq!(roundtrip(r#"[1e21,0.1,-0]"#, JSValue::Undefined), "[1e+21,0.1,0]");
    }

    #[test]
    fn test_indent() {
        let text = r#"[[{"x":1,"y":{},"z":[]},2,3]]"#;
        let expected = "[\n [\n  {\n   \"x\": 1,\n   \"y\": {},\n   \"z\": []\n  },\n  2,\n  3\n ]\n]";
        assert_eq!(roundtrip(text, JSValue::from(1)), expected);
        assert_eq!(roundtrip("[1]", JSValue::from("\t")), "[\n\t1\n]");
        assert_eq!(roundtrip("[1]", JSValue::from(0)), "[1]");
        assert_eq!(roundtrip("[1]", JSValue::from(20)), format!("[\n{}1\n]", " ".repeat(10)));
        assert_eq!(roundtrip("{\"a\":1}", JSValue::from("abcdefghijkl")), "{\nabcdefghij\"a\": 1\n}");
    }

    #[test]
    fn test_stringify_special_values() {
        let mut heap = Heap::new();
        let func = heap.alloc_func(|_, _| Ok(JSValue::Undefined));
        let mut object = JSObject::new();
        object.set_property("u", JSValue::Undefined).unwrap();
        object.set_property("f", func).unwrap();
        object.set_property("n", f64::NAN).unwrap();
        object.set_property("s", "\u{1}\"").unwrap();
        let objref = heap.alloc(object);
        let array = heap.alloc_array(vec![JSValue::Undefined, JSValue::from(func), JSValue::from(f64::INFINITY)]);
        heap.get_mut(objref).set_property("a", array).unwrap();

        let result = json_stringify(&mut heap, &JSValue::from(objref), &JSValue::Undefined).unwrap();
        assert_eq!(result.unwrap().to_string(), r#"{"n":null,"s":"\u0001\"","a":[null,null,null]}"#);

        assert_eq!(json_stringify(&mut heap, &JSValue::Undefined, &JSValue::Undefined).unwrap(), None);
        assert_eq!(json_stringify(&mut heap, &JSValue::from(func), &JSValue::Undefined).unwrap(), None);

        let lone = JSValue::from(JSString::from(vec![0xDEAD, 0xD83D, 0xDE00]));
        let result = json_stringify(&mut heap, &lone, &JSValue::Undefined).unwrap();
        assert_eq!(result, Some(JSString::from(vec![0x22, 0x5C, 0x75, 0x64, 0x65, 0x61, 0x64, 0xD83D, 0xDE00, 0x22])));
    }

    #[test]
    fn test_stringify_cycle() {
        let mut heap = Heap::new();
        let objref = heap.alloc(JSObject::new());
        let inner = heap.alloc_array(vec![JSValue::from(objref)]);
        heap.get_mut(objref).set_property("inner", inner).unwrap();
        let err = json_stringify(&mut heap, &JSValue::from(objref), &JSValue::Undefined).unwrap_err();
        assert!(matches!(err, Exception::TypeErrorCircularJSON(r) if r == objref));

        // the same object twice is not a cycle
        let shared = heap.alloc(JSObject::new());
        let pair = heap.alloc_array(vec![JSValue::from(shared), JSValue::from(shared)]);
        let result = json_stringify(&mut heap, &JSValue::from(pair), &JSValue::Undefined).unwrap();
        assert_eq!(result.unwrap().to_string(), "[{},{}]");
    }
}
