use crate::prelude::*;
use crate::value::{
    decimal_prefix_len,
    is_whitespace,
    to_int32,
};
use crate::{
    CallContext,
    Heap,
    JSObject,
    JSResult,
};

fn skip_whitespace(units: &[u16]) -> &[u16] {
    let start = units.iter().position(|&c| !is_whitespace(c)).unwrap_or(units.len());
    &units[start..]
}

fn split_sign(units: &[u16]) -> (JSNumber, &[u16]) {
    match units.first() {
        Some(&c) if c == b'-' as u16 => (-1.0, &units[1..]),
        Some(&c) if c == b'+' as u16 => (1.0, &units[1..]),
        _ => (1.0, units),
    }
}

/// `parseInt(string, radix)`
pub fn parse_int(s: &[u16], radix: i32) -> JSNumber {
    let (sign, mut digits) = split_sign(skip_whitespace(s));

    let mut radix = radix as u32;
    let mut strip_prefix = true;
    if radix != 0 {
        if !(2..=36).contains(&radix) {
            return f64::NAN;
        }
        strip_prefix = radix == 16;
    } else {
        radix = 10;
    }
    if strip_prefix && digits.len() >= 2 && digits[0] == b'0' as u16 && (digits[1] | 0x20) == b'x' as u16 {
        digits = &digits[2..];
        radix = 16;
    }

    let valid = (digits.iter())
        .map_while(|&c| char::from_u32(c as u32).and_then(|c| c.to_digit(radix)))
        .collect::<Vec<u32>>();
    if valid.is_empty() {
        return f64::NAN;
    }
    let magnitude = valid.iter().fold(0.0, |acc, &d| acc * radix as f64 + d as f64);
    sign * magnitude
}

/// `parseFloat(string)`
pub fn parse_float(s: &[u16]) -> JSNumber {
    let (sign, rest) = split_sign(skip_whitespace(s));
    if rest.starts_with(JSString::from("Infinity").as_units()) {
        return sign * f64::INFINITY;
    }
    let ascii: Vec<u8> = (rest.iter())
        .take_while(|&&c| c < 0x80)
        .map(|&c| c as u8)
        .collect();
    let len = decimal_prefix_len(&ascii);
    if len == 0 {
        return f64::NAN;
    }
    let text = String::from_utf8_lossy(&ascii[..len]);
    match f64::from_str(&text) {
        Ok(n) => sign * n,
        Err(_) => f64::NAN,
    }
}

#[allow(non_snake_case)]
fn global_parseInt(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = call.arg_value(0).stringify(heap)?;
    let radix = call.arg_value(1).numberify(heap)?;
    Ok(JSValue::from(parse_int(s.as_units(), to_int32(radix))))
}

#[allow(non_snake_case)]
fn global_parseFloat(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = call.arg_value(0).stringify(heap)?;
    Ok(JSValue::from(parse_float(s.as_units())))
}

#[allow(non_snake_case)]
fn global_isNaN(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let n = call.arg_value(0).numberify(heap)?;
    Ok(JSValue::from(n.is_nan()))
}

pub fn init(heap: &mut Heap) -> JSResult<()> {
    let mut global = JSObject::new();

    global.set_system("NaN", f64::NAN)?;
    global.set_system("Infinity", f64::INFINITY)?;
    global.set_system("undefined", JSValue::Undefined)?;

    global.set_hidden("globalThis", Heap::GLOBAL)?;

    global.set_hidden("parseInt", heap.alloc_func(global_parseInt))?;
    global.set_hidden("parseFloat", heap.alloc_func(global_parseFloat))?;
    global.set_hidden("isNaN", heap.alloc_func(global_isNaN))?;

    *heap.get_mut(Heap::GLOBAL) = global;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(s: &str) -> JSNumber {
        parse_int(JSString::from(s).as_units(), 0)
    }

    fn float(s: &str) -> JSNumber {
        parse_float(JSString::from(s).as_units())
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(int("123"), 123.0);
        assert_eq!(int("  123r"), 123.0);
        assert_eq!(int("0x123"), 291.0);
        assert_eq!(int("0o123"), 0.0);
        assert_eq!(int("-0X1f"), -31.0);
        assert!(int("r123").is_nan());
        assert!(int("").is_nan());
        assert_eq!(parse_int(JSString::from("ff").as_units(), 16), 255.0);
        assert_eq!(parse_int(JSString::from("0x10").as_units(), 10), 0.0);
        assert!(parse_int(JSString::from("1").as_units(), 37).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(float("Infinity"), f64::INFINITY);
        assert_eq!(float("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(float("123.2"), 123.2);
        assert_eq!(float("123.2e3"), 123200.0);
        assert_eq!(float("  .5px"), 0.5);
        assert_eq!(float("1e"), 1.0);
        assert_eq!(float("0x1234"), 0.0);
        assert!(float("e5").is_nan());
        assert!(float("").is_nan());
    }
}
