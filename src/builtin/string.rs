use crate::prelude::*;
use crate::regexp::RegExp;
use crate::value::{
    relative_index,
    to_integer_or_infinity,
    to_uint32,
};
use crate::{
    builtin::{
        construct_into,
        regexp::regexp_of,
    },
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    PropertyKey,
};

/// Clamps a search position into `0..=len`.
fn clamp_position(pos: JSNumber, len: usize) -> usize {
    to_integer_or_infinity(pos).clamp(0.0, len as f64) as usize
}

/// `String.prototype.indexOf`: the first occurrence of `needle` at or after `from`.
pub fn index_of(haystack: &[u16], needle: &[u16], from: JSNumber) -> Option<usize> {
    let start = clamp_position(from, haystack.len());
    if needle.is_empty() {
        return Some(start);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (start..=haystack.len() - needle.len()).find(|&i| haystack[i..].starts_with(needle))
}

/// `String.prototype.lastIndexOf`: the last occurrence of `needle` starting at or before `from`.
/// `NaN` searches the whole string.
pub fn last_index_of(haystack: &[u16], needle: &[u16], from: JSNumber) -> Option<usize> {
    let from = if from.is_nan() { f64::INFINITY } else { from };
    let start = clamp_position(from, haystack.len());
    if needle.len() > haystack.len() {
        return None;
    }
    let start = usize::min(start, haystack.len() - needle.len());
    (0..=start).rev().find(|&i| haystack[i..].starts_with(needle))
}

/// `String.prototype.split` with a string separator.
/// Without a separator the whole string is the only piece.
pub fn split(s: &JSString, separator: Option<&JSString>, limit: Option<u32>) -> Vec<JSString> {
    let limit = limit.unwrap_or(u32::MAX) as usize;
    if limit == 0 {
        return vec![];
    }
    let separator = match separator {
        None => return vec![s.clone()],
        Some(separator) => separator.as_units(),
    };
    let units = s.as_units();
    if separator.is_empty() {
        return (0..units.len().min(limit)).map(|i| s.slice(i, i + 1)).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(found) = index_of(units, separator, start as f64) {
        pieces.push(s.slice(start, found));
        if pieces.len() == limit {
            return pieces;
        }
        start = found + separator.len();
    }
    pieces.push(s.slice(start, units.len()));
    pieces
}

/// `String.prototype.split` with a RegExp separator: captures are spliced
/// into the result, empty matches never split at the string edges.
fn split_by_regexp(s: &JSString, regexp: &RegExp, limit: u32) -> Vec<JSValue> {
    let limit = limit as usize;
    let mut pieces = Vec::new();
    if limit == 0 {
        return pieces;
    }
    let units = s.as_units();
    if units.is_empty() {
        if regexp.match_at(units, 0).is_none() {
            pieces.push(JSValue::from(s.clone()));
        }
        return pieces;
    }

    let mut last = 0;
    let mut pos = 0;
    while pos < units.len() {
        let found = match regexp.match_at(units, pos) {
            Some(found) if found.end() != last => found,
            _ => {
                pos += 1;
                continue;
            }
        };
        let end = usize::min(found.end(), units.len());
        pieces.push(JSValue::from(s.slice(last, pos)));
        if pieces.len() == limit {
            return pieces;
        }
        for capture in found.texts(s).into_iter().skip(1) {
            pieces.push(JSValue::from(capture));
            if pieces.len() == limit {
                return pieces;
            }
        }
        last = end;
        pos = end;
    }
    pieces.push(JSValue::from(s.slice(last, units.len())));
    pieces
}

/// GetSubstitution: expands `$$`, `$&`, `` $` ``, `$'`, `$n` and `$nn` in `template`.
fn substitute(template: &[u16], input: &JSString, texts: &[Option<JSString>], position: usize, out: &mut Vec<u16>) {
    let dollar = b'$' as u16;
    let digit = |c: Option<&u16>| c.and_then(|&c| char::from_u32(c as u32)?.to_digit(10)).map(|d| d as usize);
    let matched_len = texts.first().and_then(|m| m.as_ref()).map_or(0, |m| m.len());
    let units = input.as_units();

    let mut i = 0;
    while i < template.len() {
        let c = template[i];
        let next = template.get(i + 1).copied();
        if c != dollar || next.is_none() {
            out.push(c);
            i += 1;
            continue;
        }
        match next.and_then(|n| char::from_u32(n as u32)) {
            Some('$') => out.push(dollar),
            Some('&') => out.extend_from_slice(&units[position..position + matched_len]),
            Some('`') => out.extend_from_slice(&units[..position]),
            Some('\'') => out.extend_from_slice(&units[usize::min(position + matched_len, units.len())..]),
            Some('0'..='9') => {
                let d = digit(template.get(i + 1)).unwrap_or(0);
                let two = digit(template.get(i + 2)).map(|e| d * 10 + e);
                let (group, width) = match two {
                    Some(nn) if nn >= 1 && nn < texts.len() => (nn, 3),
                    _ if d >= 1 && d < texts.len() => (d, 2),
                    _ => {
                        out.push(dollar);
                        i += 1;
                        continue;
                    }
                };
                if let Some(text) = &texts[group] {
                    out.extend_from_slice(text.as_units());
                }
                i += width;
                continue;
            }
            _ => {
                out.push(dollar);
                i += 1;
                continue;
            }
        }
        i += 2;
    }
}

/// The replacement of one match, either from a template or from a callback.
fn replacement(replace: &JSValue, input: &JSString, texts: Vec<Option<JSString>>, position: usize, heap: &mut Heap) -> JSResult<Vec<u16>> {
    match replace.as_object() {
        Some(funcref) if heap.get(funcref).is_callable() => {
            let mut arguments: Vec<JSValue> = texts.into_iter().map(JSValue::from).collect();
            arguments.push(JSValue::from(position));
            arguments.push(JSValue::from(input.clone()));
            let call = CallContext::method(JSValue::Undefined, "replace", arguments);
            let result = heap.execute(funcref, call)?.stringify(heap)?;
            Ok(result.as_units().to_vec())
        }
        _ => {
            let template = replace.stringify(heap)?;
            let mut out = Vec::new();
            substitute(template.as_units(), input, &texts, position, &mut out);
            Ok(out)
        }
    }
}

/// The string value of `this`: primitives are converted, `null` and `undefined` rejected.
fn this_string(call: &CallContext, heap: &mut Heap) -> JSResult<JSString> {
    match &call.this {
        JSValue::String(s) => Ok(s.clone()),
        this if this.is_nullish() => Err(Exception::instance_required(this.clone(), "String")),
        JSValue::Ref(r) => match heap.get(*r).as_str() {
            Some(s) => Ok(s.clone()),
            None => call.this.stringify(heap),
        },
        this => this.stringify(heap),
    }
}

fn string_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = match call.arguments.first() {
        Some(value) => value.stringify(heap)?,
        None => JSString::default(),
    };
    if !call.new_target {
        // take the argument and produce a string from it
        return Ok(JSValue::from(s));
    }
    construct_into(&call, heap, JSObject::from_string(s))
}

#[allow(non_snake_case)]
fn string_object_fromCharCode(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let mut units = Vec::with_capacity(call.arguments.len());
    for value in call.arguments.iter() {
        units.push(to_uint32(value.numberify(heap)?) as u16);
    }
    Ok(JSValue::from(JSString::from(units)))
}

#[allow(non_snake_case)]
fn string_proto_valueOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    match &call.this {
        JSValue::String(s) => Ok(JSValue::from(s.clone())),
        JSValue::Ref(r) if heap.get(*r).as_str().is_some() => {
            let s = heap.get(*r).as_str().cloned().unwrap_or_default();
            Ok(JSValue::from(s))
        }
        _ => Err(Exception::instance_required(call.this.clone(), "String")),
    }
}

#[allow(non_snake_case)]
fn string_proto_charAt(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let index = to_integer_or_infinity(call.arg_as_number(0, heap)?.unwrap_or(0.0));
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JSValue::from(""));
    }
    let index = index as usize;
    Ok(JSValue::from(s.slice(index, index + 1)))
}

#[allow(non_snake_case)]
fn string_proto_charCodeAt(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let index = to_integer_or_infinity(call.arg_as_number(0, heap)?.unwrap_or(0.0));
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JSValue::from(f64::NAN));
    }
    Ok(JSValue::from(s.as_units()[index as usize] as u32))
}

fn string_proto_concat(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let mut result = this_string(&call, heap)?;
    for value in call.arguments.iter() {
        result = result.concat(&value.stringify(heap)?);
    }
    Ok(JSValue::from(result))
}

#[allow(non_snake_case)]
fn string_proto_indexOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let haystack = this_string(&call, heap)?;
    let needle = call.arg_value(0).stringify(heap)?;
    let from = call.arg_value(1).numberify(heap)?;
    let found = index_of(haystack.as_units(), needle.as_units(), from);
    Ok(JSValue::from(found.map_or(-1.0, |i| i as f64)))
}

#[allow(non_snake_case)]
fn string_proto_lastIndexOf(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let haystack = this_string(&call, heap)?;
    let needle = call.arg_value(0).stringify(heap)?;
    let from = call.arg_value(1).numberify(heap)?;
    let found = last_index_of(haystack.as_units(), needle.as_units(), from);
    Ok(JSValue::from(found.map_or(-1.0, |i| i as f64)))
}

fn string_proto_slice(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let begin = relative_index(call.arg_as_number(0, heap)?.unwrap_or(0.0), s.len());
    let end = match call.arg_as_number(1, heap)? {
        Some(end) => relative_index(end, s.len()),
        None => s.len(),
    };
    Ok(JSValue::from(s.slice(begin, end)))
}

fn string_proto_substring(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let start = clamp_position(call.arg_as_number(0, heap)?.unwrap_or(0.0), s.len());
    let end = match call.arg_as_number(1, heap)? {
        Some(end) => clamp_position(end, s.len()),
        None => s.len(),
    };
    Ok(JSValue::from(s.slice(usize::min(start, end), usize::max(start, end))))
}

fn string_proto_substr(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let begin = relative_index(call.arg_as_number(0, heap)?.unwrap_or(0.0), s.len());
    let available = (s.len() - begin) as f64;
    let count = match call.arg_as_number(1, heap)? {
        Some(count) => to_integer_or_infinity(count).clamp(0.0, available),
        None => available,
    };
    Ok(JSValue::from(s.slice(begin, begin + count as usize)))
}

fn change_case(s: &JSString, convert: fn(char) -> String) -> JSString {
    let mut units = Vec::with_capacity(s.len());
    for decoded in char::decode_utf16(s.as_units().iter().copied()) {
        match decoded {
            Ok(c) => units.extend(convert(c).encode_utf16()),
            Err(lone) => units.push(lone.unpaired_surrogate()),
        }
    }
    JSString::from(units)
}

#[allow(non_snake_case)]
fn string_proto_toLowerCase(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    Ok(JSValue::from(change_case(&s, |c| c.to_lowercase().collect())))
}

#[allow(non_snake_case)]
fn string_proto_toUpperCase(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    Ok(JSValue::from(change_case(&s, |c| c.to_uppercase().collect())))
}

fn string_proto_split(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let s = this_string(&call, heap)?;
    let limit = match call.arg_as_number(1, heap)? {
        Some(limit) => Some(to_uint32(limit)),
        None => None,
    };

    let separator = call.arg_value(0);
    let pieces = if let Some(regexp) = regexp_of(&separator, heap) {
        split_by_regexp(&s, &regexp, limit.unwrap_or(u32::MAX))
    } else {
        let separator = call.arg_as_string(0, heap)?;
        (split(&s, separator.as_ref(), limit).into_iter())
            .map(JSValue::from)
            .collect()
    };
    Ok(JSValue::from(heap.alloc_array(pieces)))
}

fn string_proto_replace(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let input = this_string(&call, heap)?;
    let search = call.arg_value(0);
    let replace = call.arg_value(1);
    let units = input.as_units();

    let mut result: Vec<u16> = Vec::with_capacity(units.len());
    let mut last = 0;
    if let Some(regexp) = regexp_of(&search, heap) {
        let mut pos = 0;
        while let Some(found) = regexp.find_from(units, pos) {
            result.extend_from_slice(&units[last..found.start()]);
            let start = found.start();
            let end = found.end();
            result.extend(replacement(&replace, &input, found.texts(&input), start, heap)?);
            last = end;
            if !regexp.flags.global() {
                break;
            }
            pos = if end == start { end + 1 } else { end };
            if pos > units.len() {
                break;
            }
        }
        if regexp.flags.global() {
            if let Some(objref) = search.as_object() {
                heap.put(objref, PropertyKey::from("lastIndex"), JSValue::from(0))?;
            }
        }
    } else {
        let needle = search.stringify(heap)?;
        if let Some(found) = index_of(units, needle.as_units(), 0.0) {
            result.extend_from_slice(&units[..found]);
            let texts = vec![Some(needle.clone())];
            result.extend(replacement(&replace, &input, texts, found, heap)?);
            last = found + needle.len();
        }
    }
    result.extend_from_slice(&units[last..]);
    Ok(JSValue::from(JSString::from(result)))
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut string_proto = JSObject::from_string(JSString::default());
    string_proto.proto = Heap::OBJECT_PROTO;

    string_proto.set_hidden("charAt", heap.alloc_func(string_proto_charAt))?;
    string_proto.set_hidden("charCodeAt", heap.alloc_func(string_proto_charCodeAt))?;
    string_proto.set_hidden("concat", heap.alloc_func(string_proto_concat))?;
    string_proto.set_hidden("indexOf", heap.alloc_func(string_proto_indexOf))?;
    string_proto.set_hidden("lastIndexOf", heap.alloc_func(string_proto_lastIndexOf))?;
    string_proto.set_hidden("replace", heap.alloc_func(string_proto_replace))?;
    string_proto.set_hidden("slice", heap.alloc_func(string_proto_slice))?;
    string_proto.set_hidden("split", heap.alloc_func(string_proto_split))?;
    string_proto.set_hidden("substr", heap.alloc_func(string_proto_substr))?;
    string_proto.set_hidden("substring", heap.alloc_func(string_proto_substring))?;
    string_proto.set_hidden("toLowerCase", heap.alloc_func(string_proto_toLowerCase))?;
    string_proto.set_hidden("toUpperCase", heap.alloc_func(string_proto_toUpperCase))?;
    string_proto.set_hidden("toString", heap.alloc_func(string_proto_valueOf))?;
    string_proto.set_hidden("valueOf", heap.alloc_func(string_proto_valueOf))?;

    *heap.get_mut(Heap::STRING_PROTO) = string_proto;

    let mut the_string = JSObject::from_func(string_constructor);
    the_string.set_system("prototype", Heap::STRING_PROTO)?;
    the_string.set_hidden("fromCharCode", heap.alloc_func(string_object_fromCharCode))?;

    let the_string_ref = heap.alloc(the_string);
    heap.get_mut(Heap::STRING_PROTO)
        .set_hidden("constructor", the_string_ref)?;

    Ok(the_string_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn pieces(s: &str, separator: Option<&str>, limit: Option<u32>) -> Vec<String> {
        let separator = separator.map(JSString::from);
        (split(&JSString::from(s), separator.as_ref(), limit).into_iter())
            .map(|piece| piece.to_string())
            .collect()
    }

    #[test]
    fn test_index_of() {
        let aaa = units("aaa");
        let a = units("a");
        let cases = [
            (f64::NAN, Some(0)),
            (f64::NEG_INFINITY, Some(0)),
            (-1.0, Some(0)),
            (-0.0, Some(0)),
            (1.0, Some(1)),
            (2.0, Some(2)),
            (3.0, None),
            (4.0, None),
            (f64::INFINITY, None),
        ];
        for (from, expected) in cases {
            assert_eq!(index_of(&aaa, &a, from), expected, "indexOf('a', {})", from);
        }
        assert_eq!(index_of(&units("abcabc"), &units("cab"), 0.0), Some(2));
        assert_eq!(index_of(&units("abcabc"), &units("cab2"), 0.0), None);

        assert_eq!(index_of(&aaa, &[], 3.0), Some(3));
        assert_eq!(index_of(&aaa, &[], 4.0), Some(3));
        assert_eq!(index_of(&aaa, &[], f64::INFINITY), Some(3));
        assert_eq!(index_of(&aaa, &[], -1.0), Some(0));
    }

    #[test]
    fn test_last_index_of() {
        let aaa = units("aaa");
        let a = units("a");
        let cases = [
            (f64::NAN, Some(2)),
            (f64::NEG_INFINITY, Some(0)),
            (-1.0, Some(0)),
            (-0.0, Some(0)),
            (1.0, Some(1)),
            (3.0, Some(2)),
            (f64::INFINITY, Some(2)),
        ];
        for (from, expected) in cases {
            assert_eq!(last_index_of(&aaa, &a, from), expected, "lastIndexOf('a', {})", from);
        }
        assert_eq!(last_index_of(&aaa, &[], f64::NAN), Some(3));
        assert_eq!(last_index_of(&aaa, &[], 2.0), Some(2));
        assert_eq!(last_index_of(&aaa, &[], 4.0), Some(3));
        assert_eq!(last_index_of(&aaa, &[], f64::NEG_INFINITY), Some(0));
        assert_eq!(last_index_of(&a, &aaa, f64::NAN), None);
    }

    #[test]
    fn test_split() {
        assert_eq!(pieces("a,b,c", Some(","), None), ["a", "b", "c"]);
        assert_eq!(pieces(",b,c", Some(","), None), ["", "b", "c"]);
        assert_eq!(pieces("a,b,", Some(","), None), ["a", "b", ""]);
        assert_eq!(pieces("aaaa", None, None), ["aaaa"]);
        assert_eq!(pieces("aaaa", None, Some(0)), Vec::<String>::new());
        assert_eq!(pieces("aaaa", Some(""), None), ["a", "a", "a", "a"]);
        assert_eq!(pieces("aaaa", Some(""), Some(2)), ["a", "a"]);
        assert_eq!(pieces("aaaa", Some("a"), None), ["", "", "", "", ""]);
        assert_eq!(pieces("aaaa", Some("a"), Some(2)), ["", ""]);
        assert_eq!(pieces("aaaa", Some("aa"), None), ["", "", ""]);
        assert_eq!(pieces("aaaa", Some("aa"), Some(0)), Vec::<String>::new());
        assert_eq!(pieces("aaaa", Some("aaa"), None), ["", "a"]);
        assert_eq!(pieces("aaaa", Some("aaaa"), None), ["", ""]);
        assert_eq!(pieces("aaaa", Some("aaaaa"), None), ["aaaa"]);
        assert_eq!(pieces("aaaa", Some("aaaaa"), Some(1)), ["aaaa"]);
    }

    #[test]
    fn test_split_by_regexp() {
        let split_re = |s: &str, source: &str| -> Vec<JSValue> {
            let regexp = RegExp::new(JSString::from(source), &JSString::default()).unwrap();
            split_by_regexp(&JSString::from(s), &regexp, u32::MAX)
        };
        let strs = |items: &[&str]| -> Vec<JSValue> { items.iter().map(|&s| JSValue::from(s)).collect() };

        assert_eq!(split_re("a1b22c", "\\d+"), strs(&["a", "b", "c"]));
        assert_eq!(split_re("abc", ""), strs(&["a", "b", "c"]));
        assert_eq!(split_re("a-b", "(-)"), strs(&["a", "-", "b"]));
        assert_eq!(split_re("", "x"), strs(&[""]));
        assert_eq!(split_re("", ""), strs(&[]));
        assert_eq!(
            split_re("ab", "(x)?b"),
            vec![JSValue::from("a"), JSValue::Undefined, JSValue::from("")]
        );
    }

    #[test]
    fn test_substitute() {
        let input = JSString::from("abcdef");
        let texts = vec![Some(JSString::from("cd")), Some(JSString::from("c")), None];
        let expand = |template: &str| {
            let mut out = Vec::new();
            substitute(&units(template), &input, &texts, 2, &mut out);
            String::from_utf16_lossy(&out)
        };
        assert_eq!(expand("[$&]"), "[cd]");
        assert_eq!(expand("$`|$'"), "ab|ef");
        assert_eq!(expand("$$1"), "$1");
        assert_eq!(expand("$1$2$3"), "c$3");
        assert_eq!(expand("$01"), "c");
        assert_eq!(expand("$10"), "c0");
        assert_eq!(expand("$"), "$");
        assert_eq!(expand("$x"), "$x");
    }

    #[test]
    fn test_change_case() {
        let lone = JSString::from(vec![0x41, 0xD800, 0x62]);
        assert_eq!(change_case(&lone, |c| c.to_lowercase().collect()), JSString::from(vec![0x61, 0xD800, 0x62]));
        assert_eq!(change_case(&JSString::from("Abc123!"), |c| c.to_uppercase().collect()), "ABC123!");
    }
}
