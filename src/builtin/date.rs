//! `Date`: time values are milliseconds since the Unix epoch as `f64`,
//! `NaN` is an invalid date. There is no time zone database, so local time is UTC.

use std::time::{
    SystemTime,
    UNIX_EPOCH,
};

use crate::object::ObjectValue;
use crate::prelude::*;
use crate::value::{
    to_integer_or_infinity,
    Hint,
};
use crate::{
    builtin::construct_into,
    CallContext,
    Exception,
    Heap,
    JSObject,
    JSRef,
    JSResult,
    NativeFunction,
};

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = 60000.0;
const MS_PER_HOUR: f64 = 3600000.0;
const MS_PER_DAY: f64 = 86400000.0;
const MAX_TIME: f64 = 8.64e15;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Days since 1970-01-01 of a proleptic Gregorian date (`month` is 1-based).
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let month = month as i64;
    let doy = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// The inverse of [`days_from_civil`].
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// MakeDay: `month` is 0-based and may overflow into years.
fn make_day(year: JSNumber, month: JSNumber, date: JSNumber) -> JSNumber {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return f64::NAN;
    }
    let (year, month, date) = (year.trunc(), month.trunc(), date.trunc());
    let year = year + (month / 12.0).floor();
    if year.abs() > 400000.0 {
        return f64::NAN;
    }
    let month = month.rem_euclid(12.0) as u32 + 1;
    days_from_civil(year as i64, month, 1) as f64 + date - 1.0
}

/// MakeTime
fn make_time(hour: JSNumber, min: JSNumber, sec: JSNumber, ms: JSNumber) -> JSNumber {
    if !(hour.is_finite() && min.is_finite() && sec.is_finite() && ms.is_finite()) {
        return f64::NAN;
    }
    hour.trunc() * MS_PER_HOUR + min.trunc() * MS_PER_MINUTE + sec.trunc() * MS_PER_SECOND + ms.trunc()
}

fn make_date(day: JSNumber, time: JSNumber) -> JSNumber {
    if !(day.is_finite() && time.is_finite()) {
        return f64::NAN;
    }
    day * MS_PER_DAY + time
}

/// TimeClip: `NaN` outside of ±8.64e15 ms.
pub fn time_clip(time: JSNumber) -> JSNumber {
    if !time.is_finite() || time.abs() > MAX_TIME {
        return f64::NAN;
    }
    to_integer_or_infinity(time)
}

/// The broken-down UTC fields of a valid time value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DateParts {
    year: i64,
    /// 0-based
    month: u32,
    day: u32,
    weekday: u32,
    /// `[hours, minutes, seconds, milliseconds]`
    time: [u32; 4],
}

impl DateParts {
    fn from_time(t: JSNumber) -> Option<DateParts> {
        if t.is_nan() {
            return None;
        }
        let t = t as i64;
        let days = t.div_euclid(MS_PER_DAY as i64);
        let ms = t.rem_euclid(MS_PER_DAY as i64);
        let (year, month, day) = civil_from_days(days);
        let time = [
            (ms / 3600000) as u32,
            (ms / 60000 % 60) as u32,
            (ms / 1000 % 60) as u32,
            (ms % 1000) as u32,
        ];
        let weekday = (days + 4).rem_euclid(7) as u32;
        Some(DateParts { year, month: month - 1, day, weekday, time })
    }

    fn year_string(&self) -> String {
        match self.year {
            0..=9999 => format!("{:04}", self.year),
            year if year < 0 => format!("-{:06}", -year),
            year => format!("+{:06}", year),
        }
    }
}

/// Date Time String Format: `YYYY[-MM[-DD]][THH:mm[:ss[.s+]][Z|±HH:mm]]`
/// with `±YYYYYY` extended years. Returns `NaN` for anything else.
pub fn parse_iso(text: &[u16]) -> JSNumber {
    IsoParser { text, pos: 0 }.parse().map_or(f64::NAN, time_clip)
}

struct IsoParser<'a> {
    text: &'a [u16],
    pos: usize,
}

impl<'a> IsoParser<'a> {
    fn eat(&mut self, c: u8) -> bool {
        if self.text.get(self.pos) == Some(&(c as u16)) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn digits(&mut self, count: usize) -> Option<i64> {
        let digits = self.text.get(self.pos..self.pos + count)?;
        let mut value = 0;
        for &c in digits {
            let digit = char::from_u32(c as u32)?.to_digit(10)?;
            value = value * 10 + digit as i64;
        }
        self.pos += count;
        Some(value)
    }

    /// The first four fractional digits rounded to a millisecond.
    fn fraction(&mut self) -> Option<i64> {
        let start = self.pos;
        let mut scaled = 0;
        while let Some(digit) = (self.text.get(self.pos)).and_then(|&c| char::from_u32(c as u32)?.to_digit(10)) {
            if self.pos - start < 4 {
                scaled = scaled * 10 + digit as i64;
            }
            self.pos += 1;
        }
        let count = self.pos - start;
        if count == 0 {
            return None;
        }
        for _ in count..4 {
            scaled *= 10;
        }
        Some((scaled + 5) / 10)
    }

    fn year(&mut self) -> Option<i64> {
        let sign = match self.text.first().copied() {
            Some(c) if c == b'+' as u16 => 1,
            Some(c) if c == b'-' as u16 => -1,
            _ => return self.digits(4),
        };
        self.pos += 1;
        let year = self.digits(6)?;
        if sign < 0 && year == 0 {
            return None;
        }
        Some(sign * year)
    }

    fn parse(&mut self) -> Option<JSNumber> {
        let year = self.year()?;
        let mut month = 1;
        let mut day = 1;
        if self.eat(b'-') {
            month = self.digits(2)?;
            if self.eat(b'-') {
                day = self.digits(2)?;
            }
        }
        if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month as u32) as i64 {
            return None;
        }

        let mut time = [0i64; 4];
        let mut offset = 0;
        if self.eat(b'T') {
            time[0] = self.digits(2)?;
            if !self.eat(b':') {
                return None;
            }
            time[1] = self.digits(2)?;
            if self.eat(b':') {
                time[2] = self.digits(2)?;
                if self.eat(b'.') {
                    time[3] = self.fraction()?;
                }
            }
            if self.eat(b'Z') {
                offset = 0;
            } else if let Some(sign) = self.offset_sign() {
                let hours = self.digits(2)?;
                if !self.eat(b':') {
                    return None;
                }
                let minutes = self.digits(2)?;
                if hours > 23 || minutes > 59 {
                    return None;
                }
                offset = sign * (hours * 60 + minutes);
            }
            let midnight = time[0] == 24 && time[1..].iter().all(|&f| f == 0);
            if (time[0] > 23 && !midnight) || time[1] > 59 || time[2] > 59 {
                return None;
            }
        }
        if self.pos != self.text.len() {
            return None;
        }

        let day = make_day(year as f64, (month - 1) as f64, day as f64);
        let time = make_time(time[0] as f64, time[1] as f64, time[2] as f64, time[3] as f64);
        Some(make_date(day, time) - offset as f64 * MS_PER_MINUTE)
    }

    fn offset_sign(&mut self) -> Option<i64> {
        if self.eat(b'+') {
            Some(1)
        } else if self.eat(b'-') {
            Some(-1)
        } else {
            None
        }
    }
}

/// `Date.prototype.toISOString`: `None` for invalid dates.
pub fn format_iso(t: JSNumber) -> Option<String> {
    let parts = DateParts::from_time(t)?;
    let [hours, minutes, seconds, ms] = parts.time;
    Some(format!(
        "{}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        parts.year_string(),
        parts.month + 1,
        parts.day,
        hours,
        minutes,
        seconds,
        ms
    ))
}

/// `Date.prototype.toString`
fn format_display(t: JSNumber) -> String {
    let parts = match DateParts::from_time(t) {
        Some(parts) => parts,
        None => return "Invalid Date".to_string(),
    };
    let [hours, minutes, seconds, _] = parts.time;
    format!(
        "{} {} {:02} {} {:02}:{:02}:{:02} GMT+0000 (Coordinated Universal Time)",
        WEEKDAYS[parts.weekday as usize],
        MONTHS[parts.month as usize],
        parts.day,
        parts.year_string(),
        hours,
        minutes,
        seconds
    )
}

fn now() -> JSNumber {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as f64,
        Err(_) => 0.0,
    }
}

/// The time value from `year, month[, day, hours, minutes, seconds, ms]` arguments.
fn time_from_fields(call: &CallContext, heap: &mut Heap) -> JSResult<JSNumber> {
    let mut fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (i, field) in fields.iter_mut().enumerate() {
        if let Some(value) = call.arg_as_number(i, heap)? {
            *field = value;
        }
    }
    let [year, month, day, hours, minutes, seconds, ms] = fields;
    let year = match to_integer_or_infinity(year) {
        y if !year.is_nan() && (0.0..=99.0).contains(&y) => 1900.0 + y,
        _ => year,
    };
    let day = make_day(year, month, day);
    Ok(make_date(day, make_time(hours, minutes, seconds, ms)))
}

fn date_constructor(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    if !call.new_target {
        return Ok(JSValue::from(format_display(now())));
    }
    let time = match call.arguments.len() {
        0 => now(),
        1 => {
            let value = call.arg_value(0);
            let date = match value.as_object().map(|r| &heap.get(r).value) {
                Some(ObjectValue::Date(t)) => Some(*t),
                _ => None,
            };
            let value = match date {
                Some(t) => JSValue::from(t),
                None => value.to_primitive(Hint::Number, heap)?,
            };
            match value {
                JSValue::String(s) => parse_iso(s.as_units()),
                value => time_clip(value.numberify(heap)?),
            }
        }
        _ => time_clip(time_from_fields(&call, heap)?),
    };

    let mut object = JSObject::with_proto(Heap::DATE_PROTO);
    object.value = ObjectValue::Date(time);
    construct_into(&call, heap, object)
}

fn date_object_now(_call: CallContext, _heap: &mut Heap) -> JSResult<JSValue> {
    Ok(JSValue::from(now()))
}

fn date_object_parse(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let text = call.arg_value(0).stringify(heap)?;
    Ok(JSValue::from(parse_iso(text.as_units())))
}

#[allow(non_snake_case)]
fn date_object_UTC(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    Ok(JSValue::from(time_clip(time_from_fields(&call, heap)?)))
}

fn this_time(call: &CallContext, heap: &Heap) -> JSResult<JSNumber> {
    if let Some(objref) = call.this.as_object() {
        if let ObjectValue::Date(t) = heap.get(objref).value {
            return Ok(t);
        }
    }
    Err(Exception::instance_required(call.this.clone(), "Date"))
}

fn set_this_time(call: &CallContext, heap: &mut Heap, time: JSNumber) -> JSResult<JSValue> {
    let objref = call.this_ref()?;
    let time = time_clip(time);
    heap.get_mut(objref).value = ObjectValue::Date(time);
    Ok(JSValue::from(time))
}

#[allow(non_snake_case)]
fn date_proto_getTime(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    Ok(JSValue::from(this_time(&call, heap)?))
}

#[allow(non_snake_case)]
fn date_proto_toISOString(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let time = this_time(&call, heap)?;
    let iso = format_iso(time).ok_or(Exception::RangeErrorInvalidDate)?;
    Ok(JSValue::from(iso))
}

#[allow(non_snake_case)]
fn date_proto_toString(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    Ok(JSValue::from(format_display(this_time(&call, heap)?)))
}

#[allow(non_snake_case)]
fn date_proto_toJSON(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    let time = call.this.to_primitive(Hint::Number, heap)?;
    if let JSValue::Number(n) = time {
        if !n.is_finite() {
            return Ok(JSValue::NULL);
        }
    }
    heap.execute_method(call.this, "toISOString", vec![])
}

/// Getters of UTC fields: `NaN` for invalid dates.
fn get_field(call: &CallContext, heap: &Heap, field: fn(&DateParts) -> i64) -> JSResult<JSValue> {
    let time = this_time(call, heap)?;
    let value = DateParts::from_time(time).map_or(f64::NAN, |parts| field(&parts) as f64);
    Ok(JSValue::from(value))
}

#[allow(non_snake_case)]
fn date_proto_getUTCFullYear(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.year)
}

#[allow(non_snake_case)]
fn date_proto_getUTCMonth(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.month as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCDate(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.day as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCDay(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.weekday as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCHours(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.time[0] as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCMinutes(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.time[1] as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCSeconds(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.time[2] as i64)
}

#[allow(non_snake_case)]
fn date_proto_getUTCMilliseconds(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    get_field(&call, heap, |parts| parts.time[3] as i64)
}

#[allow(non_snake_case)]
fn date_proto_setTime(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    this_time(&call, heap)?;
    let time = call.arg_value(0).numberify(heap)?;
    set_this_time(&call, heap, time)
}

/// Replaces the time-of-day fields from `first` on (0 is hours, 3 is milliseconds)
/// with the arguments, keeping the date and the fields not given.
fn set_time_fields(call: &CallContext, heap: &mut Heap, first: usize) -> JSResult<JSValue> {
    let time = this_time(call, heap)?;

    let mut args = Vec::new();
    for i in 0..(4 - first) {
        match call.arguments.get(i) {
            Some(value) => args.push(value.numberify(heap)?),
            None if i == 0 => args.push(f64::NAN),
            None => break,
        }
    }
    if time.is_nan() {
        return Ok(JSValue::from(f64::NAN));
    }

    let day = (time / MS_PER_DAY).floor();
    let within_day = time.rem_euclid(MS_PER_DAY);
    let mut fields = [
        (within_day / MS_PER_HOUR).floor(),
        (within_day / MS_PER_MINUTE).floor() % 60.0,
        (within_day / MS_PER_SECOND).floor() % 60.0,
        within_day % MS_PER_SECOND,
    ];
    fields[first..first + args.len()].copy_from_slice(&args);

    let [hours, minutes, seconds, ms] = fields;
    set_this_time(call, heap, make_date(day, make_time(hours, minutes, seconds, ms)))
}

#[allow(non_snake_case)]
fn date_proto_setUTCHours(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    set_time_fields(&call, heap, 0)
}

#[allow(non_snake_case)]
fn date_proto_setUTCMinutes(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    set_time_fields(&call, heap, 1)
}

#[allow(non_snake_case)]
fn date_proto_setUTCSeconds(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    set_time_fields(&call, heap, 2)
}

#[allow(non_snake_case)]
fn date_proto_setUTCMilliseconds(call: CallContext, heap: &mut Heap) -> JSResult<JSValue> {
    set_time_fields(&call, heap, 3)
}

pub fn init(heap: &mut Heap) -> JSResult<JSRef> {
    let mut date_proto = JSObject::new();

    let methods: [(&str, NativeFunction); 18] = [
        ("getTime", date_proto_getTime),
        ("getUTCDate", date_proto_getUTCDate),
        ("getUTCDay", date_proto_getUTCDay),
        ("getUTCFullYear", date_proto_getUTCFullYear),
        ("getUTCHours", date_proto_getUTCHours),
        ("getUTCMilliseconds", date_proto_getUTCMilliseconds),
        ("getUTCMinutes", date_proto_getUTCMinutes),
        ("getUTCMonth", date_proto_getUTCMonth),
        ("getUTCSeconds", date_proto_getUTCSeconds),
        ("setTime", date_proto_setTime),
        ("setUTCHours", date_proto_setUTCHours),
        ("setUTCMilliseconds", date_proto_setUTCMilliseconds),
        ("setUTCMinutes", date_proto_setUTCMinutes),
        ("setUTCSeconds", date_proto_setUTCSeconds),
        ("toISOString", date_proto_toISOString),
        ("toJSON", date_proto_toJSON),
        ("toString", date_proto_toString),
        ("valueOf", date_proto_getTime),
    ];
    for (name, func) in methods {
        date_proto.set_hidden(name, heap.alloc_func(func))?;
    }

    *heap.get_mut(Heap::DATE_PROTO) = date_proto;

    let mut the_date = JSObject::from_func(date_constructor);
    the_date.set_system("prototype", Heap::DATE_PROTO)?;
    the_date.set_hidden("now", heap.alloc_func(date_object_now))?;
    the_date.set_hidden("parse", heap.alloc_func(date_object_parse))?;
    the_date.set_hidden("UTC", heap.alloc_func(date_object_UTC))?;

    let the_date_ref = heap.alloc(the_date);
    heap.get_mut(Heap::DATE_PROTO)
        .set_hidden("constructor", the_date_ref)?;

    Ok(the_date_ref)
}
