//! A backtracking matcher for JavaScript regular expressions over UTF-16
//! code units, with lookahead, lookbehind, backreferences and the legacy
//! (web-compatible) escape and brace rules.

mod matcher;
mod parse;

use bitflags::bitflags;

use crate::error::Exception;
use crate::prelude::*;
use crate::JSResult;

use self::matcher::{
    Matcher,
    Program,
};

pub use self::matcher::Captures;
pub use self::parse::Node;

bitflags! {
    pub struct Flags: u8 {
        const GLOBAL = 0b000001;
        const IGNORE_CASE = 0b000010;
        const MULTILINE = 0b000100;
        const DOT_ALL = 0b001000;
        const UNICODE = 0b010000;
        const STICKY = 0b100000;
    }
}

/// Flag letters in the order of `RegExp.prototype.flags`.
const FLAG_LETTERS: [(char, Flags); 6] = [
    ('g', Flags::GLOBAL),
    ('i', Flags::IGNORE_CASE),
    ('m', Flags::MULTILINE),
    ('s', Flags::DOT_ALL),
    ('u', Flags::UNICODE),
    ('y', Flags::STICKY),
];

impl Flags {
    pub fn parse(flags: &JSString) -> JSResult<Flags> {
        let mut result = Flags::empty();
        for &c in flags.as_units() {
            let flag = (FLAG_LETTERS.iter())
                .find(|(letter, _)| *letter as u16 == c)
                .map(|(_, flag)| *flag);
            match flag {
                Some(flag) if !result.contains(flag) => result.insert(flag),
                _ => return Err(Exception::SyntaxErrorInvalidFlags(flags.clone())),
            }
        }
        Ok(result)
    }

    pub fn global(&self) -> bool {
        self.contains(Flags::GLOBAL)
    }

    pub fn sticky(&self) -> bool {
        self.contains(Flags::STICKY)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, _) in FLAG_LETTERS.iter().filter(|(_, flag)| self.contains(*flag)) {
            f.write_char(*letter)?;
        }
        Ok(())
    }
}

/// A successful match: `captures[0]` is the whole match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub captures: Captures,
}

impl Match {
    pub fn start(&self) -> usize {
        self.captures[0].map_or(0, |(start, _)| start)
    }

    pub fn end(&self) -> usize {
        self.captures[0].map_or(0, |(_, end)| end)
    }

    /// The text of every capture, `None` for groups that did not participate.
    pub fn texts(&self, input: &JSString) -> Vec<Option<JSString>> {
        (self.captures.iter())
            .map(|span| span.map(|(start, end)| input.slice(start, end)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RegExp {
    source: JSString,
    pub flags: Flags,
    program: Program,
    group_count: usize,
}

impl RegExp {
    pub fn new(source: JSString, flags: &JSString) -> JSResult<RegExp> {
        let flags = Flags::parse(flags)?;
        let pattern = parse::parse(source.as_units())?;
        log::trace!("compiled /{}/{} with {} groups", source, flags, pattern.group_count);
        Ok(RegExp {
            source,
            flags,
            program: Program::compile(&pattern.node),
            group_count: pattern.group_count,
        })
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// The pattern text as it would appear in a literal:
    /// unescaped `/` and line terminators are escaped, `(?:)` stands for an empty pattern.
    pub fn source(&self) -> JSString {
        let units = self.source.as_units();
        if units.is_empty() {
            return JSString::from("(?:)");
        }
        let mut escaped = Vec::with_capacity(units.len());
        let mut in_class = false;
        let mut i = 0;
        while i < units.len() {
            let c = units[i];
            match c {
                0x5C => {
                    escaped.push(c);
                    if let Some(&next) = units.get(i + 1) {
                        escaped.push(next);
                        i += 1;
                    }
                }
                0x2F if !in_class => escaped.extend_from_slice(&[0x5C, 0x2F]),
                0x0A => escaped.extend_from_slice(&[0x5C, b'n' as u16]),
                0x0D => escaped.extend_from_slice(&[0x5C, b'r' as u16]),
                0x2028 | 0x2029 => {
                    let code = format!("\\u{:04x}", c);
                    escaped.extend(code.encode_utf16());
                }
                _ => {
                    if c == b'[' as u16 {
                        in_class = true;
                    } else if c == b']' as u16 {
                        in_class = false;
                    }
                    escaped.push(c);
                }
            }
            i += 1;
        }
        JSString::from(escaped)
    }

    /// Tries a match that starts exactly at `start`.
    pub fn match_at(&self, input: &[u16], start: usize) -> Option<Match> {
        if start > input.len() {
            return None;
        }
        let matcher = Matcher::new(&self.program, input, self.flags);
        let (end, mut captures) = matcher.match_at(start, self.group_count)?;
        captures[0] = Some((start, end));
        Some(Match { captures })
    }

    /// Finds the leftmost match at or after `start`; sticky patterns only try `start`.
    pub fn find_from(&self, input: &[u16], start: usize) -> Option<Match> {
        if self.flags.sticky() {
            return self.match_at(input, start);
        }
        (start..=input.len()).find_map(|pos| self.match_at(input, pos))
    }

    pub fn is_match(&self, input: &[u16]) -> bool {
        self.find_from(input, 0).is_some()
    }
}

impl fmt::Display for RegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source(), self.flags)
    }
}
