use core::ops::Range;

use crate::error::{
    Grammar,
    ParseError,
};

/// A compiled regular expression pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Empty,
    Char(u16),
    /// `.`
    Any,
    Class(CharClass),
    /// `^`
    LineStart,
    /// `$`
    LineEnd,
    /// `\b`, or `\B` when negated.
    WordBoundary { negate: bool },
    /// A capturing group with its index (starting from 1).
    Group(Box<Node>, usize),
    Backref(usize),
    Look {
        ahead: bool,
        negate: bool,
        node: Box<Node>,
    },
    Repeat {
        node: Box<Node>,
        min: usize,
        max: Option<usize>,
        greedy: bool,
        /// Capturing groups inside `node`: they are reset before every iteration.
        groups: Range<usize>,
    },
    Concat(Vec<Node>),
    Alt(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassItem {
    Range(u16, u16),
    Digit { negate: bool },
    Word { negate: bool },
    Space { negate: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharClass {
    pub negate: bool,
    pub items: Vec<ClassItem>,
}

impl CharClass {
    fn escape(c: u16) -> Option<ClassItem> {
        if c > 0x7f {
            return None;
        }
        let item = match c as u8 {
            b'd' => ClassItem::Digit { negate: false },
            b'D' => ClassItem::Digit { negate: true },
            b'w' => ClassItem::Word { negate: false },
            b'W' => ClassItem::Word { negate: true },
            b's' => ClassItem::Space { negate: false },
            b'S' => ClassItem::Space { negate: true },
            _ => return None,
        };
        Some(item)
    }
}

/// The result of parsing a pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub node: Node,
    pub group_count: usize,
}

pub fn parse(source: &[u16]) -> Result<Pattern, ParseError> {
    let mut parser = Parser {
        input: source,
        pos: 0,
        group_count: 0,
        total_groups: count_groups(source),
    };
    let node = parser.disjunction()?;
    if parser.pos < source.len() {
        // only an unmatched `)` stops a top-level disjunction
        return Err(parser.invalid("unmatched ')'"));
    }
    Ok(Pattern {
        node,
        group_count: parser.group_count,
    })
}

/// Counts capturing groups in advance: `\N` is a backreference only if
/// there are at least N groups anywhere in the pattern.
fn count_groups(source: &[u16]) -> usize {
    let mut count = 0;
    let mut in_class = false;
    let mut i = 0;
    while i < source.len() {
        match source[i] {
            c if c == b'\\' as u16 => i += 1,
            c if c == b'[' as u16 => in_class = true,
            c if c == b']' as u16 => in_class = false,
            c if c == b'(' as u16 && !in_class => {
                if source.get(i + 1) != Some(&(b'?' as u16)) {
                    count += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

fn is_digit(c: u16) -> bool {
    (b'0' as u16..=b'9' as u16).contains(&c)
}

fn hex_value(c: u16) -> Option<u16> {
    char::from_u32(c as u32)?.to_digit(16).map(|d| d as u16)
}

struct Parser<'a> {
    input: &'a [u16],
    pos: usize,
    group_count: usize,
    total_groups: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u16> {
        self.input.get(self.pos).copied()
    }

    fn peek_ascii(&self) -> Option<u8> {
        self.peek().filter(|&c| c <= 0x7f).map(|c| c as u8)
    }

    fn peek_is(&self, c: u8) -> bool {
        self.peek() == Some(c as u16)
    }

    fn lookahead_is(&self, offset: usize, c: u8) -> bool {
        self.input.get(self.pos + offset) == Some(&(c as u16))
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek_is(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn invalid(&self, reason: &'static str) -> ParseError {
        ParseError::Invalid {
            grammar: Grammar::RegExp,
            reason,
            position: self.pos,
        }
    }

    fn disjunction(&mut self) -> Result<Node, ParseError> {
        let mut branches = vec![self.alternative()?];
        while self.eat(b'|') {
            branches.push(self.alternative()?);
        }
        Ok(match branches.len() {
            1 => branches.remove(0),
            _ => Node::Alt(branches),
        })
    }

    fn alternative(&mut self) -> Result<Node, ParseError> {
        let mut terms = Vec::new();
        while let Some(c) = self.peek() {
            if c == b'|' as u16 || c == b')' as u16 {
                break;
            }
            terms.push(self.term()?);
        }
        Ok(match terms.len() {
            0 => Node::Empty,
            1 => terms.remove(0),
            _ => Node::Concat(terms),
        })
    }

    fn term(&mut self) -> Result<Node, ParseError> {
        let groups_before = self.group_count;
        let (atom, quantifiable) = self.atom()?;
        let (min, max) = match self.quantifier()? {
            Some(bounds) if quantifiable => bounds,
            Some(_) => return Err(self.invalid("nothing to repeat")),
            None => return Ok(atom),
        };
        let greedy = !self.eat(b'?');
        Ok(Node::Repeat {
            node: Box::new(atom),
            min,
            max,
            greedy,
            groups: (groups_before + 1)..(self.group_count + 1),
        })
    }

    /// `{n}`, `{n,}` and `{n,m}` or None if the input does not form one.
    fn braced_quantifier(&self) -> Option<(usize, Option<usize>, usize)> {
        let mut i = self.pos;
        if self.input.get(i) != Some(&(b'{' as u16)) {
            return None;
        }
        i += 1;
        let number = |i: &mut usize| -> Option<usize> {
            let start = *i;
            let mut n: usize = 0;
            while let Some(&c) = self.input.get(*i).filter(|&&c| is_digit(c)) {
                n = n.saturating_mul(10).saturating_add((c - b'0' as u16) as usize);
                *i += 1;
            }
            if *i > start {
                Some(n)
            } else {
                None
            }
        };
        let min = number(&mut i)?;
        let max = if self.input.get(i) == Some(&(b',' as u16)) {
            i += 1;
            number(&mut i)
        } else {
            Some(min)
        };
        if self.input.get(i) != Some(&(b'}' as u16)) {
            return None;
        }
        Some((min, max, i + 1))
    }

    fn quantifier(&mut self) -> Result<Option<(usize, Option<usize>)>, ParseError> {
        let bounds = match self.peek_ascii() {
            Some(b'*') => (0, None),
            Some(b'+') => (1, None),
            Some(b'?') => (0, Some(1)),
            Some(b'{') => match self.braced_quantifier() {
                Some((min, max, end)) => {
                    if max.map_or(false, |max| max < min) {
                        return Err(self.invalid("numbers out of order in {} quantifier"));
                    }
                    self.pos = end;
                    return Ok(Some((min, max)));
                }
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(bounds))
    }

    /// Returns the atom and whether a quantifier may follow it.
    fn atom(&mut self) -> Result<(Node, bool), ParseError> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(ParseError::UnexpectedEnd { grammar: Grammar::RegExp, position: self.pos }),
        };
        if c > 0x7f {
            self.pos += 1;
            return Ok((Node::Char(c), true));
        }
        match c as u8 {
            b'^' => {
                self.pos += 1;
                Ok((Node::LineStart, false))
            }
            b'$' => {
                self.pos += 1;
                Ok((Node::LineEnd, false))
            }
            b'.' => {
                self.pos += 1;
                Ok((Node::Any, true))
            }
            b'*' | b'+' | b'?' => Err(self.invalid("nothing to repeat")),
            b'{' if self.braced_quantifier().is_some() => Err(self.invalid("nothing to repeat")),
            b'(' => self.group(),
            b'[' => {
                self.pos += 1;
                Ok((Node::Class(self.class()?), true))
            }
            b'\\' => self.atom_escape(),
            _ => {
                self.pos += 1;
                Ok((Node::Char(c), true))
            }
        }
    }

    fn group(&mut self) -> Result<(Node, bool), ParseError> {
        let open = self.pos;
        self.pos += 1;
        let (node, quantifiable) = if self.eat(b'?') {
            let (ahead, negate) = match self.peek_ascii() {
                Some(b':') => {
                    self.pos += 1;
                    let node = self.disjunction()?;
                    return self.close_group(open, node, true);
                }
                Some(b'=') => (true, false),
                Some(b'!') => (true, true),
                Some(b'<') if self.lookahead_is(1, b'=') => (false, false),
                Some(b'<') if self.lookahead_is(1, b'!') => (false, true),
                _ => return Err(self.invalid("invalid group")),
            };
            self.pos += if ahead { 1 } else { 2 };
            let node = Box::new(self.disjunction()?);
            // Lookaheads stay quantifiable for web compatibility
            (Node::Look { ahead, negate, node }, ahead)
        } else {
            self.group_count += 1;
            let index = self.group_count;
            let node = self.disjunction()?;
            (Node::Group(Box::new(node), index), true)
        };
        self.close_group(open, node, quantifiable)
    }

    fn close_group(&mut self, open: usize, node: Node, quantifiable: bool) -> Result<(Node, bool), ParseError> {
        if !self.eat(b')') {
            return Err(ParseError::Invalid {
                grammar: Grammar::RegExp,
                reason: "unterminated group",
                position: open,
            });
        }
        Ok((node, quantifiable))
    }

    fn atom_escape(&mut self) -> Result<(Node, bool), ParseError> {
        self.pos += 1;
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.invalid("\\ at end of pattern")),
        };
        if let Some(item) = CharClass::escape(c) {
            self.pos += 1;
            let class = CharClass { negate: false, items: vec![item] };
            return Ok((Node::Class(class), true));
        }
        if c == b'b' as u16 || c == b'B' as u16 {
            self.pos += 1;
            let negate = c == b'B' as u16;
            return Ok((Node::WordBoundary { negate }, false));
        }
        if is_digit(c) && c != b'0' as u16 {
            let start = self.pos;
            let mut n: usize = 0;
            while let Some(d) = self.peek().filter(|&d| is_digit(d)) {
                n = n.saturating_mul(10).saturating_add((d - b'0' as u16) as usize);
                self.pos += 1;
            }
            if n <= self.total_groups {
                return Ok((Node::Backref(n), true));
            }
            self.pos = start;
        }
        Ok((Node::Char(self.character_escape(false)), true))
    }

    /// Decodes an escape after `\` into a single code unit.
    fn character_escape(&mut self, in_class: bool) -> u16 {
        let c = match self.peek() {
            Some(c) => c,
            None => return b'\\' as u16,
        };
        self.pos += 1;
        if c > 0x7f {
            return c;
        }
        match c as u8 {
            b'f' => 0x0C,
            b'n' => 0x0A,
            b'r' => 0x0D,
            b't' => 0x09,
            b'v' => 0x0B,
            b'b' if in_class => 0x08,
            b'c' => match self.peek() {
                Some(l) if l < 0x80 && (l as u8).is_ascii_alphabetic() => {
                    self.pos += 1;
                    l % 32
                }
                Some(l) if in_class && (is_digit(l) || l == b'_' as u16) => {
                    self.pos += 1;
                    l % 32
                }
                _ => {
                    // `\c` without a control letter is a literal backslash
                    self.pos -= 1;
                    b'\\' as u16
                }
            },
            b'x' => self.hex_escape(2).unwrap_or(c),
            b'u' => self.hex_escape(4).unwrap_or(c),
            b'0'..=b'7' => {
                let mut value = c - b'0' as u16;
                let max_len = if c <= b'3' as u16 { 3 } else { 2 };
                let mut len = 1;
                while len < max_len {
                    match self.peek().filter(|&d| (b'0' as u16..=b'7' as u16).contains(&d)) {
                        Some(d) => {
                            value = value * 8 + (d - b'0' as u16);
                            self.pos += 1;
                            len += 1;
                        }
                        None => break,
                    }
                }
                value
            }
            _ => c,
        }
    }

    fn hex_escape(&mut self, len: usize) -> Option<u16> {
        let digits = self.input.get(self.pos..self.pos + len)?;
        let mut value = 0u16;
        for &d in digits {
            value = value * 16 + hex_value(d)?;
        }
        self.pos += len;
        Some(value)
    }

    fn class(&mut self) -> Result<CharClass, ParseError> {
        let open = self.pos - 1;
        let negate = self.eat(b'^');
        let mut items = Vec::new();
        loop {
            let from = match self.peek() {
                None => {
                    return Err(ParseError::Invalid {
                        grammar: Grammar::RegExp,
                        reason: "unterminated character class",
                        position: open,
                    })
                }
                Some(c) if c == b']' as u16 => {
                    self.pos += 1;
                    return Ok(CharClass { negate, items });
                }
                Some(_) => self.class_atom()?,
            };
            let is_range = self.peek_is(b'-')
                && self.input.get(self.pos + 1).map_or(false, |&c| c != b']' as u16);
            if !is_range {
                items.push(from);
                continue;
            }
            self.pos += 1;
            let to = self.class_atom()?;
            match (from, to) {
                (ClassItem::Range(lo, _), ClassItem::Range(hi, _)) => {
                    if hi < lo {
                        return Err(self.invalid("range out of order in character class"));
                    }
                    items.push(ClassItem::Range(lo, hi));
                }
                (from, to) => {
                    // a class escape on either side makes `-` literal
                    items.push(from);
                    items.push(ClassItem::Range(b'-' as u16, b'-' as u16));
                    items.push(to);
                }
            }
        }
    }

    fn class_atom(&mut self) -> Result<ClassItem, ParseError> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.invalid("unterminated character class")),
        };
        self.pos += 1;
        if c != b'\\' as u16 {
            return Ok(ClassItem::Range(c, c));
        }
        let e = match self.peek() {
            Some(e) => e,
            None => return Err(self.invalid("\\ at end of pattern")),
        };
        if let Some(item) = CharClass::escape(e) {
            self.pos += 1;
            return Ok(item);
        }
        let unit = self.character_escape(true);
        Ok(ClassItem::Range(unit, unit))
    }
}
