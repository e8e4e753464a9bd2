//! Patterns compile to a flat program for a backtracking machine.
//! Backtracking state lives on an explicit stack, so the depth of the
//! native stack only depends on lookaround nesting, never on the input.

use core::ops::Range;

use super::parse::{
    CharClass,
    ClassItem,
    Node,
};
use super::Flags;

/// Capture spans by group index; `None` is a group that did not participate.
pub type Captures = Vec<Option<(usize, usize)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    /// Inside a lookbehind: the subpattern matches right to left.
    Backward,
}

pub fn is_line_terminator(c: u16) -> bool {
    matches!(c, 0x0A | 0x0D | 0x2028 | 0x2029)
}

fn is_word_char(c: u16) -> bool {
    c < 0x80 && ((c as u8).is_ascii_alphanumeric() || c == b'_' as u16)
}

fn is_digit(c: u16) -> bool {
    (b'0' as u16..=b'9' as u16).contains(&c)
}

/// Simple case folding to upper case, as in non-unicode Canonicalize.
pub fn canonicalize(c: u16) -> u16 {
    let ch = match char::from_u32(c as u32) {
        Some(ch) => ch,
        None => return c,
    };
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if (u as u32) < 0x10000 => {
            let u = u as u32 as u16;
            if c >= 0x80 && u < 0x80 {
                c
            } else {
                u
            }
        }
        _ => c,
    }
}

fn lowercase(c: u16) -> u16 {
    let ch = match char::from_u32(c as u32) {
        Some(ch) => ch,
        None => return c,
    };
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) if (l as u32) < 0x10000 => l as u32 as u16,
        _ => c,
    }
}

impl ClassItem {
    fn contains(&self, c: u16) -> bool {
        match self {
            ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
            ClassItem::Digit { negate } => is_digit(c) != *negate,
            ClassItem::Word { negate } => is_word_char(c) != *negate,
            ClassItem::Space { negate } => crate::value::is_whitespace(c) != *negate,
        }
    }
}

impl CharClass {
    pub fn matches(&self, c: u16, ignore_case: bool) -> bool {
        let found = self.items.iter().any(|item| {
            item.contains(c) || (ignore_case && (item.contains(canonicalize(c)) || item.contains(lowercase(c))))
        });
        found != self.negate
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Inst {
    Char(u16),
    Any,
    Class(CharClass),
    LineStart,
    LineEnd,
    WordBoundary { negate: bool },
    Backref(usize),
    /// Remembers where the group began in register `reg`.
    GroupStart { reg: usize },
    GroupEnd { group: usize, reg: usize },
    /// The assertion body follows this instruction and ends with `Accept`.
    Look { ahead: bool, negate: bool, next: usize },
    /// Continues with the next instruction; `alt` is tried on backtracking.
    Split { alt: usize },
    Jump(usize),
    RepeatStart { counter: usize },
    /// The loop head: decides between one more iteration and `exit`.
    RepeatLoop {
        counter: usize,
        min: usize,
        max: Option<usize>,
        greedy: bool,
        exit: usize,
    },
    IterationStart { mark: usize, groups: Range<usize> },
    IterationEnd { counter: usize, mark: usize, min: usize, head: usize },
    Accept,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    insts: Vec<Inst>,
    registers: usize,
}

impl Program {
    pub fn compile(node: &Node) -> Program {
        let mut compiler = Compiler { insts: Vec::new(), registers: 0 };
        compiler.compile(node, Direction::Forward);
        compiler.emit(Inst::Accept);
        Program {
            insts: compiler.insts,
            registers: compiler.registers,
        }
    }
}

struct Compiler {
    insts: Vec<Inst>,
    registers: usize,
}

impl Compiler {
    fn emit(&mut self, inst: Inst) -> usize {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn register(&mut self) -> usize {
        self.registers += 1;
        self.registers - 1
    }

    /// Points the jump at `at` to the current end of the program.
    fn patch(&mut self, at: usize) {
        let here = self.insts.len();
        match &mut self.insts[at] {
            Inst::Look { next: target, .. }
            | Inst::Split { alt: target }
            | Inst::Jump(target)
            | Inst::RepeatLoop { exit: target, .. } => *target = here,
            inst => unreachable!("{:?} has no jump target", inst),
        }
    }

    fn compile(&mut self, node: &Node, dir: Direction) {
        match node {
            Node::Empty => {}
            Node::Char(c) => {
                self.emit(Inst::Char(*c));
            }
            Node::Any => {
                self.emit(Inst::Any);
            }
            Node::Class(class) => {
                self.emit(Inst::Class(class.clone()));
            }
            Node::LineStart => {
                self.emit(Inst::LineStart);
            }
            Node::LineEnd => {
                self.emit(Inst::LineEnd);
            }
            Node::WordBoundary { negate } => {
                self.emit(Inst::WordBoundary { negate: *negate });
            }
            Node::Backref(index) => {
                self.emit(Inst::Backref(*index));
            }
            Node::Group(inner, group) => {
                let reg = self.register();
                self.emit(Inst::GroupStart { reg });
                self.compile(inner, dir);
                self.emit(Inst::GroupEnd { group: *group, reg });
            }
            Node::Look { ahead, negate, node } => {
                let look = self.emit(Inst::Look { ahead: *ahead, negate: *negate, next: 0 });
                let inner_dir = if *ahead { Direction::Forward } else { Direction::Backward };
                self.compile(node, inner_dir);
                self.emit(Inst::Accept);
                self.patch(look);
            }
            Node::Repeat { node, min, max, greedy, groups } => {
                let counter = self.register();
                let mark = self.register();
                self.emit(Inst::RepeatStart { counter });
                let head = self.emit(Inst::RepeatLoop {
                    counter,
                    min: *min,
                    max: *max,
                    greedy: *greedy,
                    exit: 0,
                });
                self.emit(Inst::IterationStart { mark, groups: groups.clone() });
                self.compile(node, dir);
                self.emit(Inst::IterationEnd { counter, mark, min: *min, head });
                self.patch(head);
            }
            Node::Concat(nodes) => match dir {
                Direction::Forward => nodes.iter().for_each(|node| self.compile(node, dir)),
                Direction::Backward => nodes.iter().rev().for_each(|node| self.compile(node, dir)),
            },
            Node::Alt(branches) => {
                let mut jumps = Vec::new();
                for (i, branch) in branches.iter().enumerate() {
                    let last = i + 1 == branches.len();
                    let split = (!last).then(|| self.emit(Inst::Split { alt: 0 }));
                    self.compile(branch, dir);
                    if let Some(split) = split {
                        jumps.push(self.emit(Inst::Jump(0)));
                        self.patch(split);
                    }
                }
                for jump in jumps {
                    self.patch(jump);
                }
            }
        }
    }
}

/// An entry of the backtracking stack: a resumption point, or an undo
/// record for a capture or register written after it.
#[derive(Debug)]
enum Frame {
    Resume { pc: usize, pos: usize },
    Capture { group: usize, span: Option<(usize, usize)> },
    Register { reg: usize, value: usize },
}

struct Thread<'c> {
    caps: &'c mut Captures,
    regs: &'c mut Vec<usize>,
    stack: Vec<Frame>,
}

impl Thread<'_> {
    fn set_capture(&mut self, group: usize, span: Option<(usize, usize)>) {
        if self.caps[group] != span {
            self.stack.push(Frame::Capture { group, span: self.caps[group] });
            self.caps[group] = span;
        }
    }

    fn set_register(&mut self, reg: usize, value: usize) {
        self.stack.push(Frame::Register { reg, value: self.regs[reg] });
        self.regs[reg] = value;
    }

    /// Undoes writes up to the latest resumption point and returns it.
    fn backtrack(&mut self) -> Option<(usize, usize)> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Resume { pc, pos } => return Some((pc, pos)),
                Frame::Capture { group, span } => self.caps[group] = span,
                Frame::Register { reg, value } => self.regs[reg] = value,
            }
        }
        None
    }
}

pub struct Matcher<'a> {
    program: &'a Program,
    input: &'a [u16],
    flags: Flags,
}

impl<'a> Matcher<'a> {
    pub fn new(program: &'a Program, input: &'a [u16], flags: Flags) -> Self {
        Matcher { program, input, flags }
    }

    /// Tries to match starting exactly at `start`.
    /// Returns the end position and the captures (index 0 is left empty).
    pub fn match_at(&self, start: usize, group_count: usize) -> Option<(usize, Captures)> {
        let mut caps = vec![None; group_count + 1];
        let mut regs = vec![0; self.program.registers];
        let end = self.run(0, start, Direction::Forward, &mut caps, &mut regs)?;
        Some((end, caps))
    }

    fn same_unit(&self, a: u16, b: u16) -> bool {
        a == b || (self.flags.contains(Flags::IGNORE_CASE) && canonicalize(a) == canonicalize(b))
    }

    /// The unit next to `pos` in direction `dir` and the position after it.
    fn step(&self, pos: usize, dir: Direction) -> Option<(u16, usize)> {
        match dir {
            Direction::Forward => self.input.get(pos).map(|&c| (c, pos + 1)),
            Direction::Backward if pos > 0 => Some((self.input[pos - 1], pos - 1)),
            Direction::Backward => None,
        }
    }

    fn step_if(&self, pos: usize, dir: Direction, test: impl Fn(u16) -> bool) -> Option<usize> {
        match self.step(pos, dir) {
            Some((c, next)) if test(c) => Some(next),
            _ => None,
        }
    }

    fn backref(&self, span: Option<(usize, usize)>, pos: usize, dir: Direction) -> Option<usize> {
        let (start, end) = match span {
            Some(span) => span,
            None => return Some(pos),
        };
        let len = end - start;
        let range = match dir {
            Direction::Forward if pos + len <= self.input.len() => pos..pos + len,
            Direction::Backward if pos >= len => pos - len..pos,
            _ => return None,
        };
        let next = if dir == Direction::Forward { range.end } else { range.start };
        let equal = (self.input[range].iter())
            .zip(&self.input[start..end])
            .all(|(&a, &b)| self.same_unit(a, b));
        equal.then(|| next)
    }

    /// Runs the program from `pc` until an `Accept`; returns the position there.
    /// On failure every capture and register write is undone.
    fn run(&self, pc: usize, pos: usize, dir: Direction, caps: &mut Captures, regs: &mut Vec<usize>) -> Option<usize> {
        let mut thread = Thread { caps, regs, stack: Vec::new() };
        let (mut pc, mut pos) = (pc, pos);
        let input = self.input;
        loop {
            // the next (pc, pos) or None to backtrack
            let next = match &self.program.insts[pc] {
                Inst::Accept => return Some(pos),
                Inst::Char(ch) => self.step_if(pos, dir, |c| self.same_unit(c, *ch)).map(|pos| (pc + 1, pos)),
                Inst::Any => {
                    let dot_all = self.flags.contains(Flags::DOT_ALL);
                    self.step_if(pos, dir, |c| dot_all || !is_line_terminator(c)).map(|pos| (pc + 1, pos))
                }
                Inst::Class(class) => {
                    let ignore_case = self.flags.contains(Flags::IGNORE_CASE);
                    self.step_if(pos, dir, |c| class.matches(c, ignore_case)).map(|pos| (pc + 1, pos))
                }
                Inst::LineStart => {
                    let multiline = self.flags.contains(Flags::MULTILINE);
                    let at_start = pos == 0 || (multiline && is_line_terminator(input[pos - 1]));
                    at_start.then(|| (pc + 1, pos))
                }
                Inst::LineEnd => {
                    let multiline = self.flags.contains(Flags::MULTILINE);
                    let at_end = pos == input.len() || (multiline && is_line_terminator(input[pos]));
                    at_end.then(|| (pc + 1, pos))
                }
                Inst::WordBoundary { negate } => {
                    let before = pos > 0 && is_word_char(input[pos - 1]);
                    let after = pos < input.len() && is_word_char(input[pos]);
                    ((before != after) != *negate).then(|| (pc + 1, pos))
                }
                Inst::Backref(group) => {
                    let span = thread.caps.get(*group).copied().flatten();
                    self.backref(span, pos, dir).map(|pos| (pc + 1, pos))
                }
                Inst::GroupStart { reg } => {
                    thread.set_register(*reg, pos);
                    Some((pc + 1, pos))
                }
                Inst::GroupEnd { group, reg } => {
                    let start = thread.regs[*reg];
                    thread.set_capture(*group, Some((start.min(pos), start.max(pos))));
                    Some((pc + 1, pos))
                }
                Inst::Look { ahead, negate, next } => {
                    let inner_dir = if *ahead { Direction::Forward } else { Direction::Backward };
                    let before = thread.caps.clone();
                    let matched = self.run(pc + 1, pos, inner_dir, thread.caps, thread.regs).is_some();
                    match (matched, *negate) {
                        (true, false) => {
                            // keep the captures of the assertion, undoably
                            for (group, span) in before.into_iter().enumerate() {
                                if thread.caps[group] != span {
                                    thread.stack.push(Frame::Capture { group, span });
                                }
                            }
                            Some((*next, pos))
                        }
                        (true, true) => {
                            thread.caps.clone_from(&before);
                            None
                        }
                        (false, false) => None,
                        (false, true) => Some((*next, pos)),
                    }
                }
                Inst::Split { alt } => {
                    thread.stack.push(Frame::Resume { pc: *alt, pos });
                    Some((pc + 1, pos))
                }
                Inst::Jump(target) => Some((*target, pos)),
                Inst::RepeatStart { counter } => {
                    thread.set_register(*counter, 0);
                    Some((pc + 1, pos))
                }
                Inst::RepeatLoop { counter, min, max, greedy, exit } => {
                    let count = thread.regs[*counter];
                    if max.map_or(false, |max| count >= max) {
                        Some((*exit, pos))
                    } else if count < *min {
                        Some((pc + 1, pos))
                    } else if *greedy {
                        thread.stack.push(Frame::Resume { pc: *exit, pos });
                        Some((pc + 1, pos))
                    } else {
                        thread.stack.push(Frame::Resume { pc: pc + 1, pos });
                        Some((*exit, pos))
                    }
                }
                Inst::IterationStart { mark, groups } => {
                    thread.set_register(*mark, pos);
                    for group in groups.clone() {
                        thread.set_capture(group, None);
                    }
                    Some((pc + 1, pos))
                }
                Inst::IterationEnd { counter, mark, min, head } => {
                    let count = thread.regs[*counter];
                    // an empty iteration past the minimum cannot make progress
                    if pos == thread.regs[*mark] && count >= *min {
                        None
                    } else {
                        thread.set_register(*counter, count + 1);
                        Some((*head, pos))
                    }
                }
            };
            match next.or_else(|| thread.backtrack()) {
                Some((next_pc, next_pos)) => {
                    pc = next_pc;
                    pos = next_pos;
                }
                None => return None,
            }
        }
    }
}
