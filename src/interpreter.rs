//! The Brainfuck interpreter: a test oracle for the compiler's own
//! correctness argument, and the `bfi` binary's engine.
//!
//! Grounded on `examples/original_source/bfi.cc`'s `BrainfuckInterpreter`:
//! a precompiled bracket-jump table, a step loop bounded by `max_steps`,
//! and a sparse tape keyed by cell index so the head can wander negative
//! without ever panicking. Restyled onto a `TryFromPrimitive`-decoded
//! `Instruction` enum and a
//! `thiserror`-based `InterpretError` (`error.rs`) in place of the
//! original's bare `throw`s, and onto `bitflags`-gated `tracing` events
//! in place of nothing (the original has no logging).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::num::Wrapping;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use tracing::trace;

use crate::error::InterpretError;

pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

bitflags! {
    /// Which execution details get traced via `tracing`. Kept as
    /// bitflags (rather than a handful of bools) so a caller can combine
    /// them freely and so the hot step loop only checks one integer
    /// before deciding whether tracing is worth the call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceFlags: u8 {
        /// One event per executed instruction.
        const STEPS = 0b001;
        /// One event per `.`/`,`.
        const IO    = 0b010;
    }
}

/// The eight Brainfuck instructions, decoded from their own ASCII byte.
/// Any other byte is simply not an `Instruction` and is dropped during
/// compilation (see `Program::compile`) rather than rejected — a BF
/// interpreter treats human-readable annotation text the same way it
/// treats whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Instruction {
    IncPointer = b'>',
    DecPointer = b'<',
    Inc = b'+',
    Dec = b'-',
    Output = b'.',
    Input = b',',
    JumpIfZero = b'[',
    JumpUnlessZero = b']',
}

/// Strips `#`-to-end-of-line comments, keeping the newline so line
/// numbers in any future diagnostics stay meaningful. This runs
/// *unless* `--nocomments` is passed — the flag name reads backwards,
/// but that is the wording this tool commits to rather than the
/// original C++'s `--nocomments` (which actually means "keep them",
/// the same inversion).
pub fn strip_line_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_comment = false;
    for c in source.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
        } else if c == '#' {
            in_comment = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// A precompiled Brainfuck program: the filtered instruction stream
/// plus a jump table resolving every `[`/`]` to its partner's index.
pub struct Program {
    instructions: Vec<Instruction>,
    jumps: Vec<usize>,
}

impl Program {
    /// Filters `source` down to `Instruction`s and resolves bracket
    /// matching. `strip_comments` controls whether `#`-comments are
    /// removed first.
    pub fn compile(source: &str, strip_comments: bool) -> Result<Self, InterpretError> {
        let text = if strip_comments {
            strip_line_comments(source)
        } else {
            source.to_string()
        };
        let instructions: Vec<Instruction> = text
            .bytes()
            .filter_map(|b| Instruction::try_from_primitive(b).ok())
            .collect();

        let mut jumps = vec![0usize; instructions.len()];
        let mut open_stack = Vec::new();
        for (ip, instr) in instructions.iter().enumerate() {
            match instr {
                Instruction::JumpIfZero => open_stack.push(ip),
                Instruction::JumpUnlessZero => {
                    let start = open_stack
                        .pop()
                        .ok_or(InterpretError::UnmatchedClose(ip))?;
                    jumps[start] = ip;
                    jumps[ip] = start;
                }
                _ => {}
            }
        }
        if let Some(&unmatched) = open_stack.last() {
            return Err(InterpretError::UnmatchedOpen(unmatched));
        }
        Ok(Self { instructions, jumps })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A sparse, signed-addressable tape of wrapping `u8` cells. The head
/// may move into negative indices; a `HashMap` keyed by position means
/// an untouched cell reads as zero without ever allocating a dense
/// array sized to the head's excursion.
#[derive(Debug, Default)]
struct Tape {
    cells: HashMap<i64, Wrapping<u8>>,
    head: i64,
}

impl Tape {
    fn get(&self) -> u8 {
        self.cells.get(&self.head).copied().unwrap_or_default().0
    }

    fn set(&mut self, value: u8) {
        self.cells.insert(self.head, Wrapping(value));
    }

    fn inc(&mut self) {
        let entry = self.cells.entry(self.head).or_insert(Wrapping(0));
        *entry += Wrapping(1);
    }

    fn dec(&mut self) {
        let entry = self.cells.entry(self.head).or_insert(Wrapping(0));
        *entry -= Wrapping(1);
    }
}

/// Runs a compiled `Program` to completion against the given input/
/// output streams.
pub struct Interpreter {
    program: Program,
    tape: Tape,
    max_steps: u64,
    trace: TraceFlags,
}

impl Interpreter {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            tape: Tape::default(),
            max_steps: DEFAULT_MAX_STEPS,
            trace: TraceFlags::empty(),
        }
    }

    pub fn with_max_steps(program: Program, max_steps: u64) -> Self {
        Self {
            max_steps,
            ..Self::new(program)
        }
    }

    pub fn with_trace_flags(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    /// Executes the program, reading `,` input from `input` and writing
    /// `.` output to `output`. Returns `Ok(())` on normal termination
    /// (instruction pointer runs off the end); `StepLimitExceeded` or
    /// `ReadPastEof` abort early with a diagnostic.
    pub fn run(&mut self, mut input: impl Read, mut output: impl Write) -> Result<(), InterpretError> {
        let mut ip = 0usize;
        let mut steps: u64 = 0;
        let mut byte = [0u8; 1];

        while ip < self.program.len() {
            if steps >= self.max_steps {
                return Err(InterpretError::StepLimitExceeded(self.max_steps));
            }
            let instr = self.program.instructions[ip];
            if self.trace.contains(TraceFlags::STEPS) {
                trace!(ip, head = self.tape.head, ?instr, "bf step");
            }
            match instr {
                Instruction::IncPointer => self.tape.head += 1,
                Instruction::DecPointer => self.tape.head -= 1,
                Instruction::Inc => self.tape.inc(),
                Instruction::Dec => self.tape.dec(),
                Instruction::Output => {
                    let value = self.tape.get();
                    if self.trace.contains(TraceFlags::IO) {
                        trace!(value, "bf output");
                    }
                    output
                        .write_all(&[value])
                        .map_err(|e| InterpretError::Io(e.to_string()))?;
                }
                Instruction::Input => {
                    if input.read(&mut byte).unwrap_or(0) == 0 {
                        return Err(InterpretError::ReadPastEof);
                    }
                    if self.trace.contains(TraceFlags::IO) {
                        trace!(value = byte[0], "bf input");
                    }
                    self.tape.set(byte[0]);
                }
                Instruction::JumpIfZero => {
                    if self.tape.get() == 0 {
                        ip = self.program.jumps[ip];
                    }
                }
                Instruction::JumpUnlessZero => {
                    ip = self.program.jumps[ip];
                    steps += 1;
                    continue;
                }
            }
            ip += 1;
            steps += 1;
        }
        output
            .flush()
            .map_err(|e| InterpretError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Convenience wrapper used by the compiler's own integration tests
/// (`tests/end_to_end.rs`): compiles `source` and runs it with empty
/// stdin, returning whatever it wrote to stdout as a `String`.
pub fn run_to_string(source: &str, max_steps: u64) -> Result<String, InterpretError> {
    let program = Program::compile(source, true)?;
    let mut interpreter = Interpreter::with_max_steps(program, max_steps);
    let mut out = Vec::new();
    interpreter.run(std::io::empty(), &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        run_to_string(src, DEFAULT_MAX_STEPS).unwrap()
    }

    #[test]
    fn prints_a_single_character() {
        assert_eq!(run("++++++++[>+++++++++<-]>."), "A");
    }

    #[test]
    fn ignores_non_instruction_characters() {
        assert_eq!(run("start +++. end"), "\u{3}");
    }

    #[test]
    fn strips_hash_comments_by_default() {
        let program = Program::compile("+++. # this is not code\n", true).unwrap();
        assert_eq!(program.len(), 4);
    }

    #[test]
    fn keeps_hash_text_when_nocomments_requested() {
        // '#' itself is not a BF instruction either way, so the visible
        // difference is that text after it is still scanned for `[`/`]`.
        let err = Program::compile("+++.[#]", false);
        assert!(err.is_ok());
    }

    #[test]
    fn detects_unmatched_open_bracket() {
        assert!(Program::compile("[+", true).is_err());
    }

    #[test]
    fn detects_unmatched_close_bracket() {
        assert!(Program::compile("+]", true).is_err());
    }

    #[test]
    fn eof_on_input_is_an_error() {
        let program = Program::compile(",", true).unwrap();
        let mut interpreter = Interpreter::new(program);
        let mut out = Vec::new();
        let result = interpreter.run(std::io::empty(), &mut out);
        assert!(matches!(result, Err(InterpretError::ReadPastEof)));
    }

    #[test]
    fn step_limit_is_enforced() {
        let program = Program::compile("+[]", true).unwrap();
        let mut interpreter = Interpreter::with_max_steps(program, 10);
        let mut out = Vec::new();
        let result = interpreter.run(std::io::empty(), &mut out);
        assert!(matches!(result, Err(InterpretError::StepLimitExceeded(10))));
    }
}
