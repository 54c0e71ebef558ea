//! C2: the cursor-aware emitter. Appends validated Brainfuck text to a
//! growing buffer, tracking the tape head so that every `Variable`
//! reference is translated into the minimal run of `<`/`>` moves.
//!
//! Grounded on `examples/original_source/bf_space.hpp`'s `BfSpace`/
//! `Emitter`/`Indent` trio. The C++ version streams through a chain of
//! `operator<<` calls on a short-lived `Emitter` temporary whose
//! destructor appends the trailing newline; Rust has no anonymous
//! temporary with a meaningful destructor point mid-expression, so the
//! newline is written by an explicit `newline()` call at the same
//! places the original's emission chains end. Indentation keeps the
//! RAII shape directly: `indent()` returns a guard whose `Drop` restores
//! the level, exactly like `BfSpace::Indent`.

use crate::error::EmitError;
use crate::scope::Variable;

const BF_CHARS: &str = "+-<>[],. \n";
const BF_INSTRUCTIONS: &str = "+-<>[],.";

pub struct Emitter {
    code: String,
    head: i64,
    indent: i32,
    at_line_start: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            code: String::new(),
            head: 0,
            indent: 0,
            at_line_start: true,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }

    pub fn head(&self) -> i64 {
        self.head
    }

    /// Appends raw Brainfuck instructions and whitespace. Rejects any
    /// character outside the eight instructions plus space/newline/tab.
    pub fn bf(&mut self, text: &str) -> Result<(), EmitError> {
        if text.chars().any(|c| !BF_CHARS.contains(c)) {
            return Err(EmitError::NonBfCharacter(text.to_string()));
        }
        self.append_raw(text);
        Ok(())
    }

    /// Emits a cursor move to `v`'s index plus a human-readable tag,
    /// then updates the tracked head position.
    pub fn var(&mut self, v: &Variable) {
        self.append_raw(&v.debug_string());
        self.move_to(v.index());
    }

    /// Moves the head to an absolute tape index with no accompanying
    /// debug tag — used when a position is known only as a raw index
    /// rather than through a `Variable` (e.g. jumping to the top of the
    /// current scope before entering a callee's frame).
    pub fn move_to(&mut self, target: i64) {
        self.move_to_inner(target);
    }

    /// Appends free text that must contain no Brainfuck instruction
    /// character.
    pub fn comment(&mut self, text: &str) -> Result<(), EmitError> {
        if text.chars().any(|c| BF_INSTRUCTIONS.contains(c)) {
            return Err(EmitError::CommentHasBfCharacter(text.to_string()));
        }
        self.append_raw(text);
        Ok(())
    }

    /// Appends free text without validation, for debug annotations that
    /// are allowed to contain anything.
    pub fn verbatim(&mut self, text: &str) {
        self.append_raw(text);
    }

    pub fn newline(&mut self) {
        self.append_raw("\n");
    }

    /// Pushes one indentation level; the returned guard pops it again
    /// on drop, the same RAII shape `BfSpace::Indent` uses.
    pub fn indent(&mut self) -> IndentGuard<'_> {
        self.indent += 1;
        IndentGuard { emitter: self }
    }

    fn move_to_inner(&mut self, target: i64) {
        let delta = target - self.head;
        self.head = target;
        if delta == 0 {
            return;
        }
        let (ch, count) = if delta > 0 { ('>', delta) } else { ('<', -delta) };
        let mover: String = std::iter::repeat(ch).take(count as usize).collect();
        self.append_raw(&mover);
    }

    fn append_raw(&mut self, text: &str) {
        for c in text.chars() {
            if self.at_line_start {
                for _ in 0..self.indent * 2 {
                    self.code.push(' ');
                }
                self.at_line_start = false;
            }
            self.code.push(c);
            if c == '\n' {
                self.at_line_start = true;
            }
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IndentGuard<'a> {
    emitter: &'a mut Emitter,
}

impl Drop for IndentGuard<'_> {
    fn drop(&mut self) {
        self.emitter.indent -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    #[test]
    fn rejects_non_bf_character() {
        let mut e = Emitter::new();
        assert!(e.bf("x").is_err());
    }

    #[test]
    fn rejects_comment_with_bf_instruction() {
        let mut e = Emitter::new();
        assert!(e.comment("has a [ in it").is_err());
    }

    #[test]
    fn var_emits_minimal_move() {
        let scope = Scope::root(0);
        let a = scope.add("a", 1).unwrap();
        let b = scope.add("b", 1).unwrap();
        let mut e = Emitter::new();
        e.var(&a);
        e.bf("+").unwrap();
        e.var(&b);
        e.bf("-").unwrap();
        assert_eq!(e.code(), "a{0}+b{1}>-");
    }

    #[test]
    fn indent_guard_restores_level_on_drop() {
        let mut e = Emitter::new();
        {
            let mut e2 = e.indent();
            e2.emitter.bf("+").unwrap();
            e2.emitter.newline();
        }
        e.bf("+").unwrap();
        assert_eq!(e.code(), "  +\n+");
    }
}
