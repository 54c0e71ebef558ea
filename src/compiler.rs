//! C7: the two-pass compiler driver, plus the shared plumbing (C1+C2
//! glue) that every other core module (C3 `ops`, C5 `dispatch`, C6
//! `lower`) is implemented as methods on.
//!
//! Grounded on `examples/original_source/bf_space.hpp`'s `BfSpace`,
//! which is exactly this bundle: one emitter, one scope chain, one
//! function table, one running call counter, and the per-function-name
//! reservation map, all mutated only by the driver.
//! `BfSpace::code()`'s double call to `reset_env_and_code(); generate_dispatch_wrapped_code();`
//! is `Compiler::compile`'s two passes below.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::ast::Program;
use crate::emit::Emitter;
use crate::error::CompileError;
use crate::functions::FunctionTable;
use crate::scope::{Scope, Variable};

pub(crate) const CALLED_FUNCTION_INDEX: &str = "__CalledFunctionIndex";
pub(crate) const RETURN_POSITION: &str = "__ReturnPosition";
pub(crate) const CALL_NOT_PENDING: &str = "__CallNotPending";
pub(crate) const PARAMETER_PREFIX: &str = "__Parameter";
pub(crate) const PRE_CALL_PARAMETER_PREFIX: &str = "__PreCallParameter";

pub(crate) fn parameter_name(num: usize) -> String {
    format!("{PARAMETER_PREFIX}{num}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Pass 1: run the full lowering to measure, for every callee name,
    /// the largest `named_cells` count observed at any call site that
    /// invokes it. The emitted text is discarded.
    Measure,
    /// Pass 2: scopes are seeded with the reservations pass 1 measured;
    /// emission is kept.
    Emit,
}

/// The compiler's mutable state while walking one pass over the AST
///.
pub struct Compiler {
    pub(crate) emitter: Emitter,
    pub(crate) scope: Scope,
    pub(crate) functions: FunctionTable,
    pub(crate) pass: Pass,
    /// Running counter of call sites emitted so far in the function
    /// body currently being lowered — the call's "return position".
    pub(crate) num_function_calls: u32,
    /// Per-callee-name maximum `named_cells` observed at any call site
    /// invoking that callee, across the whole program. Measured in
    /// pass 1, consulted (as the frame-skip distance) in both passes.
    pub(crate) max_named_cells_per_callee: HashMap<String, i64>,
    /// Compile-time-only symbol table of declared array sizes, one map
    /// per lexical scope depth (mirrors `scope`'s own push/pop). Not
    /// part of `Scope`/`Variable` since `Scope::get` only ever hands
    /// back size-1 views; lowering
    /// needs the element count to size a read/write's linear scan.
    pub(crate) array_sizes: Vec<HashMap<String, u32>>,
}

impl Compiler {
    fn new(functions: FunctionTable, pass: Pass, reservation: i64) -> Self {
        let scope = Scope::root(reservation);
        let mut compiler = Self {
            emitter: Emitter::new(),
            scope,
            functions,
            pass,
            num_function_calls: 0,
            max_named_cells_per_callee: HashMap::new(),
            array_sizes: vec![HashMap::new()],
        };
        let max_arity = compiler.functions.max_arity();
        compiler.add_frame_vars(max_arity);
        compiler
    }

    fn add_frame_vars(&mut self, max_arity: usize) {
        for name in [CALLED_FUNCTION_INDEX, RETURN_POSITION, CALL_NOT_PENDING] {
            self.scope.add(name, 1).expect("frame vars are unique");
        }
        for i in 0..max_arity {
            self.scope
                .add(&parameter_name(i), 1)
                .expect("parameter vars are unique");
        }
    }

    pub(crate) fn bf(&mut self, text: &str) -> Result<(), CompileError> {
        self.emitter.bf(text)?;
        Ok(())
    }

    pub(crate) fn comment(&mut self, text: &str) -> Result<(), CompileError> {
        self.emitter.comment(text)?;
        Ok(())
    }

    pub(crate) fn var(&mut self, v: &Variable) {
        self.emitter.var(v);
    }

    /// Allocates an anonymous temporary in the current scope.
    pub(crate) fn add_temp(&mut self, size: u32) -> Variable {
        self.scope.add_temp(size)
    }

    pub(crate) fn get(&self, name: &str) -> Variable {
        self.scope.get(name).expect("internal frame variable must exist")
    }

    pub(crate) fn get_called_function_index(&self) -> Variable {
        self.get(CALLED_FUNCTION_INDEX)
    }

    pub(crate) fn get_return_position(&self) -> Variable {
        self.get(RETURN_POSITION)
    }

    pub(crate) fn get_call_not_pending(&self) -> Variable {
        self.get(CALL_NOT_PENDING)
    }

    /// Aliases the `num`-th frame parameter cell under the callee's
    /// own name for it.
    pub(crate) fn register_parameter(&mut self, num: usize, name: &str) -> Result<(), CompileError> {
        self.scope.add_alias(&parameter_name(num), name)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_test(functions: FunctionTable) -> Self {
        Self::new(functions, Pass::Emit, 0)
    }

    pub(crate) fn push_scope(&mut self, min_next_free: i64) {
        let child = self.scope.push(min_next_free);
        self.scope = child;
        self.array_sizes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        let scope = std::mem::replace(&mut self.scope, Scope::root(0));
        self.scope = scope.pop();
        self.array_sizes.pop();
    }

    /// Records that `name` (just declared in the current scope) is an
    /// array of `size` elements.
    pub(crate) fn declare_array_size(&mut self, name: &str, size: u32) {
        self.array_sizes
            .last_mut()
            .expect("at least the root scope frame exists")
            .insert(name.to_string(), size);
    }

    /// Looks up `name`'s declared array size, searching outward through
    /// enclosing scopes the same way `Scope::get` does.
    pub(crate) fn lookup_array_size(&self, name: &str) -> Option<u32> {
        self.array_sizes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }

    /// Moves the emitter's head to the current scope's watermark — the
    /// first cell above every named cell and live temporary — which is
    /// where a callee's frame begins.
    pub(crate) fn move_to_top(&mut self) {
        let top = self.scope.top();
        self.emitter.move_to(top);
    }

    /// Runs the full two-pass compilation: pass 1 discards output and
    /// records reservations; pass 2 emits for real using those
    /// reservations. In debug builds, pass 2 is run a second time and
    /// its output compared byte-for-byte against the first run, since
    /// both runs use the same reservation and must be deterministic.
    #[instrument(skip(program), fields(functions = program.functions.len()))]
    pub fn compile(program: &Program) -> Result<String, CompileError> {
        let functions = FunctionTable::build(program.functions.clone())?;
        debug!(
            user_functions = program.functions.len(),
            max_arity = functions.max_arity(),
            "function table built"
        );

        let mut pass1 = Compiler::new(functions.clone(), Pass::Measure, 0);
        crate::dispatch::generate_dispatch_wrapped_code(&mut pass1)?;
        let reservation = pass1
            .max_named_cells_per_callee
            .values()
            .copied()
            .max()
            .unwrap_or(0);
        debug!(reservation, "pass 1 complete");

        let mut pass2 = Compiler::new(functions.clone(), Pass::Emit, reservation);
        crate::dispatch::generate_dispatch_wrapped_code(&mut pass2)?;
        let output = pass2.emitter.code().to_string();
        info!(bytes = output.len(), "pass 2 complete");

        #[cfg(debug_assertions)]
        {
            let mut rerun = Compiler::new(functions, Pass::Emit, reservation);
            crate::dispatch::generate_dispatch_wrapped_code(&mut rerun)?;
            debug_assert_eq!(
                output,
                rerun.emitter.code(),
                "emission must be deterministic given a fixed reservation size"
            );
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::scanner::Scanner;

    fn compile_src(src: &str) -> String {
        let tokens = Scanner::new(src).scan_tokens().unwrap();
        let program = parser::parse(tokens).unwrap();
        Compiler::compile(&program).unwrap()
    }

    #[test]
    fn output_contains_only_allowed_characters() {
        let code = compile_src("putc('A');");
        assert!(code
            .chars()
            .all(|c| "+-<>[],. \n".contains(c)));
    }

    #[test]
    fn compiles_recursive_function() {
        let code = compile_src("fun f(n) { if (n > 0) { putc('.'); f(n-1); } } f(3);");
        assert!(!code.is_empty());
    }
}
