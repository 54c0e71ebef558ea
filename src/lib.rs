//! Compiler from the small NBF imperative language to Brainfuck, plus a
//! Brainfuck interpreter used as this compiler's own test oracle.
//!
//! The core lives in modules kept in dependency order: [`scope`] (C1,
//! the tape allocator), [`emit`] (C2, the cursor-aware text buffer), the
//! operator library (C3, private — every `op_*` method lives on
//! [`compiler::Compiler`] via `ops.rs`), [`functions`] (C4, the function
//! table), the dispatch synthesiser (C5, private — see `dispatch.rs`),
//! statement/expression lowering (C6, private — see `lower.rs`) and
//! [`compiler`] (C7, the two-pass driver). [`scanner`], [`token`],
//! [`ast`] and [`parser`] are the front end. [`interpreter`]
//! is the collaborator test oracle and the `bfi` binary's engine.

pub mod ast;
pub mod compiler;
mod dispatch;
pub mod emit;
pub mod error;
pub mod functions;
pub mod interpreter;
mod lower;
mod ops;
pub mod parser;
pub mod scanner;
pub mod scope;
pub mod token;

pub use ast::Program as AstProgram;
pub use compiler::Compiler;
pub use error::CompileError;
pub use interpreter::{Interpreter, Program as BfProgram};

/// Lexes, parses, and compiles NBF source straight to Brainfuck text —
/// the library-level equivalent of the `nbfc` binary.
#[tracing::instrument(skip(source), fields(source_len = source.len()))]
pub fn compile_source(source: &str) -> Result<String, CompileError> {
    let tokens = scanner::Scanner::new(source).scan_tokens()?;
    tracing::debug!(tokens = tokens.len(), "lexed");
    let program = parser::parse(tokens)?;
    tracing::debug!(functions = program.functions.len(), "parsed");
    Compiler::compile(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_rejects_lex_errors() {
        assert!(compile_source("@").is_err());
    }

    #[test]
    fn compile_source_emits_only_bf_characters() {
        let code = compile_source("putc('A');").unwrap();
        assert!(code.chars().all(|c| "+-<>[],. \n".contains(c)));
    }
}
