//! C4: the function table. Registers user and built-in functions,
//! assigns 1-based call indices, and tracks the maximum arity across
//! every registered function.
//!
//! Grounded on `examples/original_source/bf_space.hpp`'s
//! `FunctionStorage`/`IndexedFunction`. The standard-library `nprint`
//! is transcribed from the `kBrainfuckStandardLib`
//! NBF source embedded in `bf_space.cc` and reparsed once here instead
//! of being hand-lowered, exactly as the original does.

use std::collections::HashMap;

use crate::ast::Function;
use crate::error::{CompileError, FunctionError};
use crate::parser;
use crate::scanner::Scanner;

const STD_LIB_SOURCE: &str = r#"
fun nprint(x) {
    var old_power = 1;
    while (x or old_power) {
        var digit = x;
        var power = 1;
        while (digit > 9) {
            digit = digit / 10;
            power = power * 10;
        }
        if (power < old_power) {
            putc('0');
            old_power = old_power / 10;
        } else {
            putc(digit + '0');
            x = x - digit * power;
            old_power = power / 10;
        }
    }
}
"#;

#[derive(Clone)]
struct IndexedFunction {
    index: u32,
    function: Function,
}

/// Registers user and built-in functions and assigns dispatch indices
/// in definition order. Index 0 is reserved as "no
/// call"; the first defined function gets index 1.
#[derive(Clone)]
pub struct FunctionTable {
    functions: HashMap<String, IndexedFunction>,
    order: Vec<String>,
    max_arity: usize,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            order: Vec::new(),
            max_arity: 0,
        }
    }

    /// Builds a table seeded with the user's functions followed by the
    /// standard library (`nprint`). `print` is reserved for the
    /// compiler's own call-expansion: a user `fun print(...)` is rejected.
    pub fn build(user_functions: Vec<Function>) -> Result<Self, CompileError> {
        let mut table = Self::new();
        for f in user_functions {
            if f.name == "print" {
                return Err(FunctionError::ReservedName.into());
            }
            table.define(f)?;
        }
        let std_lib_tokens = Scanner::new(STD_LIB_SOURCE)
            .scan_tokens()
            .expect("standard library source must lex");
        let std_lib = parser::parse(std_lib_tokens).expect("standard library source must parse");
        for f in std_lib.functions {
            table.define(f)?;
        }
        Ok(table)
    }

    pub fn define(&mut self, function: Function) -> Result<(), CompileError> {
        if self.functions.contains_key(&function.name) {
            return Err(FunctionError::DuplicateFunction(function.name).into());
        }
        self.max_arity = self.max_arity.max(function.arity());
        let index = self.order.len() as u32 + 1;
        self.order.push(function.name.clone());
        self.functions.insert(
            function.name.clone(),
            IndexedFunction { index, function },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str, arity: usize) -> Result<u32, CompileError> {
        let entry = self
            .functions
            .get(name)
            .ok_or_else(|| FunctionError::UndefinedFunction {
                name: name.to_string(),
            })?;
        if entry.function.arity() != arity {
            return Err(FunctionError::ArityMismatch {
                name: name.to_string(),
                expected: entry.function.arity(),
                actual: arity,
            }
            .into());
        }
        Ok(entry.index)
    }

    /// Iterates functions in definition order — this order is the
    /// emission order of branches in the dispatch loop.
    pub fn functions(&self) -> impl Iterator<Item = (u32, &Function)> {
        self.order
            .iter()
            .map(move |name| {
                let entry = &self.functions[name];
                (entry.index, &entry.function)
            })
    }

    pub fn max_arity(&self) -> usize {
        self.max_arity
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name).map(|entry| &entry.function)
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;

    fn func(name: &str, params: &[&str]) -> Function {
        Function {
            name: name.to_string(),
            parameters: params.iter().map(|s| s.to_string()).collect(),
            body: Stmt::Block(Vec::new()),
            line: 0,
        }
    }

    #[test]
    fn indices_are_one_based_in_definition_order() {
        let mut table = FunctionTable::new();
        table.define(func("a", &[])).unwrap();
        table.define(func("b", &["x"])).unwrap();
        assert_eq!(table.lookup("a", 0).unwrap(), 1);
        assert_eq!(table.lookup("b", 1).unwrap(), 2);
        assert_eq!(table.max_arity(), 1);
    }

    #[test]
    fn duplicate_function_is_an_error() {
        let mut table = FunctionTable::new();
        table.define(func("a", &[])).unwrap();
        assert!(table.define(func("a", &[])).is_err());
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let mut table = FunctionTable::new();
        table.define(func("a", &["x"])).unwrap();
        assert!(table.lookup("a", 0).is_err());
    }

    #[test]
    fn undefined_function_is_an_error() {
        let table = FunctionTable::new();
        assert!(table.lookup("nope", 0).is_err());
    }

    #[test]
    fn build_registers_nprint() {
        let table = FunctionTable::build(Vec::new()).unwrap();
        assert!(table.lookup("nprint", 1).is_ok());
    }

    #[test]
    fn build_rejects_user_print() {
        let err = FunctionTable::build(vec![func("print", &["x"])]);
        assert!(err.is_err());
    }
}
