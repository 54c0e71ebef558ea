//! C5: the dispatch synthesiser. Turns the whole program into one
//! Brainfuck loop that simulates a call stack: each "call" writes a
//! target function index plus a resumption position into a handful of
//! frame cells and jumps the tape head up by a reservation distance;
//! each function body re-walks itself from the top every dispatch
//! iteration, skipping already-executed statements via a position
//! guard, until it reaches the statement that issued the pending call.
//!
//! Transcribed from `examples/original_source/bf_space.cc`'s
//! `BfSpace::generate_dispatch_wrapped_code`/`op_call_function`/
//! `finish_function_call` and `statement.cc`'s anonymous
//! `return_position_condition`/`statement_condition`/
//! `condition_add_return_pos_check` helpers.

use crate::compiler::{parameter_name, Compiler, PRE_CALL_PARAMETER_PREFIX};
use crate::error::CompileError;
use crate::scope::Variable;

/// True while the current statement's position is still within the
/// range that has already run this dispatch iteration.
pub(crate) fn return_position_condition(c: &mut Compiler) -> Result<Variable, CompileError> {
    let return_position = c.get_return_position();
    let calls = c.add_temp_with_value(c.num_function_calls as i64)?;
    c.op_le(return_position, calls)
}

/// The guard every statement runs under: no call is pending, and we
/// haven't yet fast-forwarded past this statement's position.
pub(crate) fn statement_condition(c: &mut Compiler) -> Result<Variable, CompileError> {
    let not_pending = c.get_call_not_pending();
    c.op_and(not_pending, |c| return_position_condition(c))
}

/// Extends `cond` so that a statement also runs if it is currently
/// the one being resumed into — `num_calls` is the number of call
/// sites inside the statement's own subtree; a 0-call statement needs
/// no extension, a 1-call statement only needs to match the single
/// call's position exactly, and a multi-call statement (e.g. a block
/// with several calls) needs a whole range check (,
/// `statement.cc`'s `condition_add_return_pos_check`).
pub(crate) fn condition_add_return_pos_check(
    c: &mut Compiler,
    cond: Variable,
    num_calls: u32,
) -> Result<Variable, CompileError> {
    let current_calls = c.num_function_calls;
    match num_calls {
        0 => Ok(cond),
        1 => c.op_or(cond, move |c| {
            let return_position = c.get_return_position();
            let target = c.add_temp_with_value(current_calls as i64 + 1)?;
            c.op_eq(return_position, target)
        }),
        _ => c.op_or(cond, move |c| {
            let lower_bound = c.add_temp_with_value(current_calls as i64)?;
            let return_position = c.get_return_position();
            let above_lower = c.op_lt(lower_bound, return_position)?;
            c.op_and(above_lower, move |c| {
                let return_position = c.get_return_position();
                let upper_bound = c.add_temp_with_value(current_calls as i64 + num_calls as i64)?;
                c.op_le(return_position, upper_bound)
            })
        }),
    }
}

/// Emits the raw jump-and-register-write sequence for calling `name`
/// with `arguments`. Any temporary argument is first copied into a
/// named pre-call slot, since it must survive the stack-frame jump
/// that follows.
pub(crate) fn op_call_function(
    c: &mut Compiler,
    name: &str,
    mut arguments: Vec<Variable>,
) -> Result<(), CompileError> {
    c.comment(&format!("calling {name}"))?;
    for i in 0..arguments.len() {
        if arguments[i].is_temp() {
            let slot_name = format!("{PRE_CALL_PARAMETER_PREFIX}{i}");
            let named = c.scope.add_or_get(&slot_name, 1)?;
            c.copy(&arguments[i], &named)?;
            arguments[i] = named;
        }
    }

    c.num_function_calls += 1;
    let call_number = c.add_temp_with_value(c.num_function_calls as i64)?;
    let return_position = c.get_return_position();
    c.copy(&call_number, &return_position)?;

    let named_cells_now = c.scope.num_named_cells();
    let max_named_cells = {
        let entry = c
            .max_named_cells_per_callee
            .entry(name.to_string())
            .or_insert(0);
        *entry = (*entry).max(named_cells_now);
        *entry
    };

    let function_index = c.functions.lookup(name, arguments.len())?;

    c.comment("jump up the stackframe: ")?;
    let up: String = std::iter::repeat('>')
        .take(max_named_cells.max(0) as usize)
        .collect();
    if !up.is_empty() {
        c.bf(&up)?;
    }
    for (i, arg) in arguments.iter().enumerate() {
        let source = arg.predecessor(max_named_cells);
        let param = c.get(&parameter_name(i));
        c.copy(&source, &param)?;
    }

    let function_index_value = c.add_temp_with_value(function_index as i64)?;
    let called_function_index = c.get_called_function_index();
    c.copy(&function_index_value, &called_function_index)?;

    let return_position = c.get_return_position();
    c.var(&return_position);
    c.bf("[-]")?;
    let call_not_pending = c.get_call_not_pending();
    c.var(&call_not_pending);
    c.bf("[-]")?;
    Ok(())
}

/// Undoes a callee's stack-frame jump and marks the call as complete
///.
pub(crate) fn finish_function_call(c: &mut Compiler, name: &str) -> Result<(), CompileError> {
    let num_cells = *c.max_named_cells_per_callee.get(name).unwrap_or(&0);
    c.comment("finish the function call by jumping down the stack and set call not pending: ")?;
    let down: String = std::iter::repeat('<').take(num_cells.max(0) as usize).collect();
    if !down.is_empty() {
        c.bf(&down)?;
    }
    let call_not_pending = c.get_call_not_pending();
    c.var(&call_not_pending);
    c.bf("[-]+")?;
    Ok(())
}

/// Wraps the whole program in the single dispatch loop: call `main`,
/// then loop while a call is pending, branching on
/// `__CalledFunctionIndex` to the matching function body.
pub(crate) fn generate_dispatch_wrapped_code(c: &mut Compiler) -> Result<(), CompileError> {
    op_call_function(c, "main", Vec::new())?;
    c.comment("\nfunction loop")?;
    let called_function_index = c.get_called_function_index();
    c.var(&called_function_index);
    c.bf("[")?;
    let call_not_pending = c.get_call_not_pending();
    c.var(&call_not_pending);
    c.bf("[-]+")?;

    {
        let _i = c.emitter.indent();
        let entries: Vec<(u32, String)> = c
            .functions
            .functions()
            .map(|(index, f)| (index, f.name.clone()))
            .collect();
        for (index, name) in entries {
            let function = c.functions.function(&name).expect("registered function").clone();
            let called_function_index = c.get_called_function_index();
            let target_index = c.add_temp_with_value(index as i64)?;
            let cond = c.op_eq(called_function_index, target_index)?;
            c.op_if_then(cond, |c| {
                c.move_to_top();
                c.push_scope(0);
                let _i2 = c.emitter.indent();
                c.comment(&format!("\ndefine {}", describe_function(&function)))?;
                c.num_function_calls = 0;
                crate::lower::lower_function(c, &function)?;
                let call_not_pending = c.get_call_not_pending();
                let name = name.clone();
                c.op_if_then(call_not_pending, move |c| finish_function_call(c, &name))?;
                c.pop_scope();
                Ok(())
            })?;
        }
    }
    let called_function_index = c.get_called_function_index();
    c.var(&called_function_index);
    c.bf("]")?;
    Ok(())
}

fn describe_function(f: &crate::ast::Function) -> String {
    format!("fun {}({})", f.name, f.parameters.join("; "))
}
