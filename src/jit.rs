//! Code generation: lower the analyzed tree into LLVM IR and run it.
//!
//! Every block's constants and variables become named `alloca` cells, and
//! every procedure becomes a flat function taking one pointer parameter per
//! free variable of its block, named after the identifier. All identifier
//! resolution goes through a per-function name-to-cell map, so locals,
//! materialised constants and borrowed outer cells read and write through
//! the same path. A `main` wrapper runs the program body under a landing
//! pad so that a divide-by-zero thrown inside generated code surfaces as a
//! printed message instead of tearing down the host.

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::targets::{InitializationConfig, Target};
use inkwell::types::{BasicMetadataTypeEnum, FunctionType};
use inkwell::values::{
  BasicMetadataValueEnum, BasicValueEnum, FunctionValue, GlobalValue, IntValue, PointerValue,
};
use inkwell::{AddressSpace, IntPredicate, OptimizationLevel};

use crate::analyzer::SymbolTable;
use crate::ast::{Ast, NodeId, Tag};
use crate::error::{CompileError, CompileResult};

/// Compile an analyzed program and execute its `main` in process.
pub(crate) fn run(ast: &Ast, symbols: &SymbolTable) -> CompileResult<()> {
  let context = Context::create();
  let mut jit = JitCompiler::new(&context);
  jit.compile(ast, symbols)?;
  jit.exec()
}

#[derive(Debug)]
struct JitCompiler<'ctx> {
  context: &'ctx Context,
  module: Module<'ctx>,
  builder: Builder<'ctx>,
  /// External reference to the C++ type info for `const char *`. The throw
  /// sites and the landing pad must agree on this tag for the payload to be
  /// recovered as a string.
  tyinfo: GlobalValue<'ctx>,
  /// Name-to-cell map for the function currently being emitted. Holds the
  /// allocas of constants and variables plus the pointer parameters that
  /// carry free variables.
  values: HashMap<String, PointerValue<'ctx>>,
  /// Body block to lifted function, so call sites resolve the exact
  /// function even when procedure names repeat across scopes.
  functions: HashMap<NodeId, FunctionValue<'ctx>>,
}

impl<'ctx> JitCompiler<'ctx> {
  fn new(context: &'ctx Context) -> Self {
    let module = context.create_module("pl0");
    let builder = context.create_builder();

    let ptr_type = context.i8_type().ptr_type(AddressSpace::default());
    let tyinfo = module.add_global(ptr_type, None, "_ZTIPKc");
    tyinfo.set_linkage(Linkage::External);
    tyinfo.set_constant(true);

    Self {
      context,
      module,
      builder,
      tyinfo,
      values: HashMap::new(),
      functions: HashMap::new(),
    }
  }

  fn compile(&mut self, ast: &Ast, symbols: &SymbolTable) -> CompileResult<()> {
    Target::initialize_native(&InitializationConfig::default()).map_err(CompileError::backend)?;
    self.compile_libs()?;
    self.compile_program(ast, symbols)
  }

  fn exec(self) -> CompileResult<()> {
    if let Err(message) = self.module.verify() {
      return Err(CompileError::backend(format!(
        "module verification failed: {message}"
      )));
    }

    let engine = self
      .module
      .create_jit_execution_engine(OptimizationLevel::None)
      .map_err(|message| CompileError::backend(message.to_string()))?;
    let main = self
      .module
      .get_function("main")
      .ok_or_else(|| CompileError::backend("main function is missing"))?;

    unsafe {
      engine.run_function(main, &[]);
    }
    Ok(())
  }

  // ----- Runtime prelude and wrapper -----

  /// Emit the `out` intrinsic: print a 32-bit value through `printf`.
  fn compile_libs(&mut self) -> CompileResult<()> {
    let void = self.context.void_type();
    let i32_type = self.context.i32_type();
    let ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());

    let out_fn = self
      .module
      .add_function("out", void.fn_type(&[i32_type.into()], false), None);
    let entry = self.context.append_basic_block(out_fn, "entry");
    self.builder.position_at_end(entry);

    let printf =
      self.get_or_insert_function("printf", i32_type.fn_type(&[ptr_type.into()], true));
    let format = self.builder.build_global_string_ptr("%d\n", ".printf.fmt")?;
    let value = out_fn
      .get_nth_param(0)
      .ok_or_else(|| CompileError::backend("out intrinsic lost its parameter"))?;
    self
      .builder
      .build_call(printf, &[format.as_pointer_value().into(), value.into()], "")?;
    self.builder.build_return(None)?;
    Ok(())
  }

  /// Emit `__pl0_start` holding the program body, then the `main` wrapper
  /// that invokes it under a landing pad keyed on the string type tag.
  fn compile_program(&mut self, ast: &Ast, symbols: &SymbolTable) -> CompileResult<()> {
    let void = self.context.void_type();
    let i32_type = self.context.i32_type();
    let ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());

    let start_fn = self
      .module
      .add_function("__pl0_start", void.fn_type(&[], false), None);
    let entry = self.context.append_basic_block(start_fn, "entry");
    self.builder.position_at_end(entry);
    let root_block = ast.child(ast.root(), 0);
    self.compile_block(ast, symbols, root_block)?;
    self.builder.build_return(None)?;

    let main_fn = self
      .module
      .add_function("main", void.fn_type(&[], false), None);
    let personality =
      self.get_or_insert_function("__gxx_personality_v0", i32_type.fn_type(&[], true));
    main_fn.set_personality_function(personality);

    let entry = self.context.append_basic_block(main_fn, "entry");
    let lpad = self.context.append_basic_block(main_fn, "lpad");
    let catch_with_message = self.context.append_basic_block(main_fn, "catch_with_message");
    let catch_unknown = self.context.append_basic_block(main_fn, "catch_unknown");
    let end = self.context.append_basic_block(main_fn, "end");

    self.builder.position_at_end(entry);
    self.builder.build_invoke(start_fn, &[], end, lpad, "")?;

    self.builder.position_at_end(lpad);
    let exception_type = self
      .context
      .struct_type(&[ptr_type.into(), i32_type.into()], false);
    let exception = self.builder.build_landing_pad(
      exception_type,
      personality,
      &[self.tyinfo.as_pointer_value().into()],
      false,
      "exc",
    )?;
    let exception = exception.into_struct_value();
    let payload = self
      .builder
      .build_extract_value(exception, 0, "exc.ptr")?
      .into_pointer_value();
    let selector = self
      .builder
      .build_extract_value(exception, 1, "exc.sel")?
      .into_int_value();

    let typeid_fn = self.get_or_insert_function(
      "llvm.eh.typeid.for",
      i32_type.fn_type(&[ptr_type.into()], false),
    );
    let type_id = self
      .call_value(typeid_fn, &[self.tyinfo.as_pointer_value().into()], "tid.int")?
      .into_int_value();
    let matches =
      self
        .builder
        .build_int_compare(IntPredicate::EQ, selector, type_id, "tst.int")?;
    self
      .builder
      .build_conditional_branch(matches, catch_with_message, catch_unknown)?;

    let begin_catch =
      self.get_or_insert_function("__cxa_begin_catch", ptr_type.fn_type(&[ptr_type.into()], false));
    let end_catch = self.get_or_insert_function("__cxa_end_catch", void.fn_type(&[], false));
    let puts = self.get_or_insert_function("puts", i32_type.fn_type(&[ptr_type.into()], false));

    // The payload of a matched throw is the message C string itself.
    self.builder.position_at_end(catch_with_message);
    let message = self.call_value(begin_catch, &[payload.into()], "str")?;
    self.builder.build_call(puts, &[message.into()], "")?;
    self.builder.build_call(end_catch, &[], "")?;
    self.builder.build_unconditional_branch(end)?;

    self.builder.position_at_end(catch_unknown);
    self.builder.build_call(begin_catch, &[payload.into()], "")?;
    let unknown = self
      .builder
      .build_global_string_ptr("unknown error...", ".str.unknown")?;
    self
      .builder
      .build_call(puts, &[unknown.as_pointer_value().into()], "")?;
    self.builder.build_call(end_catch, &[], "")?;
    self.builder.build_unconditional_branch(end)?;

    self.builder.position_at_end(end);
    self.builder.build_return(None)?;
    Ok(())
  }

  // ----- Block emission -----

  fn compile_block(&mut self, ast: &Ast, symbols: &SymbolTable, id: NodeId) -> CompileResult<()> {
    self.compile_const(ast, ast.child(id, 0))?;
    self.compile_var(ast, ast.child(id, 1))?;
    self.compile_procedure(ast, symbols, ast.child(id, 2))?;
    self.compile_statement(ast, symbols, ast.child(id, 3))
  }

  /// Constants are materialised as initialised stack cells so that reads go
  /// through the same name lookup as variables.
  fn compile_const(&mut self, ast: &Ast, id: NodeId) -> CompileResult<()> {
    let i32_type = self.context.i32_type();
    for pair in ast.children(id).chunks(2) {
      let name = &ast.node(pair[0]).token;
      let value = ast.number_value(pair[1])?;

      let cell = self.builder.build_alloca(i32_type, name)?;
      self
        .builder
        .build_store(cell, i32_type.const_int(value as u64, false))?;
      self.values.insert(name.clone(), cell);
    }
    Ok(())
  }

  fn compile_var(&mut self, ast: &Ast, id: NodeId) -> CompileResult<()> {
    let i32_type = self.context.i32_type();
    for &ident in ast.children(id) {
      let name = &ast.node(ident).token;
      let cell = self.builder.build_alloca(i32_type, name)?;
      self.values.insert(name.clone(), cell);
    }
    Ok(())
  }

  /// Lift each procedure into a flat function with one pointer parameter
  /// per free variable, in the recorded order, each named after its
  /// identifier. The surrounding emission cursor and value environment are
  /// restored afterwards, so nesting never disturbs the caller.
  fn compile_procedure(
    &mut self,
    ast: &Ast,
    symbols: &SymbolTable,
    id: NodeId,
  ) -> CompileResult<()> {
    let void = self.context.void_type();
    let ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());

    for pair in ast.children(id).chunks(2) {
      let name = &ast.node(pair[0]).token;
      let body = pair[1];
      let scope = ast
        .node(body)
        .scope
        .ok_or_else(|| CompileError::backend("procedure block was not analyzed"))?;
      let free = &symbols.scope(scope).free_variables;

      let params: Vec<BasicMetadataTypeEnum> = free.iter().map(|_| ptr_type.into()).collect();
      let function = self
        .module
        .add_function(name, void.fn_type(&params, false), None);
      self.functions.insert(body, function);

      let previous = self.builder.get_insert_block();
      let saved = std::mem::take(&mut self.values);
      for (param, free_name) in function.get_param_iter().zip(free) {
        let cell = param.into_pointer_value();
        cell.set_name(free_name);
        self.values.insert(free_name.clone(), cell);
      }

      let entry = self.context.append_basic_block(function, "entry");
      self.builder.position_at_end(entry);
      self.compile_block(ast, symbols, body)?;
      self.builder.build_return(None)?;

      self.values = saved;
      if let Some(previous) = previous {
        self.builder.position_at_end(previous);
      }
    }
    Ok(())
  }

  // ----- Statement lowering -----

  fn compile_statement(
    &mut self,
    ast: &Ast,
    symbols: &SymbolTable,
    id: NodeId,
  ) -> CompileResult<()> {
    if let Some(&child) = ast.children(id).first() {
      self.compile_switch(ast, symbols, child)?;
    }
    Ok(())
  }

  fn compile_switch(&mut self, ast: &Ast, symbols: &SymbolTable, id: NodeId) -> CompileResult<()> {
    match ast.node(id).tag {
      Tag::Assignment => self.compile_assignment(ast, id),
      Tag::Call => self.compile_call(ast, symbols, id),
      Tag::Statements => self.compile_statements(ast, symbols, id),
      Tag::If => self.compile_if(ast, symbols, id),
      Tag::While => self.compile_while(ast, symbols, id),
      Tag::Out => self.compile_out(ast, id),
      _ => self.compile_switch(ast, symbols, ast.child(id, 0)),
    }
  }

  fn compile_assignment(&mut self, ast: &Ast, id: NodeId) -> CompileResult<()> {
    let target = ast.child(id, 0);
    let name = &ast.node(target).token;
    let cell = self
      .values
      .get(name)
      .copied()
      .ok_or_else(|| ast.error_at(id, format!("'{name}' is not defined...")))?;

    let value = self.compile_expression(ast, ast.child(id, 1))?;
    self.builder.build_store(cell, value)?;
    Ok(())
  }

  /// Pass a cell, not a loaded value, for each free variable of the callee,
  /// in the callee's recorded order.
  fn compile_call(&mut self, ast: &Ast, symbols: &SymbolTable, id: NodeId) -> CompileResult<()> {
    let target = ast.child(id, 0);
    let name = &ast.node(target).token;

    let scope = ast
      .closest_scope(id)
      .ok_or_else(|| CompileError::backend("call site has no enclosing block"))?;
    let body = symbols
      .get_procedure(scope, name)
      .ok_or_else(|| ast.error_at(target, format!("undefined procedure '{name}'...")))?;
    let callee_scope = ast
      .node(body)
      .scope
      .ok_or_else(|| CompileError::backend("procedure block was not analyzed"))?;

    let mut args: Vec<BasicMetadataValueEnum> = Vec::new();
    for free in &symbols.scope(callee_scope).free_variables {
      let cell = self
        .values
        .get(free)
        .copied()
        .ok_or_else(|| ast.error_at(id, format!("'{free}' is not defined...")))?;
      args.push(cell.into());
    }

    let function = self
      .functions
      .get(&body)
      .copied()
      .ok_or_else(|| CompileError::backend(format!("procedure '{name}' was never emitted")))?;
    self.builder.build_call(function, &args, "")?;
    Ok(())
  }

  fn compile_statements(
    &mut self,
    ast: &Ast,
    symbols: &SymbolTable,
    id: NodeId,
  ) -> CompileResult<()> {
    for &statement in ast.children(id) {
      self.compile_statement(ast, symbols, statement)?;
    }
    Ok(())
  }

  fn compile_if(&mut self, ast: &Ast, symbols: &SymbolTable, id: NodeId) -> CompileResult<()> {
    let condition = self.compile_condition(ast, ast.child(id, 0))?;

    let function = self.current_function()?;
    let then_block = self.context.append_basic_block(function, "if.then");
    let end_block = self.context.append_basic_block(function, "if.end");
    self
      .builder
      .build_conditional_branch(condition, then_block, end_block)?;

    self.builder.position_at_end(then_block);
    self.compile_statement(ast, symbols, ast.child(id, 1))?;
    self.builder.build_unconditional_branch(end_block)?;

    self.builder.position_at_end(end_block);
    Ok(())
  }

  fn compile_while(&mut self, ast: &Ast, symbols: &SymbolTable, id: NodeId) -> CompileResult<()> {
    let function = self.current_function()?;
    let cond_block = self.context.append_basic_block(function, "while.cond");
    self.builder.build_unconditional_branch(cond_block)?;

    self.builder.position_at_end(cond_block);
    let condition = self.compile_condition(ast, ast.child(id, 0))?;

    let body_block = self.context.append_basic_block(function, "while.body");
    let end_block = self.context.append_basic_block(function, "while.end");
    self
      .builder
      .build_conditional_branch(condition, body_block, end_block)?;

    self.builder.position_at_end(body_block);
    self.compile_statement(ast, symbols, ast.child(id, 1))?;
    self.builder.build_unconditional_branch(cond_block)?;

    self.builder.position_at_end(end_block);
    Ok(())
  }

  fn compile_out(&mut self, ast: &Ast, id: NodeId) -> CompileResult<()> {
    let value = self.compile_expression(ast, ast.child(id, 0))?;
    let out = self
      .module
      .get_function("out")
      .ok_or_else(|| CompileError::backend("out intrinsic is missing"))?;
    self.builder.build_call(out, &[value.into()], "")?;
    Ok(())
  }

  // ----- Conditions and expressions -----

  fn compile_switch_value(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    match ast.node(id).tag {
      Tag::Odd => self.compile_odd(ast, id),
      Tag::Compare => self.compile_compare(ast, id),
      Tag::Expression => self.compile_expression(ast, id),
      Tag::Ident => self.compile_ident(ast, id),
      Tag::Number => self.compile_number(ast, id),
      _ => self.compile_switch_value(ast, ast.child(id, 0)),
    }
  }

  fn compile_condition(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    self.compile_switch_value(ast, ast.child(id, 0))
  }

  // `odd e` compares the whole value against zero.
  fn compile_odd(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let value = self.compile_expression(ast, ast.child(id, 0))?;
    let zero = self.context.i32_type().const_int(0, false);
    Ok(
      self
        .builder
        .build_int_compare(IntPredicate::NE, value, zero, "icmpne")?,
    )
  }

  fn compile_compare(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let lhs = self.compile_expression(ast, ast.child(id, 0))?;
    let rhs = self.compile_expression(ast, ast.child(id, 2))?;

    let op_node = ast.child(id, 1);
    let compared = match ast.node(op_node).token.as_str() {
      "=" => self
        .builder
        .build_int_compare(IntPredicate::EQ, lhs, rhs, "icmpeq")?,
      "#" => self
        .builder
        .build_int_compare(IntPredicate::NE, lhs, rhs, "icmpne")?,
      "<" => self
        .builder
        .build_int_compare(IntPredicate::SLT, lhs, rhs, "icmpslt")?,
      "<=" => self
        .builder
        .build_int_compare(IntPredicate::SLE, lhs, rhs, "icmpsle")?,
      ">" => self
        .builder
        .build_int_compare(IntPredicate::SGT, lhs, rhs, "icmpsgt")?,
      ">=" => self
        .builder
        .build_int_compare(IntPredicate::SGE, lhs, rhs, "icmpsge")?,
      other => {
        return Err(ast.error_at(op_node, format!("invalid comparison operator '{other}'")));
      }
    };
    Ok(compared)
  }

  fn compile_expression(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let children = ast.children(id);

    let sign = &ast.node(children[0]).token;
    let negative = !(sign.is_empty() || sign == "+");

    let mut value = self.compile_term(ast, children[1])?;
    if negative {
      value = self.builder.build_int_neg(value, "negative")?;
    }

    let mut i = 2;
    while i < children.len() {
      let op_node = children[i];
      let rhs = self.compile_term(ast, children[i + 1])?;
      value = match ast.node(op_node).token.as_str() {
        "+" => self.builder.build_int_add(value, rhs, "add")?,
        "-" => self.builder.build_int_sub(value, rhs, "sub")?,
        other => {
          return Err(ast.error_at(op_node, format!("invalid operator '{other}'")));
        }
      };
      i += 2;
    }
    Ok(value)
  }

  fn compile_term(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let children = ast.children(id);
    let mut value = self.compile_factor(ast, children[0])?;

    let mut i = 1;
    while i < children.len() {
      let op_node = children[i];
      let rhs = self.compile_switch_value(ast, children[i + 1])?;
      match ast.node(op_node).token.as_str() {
        "*" => {
          value = self.builder.build_int_mul(value, rhs, "mul")?;
        }
        "/" => {
          // The divisor is checked before any division is issued; the rest
          // of the term continues in the non-zero block.
          let zero = self.context.i32_type().const_int(0, false);
          let is_zero = self
            .builder
            .build_int_compare(IntPredicate::EQ, rhs, zero, "icmpeq")?;

          let function = self.current_function()?;
          let zero_block = self.context.append_basic_block(function, "zdiv.zero");
          let non_zero_block = self.context.append_basic_block(function, "zdiv.non_zero");
          self
            .builder
            .build_conditional_branch(is_zero, zero_block, non_zero_block)?;

          self.builder.position_at_end(zero_block);
          self.compile_zero_divide_throw()?;
          self.builder.build_unreachable()?;

          self.builder.position_at_end(non_zero_block);
          value = self.builder.build_int_signed_div(value, rhs, "div")?;
        }
        other => {
          return Err(ast.error_at(op_node, format!("invalid operator '{other}'")));
        }
      }
      i += 2;
    }
    Ok(value)
  }

  /// Allocate an exception slot, point it at the message string and throw
  /// it with the string type tag, so the top-level landing pad can print it.
  fn compile_zero_divide_throw(&mut self) -> CompileResult<()> {
    let void = self.context.void_type();
    let i64_type = self.context.i64_type();
    let ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());

    let allocate = self.get_or_insert_function(
      "__cxa_allocate_exception",
      ptr_type.fn_type(&[i64_type.into()], false),
    );
    let exception = self
      .call_value(allocate, &[i64_type.const_int(8, false).into()], "eh")?
      .into_pointer_value();

    let message = self
      .builder
      .build_global_string_ptr("divide by 0", ".str.zero_divide")?;
    self
      .builder
      .build_store(exception, message.as_pointer_value())?;

    let throw_fn = self.get_or_insert_function(
      "__cxa_throw",
      void.fn_type(&[ptr_type.into(), ptr_type.into(), ptr_type.into()], false),
    );
    self.builder.build_call(
      throw_fn,
      &[
        exception.into(),
        self.tyinfo.as_pointer_value().into(),
        ptr_type.const_null().into(),
      ],
      "",
    )?;
    Ok(())
  }

  fn compile_factor(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    self.compile_switch_value(ast, ast.child(id, 0))
  }

  fn compile_ident(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let name = &ast.node(id).token;
    let cell = self
      .values
      .get(name)
      .copied()
      .ok_or_else(|| ast.error_at(id, format!("'{name}' is not defined...")))?;
    Ok(
      self
        .builder
        .build_load(cell, "")?
        .into_int_value(),
    )
  }

  fn compile_number(&mut self, ast: &Ast, id: NodeId) -> CompileResult<IntValue<'ctx>> {
    let value = ast.number_value(id)?;
    Ok(self.context.i32_type().const_int(value as u64, false))
  }

  // ----- Helpers -----

  fn get_or_insert_function(&self, name: &str, ty: FunctionType<'ctx>) -> FunctionValue<'ctx> {
    self
      .module
      .get_function(name)
      .unwrap_or_else(|| self.module.add_function(name, ty, None))
  }

  /// Call a function that must produce a value.
  fn call_value(
    &self,
    function: FunctionValue<'ctx>,
    args: &[BasicMetadataValueEnum<'ctx>],
    name: &str,
  ) -> CompileResult<BasicValueEnum<'ctx>> {
    let site = self.builder.build_call(function, args, name)?;
    site.try_as_basic_value().left().ok_or_else(|| {
      CompileError::backend(format!(
        "call to '{}' produced no value",
        function.get_name().to_string_lossy()
      ))
    })
  }

  fn current_function(&self) -> CompileResult<FunctionValue<'ctx>> {
    self
      .builder
      .get_insert_block()
      .and_then(|block| block.get_parent())
      .ok_or_else(|| CompileError::backend("builder is not positioned inside a function"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::analyze;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn try_compile<'ctx>(
    context: &'ctx Context,
    source: &str,
  ) -> CompileResult<JitCompiler<'ctx>> {
    let tokens = tokenize(source, "test.pl0")?;
    let mut ast = parse(tokens, source, "test.pl0")?;
    let symbols = analyze(&mut ast)?;
    let mut jit = JitCompiler::new(context);
    jit.compile(&ast, &symbols)?;
    Ok(jit)
  }

  fn compile_source<'ctx>(context: &'ctx Context, source: &str) -> JitCompiler<'ctx> {
    try_compile(context, source).unwrap()
  }

  #[test]
  fn compile_emits_runtime_and_wrapper() {
    let context = Context::create();
    let jit = compile_source(&context, "var x; begin x := 7; ! x end.");
    assert!(jit.module.get_function("out").is_some());
    assert!(jit.module.get_function("__pl0_start").is_some());
    assert!(jit.module.get_function("main").is_some());
    assert!(jit.module.verify().is_ok());
  }

  #[test]
  fn lifted_procedure_takes_named_pointer_parameters() {
    let context = Context::create();
    let source = "\
var x, y;
procedure bump;
begin x := x + y end;
begin x := 1; y := 2; call bump end.";
    let jit = compile_source(&context, source);

    let bump = jit.module.get_function("bump").unwrap();
    assert_eq!(bump.count_params(), 2);
    let names: Vec<String> = bump
      .get_param_iter()
      .map(|param| {
        param
          .into_pointer_value()
          .get_name()
          .to_string_lossy()
          .into_owned()
      })
      .collect();
    assert_eq!(names, vec!["x", "y"]);
    assert!(jit.module.verify().is_ok());
  }

  #[test]
  fn divide_site_branches_before_dividing() {
    let context = Context::create();
    let jit = compile_source(&context, "var a; begin a := 0; ! 10 / a end.");
    let ir = jit.module.print_to_string().to_string();
    assert!(ir.contains("zdiv.zero"));
    assert!(ir.contains("zdiv.non_zero"));
    assert!(ir.contains("__cxa_throw"));
    assert!(ir.contains("divide by 0"));
    assert!(jit.module.verify().is_ok());
  }

  #[test]
  fn stale_procedure_reference_fails_emission() {
    // `q` was analyzed against the first `p`, but the call site resolves
    // the second `p`, whose borrowed cell `y` never reached `q`'s
    // parameter list.
    let context = Context::create();
    let source = "\
var x, y;
procedure p; begin x := 1 end;
procedure q; begin call p end;
procedure p; begin y := 1 end;
begin call q end.";
    let err = try_compile(&context, source).unwrap_err();
    assert!(err.to_string().contains("'y' is not defined..."));
  }

  #[test]
  fn exec_runs_simple_program() {
    let context = Context::create();
    let jit = compile_source(&context, "var x; begin x := 7; ! x end.");
    jit.exec().unwrap();
  }

  #[test]
  fn exec_contains_divide_by_zero() {
    let context = Context::create();
    let jit = compile_source(&context, "var a; begin a := 0; ! 10 / a end.");
    // The throw is caught by the generated landing pad, so execution
    // finishes normally from the host's point of view.
    jit.exec().unwrap();
  }
}
