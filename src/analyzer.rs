//! Symbol-table construction and semantic checks.
//!
//! A single walk over the tree builds one scope per block, validates every
//! declaration and use against the visibility rules, and records for each
//! block the enclosing-scope identifiers that the block or any of its
//! callees reads or writes. Those free-variable lists later decide the
//! calling convention of lifted procedures, so their order must be stable:
//! they are kept in first-reference order.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, NodeId, Tag};
use crate::error::CompileResult;

/// Index of a scope within the `SymbolTable` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Symbols declared by one block, plus the identifiers it borrows from
/// enclosing blocks.
#[derive(Debug, Default)]
pub struct SymbolScope {
  pub constants: HashMap<String, i32>,
  pub variables: HashSet<String>,
  /// Procedure name to the block node that is its body. Re-registration
  /// overwrites, so the last definition of a name wins.
  pub procedures: HashMap<String, NodeId>,
  /// Identifiers referenced but not declared here, in first-reference
  /// order and free of duplicates.
  pub free_variables: Vec<String>,
  outer: Option<ScopeId>,
}

/// All scopes of one analyzed program. Blocks point into this arena via the
/// `ScopeId` the analyzer attaches to them.
#[derive(Debug)]
pub struct SymbolTable {
  scopes: Vec<SymbolScope>,
}

impl SymbolTable {
  fn new() -> Self {
    Self { scopes: Vec::new() }
  }

  fn push_scope(&mut self, outer: Option<ScopeId>) -> ScopeId {
    let id = ScopeId(self.scopes.len());
    self.scopes.push(SymbolScope {
      outer,
      ..SymbolScope::default()
    });
    id
  }

  pub fn scope(&self, id: ScopeId) -> &SymbolScope {
    &self.scopes[id.0]
  }

  fn scope_mut(&mut self, id: ScopeId) -> &mut SymbolScope {
    &mut self.scopes[id.0]
  }

  /// Whether `ident` names a constant or variable in this scope, extending
  /// outward through the chain when `extend` is set.
  pub fn has_symbol(&self, id: ScopeId, ident: &str, extend: bool) -> bool {
    let scope = self.scope(id);
    if scope.constants.contains_key(ident) || scope.variables.contains(ident) {
      return true;
    }
    match scope.outer {
      Some(outer) if extend => self.has_symbol(outer, ident, true),
      _ => false,
    }
  }

  pub fn has_constant(&self, id: ScopeId, ident: &str) -> bool {
    let scope = self.scope(id);
    if scope.constants.contains_key(ident) {
      return true;
    }
    match scope.outer {
      Some(outer) => self.has_constant(outer, ident),
      None => false,
    }
  }

  pub fn has_variable(&self, id: ScopeId, ident: &str) -> bool {
    let scope = self.scope(id);
    if scope.variables.contains(ident) {
      return true;
    }
    match scope.outer {
      Some(outer) => self.has_variable(outer, ident),
      None => false,
    }
  }

  pub fn has_procedure(&self, id: ScopeId, ident: &str) -> bool {
    let scope = self.scope(id);
    if scope.procedures.contains_key(ident) {
      return true;
    }
    match scope.outer {
      Some(outer) => self.has_procedure(outer, ident),
      None => false,
    }
  }

  /// Resolve a procedure name to its body block through the scope chain.
  pub fn get_procedure(&self, id: ScopeId, ident: &str) -> Option<NodeId> {
    let scope = self.scope(id);
    match scope.procedures.get(ident) {
      Some(&body) => Some(body),
      None => self.get_procedure(scope.outer?, ident),
    }
  }

  fn add_free_variable(&mut self, id: ScopeId, ident: &str) {
    let scope = self.scope_mut(id);
    if !scope.free_variables.iter().any(|free| free == ident) {
      scope.free_variables.push(ident.to_string());
    }
  }
}

/// Build the symbol table for a parsed program, attaching a scope to every
/// block node.
pub fn analyze(ast: &mut Ast) -> CompileResult<SymbolTable> {
  let mut table = SymbolTable::new();
  let root_block = ast.child(ast.root(), 0);
  block(ast, &mut table, root_block, None)?;
  Ok(table)
}

fn block(
  ast: &mut Ast,
  table: &mut SymbolTable,
  id: NodeId,
  outer: Option<ScopeId>,
) -> CompileResult<()> {
  let scope = table.push_scope(outer);
  let sections = ast.children(id).to_vec();
  constants(ast, table, sections[0], scope)?;
  variables(ast, table, sections[1], scope)?;
  procedures(ast, table, sections[2], scope)?;
  walk(ast, table, sections[3], scope)?;

  // Attached only once the whole subtree is analyzed. A call reaching its
  // own procedure early observes an unattached scope and propagates no
  // free variables.
  ast.node_mut(id).scope = Some(scope);
  Ok(())
}

fn constants(
  ast: &mut Ast,
  table: &mut SymbolTable,
  id: NodeId,
  scope: ScopeId,
) -> CompileResult<()> {
  let pairs = ast.children(id).to_vec();
  for pair in pairs.chunks(2) {
    let name = ast.node(pair[0]).token.clone();
    if table.has_symbol(scope, &name, true) {
      return Err(ast.error_at(pair[0], format!("'{name}' is already defined...")));
    }
    let value = ast.number_value(pair[1])?;
    table.scope_mut(scope).constants.insert(name, value);
  }
  Ok(())
}

fn variables(
  ast: &mut Ast,
  table: &mut SymbolTable,
  id: NodeId,
  scope: ScopeId,
) -> CompileResult<()> {
  let names = ast.children(id).to_vec();
  for ident in names {
    let name = ast.node(ident).token.clone();
    if table.has_symbol(scope, &name, true) {
      return Err(ast.error_at(ident, format!("'{name}' is already defined...")));
    }
    table.scope_mut(scope).variables.insert(name);
  }
  Ok(())
}

fn procedures(
  ast: &mut Ast,
  table: &mut SymbolTable,
  id: NodeId,
  scope: ScopeId,
) -> CompileResult<()> {
  let pairs = ast.children(id).to_vec();
  for pair in pairs.chunks(2) {
    let name = ast.node(pair[0]).token.clone();
    let body = pair[1];
    // Registered before the body is analyzed, so a procedure can call
    // earlier siblings but not later ones.
    table.scope_mut(scope).procedures.insert(name, body);
    block(ast, table, body, Some(scope))?;
  }
  Ok(())
}

fn walk(ast: &mut Ast, table: &mut SymbolTable, id: NodeId, scope: ScopeId) -> CompileResult<()> {
  match ast.node(id).tag {
    Tag::Assignment => assignment(ast, table, id, scope),
    Tag::Call => call(ast, table, id, scope),
    Tag::Ident => ident(ast, table, id, scope),
    _ => {
      let children = ast.children(id).to_vec();
      for child in children {
        walk(ast, table, child, scope)?;
      }
      Ok(())
    }
  }
}

fn assignment(
  ast: &mut Ast,
  table: &mut SymbolTable,
  id: NodeId,
  scope: ScopeId,
) -> CompileResult<()> {
  let target = ast.child(id, 0);
  let value = ast.child(id, 1);
  let name = ast.node(target).token.clone();

  if table.has_constant(scope, &name) {
    return Err(ast.error_at(target, format!("cannot modify constant value '{name}'...")));
  }
  if !table.has_variable(scope, &name) {
    return Err(ast.error_at(target, format!("undefined variable '{name}'...")));
  }

  walk(ast, table, value, scope)?;

  if !table.has_symbol(scope, &name, false) {
    table.add_free_variable(scope, &name);
  }
  Ok(())
}

fn call(ast: &mut Ast, table: &mut SymbolTable, id: NodeId, scope: ScopeId) -> CompileResult<()> {
  let target = ast.child(id, 0);
  let name = ast.node(target).token.clone();

  if !table.has_procedure(scope, &name) {
    return Err(ast.error_at(target, format!("undefined procedure '{name}'...")));
  }

  // Everything the callee borrows and the caller does not itself declare
  // becomes a free variable of the caller too.
  if let Some(body) = table.get_procedure(scope, &name)
    && let Some(callee_scope) = ast.node(body).scope
  {
    let borrowed = table.scope(callee_scope).free_variables.clone();
    for free in borrowed {
      if !table.has_symbol(scope, &free, false) {
        table.add_free_variable(scope, &free);
      }
    }
  }
  Ok(())
}

fn ident(ast: &mut Ast, table: &mut SymbolTable, id: NodeId, scope: ScopeId) -> CompileResult<()> {
  let name = ast.node(id).token.clone();
  if !table.has_symbol(scope, &name, true) {
    return Err(ast.error_at(id, format!("undefined variable '{name}'...")));
  }
  if !table.has_symbol(scope, &name, false) {
    table.add_free_variable(scope, &name);
  }
  Ok(())
}
