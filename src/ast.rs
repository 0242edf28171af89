//! Abstract syntax tree shared by the parser, analyzer and emitter.
//!
//! Nodes are kept in an arena owned by `Ast` and referenced by index, which
//! gives us parent back-links without reference cycles. Every node carries
//! the syntactic rule that produced it, its source position and (for leaf
//! rules) the matched text. Block nodes additionally carry the symbol scope
//! the analyzer attaches to them; everything else about a node is immutable
//! once parsing is done.

use crate::analyzer::ScopeId;
use crate::error::{CompileError, CompileResult};

/// Syntactic category of a node, one per grammar rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
  Program,
  Block,
  Const,
  Var,
  Procedure,
  Statement,
  Assignment,
  Call,
  Statements,
  If,
  While,
  Out,
  Condition,
  Odd,
  Compare,
  CompareOp,
  Expression,
  Sign,
  TermOp,
  Term,
  FactorOp,
  Factor,
  Ident,
  Number,
}

/// Index of a node within its owning `Ast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct Node {
  pub tag: Tag,
  pub line: usize,
  pub column: usize,
  /// Matched text for leaf rules (identifiers, numbers, signs, operators);
  /// empty for interior nodes.
  pub token: String,
  pub children: Vec<NodeId>,
  pub parent: Option<NodeId>,
  /// Attached by the analyzer, on `Block` nodes only.
  pub scope: Option<ScopeId>,
}

#[derive(Debug)]
pub struct Ast {
  path: String,
  nodes: Vec<Node>,
  root: NodeId,
}

impl Ast {
  pub(crate) fn new(path: impl Into<String>, nodes: Vec<Node>, root: NodeId) -> Self {
    Self {
      path: path.into(),
      nodes,
      root,
    }
  }

  /// Source path this tree was parsed from, used in diagnostics.
  pub fn path(&self) -> &str {
    &self.path
  }

  /// The `Program` node.
  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id.0]
  }

  pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.0]
  }

  pub fn children(&self, id: NodeId) -> &[NodeId] {
    &self.nodes[id.0].children
  }

  pub fn child(&self, id: NodeId, index: usize) -> NodeId {
    self.nodes[id.0].children[index]
  }

  /// The scope governing a non-block node: walk parent links upward until a
  /// block is reached and return the scope attached to it.
  pub fn closest_scope(&self, id: NodeId) -> Option<ScopeId> {
    let mut current = self.node(id).parent;
    while let Some(parent) = current {
      let node = self.node(parent);
      if node.tag == Tag::Block {
        return node.scope;
      }
      current = node.parent;
    }
    None
  }

  /// Construct a diagnostic anchored at a node's source position.
  pub fn error_at(&self, id: NodeId, message: impl Into<String>) -> CompileError {
    let node = self.node(id);
    CompileError::at(&self.path, node.line, node.column, message)
  }

  /// Convert a `Number` leaf's token to its value.
  pub fn number_value(&self, id: NodeId) -> CompileResult<i32> {
    let node = self.node(id);
    node
      .token
      .parse::<i32>()
      .map_err(|_| self.error_at(id, format!("invalid number literal '{}'", node.token)))
  }
}
