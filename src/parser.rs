//! Recursive-descent parser producing the rule-shaped syntax tree.
//!
//! One function per grammar rule, descending over a thin cursor on the token
//! vector. The tree keeps the full rule structure rather than collapsing
//! single-child nodes: a block always has exactly four children (const, var,
//! procedure, statement) even when the declaration sections are empty, and
//! an expression always starts with a sign leaf. Later passes index children
//! positionally and rely on that shape.

use crate::ast::{Ast, Node, NodeId, Tag};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Parse a token vector into a syntax tree rooted at a `Program` node.
pub fn parse(tokens: Vec<Token>, source: &str, path: &str) -> CompileResult<Ast> {
  let mut parser = Parser {
    stream: TokenStream::new(tokens, source, path),
    nodes: Vec::new(),
  };

  let root = parser.program()?;
  Ok(Ast::new(path, parser.nodes, root))
}

struct Parser<'a> {
  stream: TokenStream<'a>,
  nodes: Vec<Node>,
}

impl Parser<'_> {
  /// Allocate a node, wiring the parent back-links of its children.
  fn new_node(
    &mut self,
    tag: Tag,
    line: usize,
    column: usize,
    token: String,
    children: Vec<NodeId>,
  ) -> NodeId {
    let id = NodeId(self.nodes.len());
    for &child in &children {
      self.nodes[child.0].parent = Some(id);
    }
    self.nodes.push(Node {
      tag,
      line,
      column,
      token,
      children,
      parent: None,
      scope: None,
    });
    id
  }

  fn leaf(&mut self, tag: Tag, line: usize, column: usize, token: impl Into<String>) -> NodeId {
    self.new_node(tag, line, column, token.into(), Vec::new())
  }

  // program <- block '.'
  fn program(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let block = self.block()?;
    self.stream.skip(".")?;
    self.stream.expect_eof()?;
    Ok(self.new_node(Tag::Program, line, column, String::new(), vec![block]))
  }

  // block <- const var procedure statement
  fn block(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let constants = self.const_section()?;
    let variables = self.var_section()?;
    let procedures = self.procedure_section()?;
    let statement = self.statement()?;
    Ok(self.new_node(
      Tag::Block,
      line,
      column,
      String::new(),
      vec![constants, variables, procedures, statement],
    ))
  }

  // ----- Declaration sections -----

  // const <- ('const' ident '=' number (',' ident '=' number)* ';')?
  fn const_section(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let mut children = Vec::new();
    if self.stream.equal("const") {
      loop {
        children.push(self.ident()?);
        self.stream.skip("=")?;
        children.push(self.number()?);
        if self.stream.equal(",") {
          continue;
        }
        break;
      }
      self.stream.skip(";")?;
    }
    Ok(self.new_node(Tag::Const, line, column, String::new(), children))
  }

  // var <- ('var' ident (',' ident)* ';')?
  fn var_section(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let mut children = Vec::new();
    if self.stream.equal("var") {
      loop {
        children.push(self.ident()?);
        if self.stream.equal(",") {
          continue;
        }
        break;
      }
      self.stream.skip(";")?;
    }
    Ok(self.new_node(Tag::Var, line, column, String::new(), children))
  }

  // procedure <- ('procedure' ident ';' block ';')*
  fn procedure_section(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let mut children = Vec::new();
    while self.stream.equal("procedure") {
      children.push(self.ident()?);
      self.stream.skip(";")?;
      children.push(self.block()?);
      self.stream.skip(";")?;
    }
    Ok(self.new_node(Tag::Procedure, line, column, String::new(), children))
  }

  // ----- Statements -----

  // statement <- (assignment / call / statements / if / while / out)?
  fn statement(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let mut children = Vec::new();
    if self.stream.peek_ident() {
      children.push(self.assignment()?);
    } else if self.stream.peek_is("call") {
      children.push(self.call()?);
    } else if self.stream.peek_is("begin") {
      children.push(self.statements()?);
    } else if self.stream.peek_is("if") {
      children.push(self.if_statement()?);
    } else if self.stream.peek_is("while") {
      children.push(self.while_statement()?);
    } else if self.stream.peek_is("!") {
      children.push(self.out()?);
    }
    Ok(self.new_node(Tag::Statement, line, column, String::new(), children))
  }

  // assignment <- ident ':=' expression
  fn assignment(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let target = self.ident()?;
    self.stream.skip(":=")?;
    let value = self.expression()?;
    Ok(self.new_node(
      Tag::Assignment,
      line,
      column,
      String::new(),
      vec![target, value],
    ))
  }

  // call <- 'call' ident
  fn call(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("call")?;
    let target = self.ident()?;
    Ok(self.new_node(Tag::Call, line, column, String::new(), vec![target]))
  }

  // statements <- 'begin' statement (';' statement)* 'end'
  fn statements(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("begin")?;
    let mut children = vec![self.statement()?];
    while self.stream.equal(";") {
      children.push(self.statement()?);
    }
    self.stream.skip("end")?;
    Ok(self.new_node(Tag::Statements, line, column, String::new(), children))
  }

  // if <- 'if' condition 'then' statement
  fn if_statement(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("if")?;
    let condition = self.condition()?;
    self.stream.skip("then")?;
    let body = self.statement()?;
    Ok(self.new_node(Tag::If, line, column, String::new(), vec![condition, body]))
  }

  // while <- 'while' condition 'do' statement
  fn while_statement(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("while")?;
    let condition = self.condition()?;
    self.stream.skip("do")?;
    let body = self.statement()?;
    Ok(self.new_node(Tag::While, line, column, String::new(), vec![condition, body]))
  }

  // out <- '!' expression
  fn out(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("!")?;
    let value = self.expression()?;
    Ok(self.new_node(Tag::Out, line, column, String::new(), vec![value]))
  }

  // ----- Conditions -----

  // condition <- odd / compare
  fn condition(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let child = if self.stream.peek_is("odd") {
      self.odd()?
    } else {
      self.compare()?
    };
    Ok(self.new_node(
      Tag::Condition,
      line,
      column,
      String::new(),
      vec![child],
    ))
  }

  // odd <- 'odd' expression
  fn odd(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    self.stream.skip("odd")?;
    let value = self.expression()?;
    Ok(self.new_node(Tag::Odd, line, column, String::new(), vec![value]))
  }

  // compare <- expression compare_op expression
  fn compare(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let lhs = self.expression()?;
    let op = self.compare_op()?;
    let rhs = self.expression()?;
    Ok(self.new_node(
      Tag::Compare,
      line,
      column,
      String::new(),
      vec![lhs, op, rhs],
    ))
  }

  // compare_op <- '=' / '#' / '<=' / '<' / '>=' / '>'
  fn compare_op(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    for op in ["=", "#", "<=", "<", ">=", ">"] {
      if self.stream.equal(op) {
        return Ok(self.leaf(Tag::CompareOp, line, column, op));
      }
    }
    Err(self.stream.error_here("expected a comparison operator"))
  }

  // ----- Expressions -----

  // expression <- sign term (term_op term)*
  fn expression(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let sign_text = if self.stream.equal("+") {
      "+"
    } else if self.stream.equal("-") {
      "-"
    } else {
      ""
    };
    let sign = self.leaf(Tag::Sign, line, column, sign_text);

    let mut children = vec![sign, self.term()?];
    loop {
      let (op_line, op_column) = self.stream.position();
      let op = if self.stream.equal("+") {
        "+"
      } else if self.stream.equal("-") {
        "-"
      } else {
        break;
      };
      children.push(self.leaf(Tag::TermOp, op_line, op_column, op));
      children.push(self.term()?);
    }
    Ok(self.new_node(Tag::Expression, line, column, String::new(), children))
  }

  // term <- factor (factor_op factor)*
  fn term(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let mut children = vec![self.factor()?];
    loop {
      let (op_line, op_column) = self.stream.position();
      let op = if self.stream.equal("*") {
        "*"
      } else if self.stream.equal("/") {
        "/"
      } else {
        break;
      };
      children.push(self.leaf(Tag::FactorOp, op_line, op_column, op));
      children.push(self.factor()?);
    }
    Ok(self.new_node(Tag::Term, line, column, String::new(), children))
  }

  // factor <- ident / number / '(' expression ')'
  fn factor(&mut self) -> CompileResult<NodeId> {
    let (line, column) = self.stream.position();
    let child = if self.stream.peek_ident() {
      self.ident()?
    } else if self.stream.peek_number() {
      self.number()?
    } else if self.stream.equal("(") {
      let inner = self.expression()?;
      self.stream.skip(")")?;
      inner
    } else {
      return Err(
        self
          .stream
          .error_here("expected an identifier, a number or '('"),
      );
    };
    Ok(self.new_node(Tag::Factor, line, column, String::new(), vec![child]))
  }

  // ----- Leaves -----

  fn ident(&mut self) -> CompileResult<NodeId> {
    let (text, line, column) = self.stream.get_ident()?;
    Ok(self.leaf(Tag::Ident, line, column, text))
  }

  fn number(&mut self) -> CompileResult<NodeId> {
    let (text, line, column) = self.stream.get_number()?;
    Ok(self.leaf(Tag::Number, line, column, text))
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  path: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it
  /// consumes input.
  fn new(tokens: Vec<Token>, source: &'a str, path: &'a str) -> Self {
    Self {
      tokens,
      source,
      path,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Line and column of the current token, used to position the node a rule
  /// is about to produce.
  fn position(&self) -> (usize, usize) {
    match self.peek().or_else(|| self.tokens.last()) {
      Some(token) => (token.line, token.column),
      None => (1, 1),
    }
  }

  fn peek_is(&self, symbol: &str) -> bool {
    self
      .peek()
      .filter(|token| {
        matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
          && token_text(token, self.source) == symbol
      })
      .is_some()
  }

  fn peek_ident(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Ident))
  }

  fn peek_number(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Number))
  }

  /// Consume the current token if it matches the provided punctuator or
  /// keyword.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(self.error_here(format!("expected \"{s}\", but got \"{got}\"")))
    }
  }

  /// Parse the current token as an identifier, returning text and position.
  fn get_ident(&mut self) -> CompileResult<(String, usize, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let text = token_text(token, self.source).to_string();
      let (line, column) = (token.line, token.column);
      self.pos += 1;
      return Ok((text, line, column));
    }

    let got = describe_token(self.peek(), self.source);
    Err(self.error_here(format!("expected an identifier, but got \"{got}\"")))
  }

  /// Parse the current token as a number literal, returning text and
  /// position. The tokenizer has already validated the value range.
  fn get_number(&mut self) -> CompileResult<(String, usize, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Number
    {
      let text = token_text(token, self.source).to_string();
      let (line, column) = (token.line, token.column);
      self.pos += 1;
      return Ok((text, line, column));
    }

    let got = describe_token(self.peek(), self.source);
    Err(self.error_here(format!("expected a number, but got \"{got}\"")))
  }

  fn expect_eof(&self) -> CompileResult<()> {
    if self.is_eof() {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(self.error_here(format!("expected end of input, but got \"{got}\"")))
    }
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }

  fn error_here(&self, message: impl Into<String>) -> CompileError {
    let (line, column) = self.position();
    CompileError::at(self.path, line, column, message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> CompileResult<Ast> {
    let tokens = tokenize(source, "test.pl0")?;
    parse(tokens, source, "test.pl0")
  }

  fn tags(ast: &Ast, id: NodeId) -> Vec<Tag> {
    ast
      .children(id)
      .iter()
      .map(|&child| ast.node(child).tag)
      .collect()
  }

  #[test]
  fn parse_block_shape() {
    let ast = parse_source("var x; begin x := 7; ! x end.").unwrap();
    let root = ast.root();
    assert_eq!(ast.node(root).tag, Tag::Program);
    let block = ast.child(root, 0);
    assert_eq!(
      tags(&ast, block),
      vec![Tag::Const, Tag::Var, Tag::Procedure, Tag::Statement]
    );

    let var_section = ast.child(block, 1);
    assert_eq!(ast.children(var_section).len(), 1);
    assert_eq!(ast.node(ast.child(var_section, 0)).token, "x");

    let statement = ast.child(block, 3);
    assert_eq!(tags(&ast, statement), vec![Tag::Statements]);
  }

  #[test]
  fn parse_empty_sections() {
    // The smallest well-formed program: every section empty.
    let ast = parse_source(".").unwrap();
    let block = ast.child(ast.root(), 0);
    for &section in ast.children(block) {
      assert!(ast.children(section).is_empty());
    }
  }

  #[test]
  fn parse_expression_shape() {
    let ast = parse_source("! -2 + 3 * 4.").unwrap();
    let block = ast.child(ast.root(), 0);
    let out = ast.child(ast.child(block, 3), 0);
    assert_eq!(ast.node(out).tag, Tag::Out);

    let expression = ast.child(out, 0);
    let children = ast.children(expression);
    assert_eq!(
      tags(&ast, expression),
      vec![Tag::Sign, Tag::Term, Tag::TermOp, Tag::Term]
    );
    assert_eq!(ast.node(children[0]).token, "-");
    assert_eq!(ast.node(children[2]).token, "+");

    let product = children[3];
    assert_eq!(
      tags(&ast, product),
      vec![Tag::Factor, Tag::FactorOp, Tag::Factor]
    );
  }

  #[test]
  fn parse_procedure_pairs() {
    let source = "var x; procedure bump; begin x := x + 1 end; begin call bump end.";
    let ast = parse_source(source).unwrap();
    let block = ast.child(ast.root(), 0);
    let procedures = ast.child(block, 2);
    assert_eq!(tags(&ast, procedures), vec![Tag::Ident, Tag::Block]);
    assert_eq!(ast.node(ast.child(procedures, 0)).token, "bump");
  }

  #[test]
  fn parse_wires_parent_links() {
    let ast = parse_source("var x; begin x := 1 end.").unwrap();
    let block = ast.child(ast.root(), 0);
    let statements = ast.child(ast.child(block, 3), 0);
    let assignment = ast.child(ast.child(statements, 0), 0);
    assert_eq!(ast.node(assignment).tag, Tag::Assignment);

    // Walking parents from the assignment target reaches the block.
    let target = ast.child(assignment, 0);
    let mut current = ast.node(target).parent;
    let mut reached_block = false;
    while let Some(parent) = current {
      if ast.node(parent).tag == Tag::Block {
        reached_block = true;
        break;
      }
      current = ast.node(parent).parent;
    }
    assert!(reached_block);
  }

  #[test]
  fn parse_conditions() {
    let ast = parse_source("if odd 3 then ! 1.").unwrap();
    let block = ast.child(ast.root(), 0);
    let if_node = ast.child(ast.child(block, 3), 0);
    let condition = ast.child(if_node, 0);
    assert_eq!(tags(&ast, condition), vec![Tag::Odd]);

    let ast = parse_source("if x < 3 then ! 1.").unwrap();
    let block = ast.child(ast.root(), 0);
    let if_node = ast.child(ast.child(block, 3), 0);
    let condition = ast.child(if_node, 0);
    let compare = ast.child(condition, 0);
    assert_eq!(
      tags(&ast, compare),
      vec![Tag::Expression, Tag::CompareOp, Tag::Expression]
    );
    assert_eq!(ast.node(ast.child(compare, 1)).token, "<");
  }

  #[test]
  fn parse_reports_syntax_errors() {
    assert!(parse_source("begin ! 1 end").is_err()); // missing '.'
    assert!(parse_source("if x < 1 ! 2.").is_err()); // missing 'then'
    assert!(parse_source("! .").is_err()); // missing factor
    assert!(parse_source("begin ! 1 end. extra").is_err()); // trailing input

    let err = parse_source("var x begin x := 1 end.").unwrap_err();
    assert!(err.to_string().contains("expected \";\""));
  }
}
