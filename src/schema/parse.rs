//! Parser for the schema expression language.
//!
//! The grammar is a small configuration-language subset: atoms, type
//! idents, bounds, structs, lists, calls, and the `|`/`&` combinators.
//! Newlines and commas both separate fields and elements, and a source
//! that consists of a bare field list is read as a struct body, so
//! package definitions can be written without an outer `{}`.

use super::{Field, Labels, Value};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// A parse failure, with the byte offset it was detected at.
#[derive(Debug)]
pub struct ParseError {
  pub offset: usize,
  pub message: String,
}

impl Display for ParseError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "parse error at byte {}: {}", self.offset, self.message)
  }
}

impl Error for ParseError {}

/// Parses a schema expression or a bare field list.
pub fn parse(src: &str) -> Result<Value, ParseError> {
  let toks = lex(src)?;
  let mut p = Parser { toks, pos: 0 };
  p.skip_newlines();
  let v = if p.at_field_start() {
    p.parse_struct_body()?
  } else {
    p.parse_expr()?
  };
  p.skip_newlines();
  if let Some((offset, tok)) = p.peek_full() {
    return Err(ParseError {
      offset,
      message: format!("unexpected {} after expression", tok.describe()),
    });
  }
  Ok(v)
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
  Ident(String),
  Str(String),
  Bytes(Vec<u8>),
  Int(i64),
  Float(f64),
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  LParen,
  RParen,
  Comma,
  Colon,
  Bang,
  Query,
  Bar,
  Amp,
  Ellipsis,
  Gt,
  Ge,
  Lt,
  Le,
  MatchRe,
  NotMatchRe,
  BottomLit,
  Newline,
}

impl Tok {
  fn describe(&self) -> String {
    use Tok::*;
    match self {
      Ident(name) => format!("identifier `{}`", name),
      Str(_) => "string literal".to_string(),
      Bytes(_) => "bytes literal".to_string(),
      Int(_) | Float(_) => "number".to_string(),
      Newline => "newline".to_string(),
      LBrace => "`{`".to_string(),
      RBrace => "`}`".to_string(),
      LBracket => "`[`".to_string(),
      RBracket => "`]`".to_string(),
      LParen => "`(`".to_string(),
      RParen => "`)`".to_string(),
      Comma => "`,`".to_string(),
      Colon => "`:`".to_string(),
      Bang => "`!`".to_string(),
      Query => "`?`".to_string(),
      Bar => "`|`".to_string(),
      Amp => "`&`".to_string(),
      Ellipsis => "`...`".to_string(),
      Gt => "`>`".to_string(),
      Ge => "`>=`".to_string(),
      Lt => "`<`".to_string(),
      Le => "`<=`".to_string(),
      MatchRe => "`=~`".to_string(),
      NotMatchRe => "`!~`".to_string(),
      BottomLit => "`_|_`".to_string(),
    }
  }
}

struct Lexer<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Lexer<'a> {
  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn peek_at(&self, n: usize) -> Option<char> {
    self.src[self.pos..].chars().nth(n)
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += c.len_utf8();
    Some(c)
  }

  fn eat(&mut self, c: char) -> bool {
    if self.peek() == Some(c) {
      self.bump();
      return true;
    }
    false
  }

  fn err(&self, message: impl Into<String>) -> ParseError {
    ParseError {
      offset: self.pos,
      message: message.into(),
    }
  }
}

fn lex(src: &str) -> Result<Vec<(usize, Tok)>, ParseError> {
  let mut lx = Lexer { src, pos: 0 };
  let mut toks = Vec::new();
  while let Some(c) = lx.peek() {
    let start = lx.pos;
    match c {
      ' ' | '\t' | '\r' => {
        lx.bump();
      }
      '\n' => {
        lx.bump();
        toks.push((start, Tok::Newline));
      }
      '/' if lx.peek_at(1) == Some('/') => {
        while let Some(c) = lx.peek() {
          if c == '\n' {
            break;
          }
          lx.bump();
        }
      }
      '{' => {
        lx.bump();
        toks.push((start, Tok::LBrace));
      }
      '}' => {
        lx.bump();
        toks.push((start, Tok::RBrace));
      }
      '[' => {
        lx.bump();
        toks.push((start, Tok::LBracket));
      }
      ']' => {
        lx.bump();
        toks.push((start, Tok::RBracket));
      }
      '(' => {
        lx.bump();
        toks.push((start, Tok::LParen));
      }
      ')' => {
        lx.bump();
        toks.push((start, Tok::RParen));
      }
      ',' => {
        lx.bump();
        toks.push((start, Tok::Comma));
      }
      ':' => {
        lx.bump();
        toks.push((start, Tok::Colon));
      }
      '|' => {
        lx.bump();
        toks.push((start, Tok::Bar));
      }
      '&' => {
        lx.bump();
        toks.push((start, Tok::Amp));
      }
      '?' => {
        lx.bump();
        toks.push((start, Tok::Query));
      }
      '!' => {
        lx.bump();
        if lx.eat('~') {
          toks.push((start, Tok::NotMatchRe));
        } else {
          toks.push((start, Tok::Bang));
        }
      }
      '=' => {
        lx.bump();
        if lx.eat('~') {
          toks.push((start, Tok::MatchRe));
        } else {
          return Err(lx.err("expected `~` after `=`"));
        }
      }
      '>' => {
        lx.bump();
        if lx.eat('=') {
          toks.push((start, Tok::Ge));
        } else {
          toks.push((start, Tok::Gt));
        }
      }
      '<' => {
        lx.bump();
        if lx.eat('=') {
          toks.push((start, Tok::Le));
        } else {
          toks.push((start, Tok::Lt));
        }
      }
      '.' => {
        if lx.peek_at(1) == Some('.') && lx.peek_at(2) == Some('.') {
          lx.bump();
          lx.bump();
          lx.bump();
          toks.push((start, Tok::Ellipsis));
        } else if lx.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
          toks.push((start, lex_number(&mut lx)?));
        } else {
          return Err(lx.err("unexpected `.`"));
        }
      }
      '"' => toks.push((start, Tok::Str(lex_string(&mut lx)?))),
      '\'' => toks.push((start, Tok::Bytes(lex_bytes(&mut lx)?))),
      '-' => {
        let next = lx.peek_at(1);
        if next.map_or(false, |c| c.is_ascii_digit() || c == '.') {
          toks.push((start, lex_number(&mut lx)?));
        } else {
          return Err(lx.err("unexpected `-`"));
        }
      }
      c if c.is_ascii_digit() => toks.push((start, lex_number(&mut lx)?)),
      c if c.is_ascii_alphabetic() || c == '_' => {
        // `_|_` reads as a single bottom token.
        if c == '_' && lx.peek_at(1) == Some('|') && lx.peek_at(2) == Some('_')
        {
          lx.bump();
          lx.bump();
          lx.bump();
          toks.push((start, Tok::BottomLit));
          continue;
        }
        let mut name = String::new();
        while let Some(c) = lx.peek() {
          if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            lx.bump();
          } else {
            break;
          }
        }
        toks.push((start, Tok::Ident(name)));
      }
      c => return Err(lx.err(format!("unexpected character `{}`", c))),
    }
  }
  Ok(toks)
}

fn lex_number(lx: &mut Lexer<'_>) -> Result<Tok, ParseError> {
  let start = lx.pos;
  let mut is_float = false;
  lx.eat('-');
  while lx.peek().map_or(false, |c| c.is_ascii_digit()) {
    lx.bump();
  }
  if lx.peek() == Some('.')
    && lx.peek_at(1).map_or(false, |c| c.is_ascii_digit())
  {
    is_float = true;
    lx.bump();
    while lx.peek().map_or(false, |c| c.is_ascii_digit()) {
      lx.bump();
    }
  }
  if matches!(lx.peek(), Some('e') | Some('E')) {
    is_float = true;
    lx.bump();
    if matches!(lx.peek(), Some('+') | Some('-')) {
      lx.bump();
    }
    if !lx.peek().map_or(false, |c| c.is_ascii_digit()) {
      return Err(lx.err("malformed exponent"));
    }
    while lx.peek().map_or(false, |c| c.is_ascii_digit()) {
      lx.bump();
    }
  }
  let text = &lx.src[start..lx.pos];
  if is_float {
    match text.parse::<f64>() {
      Ok(x) => Ok(Tok::Float(x)),
      Err(_) => Err(lx.err(format!("malformed number `{}`", text))),
    }
  } else {
    match text.parse::<i64>() {
      Ok(n) => Ok(Tok::Int(n)),
      Err(_) => Err(lx.err(format!("integer `{}` out of range", text))),
    }
  }
}

fn lex_escape(lx: &mut Lexer<'_>) -> Result<char, ParseError> {
  match lx.bump() {
    Some('"') => Ok('"'),
    Some('\'') => Ok('\''),
    Some('\\') => Ok('\\'),
    Some('n') => Ok('\n'),
    Some('r') => Ok('\r'),
    Some('t') => Ok('\t'),
    Some('0') => Ok('\0'),
    Some('u') => {
      if !lx.eat('{') {
        return Err(lx.err("expected `{` after `\\u`"));
      }
      let mut code = 0u32;
      let mut digits = 0;
      while let Some(c) = lx.peek() {
        if let Some(d) = c.to_digit(16) {
          code = code * 16 + d;
          digits += 1;
          lx.bump();
        } else {
          break;
        }
      }
      if digits == 0 || digits > 6 || !lx.eat('}') {
        return Err(lx.err("malformed unicode escape"));
      }
      char::from_u32(code)
        .ok_or_else(|| lx.err("escape is not a valid code point"))
    }
    _ => Err(lx.err("unknown escape")),
  }
}

fn lex_string(lx: &mut Lexer<'_>) -> Result<String, ParseError> {
  lx.bump(); // opening quote
  let mut s = String::new();
  loop {
    match lx.bump() {
      None | Some('\n') => return Err(lx.err("unterminated string literal")),
      Some('"') => return Ok(s),
      Some('\\') => s.push(lex_escape(lx)?),
      Some(c) => s.push(c),
    }
  }
}

fn lex_bytes(lx: &mut Lexer<'_>) -> Result<Vec<u8>, ParseError> {
  lx.bump(); // opening quote
  let mut b = Vec::new();
  loop {
    match lx.bump() {
      None | Some('\n') => return Err(lx.err("unterminated bytes literal")),
      Some('\'') => return Ok(b),
      Some('\\') => {
        if lx.peek() == Some('x') {
          lx.bump();
          let hi = lx.bump().and_then(|c| c.to_digit(16));
          let lo = lx.bump().and_then(|c| c.to_digit(16));
          match (hi, lo) {
            (Some(hi), Some(lo)) => b.push((hi * 16 + lo) as u8),
            _ => return Err(lx.err("malformed byte escape")),
          }
        } else {
          let mut buf = [0u8; 4];
          b.extend_from_slice(lex_escape(lx)?.encode_utf8(&mut buf).as_bytes());
        }
      }
      Some(c) => {
        let mut buf = [0u8; 4];
        b.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
      }
    }
  }
}

struct Parser {
  toks: Vec<(usize, Tok)>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Tok> {
    self.toks.get(self.pos).map(|(_, t)| t)
  }

  fn peek_at(&self, n: usize) -> Option<&Tok> {
    self.toks.get(self.pos + n).map(|(_, t)| t)
  }

  fn peek_full(&self) -> Option<(usize, &Tok)> {
    self.toks.get(self.pos).map(|(o, t)| (*o, t))
  }

  fn bump(&mut self) -> Option<Tok> {
    let t = self.toks.get(self.pos).map(|(_, t)| t.clone());
    if t.is_some() {
      self.pos += 1;
    }
    t
  }

  fn eat(&mut self, tok: &Tok) -> bool {
    if self.peek() == Some(tok) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn expect(&mut self, tok: &Tok) -> Result<(), ParseError> {
    if self.eat(tok) {
      return Ok(());
    }
    Err(self.err(format!(
      "expected {}, found {}",
      tok.describe(),
      self
        .peek()
        .map_or("end of input".to_string(), |t| t.describe())
    )))
  }

  fn err(&self, message: impl Into<String>) -> ParseError {
    let offset = self
      .toks
      .get(self.pos)
      .or_else(|| self.toks.last())
      .map_or(0, |(o, _)| *o);
    ParseError {
      offset,
      message: message.into(),
    }
  }

  fn skip_newlines(&mut self) {
    while self.eat(&Tok::Newline) {}
  }

  fn skip_separators(&mut self) {
    while matches!(self.peek(), Some(Tok::Newline) | Some(Tok::Comma)) {
      self.pos += 1;
    }
  }

  fn at_field_start(&self) -> bool {
    matches!(self.peek(), Some(Tok::Ident(_)) | Some(Tok::Str(_)))
      && matches!(
        self.peek_at(1),
        Some(Tok::Bang) | Some(Tok::Query) | Some(Tok::Colon)
      )
  }

  fn parse_struct_body(&mut self) -> Result<Value, ParseError> {
    let mut fields = Vec::new();
    loop {
      self.skip_separators();
      if self.peek().is_none() {
        return Ok(Value::struct_of(fields));
      }
      let field = self.parse_field()?;
      self.push_field(&mut fields, field)?;
      match self.peek() {
        None | Some(Tok::Newline) | Some(Tok::Comma) => {}
        Some(t) => {
          return Err(self.err(format!("expected field separator, found {}", t.describe())))
        }
      }
    }
  }

  fn parse_expr(&mut self) -> Result<Value, ParseError> {
    let mut args = vec![self.parse_and()?];
    while self.eat(&Tok::Bar) {
      self.skip_newlines();
      args.push(self.parse_and()?);
    }
    Ok(Value::or_of(args))
  }

  fn parse_and(&mut self) -> Result<Value, ParseError> {
    let mut args = vec![self.parse_unary()?];
    while self.eat(&Tok::Amp) {
      self.skip_newlines();
      args.push(self.parse_unary()?);
    }
    Ok(Value::and_of(args))
  }

  fn parse_unary(&mut self) -> Result<Value, ParseError> {
    use super::BoundOp::*;
    let op = match self.peek() {
      Some(Tok::Gt) => Some(Gt),
      Some(Tok::Ge) => Some(Ge),
      Some(Tok::Lt) => Some(Lt),
      Some(Tok::Le) => Some(Le),
      Some(Tok::MatchRe) => Some(Match),
      Some(Tok::NotMatchRe) => Some(NotMatch),
      _ => None,
    };
    if let Some(op) = op {
      self.pos += 1;
      let arg = self.parse_primary()?;
      return Ok(Value::bound(op, arg));
    }
    self.parse_primary()
  }

  fn parse_primary(&mut self) -> Result<Value, ParseError> {
    match self.bump() {
      Some(Tok::Int(n)) => Ok(Value::of_int(n)),
      Some(Tok::Float(x)) => Ok(Value::of_float(x)),
      Some(Tok::Str(s)) => Ok(Value::of_string(s)),
      Some(Tok::Bytes(b)) => Ok(Value::of_bytes(b)),
      Some(Tok::BottomLit) => Ok(Value::bottom()),
      Some(Tok::Ident(name)) => {
        if self.peek() == Some(&Tok::LParen) {
          return self.parse_call(name);
        }
        match name.as_str() {
          "_" => Ok(Value::top()),
          "null" => Ok(Value::null()),
          "true" => Ok(Value::of_bool(true)),
          "false" => Ok(Value::of_bool(false)),
          "bool" => Ok(Value::type_ident(super::Kind::BOOL).unwrap()),
          "int" => Ok(Value::type_ident(super::Kind::INT).unwrap()),
          "float" => Ok(Value::type_ident(super::Kind::FLOAT).unwrap()),
          "number" => Ok(Value::type_ident(super::Kind::NUMBER).unwrap()),
          "string" => Ok(Value::type_ident(super::Kind::STRING).unwrap()),
          "bytes" => Ok(Value::type_ident(super::Kind::BYTES).unwrap()),
          _ => {
            self.pos -= 1;
            Err(self.err(format!("unknown identifier `{}`", name)))
          }
        }
      }
      Some(Tok::LBrace) => self.parse_struct_literal(),
      Some(Tok::LBracket) => self.parse_list_literal(),
      Some(Tok::LParen) => {
        self.skip_newlines();
        let v = self.parse_expr()?;
        self.skip_newlines();
        self.expect(&Tok::RParen)?;
        Ok(v)
      }
      Some(t) => {
        self.pos -= 1;
        Err(self.err(format!("expected expression, found {}", t.describe())))
      }
      None => Err(self.err("expected expression, found end of input")),
    }
  }

  fn parse_call(&mut self, name: String) -> Result<Value, ParseError> {
    self.expect(&Tok::LParen)?;
    self.skip_newlines();
    let mut args = Vec::new();
    if !self.eat(&Tok::RParen) {
      loop {
        args.push(self.parse_expr()?);
        self.skip_newlines();
        if self.eat(&Tok::Comma) {
          self.skip_newlines();
          continue;
        }
        self.expect(&Tok::RParen)?;
        break;
      }
    }
    Ok(Value::call(name, args))
  }

  fn parse_struct_literal(&mut self) -> Result<Value, ParseError> {
    let mut fields = Vec::new();
    let mut open = false;
    loop {
      self.skip_separators();
      if self.eat(&Tok::RBrace) {
        break;
      }
      if self.eat(&Tok::Ellipsis) {
        open = true;
        continue;
      }
      let field = self.parse_field()?;
      self.push_field(&mut fields, field)?;
      match self.peek() {
        Some(Tok::Newline) | Some(Tok::Comma) | Some(Tok::RBrace) => {}
        Some(t) => {
          return Err(self.err(format!("expected field separator, found {}", t.describe())))
        }
        None => return Err(self.err("unterminated struct literal")),
      }
    }
    if open {
      Ok(Value::open_struct(fields))
    } else {
      Ok(Value::struct_of(fields))
    }
  }

  fn parse_list_literal(&mut self) -> Result<Value, ParseError> {
    let mut elems = Vec::new();
    let mut rest = None;
    loop {
      self.skip_separators();
      if self.eat(&Tok::RBracket) {
        break;
      }
      if rest.is_some() {
        return Err(self.err("rest element must be last"));
      }
      if self.eat(&Tok::Ellipsis) {
        if matches!(
          self.peek(),
          Some(Tok::RBracket) | Some(Tok::Comma) | Some(Tok::Newline)
        ) {
          rest = Some(Value::top());
        } else {
          rest = Some(self.parse_expr()?);
        }
        continue;
      }
      elems.push(self.parse_expr()?);
      match self.peek() {
        Some(Tok::Newline) | Some(Tok::Comma) | Some(Tok::RBracket) => {}
        Some(t) => {
          return Err(self.err(format!("expected `,` or `]`, found {}", t.describe())))
        }
        None => return Err(self.err("unterminated list literal")),
      }
    }
    Ok(Value::list_of(elems, rest))
  }

  fn parse_field(&mut self) -> Result<Field, ParseError> {
    let name = match self.bump() {
      Some(Tok::Ident(name)) => name,
      Some(Tok::Str(name)) => name,
      _ => {
        self.pos = self.pos.saturating_sub(1);
        return Err(self.err("expected field name"));
      }
    };
    let label = if self.eat(&Tok::Bang) {
      Labels::REQUIRED
    } else if self.eat(&Tok::Query) {
      Labels::OPTIONAL
    } else {
      Labels::REGULAR
    };
    self.expect(&Tok::Colon)?;
    let value = if self.at_field_start() {
      // Shorthand for a nested single-field struct: `a!: b!: v`.
      let inner = self.parse_field()?;
      Value::struct_of(vec![inner])
    } else {
      self.parse_expr()?
    };
    Ok(Field { name, label, value })
  }

  /// Appends a field, unifying duplicate names when both declarations
  /// are structs.
  fn push_field(
    &self,
    fields: &mut Vec<Field>,
    field: Field,
  ) -> Result<(), ParseError> {
    for existing in fields.iter_mut() {
      if existing.name != field.name {
        continue;
      }
      let merged = merge_structs(&existing.value, &field.value)
        .ok_or_else(|| self.err(format!("duplicate field `{}`", field.name)))?;
      existing.value = merged;
      existing.label = stronger_label(existing.label, field.label);
      return Ok(());
    }
    fields.push(field);
    Ok(())
  }
}

fn stronger_label(l1: Labels, l2: Labels) -> Labels {
  if (l1 | l2).intersects(Labels::REQUIRED) {
    Labels::REQUIRED
  } else if (l1 | l2).intersects(Labels::REGULAR) {
    Labels::REGULAR
  } else {
    Labels::OPTIONAL
  }
}

/// Unifies two struct values field by field, or reports `None` when
/// either is not a struct.
fn merge_structs(a: &Value, b: &Value) -> Option<Value> {
  if a.kind() != super::Kind::STRUCT || b.kind() != super::Kind::STRUCT {
    return None;
  }
  let mut fields: Vec<Field> = a.fields(Labels::all()).cloned().collect();
  for bf in b.fields(Labels::all()) {
    let mut merged = false;
    for existing in fields.iter_mut() {
      if existing.name != bf.name {
        continue;
      }
      existing.value = merge_structs(&existing.value, &bf.value)?;
      existing.label = stronger_label(existing.label, bf.label);
      merged = true;
      break;
    }
    if !merged {
      fields.push(bf.clone());
    }
  }
  Some(Value::struct_of(fields))
}
