//! The `schema` module implements the configuration-schema value language
//! that the discrimination core analyses.
//!
//! A [`Value`] is an immutable expression: a concrete atom (`"foo"`, `42`,
//! `true`), a type (`int`, `string`), a bound (`>5`, `=~"^a"`), a struct or
//! list, or a combination of those under `|` and `&`. Values are cheap to
//! clone and hand around; all the accessors used by the core are total and
//! signal "no such thing" with the bottom value rather than an error.

use bitflags::bitflags;
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

mod parse;
#[cfg(test)]
mod test;

pub use parse::{parse, ParseError};

bitflags! {
  /// A bitmask of value kinds.
  ///
  /// The empty mask (`BOTTOM`) denotes the absence of a value; it is what
  /// a missing field reports. The bit order doubles as the canonical
  /// print order for kind-switch branches.
  #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
  pub struct Kind: u16 {
    const NULL = 1 << 0;
    const BOOL = 1 << 1;
    const INT = 1 << 2;
    const FLOAT = 1 << 3;
    const STRING = 1 << 4;
    const BYTES = 1 << 5;
    const LIST = 1 << 6;
    const STRUCT = 1 << 7;

    const NUMBER = Self::INT.bits() | Self::FLOAT.bits();
    const TOP = Self::NULL.bits()
      | Self::BOOL.bits()
      | Self::NUMBER.bits()
      | Self::STRING.bits()
      | Self::BYTES.bits()
      | Self::LIST.bits()
      | Self::STRUCT.bits();
  }
}

/// The kinds a value can take, in canonical order.
pub const ALL_KINDS: [Kind; 8] = [
  Kind::NULL,
  Kind::BOOL,
  Kind::INT,
  Kind::FLOAT,
  Kind::STRING,
  Kind::BYTES,
  Kind::LIST,
  Kind::STRUCT,
];

impl Kind {
  /// The empty mask; the kind of a missing value.
  pub const BOTTOM: Kind = Kind::empty();

  /// True if `self` is exactly one of the kinds an atom can have.
  ///
  /// `NUMBER` counts as an atom kind even though it covers two bits.
  pub fn is_atom(self) -> bool {
    self == Kind::NULL
      || self == Kind::BOOL
      || self == Kind::INT
      || self == Kind::FLOAT
      || self == Kind::NUMBER
      || self == Kind::STRING
      || self == Kind::BYTES
  }

  fn name(self) -> Option<&'static str> {
    const NAMES: [(Kind, &str); 9] = [
      (Kind::NULL, "null"),
      (Kind::BOOL, "bool"),
      (Kind::INT, "int"),
      (Kind::FLOAT, "float"),
      (Kind::NUMBER, "number"),
      (Kind::STRING, "string"),
      (Kind::BYTES, "bytes"),
      (Kind::LIST, "list"),
      (Kind::STRUCT, "struct"),
    ];
    NAMES.iter().find(|(k, _)| *k == self).map(|(_, name)| *name)
  }
}

impl Display for Kind {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return write!(f, "_|_");
    }
    if *self == Kind::TOP {
      return write!(f, "_");
    }
    if let Some(name) = self.name() {
      return write!(f, "{}", name);
    }
    write!(f, "(")?;
    let mut first = true;
    for k in ALL_KINDS {
      if !self.intersects(k) {
        continue;
      }
      if !first {
        write!(f, "|")?;
      }
      write!(f, "{}", k.name().unwrap())?;
      first = false;
    }
    write!(f, ")")
  }
}

bitflags! {
  /// Field label classes. A field declaration carries exactly one of
  /// these; iteration masks may combine several.
  #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
  pub struct Labels: u8 {
    const REQUIRED = 1 << 0;
    const OPTIONAL = 1 << 1;
    const REGULAR = 1 << 2;
  }
}

impl Labels {
  fn mark(self) -> &'static str {
    if self == Labels::REQUIRED {
      "!"
    } else if self == Labels::OPTIONAL {
      "?"
    } else {
      ""
    }
  }
}

/// A single field declaration inside a struct value.
#[derive(Clone, Debug)]
pub struct Field {
  pub name: String,
  pub label: Labels,
  pub value: Value,
}

/// The relational operator of a bound value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoundOp {
  Gt,
  Ge,
  Lt,
  Le,
  Match,
  NotMatch,
}

impl BoundOp {
  fn symbol(self) -> &'static str {
    use BoundOp::*;
    match self {
      Gt => ">",
      Ge => ">=",
      Lt => "<",
      Le => "<=",
      Match => "=~",
      NotMatch => "!~",
    }
  }
}

#[derive(Debug)]
enum Repr {
  Bottom,
  Top,
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  Bytes(Vec<u8>),
  BoolType,
  IntType,
  FloatType,
  NumberType,
  StringType,
  BytesType,
  Struct { fields: Vec<Field>, open: bool },
  List { elems: Vec<Value>, rest: Option<Value> },
  Or(Vec<Value>),
  And(Vec<Value>),
  Bound { op: BoundOp, arg: Value },
  Call { name: String, args: Vec<Value> },
}

/// An immutable schema value. Cloning is cheap; the expression tree is
/// shared behind a reference count.
#[derive(Clone, Debug)]
pub struct Value(Rc<Repr>);

/// A borrowed structural view of a value, for callers that dispatch on
/// the top-level expression form.
pub enum Expr<'a> {
  Or(&'a [Value]),
  And(&'a [Value]),
  Call(&'a str, &'a [Value]),
  Bound(BoundOp, &'a Value),
  Leaf,
}

/// The element prefix and optional rest element of a list value.
#[derive(Clone, Debug)]
pub struct ListShape {
  pub elems: Vec<Value>,
  pub rest: Option<Value>,
}

impl ListShape {
  /// Number of element positions that carry a declared type, counting
  /// the rest element as one position.
  pub fn width(&self) -> usize {
    self.elems.len() + self.rest.is_some() as usize
  }

  /// The value at index `i`: a declared element, the rest element for
  /// any index past the prefix, or bottom.
  pub fn at(&self, i: usize) -> Value {
    if let Some(v) = self.elems.get(i) {
      return v.clone();
    }
    match &self.rest {
      Some(v) => v.clone(),
      None => Value::bottom(),
    }
  }
}

impl Value {
  fn new(repr: Repr) -> Value {
    Value(Rc::new(repr))
  }

  /// The bottom value; doubles as the absent-field sentinel.
  pub fn bottom() -> Value {
    Value::new(Repr::Bottom)
  }

  /// The top value `_`, which admits everything.
  pub fn top() -> Value {
    Value::new(Repr::Top)
  }

  pub fn null() -> Value {
    Value::new(Repr::Null)
  }

  pub fn of_bool(b: bool) -> Value {
    Value::new(Repr::Bool(b))
  }

  pub fn of_int(n: i64) -> Value {
    Value::new(Repr::Int(n))
  }

  pub fn of_float(x: f64) -> Value {
    Value::new(Repr::Float(x))
  }

  pub fn of_string(s: impl Into<String>) -> Value {
    Value::new(Repr::String(s.into()))
  }

  pub fn of_bytes(b: impl Into<Vec<u8>>) -> Value {
    Value::new(Repr::Bytes(b.into()))
  }

  /// The type ident for a single atom kind (`Kind::NUMBER` included),
  /// or `None` when `kind` has no ident form.
  pub fn type_ident(kind: Kind) -> Option<Value> {
    let repr = if kind == Kind::NULL {
      Repr::Null
    } else if kind == Kind::BOOL {
      Repr::BoolType
    } else if kind == Kind::INT {
      Repr::IntType
    } else if kind == Kind::FLOAT {
      Repr::FloatType
    } else if kind == Kind::NUMBER {
      Repr::NumberType
    } else if kind == Kind::STRING {
      Repr::StringType
    } else if kind == Kind::BYTES {
      Repr::BytesType
    } else {
      return None;
    };
    Some(Value::new(repr))
  }

  pub fn struct_of(fields: Vec<Field>) -> Value {
    Value::new(Repr::Struct {
      fields,
      open: false,
    })
  }

  /// An open struct; renders as `{...}` when empty.
  pub fn open_struct(fields: Vec<Field>) -> Value {
    Value::new(Repr::Struct { fields, open: true })
  }

  pub fn list_of(elems: Vec<Value>, rest: Option<Value>) -> Value {
    Value::new(Repr::List { elems, rest })
  }

  /// A disjunction of the given values. A single value is returned as
  /// itself rather than wrapped.
  pub fn or_of(mut args: Vec<Value>) -> Value {
    if args.len() == 1 {
      return args.pop().unwrap();
    }
    Value::new(Repr::Or(args))
  }

  /// A conjunction of the given values. A single value is returned as
  /// itself rather than wrapped.
  pub fn and_of(mut args: Vec<Value>) -> Value {
    if args.len() == 1 {
      return args.pop().unwrap();
    }
    Value::new(Repr::And(args))
  }

  pub fn bound(op: BoundOp, arg: Value) -> Value {
    Value::new(Repr::Bound { op, arg })
  }

  pub fn call(name: impl Into<String>, args: Vec<Value>) -> Value {
    Value::new(Repr::Call {
      name: name.into(),
      args,
    })
  }

  /// Converts a concrete JSON value. Objects become structs with all
  /// regular fields; numbers that fit an `i64` become ints, all other
  /// numbers floats.
  pub fn from_json(v: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match v {
      Json::Null => Value::null(),
      Json::Bool(b) => Value::of_bool(*b),
      Json::Number(n) => match n.as_i64() {
        Some(i) => Value::of_int(i),
        None => Value::of_float(n.as_f64().unwrap_or(f64::NAN)),
      },
      Json::String(s) => Value::of_string(s.clone()),
      Json::Array(elems) => {
        Value::list_of(elems.iter().map(Value::from_json).collect(), None)
      }
      Json::Object(members) => Value::struct_of(
        members
          .iter()
          .map(|(name, v)| Field {
            name: name.clone(),
            label: Labels::REGULAR,
            value: Value::from_json(v),
          })
          .collect(),
      ),
    }
  }

  /// False only for bottom. A lookup that found nothing reports a value
  /// for which `exists` is false.
  pub fn exists(&self) -> bool {
    !matches!(&*self.0, Repr::Bottom)
  }

  /// The concrete kind of the value: a single bit for atoms, structs
  /// and lists, `BOTTOM` for anything that is not concrete.
  pub fn kind(&self) -> Kind {
    use Repr::*;
    match &*self.0 {
      Null => Kind::NULL,
      Bool(_) => Kind::BOOL,
      Int(_) => Kind::INT,
      Float(_) => Kind::FLOAT,
      String(_) => Kind::STRING,
      Bytes(_) => Kind::BYTES,
      Struct { .. } => Kind::STRUCT,
      List { .. } => Kind::LIST,
      _ => Kind::BOTTOM,
    }
  }

  /// The bitmask of kinds the value admits.
  pub fn incomplete_kind(&self) -> Kind {
    use Repr::*;
    match &*self.0 {
      Bottom => Kind::BOTTOM,
      Top => Kind::TOP,
      Null => Kind::NULL,
      Bool(_) | BoolType => Kind::BOOL,
      Int(_) | IntType => Kind::INT,
      Float(_) | FloatType => Kind::FLOAT,
      NumberType => Kind::NUMBER,
      String(_) | StringType => Kind::STRING,
      Bytes(_) | BytesType => Kind::BYTES,
      Struct { .. } => Kind::STRUCT,
      List { .. } => Kind::LIST,
      Or(args) => args
        .iter()
        .fold(Kind::BOTTOM, |k, v| k | v.incomplete_kind()),
      And(args) => args.iter().fold(Kind::TOP, |k, v| k & v.incomplete_kind()),
      Bound { op, arg } => match op {
        BoundOp::Match | BoundOp::NotMatch => Kind::STRING,
        _ => {
          let k = arg.incomplete_kind();
          if Kind::NUMBER.contains(k) {
            Kind::NUMBER
          } else {
            k
          }
        }
      },
      Call { name, args } => match_any_kind(name, args).unwrap_or(Kind::TOP),
    }
  }

  /// True if the value is a single concrete atom.
  pub fn is_concrete(&self) -> bool {
    use Repr::*;
    matches!(
      &*self.0,
      Null | Bool(_) | Int(_) | Float(_) | String(_) | Bytes(_)
    )
  }

  /// The structural view of the top-level expression form.
  pub fn expr(&self) -> Expr<'_> {
    match &*self.0 {
      Repr::Or(args) => Expr::Or(args),
      Repr::And(args) => Expr::And(args),
      Repr::Call { name, args } => Expr::Call(name, args),
      Repr::Bound { op, arg } => Expr::Bound(*op, arg),
      _ => Expr::Leaf,
    }
  }

  /// The integer payload of a concrete int value.
  pub fn as_int(&self) -> Option<i64> {
    match &*self.0 {
      Repr::Int(n) => Some(*n),
      _ => None,
    }
  }

  /// An iterator over the declared fields whose label is in `mask`.
  /// Non-struct values have no fields.
  pub fn fields(&self, mask: Labels) -> impl Iterator<Item = &Field> + '_ {
    let fields: &[Field] = match &*self.0 {
      Repr::Struct { fields, .. } => fields,
      _ => &[],
    };
    fields.iter().filter(move |f| mask.intersects(f.label))
  }

  /// The element shape of a list value, or `None` for anything else.
  pub fn list_shape(&self) -> Option<ListShape> {
    match &*self.0 {
      Repr::List { elems, rest } => Some(ListShape {
        elems: elems.clone(),
        rest: rest.clone(),
      }),
      _ => None,
    }
  }

  /// Looks up a single required or regular field by name. Optional
  /// fields do not resolve; absent names yield bottom.
  pub fn lookup(&self, name: &str) -> Value {
    for f in self.fields(Labels::REQUIRED | Labels::REGULAR) {
      if f.name == name {
        return f.value.clone();
      }
    }
    Value::bottom()
  }

  /// Descends along a dotted path. The paths `.` and the empty string
  /// name the value itself. A selector containing a dot is not
  /// representable.
  pub fn lookup_path(&self, path: &str) -> Value {
    if path == "." || path.is_empty() {
      return self.clone();
    }
    let parts: SmallVec<[&str; 8]> = path.split('.').collect();
    let mut v = self.clone();
    for part in parts {
      v = v.lookup(part);
      if !v.exists() {
        return v;
      }
    }
    v
  }
}

fn match_any_kind(name: &str, args: &[Value]) -> Option<Kind> {
  if name != "matchN" || args.len() != 2 || args[0].as_int() != Some(1) {
    return None;
  }
  let shape = args[1].list_shape()?;
  Some(
    shape
      .elems
      .iter()
      .fold(Kind::BOTTOM, |k, v| k | v.incomplete_kind()),
  )
}

/// Concatenates two path components, treating `.` as the empty root.
pub fn path_concat(p1: &str, p2: &str) -> String {
  if p1.is_empty() || p1 == "." {
    return p2.to_string();
  }
  format!("{}.{}", p1, p2)
}

fn is_bare_name(name: &str) -> bool {
  !name.is_empty()
    && !name.starts_with(|c: char| c.is_ascii_digit())
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_quoted(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
  write!(f, "\"")?;
  for c in s.chars() {
    match c {
      '"' => write!(f, "\\\"")?,
      '\\' => write!(f, "\\\\")?,
      '\n' => write!(f, "\\n")?,
      '\r' => write!(f, "\\r")?,
      '\t' => write!(f, "\\t")?,
      c if c.is_control() => write!(f, "\\u{{{:04x}}}", c as u32)?,
      c => write!(f, "{}", c)?,
    }
  }
  write!(f, "\"")
}

fn write_bytes(f: &mut Formatter<'_>, b: &[u8]) -> fmt::Result {
  write!(f, "'")?;
  for &byte in b {
    match byte {
      b'\'' => write!(f, "\\'")?,
      b'\\' => write!(f, "\\\\")?,
      0x20..=0x7e => write!(f, "{}", byte as char)?,
      _ => write!(f, "\\x{:02x}", byte)?,
    }
  }
  write!(f, "'")
}

fn write_float(f: &mut Formatter<'_>, x: f64) -> fmt::Result {
  // The canonical form always carries a decimal point so that float
  // atoms stay distinct from int atoms.
  if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
    write!(f, "{:.1}", x)
  } else {
    write!(f, "{}", x)
  }
}

impl Display for Value {
  /// Writes the canonical rendering. Atom equality in the discrimination
  /// core is string equality of this form, so it re-escapes parsed
  /// content rather than preserving source spellings.
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    use Repr::*;
    match &*self.0 {
      Bottom => write!(f, "_|_"),
      Top => write!(f, "_"),
      Null => write!(f, "null"),
      Bool(b) => write!(f, "{}", b),
      Int(n) => write!(f, "{}", n),
      Float(x) => write_float(f, *x),
      String(s) => write_quoted(f, s),
      Bytes(b) => write_bytes(f, b),
      BoolType => write!(f, "bool"),
      IntType => write!(f, "int"),
      FloatType => write!(f, "float"),
      NumberType => write!(f, "number"),
      StringType => write!(f, "string"),
      BytesType => write!(f, "bytes"),
      Struct { fields, open } => {
        write!(f, "{{")?;
        let mut first = true;
        for field in fields {
          if !first {
            write!(f, ", ")?;
          }
          if is_bare_name(&field.name) {
            write!(f, "{}", field.name)?;
          } else {
            write_quoted(f, &field.name)?;
          }
          write!(f, "{}: {}", field.label.mark(), field.value)?;
          first = false;
        }
        if *open {
          if !first {
            write!(f, ", ")?;
          }
          write!(f, "...")?;
        }
        write!(f, "}}")
      }
      List { elems, rest } => {
        write!(f, "[")?;
        let mut first = true;
        for elem in elems {
          if !first {
            write!(f, ", ")?;
          }
          write!(f, "{}", elem)?;
          first = false;
        }
        if let Some(rest) = rest {
          if !first {
            write!(f, ", ")?;
          }
          match &*rest.0 {
            Top => write!(f, "...")?,
            _ => write!(f, "...{}", rest)?,
          }
        }
        write!(f, "]")
      }
      Or(args) => {
        let mut first = true;
        for arg in args {
          if !first {
            write!(f, " | ")?;
          }
          // Nested disjunctions keep their grouping visible.
          if matches!(&*arg.0, Or(_)) {
            write!(f, "({})", arg)?;
          } else {
            write!(f, "{}", arg)?;
          }
          first = false;
        }
        Ok(())
      }
      And(args) => {
        let mut first = true;
        for arg in args {
          if !first {
            write!(f, " & ")?;
          }
          if matches!(&*arg.0, Or(_) | And(_)) {
            write!(f, "({})", arg)?;
          } else {
            write!(f, "{}", arg)?;
          }
          first = false;
        }
        Ok(())
      }
      Bound { op, arg } => write!(f, "{}{}", op.symbol(), arg),
      Call { name, args } => {
        write!(f, "{}(", name)?;
        let mut first = true;
        for arg in args {
          if !first {
            write!(f, ", ")?;
          }
          write!(f, "{}", arg)?;
          first = false;
        }
        write!(f, ")")
      }
    }
  }
}
