//! Discrimination sets: the values a schema expression can admit,
//! normalized into a kind mask plus a set of concrete atoms.

use crate::schema::{Expr, Kind, Value};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

#[cfg(test)]
mod test;

/// The canonical string rendering of a concrete value.
///
/// Equality and ordering are those of the rendering, so two atoms are
/// the same value exactly when their strings match.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Atom(String);

impl Atom {
  pub fn new(s: impl Into<String>) -> Atom {
    Atom(s.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The kind of the rendered value, recovered from its first character.
  ///
  /// # Panics
  ///
  /// Panics when the string is not a canonical rendering; atoms must
  /// only be built from [`atom_for_value`] or equivalent output.
  pub fn kind(&self) -> Kind {
    match self.0.chars().next() {
      Some('"') => Kind::STRING,
      Some('\'') => Kind::BYTES,
      Some(c) if c.is_ascii_digit() || c == '.' || c == '-' => Kind::NUMBER,
      Some('n') => Kind::NULL,
      Some('t') | Some('f') => Kind::BOOL,
      _ => panic!("unknown kind for atom {:?}", self.0),
    }
  }
}

impl Display for Atom {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The atom for `v`, if `v` is a single concrete atom value.
pub fn atom_for_value(v: &Value) -> Option<Atom> {
  if !v.incomplete_kind().is_atom() || !v.is_concrete() {
    return None;
  }
  Some(Atom(v.to_string()))
}

/// A set of possible discriminating values for a field, the union of a
/// set of kinds and a set of concrete atoms:
///
/// ```text
/// (type0 | type1 | ..) | (const0 | const1 | ..)
/// ```
///
/// The set is kept normalized: no member of `consts` has a kind that is
/// already covered by `types`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ValueSet {
  types: Kind,
  consts: BTreeSet<Atom>,
}

impl Default for ValueSet {
  /// The empty set: no kinds, no atoms.
  fn default() -> ValueSet {
    ValueSet {
      types: Kind::BOTTOM,
      consts: BTreeSet::new(),
    }
  }
}

impl ValueSet {
  /// The discrimination set for the value `v`.
  pub fn for_value(v: &Value) -> ValueSet {
    if v.incomplete_kind() == Kind::NULL {
      // Null is kept as a type rather than an atom so that kind-based
      // discrimination is preferred for it.
      return ValueSet {
        types: Kind::NULL,
        consts: BTreeSet::new(),
      };
    }
    if let Some(atom) = atom_for_value(v) {
      return ValueSet {
        types: Kind::BOTTOM,
        consts: BTreeSet::from([atom]),
      };
    }
    if let Expr::Or(args) = v.expr() {
      let mut s = ValueSet::for_value(&args[0]);
      for arg in &args[1..] {
        s = s.union(&ValueSet::for_value(arg));
      }
      return s;
    }
    ValueSet {
      types: v.incomplete_kind(),
      consts: BTreeSet::new(),
    }
  }

  /// The kind mask alone, without the kinds implied by atoms.
  pub fn types(&self) -> Kind {
    self.types
  }

  pub fn consts(&self) -> &BTreeSet<Atom> {
    &self.consts
  }

  /// All possible kinds for values in the set, including the kinds of
  /// the atoms.
  pub fn kinds(&self) -> Kind {
    let mut k = self.types;
    for c in &self.consts {
      k |= c.kind();
    }
    k
  }

  pub fn holds_atom(&self, a: &Atom) -> bool {
    self.types.intersects(a.kind()) || self.consts.contains(a)
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty() && self.consts.is_empty()
  }

  pub fn union(&self, other: &ValueSet) -> ValueSet {
    ValueSet {
      types: self.types | other.types,
      consts: self.consts.union(&other.consts).cloned().collect(),
    }
    .normalize()
  }

  /// Intersection distributes over the two unions:
  ///
  /// ```text
  /// (T0 | C0) & (T1 | C1) =
  ///   (T0 & T1) | (T0 & C1) | (T1 & C0) | (C0 & C1)
  /// ```
  pub fn intersect(&self, other: &ValueSet) -> ValueSet {
    let mut consts = BTreeSet::new();
    for c in &other.consts {
      if self.types.intersects(c.kind()) {
        consts.insert(c.clone());
      }
    }
    for c in &self.consts {
      if other.types.intersects(c.kind()) {
        consts.insert(c.clone());
      }
    }
    for c in &self.consts {
      if other.consts.contains(c) {
        consts.insert(c.clone());
      }
    }
    ValueSet {
      types: self.types & other.types,
      consts,
    }
    .normalize()
  }

  pub fn without(&self, other: &ValueSet) -> ValueSet {
    ValueSet {
      types: self.types & !other.types,
      consts: self
        .consts
        .iter()
        .filter(|c| !other.holds_atom(c))
        .cloned()
        .collect(),
    }
    .normalize()
  }

  fn normalize(mut self) -> ValueSet {
    let types = self.types;
    self.consts.retain(|c| !types.intersects(c.kind()));
    self
  }
}

impl Display for ValueSet {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "(")?;
    let mut first = true;
    for k in crate::schema::ALL_KINDS {
      if !self.types.intersects(k) {
        continue;
      }
      if !first {
        write!(f, " | ")?;
      }
      write!(f, "{}", k)?;
      first = false;
    }
    for c in &self.consts {
      if !first {
        write!(f, " | ")?;
      }
      write!(f, "{}", c)?;
      first = false;
    }
    write!(f, ")")
  }
}
