//! Decision trees: the nodes a discrimination search produces, their
//! evaluator, and the pseudo-code printer.

use crate::schema::{Kind, Value};
use crate::set::IntSet;
use crate::valueset::{atom_for_value, Atom};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

/// One node of a decision tree.
///
/// Interior nodes test the input value at a dotted path; leaves name
/// the arms that remain. Paths are absolute: every test applies to the
/// original input value, whatever its depth in the tree.
#[derive(Clone, Debug)]
pub enum DecisionNode {
  /// A terminal node. Usually one arm; several when the remaining arms
  /// are indistinguishable.
  Leaf { arms: IntSet },
  /// Switches on the concrete kind of the value at `path`.
  KindSwitch {
    path: String,
    branches: BTreeMap<Kind, DecisionNode>,
  },
  /// Switches on the concrete atom at `path`, with a fallback for
  /// values outside the enumerated set.
  ValueSwitch {
    path: String,
    branches: BTreeMap<Atom, DecisionNode>,
    default: Box<DecisionNode>,
  },
  /// A conjunction of absence tests: each absent path narrows the
  /// candidates to its group.
  FieldAbsence { branches: BTreeMap<String, IntSet> },
  /// No arm matches.
  Error,
}

impl DecisionNode {
  /// The arms selected for the concrete value `v`.
  pub fn check(&self, v: &Value) -> IntSet {
    use DecisionNode::*;
    match self {
      Leaf { arms } => arms.clone(),
      KindSwitch { path, branches } => {
        let f = v.lookup_path(path);
        match branches.get(&f.kind()) {
          Some(sub) => sub.check(v),
          None => IntSet::Word(Default::default()),
        }
      }
      ValueSwitch {
        path,
        branches,
        default,
      } => {
        let f = v.lookup_path(path);
        if let Some(atom) = atom_for_value(&f) {
          if let Some(sub) = branches.get(&atom) {
            return sub.check(v);
          }
        }
        default.check(v)
      }
      FieldAbsence { branches } => {
        let mut result: Option<IntSet> = None;
        for (path, group) in branches {
          if v.lookup_path(path).exists() {
            continue;
          }
          result = Some(match result {
            Some(s) => s.intersect(group),
            None => group.clone(),
          });
        }
        match result {
          Some(s) => s,
          // No absence test fired, so nothing is ruled out.
          None => self.possible(),
        }
      }
      Error => IntSet::Word(Default::default()),
    }
  }

  /// The set of arms this node can ever select.
  pub fn possible(&self) -> IntSet {
    use DecisionNode::*;
    match self {
      Leaf { arms } => arms.clone(),
      KindSwitch { branches, .. } => union_all(branches.values()),
      ValueSwitch {
        branches, default, ..
      } => union_all(branches.values().chain(std::iter::once(&**default))),
      FieldAbsence { branches } => {
        let mut s: Option<IntSet> = None;
        for group in branches.values() {
          s = Some(match s {
            Some(s) => s.union(group),
            None => group.clone(),
          });
        }
        s.unwrap_or(IntSet::Word(Default::default()))
      }
      Error => IntSet::Word(Default::default()),
    }
  }

  /// Reports whether the tree always narrows to at most one arm. When
  /// `collapse_atoms` is set, a multi-arm leaf still counts as perfect
  /// if all its arms have the same atom kind; merged arms of one atom
  /// kind are indistinguishable by design.
  pub fn is_perfect(&self, collapse_atoms: bool, arms: &[Value]) -> bool {
    use DecisionNode::*;
    match self {
      Leaf { arms: leaf_arms } => {
        if leaf_arms.len() <= 1 {
          return true;
        }
        if !collapse_atoms {
          return false;
        }
        let mut kind = Kind::BOTTOM;
        for i in leaf_arms.values() {
          let vk = arms[i].kind();
          if !vk.is_atom() {
            return false;
          }
          if kind != Kind::BOTTOM && kind != vk {
            return false;
          }
          kind = vk;
        }
        true
      }
      KindSwitch { branches, .. } => branches
        .values()
        .all(|n| n.is_perfect(collapse_atoms, arms)),
      ValueSwitch {
        branches, default, ..
      } => {
        branches
          .values()
          .all(|n| n.is_perfect(collapse_atoms, arms))
          && default.is_perfect(collapse_atoms, arms)
      }
      FieldAbsence { .. } => false,
      Error => true,
    }
  }

  pub(crate) fn variant_name(&self) -> &'static str {
    use DecisionNode::*;
    match self {
      Leaf { .. } => "Leaf",
      KindSwitch { .. } => "KindSwitch",
      ValueSwitch { .. } => "ValueSwitch",
      FieldAbsence { .. } => "FieldAbsence",
      Error => "Error",
    }
  }

  fn write<W: Write>(&self, w: &mut IndentWriter<W>) -> io::Result<()> {
    use DecisionNode::*;
    match self {
      Leaf { arms } => w.put(&format!("choose({})", arms)),
      KindSwitch { path, branches } => {
        w.put(&format!("switch kind({}) {{", path))?;
        for (kind, node) in branches {
          w.put(&format!("case {}:", kind))?;
          w.indent();
          node.write(w)?;
          w.unindent();
        }
        w.put("}")
      }
      ValueSwitch {
        path,
        branches,
        default,
      } => {
        w.put(&format!("switch {} {{", path))?;
        for (atom, node) in branches {
          w.put(&format!("case {}:", atom))?;
          w.indent();
          node.write(w)?;
          w.unindent();
        }
        w.put("default:")?;
        w.indent();
        default.write(w)?;
        w.unindent();
        w.put("}")
      }
      FieldAbsence { branches } => {
        w.put("allOf {")?;
        w.indent();
        for (path, group) in branches {
          w.put(&format!("notPresent({}) -> {}", path, group))?;
        }
        w.unindent();
        w.put("}")
      }
      Error => w.put("error"),
    }
  }
}

fn union_all<'a>(nodes: impl Iterator<Item = &'a DecisionNode>) -> IntSet {
  let mut s: Option<IntSet> = None;
  for n in nodes {
    let p = n.possible();
    s = Some(match s {
      Some(s) => s.union(&p),
      None => p,
    });
  }
  s.unwrap_or(IntSet::Word(Default::default()))
}

/// The canonical pseudo-code rendering of a node; same as `Display`.
pub fn node_string(n: &DecisionNode) -> String {
  n.to_string()
}

impl Display for DecisionNode {
  /// Renders the canonical pseudo-code for the tree. Switch branches
  /// come out in sorted key order, so the rendering is deterministic.
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    let mut buf = Vec::new();
    let mut w = IndentWriter::new(&mut buf);
    self.write(&mut w).map_err(|_| fmt::Error)?;
    f.write_str(&String::from_utf8_lossy(&buf))
  }
}

/// A writer that prefixes each line with the current indent level.
pub struct IndentWriter<W: Write> {
  w: W,
  indent: usize,
  midline: bool,
}

impl<W: Write> IndentWriter<W> {
  pub fn new(w: W) -> IndentWriter<W> {
    IndentWriter {
      w,
      indent: 0,
      midline: false,
    }
  }

  pub fn indent(&mut self) {
    self.indent += 1;
  }

  pub fn unindent(&mut self) {
    self.indent -= 1;
  }

  /// Writes one line, supplying the final newline if `s` lacks it.
  pub fn put(&mut self, s: &str) -> io::Result<()> {
    self.write_all(s.as_bytes())?;
    if !s.ends_with('\n') {
      self.write_all(b"\n")?;
    }
    Ok(())
  }
}

impl<W: Write> Write for IndentWriter<W> {
  /// Indents every line started in this call; a trailing partial line
  /// stays open for the next write.
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    for line in buf.split_inclusive(|&b| b == b'\n') {
      if !self.midline {
        for _ in 0..self.indent {
          self.w.write_all(b"\t")?;
        }
        self.midline = true;
      }
      self.w.write_all(line)?;
      if line.ends_with(b"\n") {
        self.midline = false;
      }
    }
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.w.flush()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::schema::parse;
  use crate::set::{SetOps, WordSet};

  fn set(xs: &[usize]) -> IntSet {
    IntSet::Word(WordSet::of(xs))
  }

  #[test]
  fn indent_writer_tracks_partial_lines() {
    let mut buf = Vec::new();
    let mut w = IndentWriter::new(&mut buf);
    w.put("hello {").unwrap();
    w.indent();
    w.put("foo\nbar {").unwrap();
    w.indent();
    w.write_all(b"some\ntext\nwritten").unwrap();
    w.write_all(b" directly\n").unwrap();
    w.unindent();
    w.put("}").unwrap();
    w.unindent();
    w.put("} something").unwrap();
    assert_eq!(
      String::from_utf8(buf).unwrap(),
      "hello {\n\tfoo\n\tbar {\n\t\tsome\n\t\ttext\n\t\twritten directly\n\t}\n} something\n",
    );
  }

  #[test]
  fn leaf_and_error_render() {
    let leaf = DecisionNode::Leaf { arms: set(&[0, 2]) };
    assert_eq!(node_string(&leaf), "choose({0, 2})\n");
    assert_eq!(DecisionNode::Error.to_string(), "error\n");
  }

  #[test]
  fn field_absence_check_intersects_fired_branches() {
    let node = DecisionNode::FieldAbsence {
      branches: BTreeMap::from([
        ("a".to_string(), set(&[1, 2])),
        ("b".to_string(), set(&[0, 2])),
        ("c".to_string(), set(&[0, 1])),
      ]),
    };
    assert_eq!(node.check(&parse("{a: 5}").unwrap()), set(&[0]));
    assert_eq!(node.check(&parse(r#"{a: 1, b: "x"}"#).unwrap()), set(&[0, 1]));
    assert_eq!(
      node.check(&parse(r#"{a: 1, b: "x", c: true}"#).unwrap()),
      set(&[0, 1, 2]),
    );
    assert_eq!(node.possible(), set(&[0, 1, 2]));
  }

  #[test]
  fn value_switch_possible_includes_default() {
    let node = DecisionNode::ValueSwitch {
      path: ".".to_string(),
      branches: BTreeMap::from([(
        Atom::new("\"foo\""),
        DecisionNode::Leaf { arms: set(&[1]) },
      )]),
      default: Box::new(DecisionNode::Leaf { arms: set(&[0]) }),
    };
    assert_eq!(node.possible(), set(&[0, 1]));
    // Whatever check selects is possible.
    for src in [r#""foo""#, r#""bar""#, "42"] {
      let chosen = node.check(&parse(src).unwrap());
      assert_eq!(chosen.intersect(&node.possible()), chosen);
    }
  }

  #[test]
  fn perfectness_collapses_same_kind_atom_leaves() {
    let arms = [
      parse(r#""a""#).unwrap(),
      parse(r#""b""#).unwrap(),
      parse("1").unwrap(),
    ];
    let same = DecisionNode::Leaf { arms: set(&[0, 1]) };
    assert!(!same.is_perfect(false, &arms));
    assert!(same.is_perfect(true, &arms));
    let mixed = DecisionNode::Leaf { arms: set(&[1, 2]) };
    assert!(!mixed.is_perfect(true, &arms));
  }
}
