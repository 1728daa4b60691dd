//! The discrimination search: finding the most informative tests that
//! tell the arms of a disjunction apart, and building a decision tree
//! from them.

use crate::fields::all_fields;
use crate::merge::merge_compatible;
use crate::schema::{Kind, Labels, Value, ALL_KINDS};
use crate::set::IntSet;
use crate::tree::{DecisionNode, IndentWriter};
use crate::valueset::{Atom, ValueSet};
use std::collections::BTreeMap;
use std::io::Write;


/// Options for [`discriminate`].
pub struct Options<'a> {
  /// Sink for a trace of the search. The trace is written while the
  /// search runs and is complete before `discriminate` returns, so it
  /// cannot interleave with whatever the caller prints afterwards.
  pub log_to: Option<&'a mut dyn Write>,
  /// Coalesce compatible arms before searching. The resulting tree
  /// selects merged indices; `groups` maps them back.
  pub merge_compatible: bool,
}

impl Default for Options<'_> {
  fn default() -> Self {
    Options {
      log_to: None,
      merge_compatible: false,
    }
  }
}

/// The result of a discrimination search.
#[derive(Debug)]
pub struct Discrimination {
  /// The decision tree. Leaf indices refer to the searched arms, which
  /// are the merged arms when merging was requested.
  pub node: DecisionNode,
  /// For every searched arm, the set of original indices it stands
  /// for; singletons when no merging happened.
  pub groups: Vec<IntSet>,
  /// True when every reachable leaf selects at most one arm (with
  /// same-atom-kind leaves allowed under merging).
  pub perfect: bool,
}

/// Builds a decision tree that decides which arm of a disjunction a
/// concrete value belongs to. With a single arm the tree just selects
/// that arm.
///
/// Imperfection is not an error: when no complete discriminator exists
/// the tree ends in a multi-arm leaf and `perfect` is false.
pub fn discriminate(arms: &[Value], options: Options<'_>) -> Discrimination {
  let (arms, groups) = if options.merge_compatible {
    merge_compatible(arms)
  } else {
    let proto = IntSet::empty_for(arms.len());
    let groups = (0..arms.len())
      .map(|i| {
        let mut g = proto.empty();
        g.add(i);
        g
      })
      .collect();
    (arms.to_vec(), groups)
  };
  let mut search = Search {
    trace: options.log_to.map(IndentWriter::new),
  };
  let selected = IntSet::full(arms.len());
  let node = search.discriminate(&arms, &selected);
  let perfect = node.is_perfect(options.merge_compatible, &arms);
  Discrimination {
    node,
    groups,
    perfect,
  }
}

struct Search<'a> {
  trace: Option<IndentWriter<&'a mut dyn Write>>,
}

impl Search<'_> {
  fn log(&mut self, msg: &str) {
    if let Some(w) = &mut self.trace {
      let _ = w.put(msg);
    }
  }

  fn log_indent(&mut self) {
    if let Some(w) = &mut self.trace {
      w.indent();
    }
  }

  fn log_unindent(&mut self) {
    if let Some(w) = &mut self.trace {
      w.unindent();
    }
  }

  fn discriminate(&mut self, arms: &[Value], selected: &IntSet) -> DecisionNode {
    self.log(&format!("discriminate {} {{", selected));
    self.log_indent();
    let node = self.discriminate0(arms, selected);
    self.log_unindent();
    self.log(&format!("}} -> {}", node.variant_name()));
    node
  }

  fn discriminate0(&mut self, arms: &[Value], selected: &IntSet) -> DecisionNode {
    if selected.len() <= 1 {
      // Nothing to disambiguate.
      return DecisionNode::Leaf {
        arms: selected.clone(),
      };
    }
    // First try to discriminate on the top-level value alone. Progress
    // counts for something: the attempt is treated as complete when it
    // separates all the non-struct arms, since struct arms can still be
    // told apart by their fields below. Only when every arm is a struct
    // must the whole selection be separated here.
    let mut need_discrim = selected.empty();
    for (i, v) in arms.iter().enumerate() {
      if !v.incomplete_kind().intersects(Kind::STRUCT) {
        need_discrim.add(i);
      }
    }
    if need_discrim.is_empty() {
      need_discrim = selected.clone();
    }
    let (by_value, by_kind, full) =
      self.discriminators(arms, selected, &need_discrim);
    if full {
      return self.build_node(".", arms, selected, by_value, by_kind);
    }

    // Look for a single field that discriminates the whole selection.
    for (path, values) in all_fields(arms, selected, Labels::REQUIRED) {
      self.log(&format!("----- PATH {}", path));
      let (by_value, by_kind, full) =
        self.discriminators(&values, selected, selected);
      self.log("values:");
      for (atom, group) in &by_value {
        self.log(&format!("\t{}: {}", atom, group));
      }
      self.log("kinds:");
      for (kind, group) in &by_kind {
        self.log(&format!("\t{}: {}", kind, group));
      }
      if full {
        self.log("fully discriminated");
        return self.build_node(&path, &values, selected, by_value, by_kind);
      }
    }
    self.log(&format!(
      "no pure discriminator found; trying absence checks; selected {}",
      selected
    ));

    // No single test separates everything. Fall back to narrowing by
    // field absence. Testing for presence would not help: all the
    // discrimination is based on required fields, and extra fields are
    // generally allowed, so only a missing field rules an arm out.
    // Each test that removes exactly one arm narrows the candidates.
    let mut possible = selected.clone();
    let mut branches: BTreeMap<String, IntSet> = BTreeMap::new();
    for (path, values) in all_fields(arms, selected, Labels::REQUIRED) {
      let group = existence_discriminator(&values, selected);
      self.log(&format!(
        "----- PATH {} {}; possible {}",
        path, group, possible
      ));
      if group.len() != selected.len() - 1 {
        continue;
      }
      // Exactly one arm is deselected; make sure it is a new one.
      let removed = possible.values().iter().any(|&i| !group.has(i));
      if !removed {
        continue;
      }
      possible = possible.intersect(&group);
      branches.insert(path, group);
      if possible.is_empty() {
        break;
      }
    }
    if !possible.is_empty() {
      // The absence checks cannot settle on a single arm either.
      // TODO do better than giving up on the whole selection here.
      return DecisionNode::Leaf {
        arms: selected.clone(),
      };
    }
    DecisionNode::FieldAbsence { branches }
  }

  /// Computes the possible discriminators between the selected arm
  /// values: one by concrete value and one by kind.
  ///
  /// When the kinds alone discriminate fully, the value map comes back
  /// empty. The flag reports whether the returned maps together fully
  /// discriminate the members of `need_discrim`.
  fn discriminators(
    &mut self,
    arms0: &[Value],
    selected: &IntSet,
    need_discrim: &IntSet,
  ) -> (BTreeMap<Atom, IntSet>, BTreeMap<Kind, IntSet>, bool) {
    let sets: Vec<ValueSet> = arms0
      .iter()
      .enumerate()
      .map(|(i, v)| {
        if selected.has(i) {
          ValueSet::for_value(v)
        } else {
          ValueSet::default()
        }
      })
      .collect();
    let by_kind = kind_discrim(&sets, selected, |s| s.kinds());
    let full = fully_discriminated(by_kind.values(), need_discrim);
    if !has_consts(&sets) || full {
      return (BTreeMap::new(), by_kind, full);
    }
    // Constants are in play: discriminate on them by value, and redo
    // the kind map from the stated types alone so that the two maps
    // partition the work between them.
    let mut by_value = value_discrim(&sets, selected);
    let mut by_kind = kind_discrim(&sets, selected, |s| s.types());
    if by_kind.contains_key(&Kind::NULL) {
      by_value.remove(&Atom::new("null"));
    }
    if by_value.contains_key(&Atom::new("true"))
      && by_value.contains_key(&Atom::new("false"))
    {
      // Both bool values are enumerated, so a bool kind branch would
      // never be reached.
      by_kind.remove(&Kind::BOOL);
    }
    let full = fully_discriminated(
      by_value.values().chain(by_kind.values()),
      need_discrim,
    );
    (by_value, by_kind, full)
  }

  fn build_node(
    &mut self,
    path: &str,
    values: &[Value],
    selected: &IntSet,
    by_value: BTreeMap<Atom, IntSet>,
    by_kind: BTreeMap<Kind, IntSet>,
  ) -> DecisionNode {
    let kind_switch = if by_kind.is_empty() {
      DecisionNode::Error
    } else {
      let mut branches = BTreeMap::new();
      for (k, group) in by_kind {
        self.log(&format!("kind {}: {}", k, group));
        let branch = if k == Kind::STRUCT && group.len() > 1 {
          // Several struct arms land here; their fields can still be
          // told apart.
          self.discriminate(values, &group)
        } else if group == *selected {
          // No progress is possible; terminate.
          DecisionNode::Leaf {
            arms: selected.clone(),
          }
        } else {
          self.discriminate(values, &group)
        };
        branches.insert(k, branch);
      }
      DecisionNode::KindSwitch {
        path: path.to_string(),
        branches,
      }
    };
    if by_value.is_empty() {
      return kind_switch;
    }
    let mut branches = BTreeMap::new();
    for (atom, group) in by_value {
      let branch = if group == *selected {
        DecisionNode::Leaf {
          arms: selected.clone(),
        }
      } else {
        self.log(&format!("valSwitch {}", atom));
        self.discriminate(values, &group)
      };
      branches.insert(atom, branch);
    }
    DecisionNode::ValueSwitch {
      path: path.to_string(),
      branches,
      default: Box::new(kind_switch),
    }
  }
}

/// Assigns each selected arm to every kind its discrimination set
/// intersects, with `arm_kind` choosing which kind view to use.
fn kind_discrim(
  sets: &[ValueSet],
  selected: &IntSet,
  arm_kind: impl Fn(&ValueSet) -> Kind,
) -> BTreeMap<Kind, IntSet> {
  let mut m: BTreeMap<Kind, IntSet> = BTreeMap::new();
  for i in selected.values() {
    for k in ALL_KINDS {
      if !arm_kind(&sets[i]).intersects(k) {
        continue;
      }
      m.entry(k).or_insert_with(|| selected.empty()).add(i);
    }
  }
  m
}

/// Maps each constant to the arms that are known to be selected for
/// it: the arms that state the constant, plus the arms whose types
/// admit its kind.
fn value_discrim(
  sets: &[ValueSet],
  selected: &IntSet,
) -> BTreeMap<Atom, IntSet> {
  let mut by_value: BTreeMap<Atom, IntSet> = BTreeMap::new();
  for i in selected.values() {
    for c in sets[i].consts() {
      by_value
        .entry(c.clone())
        .or_insert_with(|| selected.empty())
        .add(i);
    }
  }
  for (c, group) in by_value.iter_mut() {
    let kind = c.kind();
    for (i, s) in sets.iter().enumerate() {
      if s.types().intersects(kind) {
        group.add(i);
      }
    }
  }
  by_value
}

fn has_consts(sets: &[ValueSet]) -> bool {
  sets.iter().any(|s| !s.consts().is_empty())
}

/// Reports whether the groups fully discriminate the members of
/// `need_discrim`: each group selects at most one of them, and every
/// one of them appears in some group.
fn fully_discriminated<'a>(
  groups: impl Iterator<Item = &'a IntSet>,
  need_discrim: &IntSet,
) -> bool {
  let mut found = need_discrim.empty();
  for g in groups {
    let mut n = 0;
    for y in g.values() {
      if !need_discrim.has(y) {
        continue;
      }
      found.add(y);
      n += 1;
    }
    if n > 1 {
      return false;
    }
  }
  found.len() == need_discrim.len()
}

/// The subset of `selected` that a non-existence check on these values
/// would select. The values come from required fields, so an arm whose
/// value exists requires the field, and an absent value means the
/// check cannot rule that arm out.
fn existence_discriminator(values: &[Value], selected: &IntSet) -> IntSet {
  let mut discrim = selected.empty();
  for i in selected.values() {
    if !values[i].exists() {
      discrim.add(i);
    }
  }
  discrim
}
