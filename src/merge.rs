//! Coalescing arms that are equivalent for data-representation
//! purposes, and synthesising a single schema expression for a merged
//! group.

use crate::fields::all_fields;
use crate::schema::{Field, Kind, Labels, ListShape, Value, ALL_KINDS};
use crate::set::IntSet;
use std::collections::{BTreeMap, HashMap, HashSet};


/// Returns `arms` with all members that are compatible merged into a
/// single representative, along with one group per returned arm naming
/// the original indices it stands for.
///
/// Two arms are compatible when they have the same atom kind, or they
/// are both structs (or both lists) whose shared positions all agree on
/// kind, recursively. To keep things simple, when there are several
/// struct or list arms they must all be mutually compatible or none are
/// merged.
///
/// The representative for a merged group is the first arm of the group.
/// Only the top level is merged, and the discrimination core uses kind
/// as its primary distinguishing feature, so the arbitrary choice does
/// not affect results. Merging makes it possible to produce a usable
/// discriminator for otherwise indistinguishable arms such as
/// `"a" | "b" | =~"^x"`.
pub fn merge_compatible(arms: &[Value]) -> (Vec<Value>, Vec<IntSet>) {
  let proto = IntSet::empty_for(arms.len());
  let mut by_kind: HashMap<Kind, IntSet> = HashMap::new();
  let mut composites: HashMap<Kind, Vec<Value>> = HashMap::new();
  for (i, arm) in arms.iter().enumerate() {
    let k = arm.incomplete_kind();
    if all_atoms_kind(k) {
      by_kind.entry(k).or_insert_with(|| proto.empty()).add(i);
    } else if k == Kind::STRUCT || k == Kind::LIST {
      composites.entry(k).or_default().push(arm.clone());
    }
  }
  for (k, vs) in &composites {
    if !compatible(vs) {
      continue;
    }
    let mut from = proto.empty();
    for (i, arm) in arms.iter().enumerate() {
      if arm.incomplete_kind() == *k {
        from.add(i);
      }
    }
    by_kind.insert(*k, from);
  }

  // Keep the first arm of every merged group, and every arm that did
  // not merge with anything.
  let mut done: HashSet<Kind> = HashSet::new();
  let mut arms1 = Vec::new();
  let mut groups = Vec::new();
  for (i, arm) in arms.iter().enumerate() {
    let k = arm.incomplete_kind();
    let from_len = by_kind.get(&k).map_or(0, |s| s.len());
    if from_len <= 1 || !done.contains(&k) {
      let group = match by_kind.get(&k) {
        Some(s) if !s.is_empty() => s.clone(),
        _ => {
          let mut g = proto.empty();
          g.add(i);
          g
        }
      };
      arms1.push(arm.clone());
      groups.push(group);
      done.insert(k);
    }
  }
  (arms1, groups)
}

/// Reports whether all the given values are compatible: either all
/// atoms of the same kind, or all structs (or lists) whose shared
/// positions agree on kind at every depth. Missing values are ignored.
pub fn compatible(arms: &[Value]) -> bool {
  if arms.len() <= 1 {
    return true;
  }
  if !compatible_kinds(arms) {
    return false;
  }
  let k = arms[0].incomplete_kind();
  if k == Kind::STRUCT {
    let selected = IntSet::full(arms.len());
    for (_, values) in all_fields(arms, &selected, Labels::all()) {
      if !compatible_kinds(&values) {
        return false;
      }
    }
    true
  } else if k == Kind::LIST {
    let (shapes, longest) = list_shapes(arms);
    for i in 0..longest {
      if !compatible(&list_values_at(&shapes, i)) {
        return false;
      }
    }
    true
  } else {
    true
  }
}

fn compatible_kinds(values: &[Value]) -> bool {
  let mut known: Option<Kind> = None;
  for v in values {
    if !v.exists() {
      continue;
    }
    let vk = v.incomplete_kind();
    match known {
      None => known = Some(vk),
      Some(k) if k != vk => return false,
      _ => {}
    }
  }
  true
}

fn all_atoms_kind(k: Kind) -> bool {
  !k.is_empty()
    && (Kind::NULL | Kind::BOOL | Kind::NUMBER | Kind::STRING | Kind::BYTES)
      .contains(k)
}

/// Synthesises a schema expression that can hold instances of any of
/// the given arms. Intended for groups that [`merge_compatible`] found
/// compatible.
///
/// # Panics
///
/// Panics when called with no arms.
pub fn data_type(arms: &[Value]) -> Value {
  if arms.is_empty() {
    panic!("data_type called with no arms");
  }
  let k = arms
    .iter()
    .fold(Kind::BOTTOM, |k, v| k | v.incomplete_kind());
  if k.bits().count_ones() > 1 {
    return syntax_for_kind(k);
  }
  if k == Kind::STRUCT {
    data_type_structs(arms)
  } else if k == Kind::LIST {
    data_type_lists(arms)
  } else {
    syntax_for_kind(k)
  }
}

fn data_type_structs(arms: &[Value]) -> Value {
  struct FieldInfo {
    label: Labels,
    values: Vec<Value>,
  }
  let mut fields: BTreeMap<String, FieldInfo> = BTreeMap::new();
  for v in arms {
    for field in v.fields(Labels::all()) {
      let info = fields.entry(field.name.clone()).or_insert(FieldInfo {
        label: field.label,
        values: Vec::new(),
      });
      info.values.push(field.value.clone());
      info.label = label_or(info.label, field.label);
    }
  }
  Value::struct_of(
    fields
      .into_iter()
      .map(|(name, info)| Field {
        name,
        label: info.label,
        value: data_type(&info.values),
      })
      .collect(),
  )
}

// Fields that disagree on their label class become optional.
fn label_or(l1: Labels, l2: Labels) -> Labels {
  if l1 == l2 {
    l1
  } else {
    Labels::OPTIONAL
  }
}

fn data_type_lists(arms: &[Value]) -> Value {
  let (shapes, longest) = list_shapes(arms);
  let has_rest = shapes.iter().any(|s| s.rest.is_some());
  let mut elems = Vec::new();
  let mut rest = None;
  for i in 0..=longest {
    let elem = data_type(&list_values_at(&shapes, i));
    if i < longest || !has_rest {
      elems.push(elem);
    } else {
      rest = Some(elem);
    }
  }
  Value::list_of(elems, rest)
}

fn syntax_for_kind(k: Kind) -> Value {
  if k == Kind::TOP {
    return Value::top();
  }
  let mut args = Vec::new();
  for ak in ALL_KINDS {
    if !k.intersects(ak) {
      continue;
    }
    let arg = if ak == Kind::STRUCT {
      Value::open_struct(Vec::new())
    } else if ak == Kind::LIST {
      Value::list_of(Vec::new(), Some(Value::top()))
    } else {
      Value::type_ident(ak).expect("atom kind has an ident")
    };
    args.push(arg);
  }
  if args.is_empty() {
    return Value::bottom();
  }
  Value::or_of(args)
}

/// The shapes of all the given list values, and the widest position
/// count across them.
///
/// # Panics
///
/// Panics when a value is not a list; callers dispatch on kind first.
fn list_shapes(arms: &[Value]) -> (Vec<ListShape>, usize) {
  let mut shapes = Vec::with_capacity(arms.len());
  let mut longest = 0;
  for v in arms {
    let shape = match v.list_shape() {
      Some(shape) => shape,
      None => panic!("list operation on non-list value {}", v),
    };
    longest = longest.max(shape.width());
    shapes.push(shape);
  }
  (shapes, longest)
}

fn list_values_at(shapes: &[ListShape], i: usize) -> Vec<Value> {
  shapes.iter().map(|s| s.at(i)).collect()
}
