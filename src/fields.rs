//! Breadth-first iteration over the fields of a set of arms.

use crate::schema::{path_concat, Kind, Labels, Value};
use crate::set::IntSet;
use std::collections::{HashMap, VecDeque};

/// Returns an iterator over `(path, values)` for every field reachable
/// from the selected arms, where `values[i]` is the value at that path
/// in arm `i` (bottom when the arm has no such field). Only fields whose
/// label is in `mask` are followed.
///
/// The traversal is breadth first, with a twist: at each level, fields
/// whose value in at least one arm is not a struct come out before the
/// struct-only fields, and only the latter are descended into. Leaf
/// fields are the useful discriminators, so the search should see them
/// before anything nested.
pub fn all_fields(
  values: &[Value],
  selected: &IntSet,
  mask: Labels,
) -> FieldWalker {
  let mut queue = VecDeque::new();
  // The root level may include arms outside the selection; they are
  // skipped when the level is expanded.
  queue.push_back((".".to_string(), values.to_vec()));
  FieldWalker {
    selected: selected.clone(),
    mask,
    queue,
    ready: VecDeque::new(),
  }
}

/// Iterator state for [`all_fields`].
pub struct FieldWalker {
  selected: IntSet,
  mask: Labels,
  queue: VecDeque<(String, Vec<Value>)>,
  ready: VecDeque<(String, Vec<Value>, bool)>,
}

impl FieldWalker {
  fn fill_level(&mut self, path: &str, values: &[Value]) {
    let mut ordered: Vec<(String, Vec<Value>)> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (i, v) in values.iter().enumerate() {
      if !self.selected.has(i) {
        continue;
      }
      for field in v.fields(self.mask) {
        let idx = match by_name.get(&field.name) {
          Some(&idx) => idx,
          None => {
            by_name.insert(field.name.clone(), ordered.len());
            ordered
              .push((field.name.clone(), vec![Value::bottom(); values.len()]));
            ordered.len() - 1
          }
        };
        ordered[idx].1[i] = field.value.clone();
      }
    }

    let mut structs_only = Vec::new();
    for (name, vals) in ordered {
      let has_non_struct = vals
        .iter()
        .any(|v| v.exists() && v.incomplete_kind() != Kind::STRUCT);
      let full_path = path_concat(path, &name);
      if has_non_struct {
        self.ready.push_back((full_path, vals, false));
      } else {
        structs_only.push((full_path, vals));
      }
    }
    for (full_path, vals) in structs_only {
      self.ready.push_back((full_path, vals, true));
    }
  }
}

impl Iterator for FieldWalker {
  type Item = (String, Vec<Value>);

  fn next(&mut self) -> Option<(String, Vec<Value>)> {
    loop {
      if let Some((path, values, descend)) = self.ready.pop_front() {
        if descend {
          self.queue.push_back((path.clone(), values.clone()));
        }
        return Some((path, values));
      }
      let (path, values) = self.queue.pop_front()?;
      self.fill_level(&path, &values);
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::schema::parse;
  use crate::split::disjunctions;

  fn walk(src: &str, mask: Labels) -> String {
    let v = parse(src).unwrap();
    let arms = disjunctions(&v);
    let selected = IntSet::full(arms.len());
    let mut out = String::new();
    for (path, values) in all_fields(&arms, &selected, mask) {
      let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
      out.push_str(&format!("{}: [{}]\n", path, rendered.join(", ")));
    }
    out
  }

  #[test]
  fn simple_struct() {
    assert_eq!(
      walk("a!: int, b!: string", Labels::REQUIRED),
      "a: [int]\nb: [string]\n",
    );
  }

  #[test]
  fn label_mask_selects_fields() {
    assert_eq!(
      walk("a!: int, b?: string, c: 5", Labels::all()),
      "a: [int]\nb: [string]\nc: [5]\n",
    );
    assert_eq!(walk("a!: int, b?: string, c: 5", Labels::REQUIRED), "a: [int]\n");
  }

  #[test]
  fn nested_struct_comes_after_leaves() {
    let src = r#"
a!: int
b!: x!: string
b!: y!: "foo"
c!: null
"#;
    assert_eq!(
      walk(src, Labels::REQUIRED),
      "a: [int]\n\
       c: [null]\n\
       b: [{x!: string, y!: \"foo\"}]\n\
       b.x: [string]\n\
       b.y: [\"foo\"]\n",
    );
  }

  #[test]
  fn just_atoms_have_no_fields() {
    assert_eq!(walk("1 | 2", Labels::REQUIRED), "");
  }

  #[test]
  fn fields_line_up_across_arms() {
    let src = r#"
{a!: "x", b!: bool, c?: string} |
{a!: "y", d!: bool}
"#;
    assert_eq!(
      walk(src, Labels::REQUIRED),
      "a: [\"x\", \"y\"]\n\
       b: [bool, _|_]\n\
       d: [_|_, bool]\n",
    );
  }

  #[test]
  fn non_struct_arms_report_bottom() {
    let src = r#"
>5 | null | "foo" | "bar" | {
  type!: "t1"
  a!: bool
} | {
  type!: "t2"
  b!: int
}
"#;
    assert_eq!(
      walk(src, Labels::REQUIRED),
      "type: [_|_, _|_, _|_, _|_, \"t1\", \"t2\"]\n\
       a: [_|_, _|_, _|_, _|_, bool, _|_]\n\
       b: [_|_, _|_, _|_, _|_, _|_, int]\n",
    );
  }

  #[test]
  fn optional_fields_do_not_descend_by_default() {
    let src = r#"
discrim!: kind!: "foo"
a?: int
"#;
    assert_eq!(
      walk(src, Labels::REQUIRED),
      "discrim: [{kind!: \"foo\"}]\ndiscrim.kind: [\"foo\"]\n",
    );
  }
}
