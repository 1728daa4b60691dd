use super::*;
use crate::schema::parse;

fn vs(src: &str) -> ValueSet {
  ValueSet::for_value(&parse(src).unwrap())
}

fn types(k: Kind) -> ValueSet {
  ValueSet {
    types: k,
    consts: BTreeSet::new(),
  }
}

fn consts(atoms: &[&str]) -> ValueSet {
  ValueSet {
    types: Kind::BOTTOM,
    consts: atoms.iter().map(|a| Atom::new(*a)).collect(),
  }
}

struct ForValueTest {
  name: &'static str,
  src: &'static str,
  want: fn() -> ValueSet,
}

#[test]
fn for_value() {
  let tests = [
    ForValueTest {
      name: "bool literal true",
      src: "true",
      want: || consts(&["true"]),
    },
    ForValueTest {
      name: "bool literal false",
      src: "false",
      want: || consts(&["false"]),
    },
    ForValueTest {
      name: "int literal",
      src: "42",
      want: || consts(&["42"]),
    },
    ForValueTest {
      name: "float literal",
      src: "3.14",
      want: || consts(&["3.14"]),
    },
    ForValueTest {
      name: "string literal",
      src: r#""hello""#,
      want: || consts(&[r#""hello""#]),
    },
    ForValueTest {
      // Null stays a type so that kind discrimination is preferred.
      name: "null literal",
      src: "null",
      want: || types(Kind::NULL),
    },
    ForValueTest {
      name: "bool type",
      src: "bool",
      want: || types(Kind::BOOL),
    },
    ForValueTest {
      name: "int or float is number",
      src: "int | float",
      want: || types(Kind::NUMBER),
    },
    ForValueTest {
      name: "top",
      src: "_",
      want: || types(Kind::TOP),
    },
    ForValueTest {
      name: "string or struct",
      src: r#"string | {a!: int}"#,
      want: || types(Kind::STRING | Kind::STRUCT),
    },
    ForValueTest {
      name: "two string literals",
      src: r#""hello" | "world""#,
      want: || consts(&[r#""hello""#, r#""world""#]),
    },
    ForValueTest {
      name: "literal and type",
      src: r#""foo" | bool"#,
      want: || ValueSet {
        types: Kind::BOOL,
        consts: BTreeSet::from([Atom::new(r#""foo""#)]),
      },
    },
    ForValueTest {
      name: "struct is its kind",
      src: "{}",
      want: || types(Kind::STRUCT),
    },
    ForValueTest {
      name: "mix of everything",
      src: r#"{foo!: int} | [] | "one" | "two" | 2 | number"#,
      want: || ValueSet {
        types: Kind::LIST | Kind::NUMBER | Kind::STRUCT,
        consts: BTreeSet::from([Atom::new(r#""one""#), Atom::new(r#""two""#)]),
      },
    },
    ForValueTest {
      name: "bottom",
      src: "_|_",
      want: || types(Kind::BOTTOM),
    },
  ];
  for test in tests {
    assert_eq!(vs(test.src), (test.want)(), "{}", test.name);
  }
}

struct OpTest {
  name: &'static str,
  a: &'static str,
  b: &'static str,
  op: fn(&ValueSet, &ValueSet) -> ValueSet,
  want: fn() -> ValueSet,
}

#[test]
fn operations() {
  let tests = [
    OpTest {
      name: "union of true and false",
      a: "true",
      b: "false",
      op: ValueSet::union,
      want: || consts(&["true", "false"]),
    },
    OpTest {
      name: "intersect of identical literals",
      a: r#""foo""#,
      b: r#""foo""#,
      op: ValueSet::intersect,
      want: || consts(&[r#""foo""#]),
    },
    OpTest {
      name: "intersect of top and number",
      a: "_",
      b: "number",
      op: ValueSet::intersect,
      want: || types(Kind::NUMBER),
    },
    OpTest {
      name: "intersect of top and literals",
      a: "_",
      b: r#""a" | true"#,
      op: ValueSet::intersect,
      want: || consts(&[r#""a""#, "true"]),
    },
    OpTest {
      name: "intersect of distinct literals is empty",
      a: r#""foo""#,
      b: r#""bar""#,
      op: ValueSet::intersect,
      want: ValueSet::default,
    },
    OpTest {
      // Normalization drops the atom once its kind is covered.
      name: "union of bool type and true",
      a: "bool",
      b: "true",
      op: ValueSet::union,
      want: || types(Kind::BOOL),
    },
    OpTest {
      name: "intersect of bool type and true",
      a: "bool",
      b: "true",
      op: ValueSet::intersect,
      want: || consts(&["true"]),
    },
    OpTest {
      name: "without removes a covered literal",
      a: "string | number",
      b: r#""hello""#,
      op: ValueSet::without,
      want: || types(Kind::STRING | Kind::NUMBER),
    },
    OpTest {
      name: "without the whole kind",
      a: "true | false",
      b: "bool",
      op: ValueSet::without,
      want: ValueSet::default,
    },
  ];
  for test in tests {
    let got = (test.op)(&vs(test.a), &vs(test.b));
    assert_eq!(got, (test.want)(), "{}", test.name);
  }
}

#[test]
fn algebra_laws() {
  let samples = [
    "true",
    "bool",
    r#""foo" | "bar""#,
    "int | float",
    r#"null | 5 | "x""#,
    "_",
    "_|_",
  ];
  for a in samples {
    for b in samples {
      let (sa, sb) = (vs(a), vs(b));
      assert_eq!(sa.union(&sb), sb.union(&sa), "union commutes: {} {}", a, b);
      assert_eq!(
        sa.union(&sb).intersect(&sa),
        sa,
        "absorption: {} {}",
        a,
        b
      );
      assert!(sa.without(&sa).is_empty(), "self difference: {}", a);
      for c in samples {
        let sc = vs(c);
        assert_eq!(
          sa.union(&sb).union(&sc),
          sa.union(&sb.union(&sc)),
          "union associates: {} {} {}",
          a,
          b,
          c
        );
        assert_eq!(
          sa.intersect(&sb.union(&sc)),
          sa.intersect(&sb).union(&sa.intersect(&sc)),
          "intersect distributes: {} {} {}",
          a,
          b,
          c
        );
      }
    }
  }
}

#[test]
fn empties() {
  assert!(ValueSet::default().is_empty());
  assert!(!vs(r#""foo""#).is_empty());
  assert!(!vs("bool").is_empty());
  assert!(vs("true | false").without(&vs("bool")).is_empty());
}

#[test]
fn kinds_include_atom_kinds() {
  assert_eq!(vs(r#""foo" | bool"#).kinds(), Kind::STRING | Kind::BOOL);
  assert_eq!(vs(r#""foo" | bool"#).types(), Kind::BOOL);
}

#[test]
fn holds_atom_covers_types_and_consts() {
  let s = vs(r#""foo" | bool"#);
  assert!(s.holds_atom(&Atom::new(r#""foo""#)));
  assert!(s.holds_atom(&Atom::new("true")));
  assert!(!s.holds_atom(&Atom::new(r#""bar""#)));
}

#[test]
fn atom_kind_from_first_character() {
  assert_eq!(Atom::new(r#""x""#).kind(), Kind::STRING);
  assert_eq!(Atom::new("'x'").kind(), Kind::BYTES);
  assert_eq!(Atom::new("42").kind(), Kind::NUMBER);
  assert_eq!(Atom::new("3.14").kind(), Kind::NUMBER);
  assert_eq!(Atom::new("-7").kind(), Kind::NUMBER);
  assert_eq!(Atom::new("null").kind(), Kind::NULL);
  assert_eq!(Atom::new("true").kind(), Kind::BOOL);
  assert_eq!(Atom::new("false").kind(), Kind::BOOL);
}

#[test]
fn atoms_come_from_concrete_values_only() {
  assert_eq!(
    atom_for_value(&parse("42").unwrap()),
    Some(Atom::new("42"))
  );
  assert_eq!(
    atom_for_value(&parse("4.0").unwrap()),
    Some(Atom::new("4.0"))
  );
  assert_eq!(atom_for_value(&parse("int").unwrap()), None);
  assert_eq!(atom_for_value(&parse(">5").unwrap()), None);
  assert_eq!(atom_for_value(&parse("{}").unwrap()), None);
  assert_eq!(atom_for_value(&parse("[1]").unwrap()), None);
}

#[test]
fn display_lists_kinds_then_atoms() {
  assert_eq!(vs(r#""foo" | bool"#).to_string(), r#"(bool | "foo")"#);
  assert_eq!(vs("int | float").to_string(), "(int | float)");
  assert_eq!(ValueSet::default().to_string(), "()");
}
