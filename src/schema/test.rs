use super::*;

fn roundtrip(src: &str) -> String {
  parse(src).unwrap().to_string()
}

#[test]
fn literals_render_canonically() {
  assert_eq!(roundtrip("42"), "42");
  assert_eq!(roundtrip("-7"), "-7");
  assert_eq!(roundtrip("3.14"), "3.14");
  // Floats keep a decimal point even when integral.
  assert_eq!(roundtrip("4.0"), "4.0");
  assert_eq!(roundtrip("true"), "true");
  assert_eq!(roundtrip("false"), "false");
  assert_eq!(roundtrip("null"), "null");
  assert_eq!(roundtrip(r#""foo""#), r#""foo""#);
  assert_eq!(roundtrip("'ab'"), "'ab'");
  assert_eq!(roundtrip("_"), "_");
  assert_eq!(roundtrip("_|_"), "_|_");
}

#[test]
fn string_escapes_are_canonicalized() {
  assert_eq!(roundtrip(r#""a\u{0041}b""#), r#""aAb""#);
  assert_eq!(roundtrip(r#""tab\there""#), "\"tab\\there\"");
  assert_eq!(parse(r#""q\"q""#).unwrap().to_string(), r#""q\"q""#);
}

#[test]
fn type_idents() {
  for src in ["bool", "int", "float", "number", "string", "bytes"] {
    assert_eq!(roundtrip(src), src);
  }
}

#[test]
fn compound_expressions_roundtrip() {
  assert_eq!(roundtrip("string | int"), "string | int");
  assert_eq!(
    roundtrip("int | bool | (null | bytes)"),
    "int | bool | (null | bytes)",
  );
  assert_eq!(roundtrip("int & >3"), "int & >3");
  assert_eq!(roundtrip(r#"=~"^a""#), r#"=~"^a""#);
  assert_eq!(roundtrip("[int, ...string]"), "[int, ...string]");
  assert_eq!(roundtrip("[...]"), "[...]");
  assert_eq!(
    roundtrip(r#"{type!: "foo", a?: int, b: 5}"#),
    r#"{type!: "foo", a?: int, b: 5}"#,
  );
  assert_eq!(roundtrip("{...}"), "{...}");
  assert_eq!(
    roundtrip(r#"matchN(1, [true, false])"#),
    "matchN(1, [true, false])",
  );
}

#[test]
fn bare_field_lists_read_as_structs() {
  assert_eq!(
    roundtrip("a!: int, b?: string"),
    "{a!: int, b?: string}",
  );
  assert_eq!(
    roundtrip("a!: int\nb!: string\n"),
    "{a!: int, b!: string}",
  );
}

#[test]
fn nested_field_shorthand() {
  assert_eq!(
    roundtrip(r#"discrim!: kind!: "foo""#),
    r#"{discrim!: {kind!: "foo"}}"#,
  );
}

#[test]
fn duplicate_struct_fields_unify() {
  assert_eq!(
    roundtrip("b!: x!: string\nb!: y!: \"foo\""),
    r#"{b!: {x!: string, y!: "foo"}}"#,
  );
  assert!(parse("a!: int, a!: int").is_err());
}

#[test]
fn comments_and_blank_lines_are_skipped() {
  assert_eq!(
    roundtrip("// header\na!: int // trailing\n\nb!: string"),
    "{a!: int, b!: string}",
  );
}

#[test]
fn incomplete_kinds() {
  let cases: &[(&str, Kind)] = &[
    ("42", Kind::INT),
    ("4.5", Kind::FLOAT),
    ("int", Kind::INT),
    ("number", Kind::NUMBER),
    (">5", Kind::NUMBER),
    (r#"=~"x""#, Kind::STRING),
    (r#">"a""#, Kind::STRING),
    ("_", Kind::TOP),
    ("_|_", Kind::BOTTOM),
    ("{a!: int}", Kind::STRUCT),
    ("[int]", Kind::LIST),
    ("string | int", Kind::STRING | Kind::INT),
    ("int & >3", Kind::NUMBER & Kind::INT),
    ("matchN(1, [int, string])", Kind::INT | Kind::STRING),
    ("matchN(0, [int, string])", Kind::TOP),
  ];
  for (src, want) in cases {
    assert_eq!(parse(src).unwrap().incomplete_kind(), *want, "{}", src);
  }
}

#[test]
fn concrete_kinds() {
  assert_eq!(parse("42").unwrap().kind(), Kind::INT);
  assert_eq!(parse("null").unwrap().kind(), Kind::NULL);
  assert_eq!(parse("int").unwrap().kind(), Kind::BOTTOM);
  assert_eq!(parse(">5").unwrap().kind(), Kind::BOTTOM);
  assert_eq!(parse("{a: 1}").unwrap().kind(), Kind::STRUCT);
  assert_eq!(parse("[1]").unwrap().kind(), Kind::LIST);
}

#[test]
fn lookup_path_descends_structs() {
  let v = parse(r#"{a!: {b!: int}, c?: string, d: 1}"#).unwrap();
  assert_eq!(v.lookup_path("a.b").to_string(), "int");
  assert_eq!(v.lookup_path("d").to_string(), "1");
  assert!(!v.lookup_path("missing").exists());
  assert!(!v.lookup_path("a.b.c").exists());
  // Optional fields do not resolve.
  assert!(!v.lookup_path("c").exists());
  // The root paths name the value itself.
  assert_eq!(v.lookup_path(".").to_string(), v.to_string());
  assert_eq!(v.lookup_path("").to_string(), v.to_string());
}

#[test]
fn field_iteration_respects_the_mask() {
  let v = parse(r#"{a!: int, b?: string, c: 5}"#).unwrap();
  let names = |mask: Labels| -> Vec<String> {
    v.fields(mask).map(|f| f.name.clone()).collect()
  };
  assert_eq!(names(Labels::REQUIRED), ["a"]);
  assert_eq!(names(Labels::OPTIONAL), ["b"]);
  assert_eq!(names(Labels::REGULAR), ["c"]);
  assert_eq!(names(Labels::all()), ["a", "b", "c"]);
  assert_eq!(
    parse("42").unwrap().fields(Labels::all()).count(),
    0,
  );
}

#[test]
fn list_shapes() {
  let shape = parse("[int, string, ...bool]").unwrap().list_shape().unwrap();
  assert_eq!(shape.width(), 3);
  assert_eq!(shape.at(0).to_string(), "int");
  assert_eq!(shape.at(1).to_string(), "string");
  assert_eq!(shape.at(2).to_string(), "bool");
  assert_eq!(shape.at(9).to_string(), "bool");

  let fixed = parse("[int]").unwrap().list_shape().unwrap();
  assert_eq!(fixed.width(), 1);
  assert!(!fixed.at(1).exists());

  assert!(parse("42").unwrap().list_shape().is_none());
}

#[test]
fn from_json_conversion() {
  let json: serde_json::Value =
    serde_json::from_str(r#"{"a": [1, 2.5, "x", null, true]}"#).unwrap();
  let v = Value::from_json(&json);
  assert_eq!(v.to_string(), r#"{a: [1, 2.5, "x", null, true]}"#);
  assert_eq!(v.kind(), Kind::STRUCT);
  assert_eq!(v.lookup_path("a").kind(), Kind::LIST);
}

#[test]
fn parse_errors_carry_offsets() {
  for src in ["\"unterminated", "{a: }", "a!: int, a!: string", "5 |", "(int"] {
    let err = parse(src).unwrap_err();
    assert!(!err.message.is_empty(), "{}", src);
    assert!(err.to_string().contains("parse error"), "{}", src);
  }
}

#[test]
fn kind_display() {
  assert_eq!(Kind::INT.to_string(), "int");
  assert_eq!(Kind::NUMBER.to_string(), "number");
  assert_eq!(Kind::TOP.to_string(), "_");
  assert_eq!(Kind::BOTTOM.to_string(), "_|_");
  assert_eq!((Kind::INT | Kind::STRING).to_string(), "(int|string)");
}

#[test]
fn path_concat_roots() {
  assert_eq!(path_concat(".", "a"), "a");
  assert_eq!(path_concat("", "a"), "a");
  assert_eq!(path_concat("a", "b"), "a.b");
}
