//! Splitting a schema value into the arms of its disjunction.

use crate::schema::{Expr, Value};

/// Splits `v` into its component disjunction arms, in source order,
/// flattening nested disjunctions. A `matchN` call asking for exactly
/// one match also counts as a disjunction; `matchN(0, ..)` ("none of")
/// and `matchN(n, ..)` for the full list length ("all of") do not.
///
/// A value that is not a disjunction is returned as its own single arm.
pub fn disjunctions(v: &Value) -> Vec<Value> {
  let mut arms = Vec::new();
  append_disjunctions(&mut arms, v);
  arms
}

fn append_disjunctions(dst: &mut Vec<Value>, v: &Value) {
  match v.expr() {
    Expr::Or(args) => {
      for arg in args {
        append_disjunctions(dst, arg);
      }
    }
    Expr::Call("matchN", args)
      if args.len() == 2 && args[0].as_int() == Some(1) =>
    {
      match args[1].list_shape() {
        Some(shape) => {
          for elem in &shape.elems {
            append_disjunctions(dst, elem);
          }
        }
        None => dst.push(v.clone()),
      }
    }
    _ => dst.push(v.clone()),
  }
}
