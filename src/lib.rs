//! Decision-tree discrimination for configuration-schema disjunctions.
//!
//! # Goals
//!
//! * Given the arms of a schema disjunction, find the cheapest tests
//!   (kind checks, constant checks, field-absence checks) that tell a
//!   concrete value's arm apart from the others
//! * Report honestly when no complete discriminator exists, and still
//!   produce a best-effort tree
//! * Optionally coalesce arms that are equivalent for data-representation
//!   purposes, so that near-miss schemas such as `"a" | "b" | =~"^x"`
//!   still get a usable discriminator
//!
//! The entry points are [`disjunctions`] to split a value into arms,
//! [`discriminate`] to build a decision tree for them, and
//! [`merge_compatible`]/[`data_type`] for the merged representations.
//!
//! ```
//! use prong::prelude::*;
//!
//! let v = prong::schema::parse(r#"{kind!: "a"} | {kind!: "b"}"#).unwrap();
//! let arms = prong::disjunctions(&v);
//! let d = prong::discriminate(&arms, Options::default());
//! assert!(d.perfect);
//! let chosen = d.node.check(&prong::schema::parse(r#"{kind: "b"}"#).unwrap());
//! assert_eq!(chosen.values(), vec![1]);
//! ```

pub mod discrim;
pub mod fields;
pub mod merge;
pub mod schema;
pub mod set;
pub mod split;
pub mod tree;
pub mod valueset;

pub use discrim::{discriminate, Discrimination, Options};
pub use merge::{data_type, merge_compatible};
pub use split::disjunctions;
pub use tree::node_string;

/// A collection of commonly used types.
pub mod prelude {
  pub use crate::discrim::{Discrimination, Options};
  pub use crate::schema::{Kind, Labels, Value};
  pub use crate::set::IntSet;
  pub use crate::tree::DecisionNode;
  pub use crate::valueset::{Atom, ValueSet};
}
