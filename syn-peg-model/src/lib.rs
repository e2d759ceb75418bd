//! # syn-peg-model
//!
//! The grammar object model behind `syn-peg`: expressions, rules, immutable
//! grammars linked through a super-grammar chain, the builder that composes
//! them, and the namespaces used to look them up.
//!
//! ## Pipeline
//!
//! 1. **[parser]**: Parse grammar source into a syntactic AST.
//! 2. **[validator]**: Reject declarations that can never build (spans attached).
//! 3. **[builder]**: Feed rule declarations into a [`Builder`] and build a [`Grammar`].
//! 4. **[namespace]**: Register grammars so others can inherit from them.

pub mod analysis;
pub mod builder;
pub mod error;
pub mod model;
pub mod namespace;
pub mod parser;
pub mod validator;

pub use builder::Builder;
pub use error::{Error, Result};
pub use model::{CharClass, Expr, Grammar, GrammarRef, Property, RegexLiteral, Rule, Value};
pub use namespace::{ConflictPolicy, Namespace, Namespaces};

/// Name of the root grammar that source grammars inherit from by default.
pub const BASE_GRAMMAR: &str = "Base";

/// The rule applied before each term of a syntactic rule.
pub const SKIP_RULE: &str = "spaces";

/// Rules every grammar compiled from source inherits from the base grammar.
pub const BASE_RULES: &[&str] = &[
    "anything", "end", "empty", "char", "digit", "lower", "upper", "letter", "alnum", "space",
    SKIP_RULE,
];
