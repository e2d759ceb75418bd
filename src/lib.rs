//! # syn-peg
//!
//! Compiles PEG grammar source into immutable [`Grammar`] objects that can
//! inherit from each other: a grammar may `define` new rules, `override`
//! (`:=`) rules of its super-grammar, or `extend` (`+=`) them with extra
//! alternatives.
//!
//! ```
//! use syn_peg::{make_grammar, Namespaces};
//! use syn_peg::rt::Matcher;
//!
//! let registry = Namespaces::new();
//! let ns = registry.namespace("app");
//! make_grammar("grammar Parent { Bar = 'y' }", Some(&ns)).unwrap();
//! let child = make_grammar("grammar Child : Parent { Bar := 'x' }", Some(&ns)).unwrap();
//!
//! let m = Matcher::new(&child);
//! assert!(m.match_str("x", "Bar").unwrap().is_some());
//! assert!(m.match_str("y", "Bar").unwrap().is_none());
//! ```

use std::sync::Arc;
use syn_peg_model::parser::{GrammarDefinition, GrammarSource};

pub mod builtins;
mod loader;

// Reference matcher (public: it is how built grammars are exercised)
pub mod rt;

// Fluent assertions for tests
pub mod testing;

pub use syn_peg_macros::grammar;
pub use syn_peg_model::{
    analysis, validator, Builder, CharClass, ConflictPolicy, Error, Expr, Grammar, GrammarRef,
    Namespace, Namespaces, Property, RegexLiteral, Result, Rule, Value,
};

/// What happens to each grammar after it has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Register compiled grammars into the namespace they were loaded with.
    pub register: bool,
    /// Fail on applications of rules that resolve nowhere in the lineage.
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            register: true,
            validate: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Compiles a single grammar declaration.
///
/// An unqualified super-grammar is looked up in `namespace`; a grammar
/// without one inherits from [`builtins::base`].
pub fn make_grammar(source: &str, namespace: Option<&Namespace>) -> Result<Arc<Grammar>> {
    make_grammar_with(source, namespace, &LoadOptions::default())
}

pub fn make_grammar_with(
    source: &str,
    namespace: Option<&Namespace>,
    options: &LoadOptions,
) -> Result<Arc<Grammar>> {
    let def: GrammarDefinition = syn::parse_str(source)?;
    let mut loader = loader::Loader::new(namespace, options);
    let grammar = loader.load(&def)?;
    let mut registered = loader.register(vec![grammar])?;
    Ok(registered.remove(0))
}

/// Compiles every grammar declaration in `source`, in order. A later grammar
/// may name an earlier one as its super-grammar.
pub fn make_grammars(source: &str, namespace: Option<&Namespace>) -> Result<Vec<Arc<Grammar>>> {
    make_grammars_with(source, namespace, &LoadOptions::default())
}

pub fn make_grammars_with(
    source: &str,
    namespace: Option<&Namespace>,
    options: &LoadOptions,
) -> Result<Vec<Arc<Grammar>>> {
    let source: GrammarSource = syn::parse_str(source)?;
    let mut loader = loader::Loader::new(namespace, options);
    let grammars = source
        .grammars
        .iter()
        .map(|def| loader.load(def))
        .collect::<Result<Vec<_>>>()?;
    loader.register(grammars)
}

/// A fresh builder for programmatic grammar construction.
pub fn new_builder() -> Builder {
    Builder::new()
}

// --- UNIT TESTS ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Testable;

    #[test]
    fn test_make_grammar_registers_by_default() {
        let registry = Namespaces::new();
        let ns = registry.namespace("app");
        let g = make_grammar("grammar Greeting { hello = \"hi\" }", Some(&ns))
            .test()
            .assert_success();
        assert!(Arc::ptr_eq(&g, &ns.grammar("Greeting").unwrap()));
    }

    #[test]
    fn test_register_can_be_disabled() {
        let registry = Namespaces::new();
        let ns = registry.namespace("app");
        let opts = LoadOptions::new().register(false);
        make_grammar_with("grammar Quiet { a = _ }", Some(&ns), &opts)
            .test()
            .assert_success();
        assert!(!ns.contains("Quiet"));
    }

    #[test]
    fn test_validate_option() {
        let src = "grammar Loose { a = nowhere }";
        make_grammar(src, None).test().assert_success();
        make_grammar_with(src, None, &LoadOptions::new().validate(true))
            .test()
            .assert_failure_contains("`nowhere`");
    }

    #[test]
    fn test_batch_sees_earlier_grammars_without_a_namespace() {
        let grammars = make_grammars(
            "grammar A { a = 'a' } grammar B : A { a += 'b' }",
            None,
        )
        .test()
        .assert_success();
        assert_eq!(grammars.len(), 2);
        assert!(Arc::ptr_eq(grammars[1].super_grammar().unwrap(), &grammars[0]));
    }

    #[test]
    fn test_make_grammar_rejects_more_than_one_declaration() {
        make_grammar("grammar A { a = _ } grammar B { b = _ }", None)
            .test()
            .assert_failure_contains("malformed grammar source");
    }

    #[test]
    fn test_failed_compilation_registers_nothing() {
        let registry = Namespaces::new();
        let ns = registry.namespace("app");
        make_grammar("grammar Broken { a = _, a = _ }", Some(&ns))
            .test()
            .assert_failure_contains("already defined");
        assert!(!ns.contains("Broken"));
    }

    #[test]
    fn test_printed_grammars_compile_to_the_same_rules() {
        let grammars = make_grammars(
            r#"
            grammar P { r = {"b c": 'x', k: _, ...}, S = #('a') 'b' }
            grammar C : P { r += -1, S := #(~'c' _)* }
            "#,
            None,
        )
        .test()
        .assert_success();
        let printed = grammars
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(!printed.contains(builtins::BASE_GRAMMAR));

        let reloaded = make_grammars(&printed, None).test().assert_success();
        for (original, again) in grammars.iter().zip(&reloaded) {
            assert_eq!(original.name(), again.name());
            for rule in original.rules() {
                let body = again.local_rule(rule.name()).map(Rule::body);
                assert_eq!(body, Some(rule.body()), "rule `{}`", rule.name());
            }
        }
    }

    #[test]
    fn test_new_builder_is_empty() {
        let b = new_builder();
        assert_eq!(b.name(), "Anonymous");
        assert!(b.super_grammar().is_none());
    }
}
