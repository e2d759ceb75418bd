//! Incremental assembly of a [`Grammar`] from rule declarations.
//!
//! A [`Builder`] is created fresh for each grammar declaration, fed with
//! `define`/`override_rule`/`extend` calls, and consumed by [`Builder::build`].

use crate::analysis;
use crate::error::{Error, Result};
use crate::model::{Expr, Grammar, Rule};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_GRAMMAR_NAME: &str = "Anonymous";

#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    super_grammar: Option<Arc<Grammar>>,
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    current_rule: Option<String>,
    inline_counts: HashMap<String, usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_GRAMMAR_NAME)
    }

    /// Links the grammar under construction to its parent. Can only be done once.
    pub fn set_super_grammar(&mut self, parent: Arc<Grammar>) -> Result<&mut Self> {
        if self.super_grammar.is_some() {
            return Err(Error::SuperGrammarAlreadySet {
                grammar: self.name().to_string(),
            });
        }
        log::trace!("{}: super-grammar is {}", self.name(), parent.name());
        self.super_grammar = Some(parent);
        Ok(self)
    }

    pub fn super_grammar(&self) -> Option<&Arc<Grammar>> {
        self.super_grammar.as_ref()
    }

    /// Marks the rule whose body is about to be compiled. Only used to name
    /// inline rules.
    pub fn begin_rule(&mut self, name: impl Into<String>) -> &mut Self {
        self.current_rule = Some(name.into());
        self
    }

    pub fn current_rule(&self) -> Option<&str> {
        self.current_rule.as_deref()
    }

    /// Looks `name` up locally, then along the super-grammar chain.
    pub fn lookup(&self, name: &str) -> Option<&Expr> {
        if let Some(&i) = self.index.get(name) {
            return Some(self.rules[i].body());
        }
        self.super_grammar
            .as_deref()
            .and_then(|g| g.rule(name))
            .map(Rule::body)
    }

    /// Registers a new rule. Fails if the name is already defined locally.
    pub fn define(&mut self, name: &str, body: Expr) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateRule {
                grammar: self.name().to_string(),
                rule: name.to_string(),
            });
        }
        log::debug!("{}: define {}", self.name(), name);
        self.install(Rule::new(name, body));
        Ok(())
    }

    /// Replaces an existing rule, shadowing any ancestor definition.
    pub fn override_rule(&mut self, name: &str, body: Expr) -> Result<()> {
        self.require(name)?;
        log::debug!("{}: override {}", self.name(), name);
        self.install(Rule::new(name, body));
        Ok(())
    }

    /// Appends `body` as a last-resort alternative to an existing rule.
    ///
    /// Every call nests one more `Alt` to the left, so the original
    /// alternatives are always tried first.
    pub fn extend(&mut self, name: &str, body: Expr) -> Result<()> {
        let existing = self.require(name)?.clone();
        log::debug!("{}: extend {}", self.name(), name);
        self.install(Rule::new(name, Expr::alt(existing, body)));
        Ok(())
    }

    /// Registers `body` as an inline rule of the current rule and returns the
    /// expression referring to it.
    ///
    /// Ordinals already taken anywhere in the lineage are skipped, so an
    /// ancestor's inline rules are never shadowed.
    pub fn inline(&mut self, body: Expr) -> Result<Expr> {
        let enclosing = self.current_rule.as_deref().unwrap_or("inline").to_string();
        let mut ordinal = self.inline_counts.get(&enclosing).copied().unwrap_or(0);
        let name = loop {
            ordinal += 1;
            let name = analysis::inline_rule_name(&enclosing, ordinal);
            if self.lookup(&name).is_none() {
                break name;
            }
        };
        self.inline_counts.insert(enclosing, ordinal);
        log::trace!("{}: inline rule {}", self.name(), name);
        self.define(&name, body.clone())?;
        Ok(Expr::Inline(name, Box::new(body)))
    }

    /// Finalizes the grammar. Registration in a namespace is up to the caller.
    pub fn build(self) -> Result<Grammar> {
        let name = self.name().to_string();
        log::debug!("{}: built with {} local rule(s)", name, self.rules.len());
        Ok(Grammar::new(name, self.rules, self.super_grammar))
    }

    fn require(&self, name: &str) -> Result<&Expr> {
        self.lookup(name).ok_or_else(|| Error::UndefinedRule {
            grammar: self.name().to_string(),
            rule: name.to_string(),
        })
    }

    fn install(&mut self, rule: Rule) {
        match self.index.get(rule.name()) {
            Some(&i) => self.rules[i] = rule,
            None => {
                self.index.insert(rule.name().to_string(), self.rules.len());
                self.rules.push(rule);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> Arc<Grammar> {
        let mut b = Builder::new();
        b.set_name("Parent");
        b.define("Bar", Expr::prim('y')).unwrap();
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn test_define_rejects_local_duplicates() {
        let mut b = Builder::new();
        b.define("foo", Expr::prim("bar")).unwrap();
        let err = b.define("foo", Expr::prim("baz")).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateRule {
                grammar: "Anonymous".into(),
                rule: "foo".into()
            }
        );
    }

    #[test]
    fn test_define_may_shadow_an_ancestor() {
        let mut b = Builder::new();
        b.set_super_grammar(parent()).unwrap();
        b.define("Bar", Expr::prim('z')).unwrap();
        let g = b.build().unwrap();
        assert_eq!(g.rule("Bar").unwrap().body(), &Expr::prim('z'));
    }

    #[test]
    fn test_override_and_extend_require_an_existing_rule() {
        let mut b = Builder::new();
        b.set_name("Lonely");
        assert!(matches!(
            b.override_rule("missing", Expr::Any),
            Err(Error::UndefinedRule { .. })
        ));
        assert!(matches!(
            b.extend("missing", Expr::Any),
            Err(Error::UndefinedRule { .. })
        ));
    }

    #[test]
    fn test_override_shadows_ancestor_without_touching_it() {
        let parent = parent();
        let mut b = Builder::new();
        b.set_name("Child");
        b.set_super_grammar(parent.clone()).unwrap();
        b.override_rule("Bar", Expr::prim('x')).unwrap();
        let child = b.build().unwrap();

        assert_eq!(child.rule("Bar").unwrap().body(), &Expr::prim('x'));
        assert_eq!(parent.rule("Bar").unwrap().body(), &Expr::prim('y'));
    }

    #[test]
    fn test_extend_nests_to_the_left() {
        let mut b = Builder::new();
        b.set_super_grammar(parent()).unwrap();
        b.extend("Bar", Expr::prim('1')).unwrap();
        b.extend("Bar", Expr::prim('2')).unwrap();
        let g = b.build().unwrap();

        let expected = Expr::alt(
            Expr::alt(Expr::prim('y'), Expr::prim('1')),
            Expr::prim('2'),
        );
        assert_eq!(g.rule("Bar").unwrap().body(), &expected);
    }

    #[test]
    fn test_override_replaces_an_extended_rule() {
        let mut b = Builder::new();
        b.define("r", Expr::prim(1)).unwrap();
        b.extend("r", Expr::prim(2)).unwrap();
        b.override_rule("r", Expr::prim(3)).unwrap();
        let g = b.build().unwrap();
        assert_eq!(g.rule("r").unwrap().body(), &Expr::prim(3));
        assert_eq!(g.rules().count(), 1);
    }

    #[test]
    fn test_inline_names_are_unique_per_enclosing_rule() {
        let mut b = Builder::new();
        b.begin_rule("Expr");
        let first = b.inline(Expr::prim("a")).unwrap();
        let second = b.inline(Expr::prim("b")).unwrap();
        b.begin_rule("Term");
        let third = b.inline(Expr::prim("c")).unwrap();

        assert!(matches!(first, Expr::Inline(ref n, _) if n == "Expr-1"));
        assert!(matches!(second, Expr::Inline(ref n, _) if n == "Expr-2"));
        assert!(matches!(third, Expr::Inline(ref n, _) if n == "Term-1"));

        let g = b.build().unwrap();
        assert!(g.local_rule("Expr-2").unwrap().is_syntactic());
    }

    #[test]
    fn test_inline_names_skip_those_of_ancestors() {
        let mut b = Builder::new();
        b.set_name("Parent");
        b.begin_rule("Expr");
        let original = b.inline(Expr::prim('a')).unwrap();
        b.define("Expr", original).unwrap();
        let parent = Arc::new(b.build().unwrap());

        let mut b = Builder::new();
        b.set_super_grammar(parent.clone()).unwrap();
        b.begin_rule("Expr");
        let added = b.inline(Expr::prim('b')).unwrap();
        assert!(matches!(added, Expr::Inline(ref n, _) if n == "Expr-2"));
        b.extend("Expr", added).unwrap();
        let child = b.build().unwrap();

        assert_eq!(child.rule("Expr-1").unwrap().body(), &Expr::prim('a'));
        assert_eq!(child.rule("Expr-2").unwrap().body(), &Expr::prim('b'));
        assert!(child.local_rule("Expr-1").is_none());
    }

    #[test]
    fn test_super_grammar_is_settable_once() {
        let mut b = Builder::new();
        b.set_super_grammar(parent()).unwrap();
        assert!(matches!(
            b.set_super_grammar(parent()),
            Err(Error::SuperGrammarAlreadySet { .. })
        ));
    }
}
