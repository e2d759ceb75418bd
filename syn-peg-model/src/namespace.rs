//! Registries of named grammars used to resolve super-grammar references.
//!
//! A [`Namespaces`] registry is owned by the host application and hands out one
//! [`Namespace`] per distinct name, created on first reference. Registration
//! is serialized per namespace and conflicts follow the registry's
//! [`ConflictPolicy`].

use crate::error::{Error, Result};
use crate::model::{Grammar, GrammarRef};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// What happens when a grammar name is registered twice in one namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail with [`Error::GrammarAlreadyRegistered`].
    #[default]
    Reject,
    /// Keep the grammar registered first and ignore the newcomer.
    KeepFirst,
}

#[derive(Debug, Default)]
struct Registry {
    policy: ConflictPolicy,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
}

/// Handle to a registry of namespaces. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    registry: Arc<Registry>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            registry: Arc::new(Registry {
                policy,
                namespaces: RwLock::default(),
            }),
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.registry.policy
    }

    /// Returns the namespace called `name`, creating it on first reference.
    pub fn namespace(&self, name: &str) -> Arc<Namespace> {
        namespace_in(&self.registry, name)
    }

    /// Looks up a fully qualified grammar.
    pub fn grammar(&self, namespace: &str, name: &str) -> Result<Arc<Grammar>> {
        self.namespace(namespace).grammar(name)
    }
}

fn namespace_in(registry: &Arc<Registry>, name: &str) -> Arc<Namespace> {
    if let Some(ns) = read(&registry.namespaces).get(name) {
        return ns.clone();
    }
    write(&registry.namespaces)
        .entry(name.to_string())
        .or_insert_with(|| {
            log::debug!("creating namespace {}", name);
            Arc::new(Namespace {
                name: name.to_string(),
                policy: registry.policy,
                grammars: RwLock::default(),
                registry: Arc::downgrade(registry),
            })
        })
        .clone()
}

/// A named set of grammars.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    policy: ConflictPolicy,
    grammars: RwLock<HashMap<String, Arc<Grammar>>>,
    registry: Weak<Registry>,
}

impl Namespace {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grammar(&self, name: &str) -> Result<Arc<Grammar>> {
        read(&self.grammars)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownGrammar {
                namespace: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.grammars).contains_key(name)
    }

    /// Names of the registered grammars, sorted.
    pub fn grammar_names(&self) -> Vec<String> {
        let mut names: Vec<_> = read(&self.grammars).keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers `grammar` under its own name and returns the grammar that
    /// ends up registered under that name.
    pub fn register(&self, grammar: Arc<Grammar>) -> Result<Arc<Grammar>> {
        let mut grammars = write(&self.grammars);
        self.insert(&mut grammars, grammar)
    }

    /// Registers a batch under one lock. Under [`ConflictPolicy::Reject`]
    /// either every grammar is registered or none is.
    pub fn register_all(&self, batch: Vec<Arc<Grammar>>) -> Result<Vec<Arc<Grammar>>> {
        let mut grammars = write(&self.grammars);
        if self.policy == ConflictPolicy::Reject {
            let mut seen = HashSet::new();
            for grammar in &batch {
                if grammars.contains_key(grammar.name()) || !seen.insert(grammar.name()) {
                    return Err(Error::GrammarAlreadyRegistered {
                        namespace: self.name.clone(),
                        name: grammar.name().to_string(),
                    });
                }
            }
        }
        batch
            .into_iter()
            .map(|grammar| self.insert(&mut grammars, grammar))
            .collect()
    }

    fn insert(
        &self,
        grammars: &mut HashMap<String, Arc<Grammar>>,
        grammar: Arc<Grammar>,
    ) -> Result<Arc<Grammar>> {
        if let Some(existing) = grammars.get(grammar.name()) {
            return match self.policy {
                ConflictPolicy::Reject => Err(Error::GrammarAlreadyRegistered {
                    namespace: self.name.clone(),
                    name: grammar.name().to_string(),
                }),
                ConflictPolicy::KeepFirst => {
                    log::warn!(
                        "grammar {} is already registered in namespace {}; keeping the first",
                        grammar.name(),
                        self.name
                    );
                    Ok(existing.clone())
                }
            };
        }
        log::debug!("registering grammar {} in namespace {}", grammar.name(), self.name);
        grammars.insert(grammar.name().to_string(), grammar.clone());
        Ok(grammar)
    }

    /// Returns another namespace of the same registry.
    /// `None` once the registry itself has been dropped.
    pub fn sibling(&self, name: &str) -> Option<Arc<Namespace>> {
        self.registry.upgrade().map(|r| namespace_in(&r, name))
    }

    /// Resolves a super-grammar reference: qualified references look in the
    /// named namespace, unqualified ones in this one.
    pub fn resolve(&self, reference: &GrammarRef) -> Result<Arc<Grammar>> {
        match &reference.namespace {
            None => self.grammar(&reference.name),
            Some(ns) if *ns == self.name => self.grammar(&reference.name),
            Some(ns) => self
                .sibling(ns)
                .ok_or_else(|| Error::UnknownGrammar {
                    namespace: ns.clone(),
                    name: reference.name.clone(),
                })?
                .grammar(&reference.name),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::model::Expr;

    fn grammar(name: &str) -> Arc<Grammar> {
        let mut b = Builder::new();
        b.set_name(name);
        b.define("start", Expr::Any).unwrap();
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn test_namespace_is_get_or_create() {
        let registry = Namespaces::new();
        let a = registry.namespace("std");
        let b = registry.namespace("std");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.namespace("other")));
    }

    #[test]
    fn test_unknown_grammar() {
        let registry = Namespaces::new();
        let err = registry.grammar("std", "Missing").unwrap_err();
        assert_eq!(
            err,
            Error::UnknownGrammar {
                namespace: "std".into(),
                name: "Missing".into()
            }
        );
    }

    #[test]
    fn test_reject_policy_errors_on_redefinition() {
        let ns = Namespaces::new().namespace("std");
        ns.register(grammar("G")).unwrap();
        assert!(matches!(
            ns.register(grammar("G")),
            Err(Error::GrammarAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_keep_first_policy() {
        let ns = Namespaces::with_policy(ConflictPolicy::KeepFirst).namespace("std");
        let first = grammar("G");
        ns.register(first.clone()).unwrap();
        let winner = ns.register(grammar("G")).unwrap();
        assert!(Arc::ptr_eq(&winner, &first));
        assert!(Arc::ptr_eq(&ns.grammar("G").unwrap(), &first));
    }

    #[test]
    fn test_rejected_batch_registers_nothing() {
        let ns = Namespaces::new().namespace("std");
        ns.register(grammar("B")).unwrap();
        let err = ns
            .register_all(vec![grammar("A"), grammar("B")])
            .unwrap_err();
        assert!(matches!(err, Error::GrammarAlreadyRegistered { ref name, .. } if name == "B"));
        assert_eq!(ns.grammar_names(), vec!["B"]);

        let err = ns
            .register_all(vec![grammar("C"), grammar("C")])
            .unwrap_err();
        assert!(matches!(err, Error::GrammarAlreadyRegistered { ref name, .. } if name == "C"));
        assert!(!ns.contains("C"));
    }

    #[test]
    fn test_qualified_and_unqualified_resolution() {
        let registry = Namespaces::new();
        let lib = registry.namespace("lib");
        let app = registry.namespace("app");
        let base = lib.register(grammar("Base")).unwrap();
        app.register(grammar("Local")).unwrap();

        let found = app.resolve(&GrammarRef::qualified("lib", "Base")).unwrap();
        assert!(Arc::ptr_eq(&found, &base));
        assert!(app.resolve(&GrammarRef::unqualified("Local")).is_ok());
        assert!(app.resolve(&GrammarRef::unqualified("Base")).is_err());
    }

    #[test]
    fn test_concurrent_registration_has_one_winner() {
        let ns = Namespaces::new().namespace("race");
        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| ns.register(grammar("G")).is_ok()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    }
}
