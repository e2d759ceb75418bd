//! Turns parsed grammar declarations into built grammars, registered once
//! the whole batch has loaded.

use crate::builtins;
use crate::LoadOptions;
use std::collections::HashMap;
use std::sync::Arc;
use syn::Lit;
use syn_peg_model::parser::{GrammarDefinition, Pattern, RuleOperator};
use syn_peg_model::{
    validator, Builder, CharClass, Error, Expr, Grammar, GrammarRef, Namespace, Property,
    RegexLiteral, Result, Value,
};

/// Loads grammar declarations one after another. Grammars loaded earlier by the
/// same loader are visible to later ones under their unqualified name.
pub(crate) struct Loader<'a> {
    namespace: Option<&'a Namespace>,
    options: &'a LoadOptions,
    batch: HashMap<String, Arc<Grammar>>,
}

impl<'a> Loader<'a> {
    pub fn new(namespace: Option<&'a Namespace>, options: &'a LoadOptions) -> Self {
        Self {
            namespace,
            options,
            batch: HashMap::new(),
        }
    }

    pub fn load(&mut self, def: &GrammarDefinition) -> Result<Arc<Grammar>> {
        let mut builder = Builder::new();
        builder.set_name(def.name.to_string());
        builder.set_super_grammar(self.super_grammar(def)?)?;

        for rule in &def.rules {
            let name = rule.name.to_string();
            builder.begin_rule(name.as_str());
            let body = lower(&rule.body, &mut builder)?;
            match rule.operator {
                RuleOperator::Define(_) => builder.define(&name, body)?,
                RuleOperator::Override(..) => builder.override_rule(&name, body)?,
                RuleOperator::Extend(_) => builder.extend(&name, body)?,
            }
        }

        let grammar = builder.build()?;
        if self.options.validate {
            validator::validate(&grammar)?;
        }
        log::debug!("loaded grammar:\n{}", grammar);

        let grammar = Arc::new(grammar);
        self.batch
            .insert(grammar.name().to_string(), grammar.clone());
        Ok(grammar)
    }

    /// Registers a fully loaded batch. Nothing is registered before every
    /// grammar of the batch has been built.
    pub fn register(&self, batch: Vec<Arc<Grammar>>) -> Result<Vec<Arc<Grammar>>> {
        match self.namespace {
            Some(ns) if self.options.register => ns.register_all(batch),
            _ => Ok(batch),
        }
    }

    /// The declared parent, or the base grammar when none is declared.
    fn super_grammar(&self, def: &GrammarDefinition) -> Result<Arc<Grammar>> {
        let Some(inherits) = &def.inherits else {
            return Ok(builtins::base());
        };
        let reference = match inherits.parts() {
            (Some(ns), name) => GrammarRef::qualified(ns.to_string(), name.to_string()),
            (None, name) => GrammarRef::unqualified(name.to_string()),
        };
        if reference.namespace.is_none() {
            if let Some(g) = self.batch.get(&reference.name) {
                return Ok(g.clone());
            }
        }
        match self.namespace {
            Some(ns) => ns.resolve(&reference),
            None => Err(Error::UnknownGrammar {
                namespace: reference.namespace.unwrap_or_default(),
                name: reference.name,
            }),
        }
    }
}

/// Lowers a parsed pattern into an expression. Inline patterns are registered
/// with the builder as they are met.
fn lower(pattern: &Pattern, builder: &mut Builder) -> Result<Expr> {
    let expr = match pattern {
        Pattern::Any(_) => Expr::Any,
        Pattern::Undefined(_) => Expr::Prim(Value::Undefined),
        Pattern::Null(_) => Expr::Prim(Value::Null),
        Pattern::Lit(lit) => Expr::Prim(literal(lit)?),
        Pattern::Negative(_, lit) => {
            let value = format!("-{}", lit.base10_digits())
                .parse::<i64>()
                .map_err(|e| syn::Error::new(lit.span(), e))?;
            Expr::Prim(Value::Int(value))
        }
        Pattern::Range { from, to } => Expr::Class(CharClass::new(from.value(), to.value())),
        Pattern::Regex(lit) => Expr::Regex(
            RegexLiteral::new(&lit.value())
                .map_err(|e| syn::Error::new(lit.span(), format!("Invalid regex: {}", e)))?,
        ),
        Pattern::RuleCall(ident) => Expr::app(ident.to_string()),
        Pattern::Alt(alts) => alts
            .iter()
            .map(|p| lower(p, builder))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .reduce(Expr::alt)
            .unwrap_or_else(|| Expr::Seq(Vec::new())),
        Pattern::Seq(items) => Expr::Seq(
            items
                .iter()
                .map(|p| lower(p, builder))
                .collect::<Result<_>>()?,
        ),
        Pattern::Bind(inner, name) => lower(inner, builder)?.bind(name.to_string()),
        Pattern::Repeat(inner, _) => lower(inner, builder)?.many(),
        Pattern::Plus(inner, _) => lower(inner, builder)?.many1(),
        Pattern::Optional(inner, _) => lower(inner, builder)?.opt(),
        Pattern::Not(inner, _) => lower(inner, builder)?.not(),
        Pattern::Peek(inner, _) => lower(inner, builder)?.lookahead(),
        Pattern::StrPattern(inner, _) => Expr::Str(Box::new(lower(inner, builder)?)),
        Pattern::ListPattern(inner, _) => Expr::Lst(Box::new(lower(inner, builder)?)),
        Pattern::Object {
            properties,
            lenient,
        } => {
            validator::check_object_keys(properties)?;
            Expr::Obj {
                properties: properties
                    .iter()
                    .map(|p| {
                        Ok(Property {
                            name: p.key.clone(),
                            pattern: lower(&p.pattern, builder)?,
                        })
                    })
                    .collect::<Result<_>>()?,
                lenient: *lenient,
            }
        }
        Pattern::Inline(inner, _) => {
            let body = lower(inner, builder)?;
            builder.inline(body)?
        }
    };
    Ok(expr)
}

fn literal(lit: &Lit) -> Result<Value> {
    let value = match lit {
        Lit::Str(s) => Value::Str(s.value()),
        Lit::Char(c) => Value::Char(c.value()),
        Lit::Int(i) => Value::Int(i.base10_parse::<i64>()?),
        Lit::Bool(b) => Value::Bool(b.value),
        other => return Err(syn::Error::new(other.span(), "unsupported literal").into()),
    };
    Ok(value)
}
