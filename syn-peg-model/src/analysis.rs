use crate::model::Expr;
use std::collections::BTreeSet;

/// Rules whose name starts with an uppercase character are syntactic.
pub fn is_syntactic(rule_name: &str) -> bool {
    rule_name.chars().next().is_some_and(char::is_uppercase)
}

/// Synthesized name of the `ordinal`-th inline rule of `enclosing`.
pub fn inline_rule_name(enclosing: &str, ordinal: usize) -> String {
    format!("{}-{}", enclosing, ordinal)
}

/// Collects the binding names visible in the scope of the enclosing rule,
/// in the order they appear.
///
/// Inline rules open their own scope, so their bindings are not collected.
pub fn collect_bindings(expr: &Expr) -> Vec<&str> {
    let mut bindings = Vec::new();
    collect_bindings_into(expr, &mut bindings);
    bindings
}

fn collect_bindings_into<'a>(expr: &'a Expr, bindings: &mut Vec<&'a str>) {
    match expr {
        Expr::Bind(inner, name) => {
            collect_bindings_into(inner, bindings);
            bindings.push(name);
        }
        Expr::Alt(l, r) => {
            collect_bindings_into(l, bindings);
            collect_bindings_into(r, bindings);
        }
        Expr::Seq(items) => items.iter().for_each(|e| collect_bindings_into(e, bindings)),
        Expr::Many(inner, _)
        | Expr::Opt(inner)
        | Expr::Lookahead(inner)
        | Expr::Str(inner)
        | Expr::Lst(inner) => collect_bindings_into(inner, bindings),
        Expr::Obj { properties, .. } => properties
            .iter()
            .for_each(|p| collect_bindings_into(&p.pattern, bindings)),
        // Not(...) only succeeds if the inner match fails, so nothing it binds survives.
        Expr::Not(_) => {}
        Expr::Inline(..)
        | Expr::Prim(_)
        | Expr::App(_)
        | Expr::Any
        | Expr::Class(_)
        | Expr::Regex(_) => {}
    }
}

/// Binding names bound more than once within one sequence.
pub fn duplicate_bindings(expr: &Expr) -> Vec<&str> {
    let mut duplicates = Vec::new();
    find_duplicates(expr, &mut duplicates);
    duplicates
}

fn find_duplicates<'a>(expr: &'a Expr, duplicates: &mut Vec<&'a str>) {
    if let Expr::Seq(items) = expr {
        let mut seen = BTreeSet::new();
        for name in items.iter().flat_map(collect_bindings) {
            if !seen.insert(name) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
    }
    for child in children(expr) {
        find_duplicates(child, duplicates);
    }
}

/// Names of all rules applied by the expression, including inline rules.
pub fn referenced_rules(expr: &Expr) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e {
            Expr::App(name) | Expr::Inline(name, _) => {
                names.insert(name.as_str());
            }
            _ => {}
        }
        stack.extend(children(e));
    }
    names
}

fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Alt(l, r) => vec![l.as_ref(), r.as_ref()],
        Expr::Seq(items) => items.iter().collect(),
        Expr::Bind(inner, _)
        | Expr::Many(inner, _)
        | Expr::Opt(inner)
        | Expr::Not(inner)
        | Expr::Lookahead(inner)
        | Expr::Str(inner)
        | Expr::Lst(inner)
        | Expr::Inline(_, inner) => vec![inner.as_ref()],
        Expr::Obj { properties, .. } => properties.iter().map(|p| &p.pattern).collect(),
        Expr::Prim(_) | Expr::App(_) | Expr::Any | Expr::Class(_) | Expr::Regex(_) => vec![],
    }
}
