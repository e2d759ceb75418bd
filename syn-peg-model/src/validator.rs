use crate::analysis;
use crate::error::{Error, Result};
use crate::model::{Grammar, RegexLiteral};
use crate::parser::{GrammarDefinition, Pattern, PropertyPattern, RuleOperator};
use std::collections::{HashMap, HashSet};

/// Span-level checks on a parsed declaration, before any builder is involved.
///
/// Rejects a name defined twice with `=`, regex literals that do not compile,
/// and object patterns naming a key twice.
pub fn check_declaration(grammar: &GrammarDefinition) -> syn::Result<()> {
    let mut defined = HashMap::new();

    for rule in &grammar.rules {
        if let RuleOperator::Define(_) = rule.operator {
            let name = rule.name.to_string();
            if defined.insert(name.clone(), rule.name.span()).is_some() {
                return Err(syn::Error::new(
                    rule.name.span(),
                    format!("Rule '{}' is defined more than once.", name),
                ));
            }
        }
        check_pattern(&rule.body)?;
    }
    Ok(())
}

fn check_pattern(pattern: &Pattern) -> syn::Result<()> {
    match pattern {
        Pattern::Regex(lit) => {
            RegexLiteral::new(&lit.value())
                .map_err(|e| syn::Error::new(lit.span(), format!("Invalid regex: {}", e)))?;
        }
        Pattern::Alt(items) | Pattern::Seq(items) => {
            for item in items {
                check_pattern(item)?;
            }
        }
        Pattern::Bind(p, _)
        | Pattern::Repeat(p, _)
        | Pattern::Plus(p, _)
        | Pattern::Optional(p, _)
        | Pattern::Not(p, _)
        | Pattern::Peek(p, _)
        | Pattern::StrPattern(p, _)
        | Pattern::ListPattern(p, _)
        | Pattern::Inline(p, _) => check_pattern(p)?,
        Pattern::Object { properties, .. } => {
            check_object_keys(properties)?;
            for prop in properties {
                check_pattern(&prop.pattern)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Fails at the second occurrence of a repeated object key.
pub fn check_object_keys(properties: &[PropertyPattern]) -> syn::Result<()> {
    let mut seen = HashSet::new();
    for prop in properties {
        if !seen.insert(prop.key.as_str()) {
            return Err(syn::Error::new(
                prop.key_span,
                format!("Property '{}' appears more than once.", prop.key),
            ));
        }
    }
    Ok(())
}

/// Checks that every rule applied by `grammar`'s own rules resolves somewhere
/// in its lineage. Duplicate binding names are reported as warnings only.
pub fn validate(grammar: &Grammar) -> Result<()> {
    for rule in grammar.rules() {
        for name in analysis::referenced_rules(rule.body()) {
            if grammar.rule(name).is_none() {
                return Err(Error::UndefinedRule {
                    grammar: grammar.name().to_string(),
                    rule: name.to_string(),
                });
            }
        }
        for name in analysis::duplicate_bindings(rule.body()) {
            log::warn!(
                "{}.{}: `{}` is bound more than once; the last binding wins",
                grammar.name(),
                rule.name(),
                name
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::model::Expr;

    #[test]
    fn test_duplicate_define_is_reported_at_the_name() {
        let g: GrammarDefinition =
            syn::parse_str("grammar T { a = _, b = _, a = _ }").expect("Parsing failed");
        let err = check_declaration(&g).unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_override_after_define_is_not_a_duplicate() {
        let g: GrammarDefinition =
            syn::parse_str("grammar T { a = _, a := 'x', a += 'y' }").expect("Parsing failed");
        assert!(check_declaration(&g).is_ok());
    }

    #[test]
    fn test_invalid_regex() {
        let g: GrammarDefinition =
            syn::parse_str(r#"grammar T { a = /"(unclosed"/ }"#).expect("Parsing failed");
        let err = check_declaration(&g).unwrap_err();
        assert!(err.to_string().contains("Invalid regex"));
    }

    #[test]
    fn test_repeated_object_key() {
        let g: GrammarDefinition =
            syn::parse_str(r#"grammar T { a = [{x: _, "y": 1}, {x: _, "x": 2}] }"#)
                .expect("Parsing failed");
        let err = check_declaration(&g).unwrap_err();
        assert!(err.to_string().contains("Property 'x' appears more than once"));

        let g: GrammarDefinition =
            syn::parse_str("grammar T { a = {x: _, y: {x: _}} }").expect("Parsing failed");
        assert!(check_declaration(&g).is_ok());
    }

    #[test]
    fn test_validate_unresolved_application() {
        let mut b = Builder::new();
        b.set_name("G");
        b.define("start", Expr::app("missing")).unwrap();
        let g = b.build().unwrap();
        assert_eq!(
            validate(&g),
            Err(Error::UndefinedRule {
                grammar: "G".into(),
                rule: "missing".into()
            })
        );
    }
}
