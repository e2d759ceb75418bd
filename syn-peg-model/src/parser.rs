//! Syntactic AST of grammar source, parsed with `syn`.
//!
//! ```text
//! grammar Arith : lib.Lexer {
//!     Expr  = Expr:x "+" Term:y | Term,
//!     Term  := digit+:ds,
//!     digit += 'a'..='f',
//! }
//! ```
use derive_syn_parse::Parse;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::{token, Ident, Lit, LitChar, LitInt, LitStr, Result, Token};

mod rt {
    use syn::ext::IdentExt;
    use syn::parse::ParseStream;
    use syn::Result;

    /// Identifiers, keywords included.
    pub fn parse_ident(input: ParseStream) -> Result<syn::Ident> {
        input.call(syn::Ident::parse_any)
    }
}

pub mod kw {
    syn::custom_keyword!(grammar);
    syn::custom_keyword!(undefined);
    syn::custom_keyword!(null);
}

/// Any number of grammar declarations, in source order.
pub struct GrammarSource {
    pub grammars: Vec<GrammarDefinition>,
}

impl Parse for GrammarSource {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut grammars = Vec::new();
        while !input.is_empty() {
            grammars.push(input.parse()?);
        }
        Ok(GrammarSource { grammars })
    }
}

pub struct GrammarDefinition {
    pub name: Ident,
    pub inherits: Option<InheritanceSpec>,
    pub rules: Vec<RuleDeclaration>,
}

impl Parse for GrammarDefinition {
    fn parse(input: ParseStream) -> Result<Self> {
        let _ = input.parse::<kw::grammar>()?;
        let name = rt::parse_ident(input)?;

        let inherits = if input.peek(Token![:]) {
            Some(input.parse::<InheritanceSpec>()?)
        } else {
            None
        };

        let content;
        let _ = syn::braced!(content in input);
        let rules = RuleDeclaration::parse_all(&content)?;

        Ok(GrammarDefinition {
            name,
            inherits,
            rules,
        })
    }
}

/// `: Parent` or `: namespace.Parent`
#[derive(Parse)]
pub struct InheritanceSpec {
    pub colon: Token![:],
    #[call(rt::parse_ident)]
    pub first: Ident,
    #[peek(Token![.])]
    pub qualified: Option<QualifiedName>,
}

#[derive(Parse)]
pub struct QualifiedName {
    pub dot: Token![.],
    #[call(rt::parse_ident)]
    pub name: Ident,
}

impl InheritanceSpec {
    /// Splits the clause into (namespace, grammar name).
    pub fn parts(&self) -> (Option<&Ident>, &Ident) {
        match &self.qualified {
            Some(q) => (Some(&self.first), &q.name),
            None => (None, &self.first),
        }
    }
}

pub enum RuleOperator {
    Define(Token![=]),
    Override(Token![:], Token![=]),
    Extend(Token![+=]),
}

impl Parse for RuleOperator {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(Token![+=]) {
            Ok(RuleOperator::Extend(input.parse()?))
        } else if input.peek(Token![:]) && input.peek2(Token![=]) {
            Ok(RuleOperator::Override(input.parse()?, input.parse()?))
        } else if input.peek(Token![=]) {
            Ok(RuleOperator::Define(input.parse()?))
        } else {
            Err(input.error("expected `=`, `:=` or `+=`"))
        }
    }
}

pub struct RuleDeclaration {
    pub name: Ident,
    pub operator: RuleOperator,
    pub body: Pattern,
}

impl Parse for RuleDeclaration {
    fn parse(input: ParseStream) -> Result<Self> {
        let name = rt::parse_ident(input)?;
        let operator = input.parse()?;
        let body = input.parse()?;
        Ok(RuleDeclaration {
            name,
            operator,
            body,
        })
    }
}

impl RuleDeclaration {
    /// Comma-separated rules; a trailing comma is allowed.
    pub fn parse_all(input: ParseStream) -> Result<Vec<Self>> {
        let mut rules = Vec::new();
        while !input.is_empty() {
            rules.push(input.parse()?);
            if input.is_empty() {
                break;
            }
            let _ = input.parse::<Token![,]>()?;
        }
        Ok(rules)
    }
}

pub enum Pattern {
    Any(Token![_]),
    Undefined(kw::undefined),
    Null(kw::null),
    /// String, char, integer and boolean literals.
    Lit(Lit),
    Negative(Token![-], LitInt),
    Range {
        from: LitChar,
        to: LitChar,
    },
    Regex(LitStr),
    RuleCall(Ident),
    Alt(Vec<Pattern>),
    Seq(Vec<Pattern>),
    Bind(Box<Pattern>, Ident),
    Repeat(Box<Pattern>, Token![*]),
    Plus(Box<Pattern>, Token![+]),
    Optional(Box<Pattern>, Token![?]),
    Not(Box<Pattern>, Token![~]),
    Peek(Box<Pattern>, Token![&]),
    StrPattern(Box<Pattern>, Token![<]),
    ListPattern(Box<Pattern>, token::Bracket),
    Object {
        properties: Vec<PropertyPattern>,
        lenient: bool,
    },
    Inline(Box<Pattern>, Token![#]),
}

pub struct PropertyPattern {
    pub key: String,
    pub key_span: proc_macro2::Span,
    pub pattern: Pattern,
}

impl Parse for PropertyPattern {
    fn parse(input: ParseStream) -> Result<Self> {
        let (key, key_span) = if input.peek(LitStr) {
            let lit = input.parse::<LitStr>()?;
            (lit.value(), lit.span())
        } else {
            let ident = rt::parse_ident(input)?;
            (ident.to_string(), ident.span())
        };
        let _ = input.parse::<Token![:]>()?;
        let pattern = input.parse()?;
        Ok(PropertyPattern {
            key,
            key_span,
            pattern,
        })
    }
}

impl Parse for Pattern {
    fn parse(input: ParseStream) -> Result<Self> {
        parse_alt(input)
    }
}

fn parse_alt(input: ParseStream) -> Result<Pattern> {
    let mut alts = vec![parse_seq(input)?];
    while input.peek(Token![|]) {
        let _ = input.parse::<Token![|]>()?;
        alts.push(parse_seq(input)?);
    }
    Ok(match alts.len() {
        1 => alts.remove(0),
        _ => Pattern::Alt(alts),
    })
}

fn parse_seq(input: ParseStream) -> Result<Pattern> {
    let mut items = Vec::new();
    while starts_term(input) {
        items.push(parse_term(input)?);
    }
    Ok(match items.len() {
        1 => items.remove(0),
        _ => Pattern::Seq(items),
    })
}

fn starts_term(input: ParseStream) -> bool {
    input.peek(Lit)
        || input.peek(Ident::peek_any)
        || input.peek(Token![~])
        || input.peek(Token![&])
        || input.peek(Token![<])
        || input.peek(Token![#])
        || input.peek(Token![/])
        || input.peek(Token![-])
        || input.peek(token::Paren)
        || input.peek(token::Bracket)
        || input.peek(token::Brace)
}

/// prefix* atom postfix* (`:` name)?
fn parse_term(input: ParseStream) -> Result<Pattern> {
    let mut pat = parse_prefixed(input)?;

    loop {
        if input.peek(Token![*]) {
            let token = input.parse::<Token![*]>()?;
            pat = Pattern::Repeat(Box::new(pat), token);
        } else if input.peek(Token![+]) && !input.peek(Token![+=]) {
            let token = input.parse::<Token![+]>()?;
            pat = Pattern::Plus(Box::new(pat), token);
        } else if input.peek(Token![?]) {
            let token = input.parse::<Token![?]>()?;
            pat = Pattern::Optional(Box::new(pat), token);
        } else {
            break;
        }
    }

    if input.peek(Token![:]) && input.peek2(Ident::peek_any) {
        let _ = input.parse::<Token![:]>()?;
        let name = rt::parse_ident(input)?;
        pat = Pattern::Bind(Box::new(pat), name);
    }
    Ok(pat)
}

fn parse_prefixed(input: ParseStream) -> Result<Pattern> {
    if input.peek(Token![~]) {
        let token = input.parse::<Token![~]>()?;
        Ok(Pattern::Not(Box::new(parse_prefixed(input)?), token))
    } else if input.peek(Token![&]) {
        let token = input.parse::<Token![&]>()?;
        Ok(Pattern::Peek(Box::new(parse_prefixed(input)?), token))
    } else {
        parse_atom(input)
    }
}

fn parse_atom(input: ParseStream) -> Result<Pattern> {
    if input.peek(Token![_]) {
        Ok(Pattern::Any(input.parse()?))
    } else if input.peek(kw::undefined) {
        Ok(Pattern::Undefined(input.parse()?))
    } else if input.peek(kw::null) {
        Ok(Pattern::Null(input.parse()?))
    } else if input.peek(Token![/]) {
        let _ = input.parse::<Token![/]>()?;
        let lit = input.parse::<LitStr>()?;
        let _ = input.parse::<Token![/]>()?;
        Ok(Pattern::Regex(lit))
    } else if input.peek(Token![-]) {
        Ok(Pattern::Negative(input.parse()?, input.parse()?))
    } else if input.peek(LitChar) && input.peek2(Token![..=]) {
        let from = input.parse::<LitChar>()?;
        let _ = input.parse::<Token![..=]>()?;
        let to = input.parse::<LitChar>()?;
        if from.value() > to.value() {
            return Err(syn::Error::new(to.span(), "empty character range"));
        }
        Ok(Pattern::Range { from, to })
    } else if input.peek(Lit) {
        Ok(Pattern::Lit(input.parse()?))
    } else if input.peek(Token![<]) {
        let token = input.parse::<Token![<]>()?;
        let inner = parse_alt(input)?;
        let _ = input.parse::<Token![>]>()?;
        Ok(Pattern::StrPattern(Box::new(inner), token))
    } else if input.peek(Token![#]) {
        let token = input.parse::<Token![#]>()?;
        let content;
        syn::parenthesized!(content in input);
        Ok(Pattern::Inline(Box::new(parse_group(&content)?), token))
    } else if input.peek(token::Paren) {
        let content;
        syn::parenthesized!(content in input);
        parse_group(&content)
    } else if input.peek(token::Bracket) {
        let content;
        let token = syn::bracketed!(content in input);
        Ok(Pattern::ListPattern(Box::new(parse_group(&content)?), token))
    } else if input.peek(token::Brace) {
        parse_object(input)
    } else if input.peek(Ident::peek_any) {
        Ok(Pattern::RuleCall(rt::parse_ident(input)?))
    } else {
        Err(input.error("expected a pattern"))
    }
}

/// The whole content of a delimited group as one pattern.
fn parse_group(content: ParseStream) -> Result<Pattern> {
    let inner = parse_alt(content)?;
    if !content.is_empty() {
        return Err(content.error("unexpected token in group"));
    }
    Ok(inner)
}

fn parse_object(input: ParseStream) -> Result<Pattern> {
    let content;
    let _ = syn::braced!(content in input);

    let mut properties = Vec::new();
    let mut lenient = false;
    while !content.is_empty() {
        if content.peek(Token![...]) {
            let _ = content.parse::<Token![...]>()?;
            if !content.is_empty() {
                return Err(content.error("`...` must close an object pattern"));
            }
            lenient = true;
            break;
        }
        properties.push(content.parse::<PropertyPattern>()?);
        if content.is_empty() {
            break;
        }
        let _ = content.parse::<Token![,]>()?;
    }

    Ok(Pattern::Object {
        properties,
        lenient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_body(src: &str) -> Pattern {
        let grammar: GrammarDefinition =
            syn::parse_str(&format!("grammar T {{ r = {} }}", src)).expect("Parsing failed");
        grammar.rules.into_iter().next().unwrap().body
    }

    #[test]
    fn test_parse_header_and_operators() {
        let input = r#"
            grammar Child : lib.Base {
                foo = "bar" | "baz",
                Bar := 'x',
                spaces += '#',
            }
        "#;
        let grammar: GrammarDefinition = syn::parse_str(input).expect("Parsing failed");
        assert_eq!(grammar.name, "Child");

        let (ns, parent) = grammar.inherits.as_ref().unwrap().parts();
        assert_eq!(ns.unwrap(), "lib");
        assert_eq!(parent, "Base");

        assert_eq!(grammar.rules.len(), 3);
        assert!(matches!(grammar.rules[0].operator, RuleOperator::Define(_)));
        assert!(matches!(grammar.rules[1].operator, RuleOperator::Override(..)));
        assert!(matches!(grammar.rules[2].operator, RuleOperator::Extend(_)));
    }

    #[test]
    fn test_unqualified_parent() {
        let grammar: GrammarDefinition =
            syn::parse_str("grammar A : B { x = _ }").expect("Parsing failed");
        let (ns, parent) = grammar.inherits.as_ref().unwrap().parts();
        assert!(ns.is_none());
        assert_eq!(parent, "B");
    }

    #[test]
    fn test_postfix_then_binding() {
        match rule_body("digit+:ds") {
            Pattern::Bind(inner, name) => {
                assert_eq!(name, "ds");
                assert!(matches!(*inner, Pattern::Plus(..)));
            }
            _ => panic!("Expected Bind pattern"),
        }
    }

    #[test]
    fn test_prefix_binds_tighter_than_postfix() {
        match rule_body("~x*") {
            Pattern::Repeat(inner, _) => assert!(matches!(*inner, Pattern::Not(..))),
            _ => panic!("Expected Repeat pattern"),
        }
    }

    #[test]
    fn test_structural_patterns() {
        match rule_body(r#"{ a: 1, "b c": _, ... }"#) {
            Pattern::Object {
                properties,
                lenient,
                ..
            } => {
                assert!(lenient);
                assert_eq!(properties.len(), 2);
                assert_eq!(properties[1].key, "b c");
            }
            _ => panic!("Expected Object pattern"),
        }
        assert!(matches!(rule_body("[digit*]"), Pattern::ListPattern(..)));
        assert!(matches!(rule_body("<letter+>"), Pattern::StrPattern(..)));
        assert!(matches!(rule_body("#(a b)"), Pattern::Inline(..)));
    }

    #[test]
    fn test_literals() {
        assert!(matches!(rule_body("'a'..='z'"), Pattern::Range { .. }));
        assert!(matches!(rule_body(r#"/r"\d+"/"#), Pattern::Regex(_)));
        assert!(matches!(rule_body("-12"), Pattern::Negative(..)));
        assert!(matches!(rule_body("null"), Pattern::Null(_)));
        assert!(matches!(rule_body("undefined"), Pattern::Undefined(_)));
        assert!(matches!(rule_body("true"), Pattern::Lit(Lit::Bool(_))));
        match rule_body("()") {
            Pattern::Seq(items) => assert!(items.is_empty()),
            _ => panic!("Expected empty Seq"),
        }
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let res = syn::parse_str::<GrammarDefinition>("grammar T { a = x  b = y }");
        assert!(res.is_err());
    }

    #[test]
    fn test_inverted_range_is_an_error() {
        let res = syn::parse_str::<GrammarDefinition>("grammar T { a = 'z'..='a' }");
        assert!(res.is_err());
    }
}
