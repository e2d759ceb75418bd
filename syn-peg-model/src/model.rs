use crate::analysis;
use itertools::Itertools;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod types;

pub use types::Value;

/// The body of a rule: a closed set of PEG combinators.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Matches an input element equal to the value.
    Prim(Value),
    /// Applies a rule by name, resolved through the grammar lineage.
    App(String),
    /// Ordered choice.
    Alt(Box<Expr>, Box<Expr>),
    Seq(Vec<Expr>),
    /// Records the value of the inner match under a name.
    Bind(Box<Expr>, String),
    /// Greedy repetition with a minimum count of 0 or 1.
    Many(Box<Expr>, usize),
    Opt(Box<Expr>),
    Not(Box<Expr>),
    Lookahead(Box<Expr>),
    /// Matches the characters of a string element as a sub-stream.
    Str(Box<Expr>),
    /// Matches the elements of a list element as a sub-stream.
    Lst(Box<Expr>),
    Obj {
        properties: Vec<Property>,
        lenient: bool,
    },
    /// An anonymous rule registered under a synthesized name.
    Inline(String, Box<Expr>),
    /// Any single element.
    Any,
    Class(CharClass),
    Regex(RegexLiteral),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub pattern: Expr,
}

impl Expr {
    pub fn app(name: impl Into<String>) -> Self {
        Expr::App(name.into())
    }

    pub fn prim(value: impl Into<Value>) -> Self {
        Expr::Prim(value.into())
    }

    pub fn alt(left: Expr, right: Expr) -> Self {
        Expr::Alt(Box::new(left), Box::new(right))
    }

    pub fn bind(self, name: impl Into<String>) -> Self {
        Expr::Bind(Box::new(self), name.into())
    }

    pub fn many(self) -> Self {
        Expr::Many(Box::new(self), 0)
    }

    pub fn many1(self) -> Self {
        Expr::Many(Box::new(self), 1)
    }

    pub fn opt(self) -> Self {
        Expr::Opt(Box::new(self))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn lookahead(self) -> Self {
        Expr::Lookahead(Box::new(self))
    }

    pub fn obj<I>(properties: I, lenient: bool) -> Self
    where
        I: IntoIterator<Item = (&'static str, Expr)>,
    {
        Expr::Obj {
            properties: properties
                .into_iter()
                .map(|(name, pattern)| Property {
                    name: name.to_string(),
                    pattern,
                })
                .collect(),
            lenient,
        }
    }

    /// Binding strength used when printing; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Alt(..) => 0,
            Expr::Seq(items) if items.len() != 1 && !items.is_empty() => 1,
            Expr::Bind(..) => 2,
            Expr::Many(..) | Expr::Opt(..) => 3,
            Expr::Not(..) | Expr::Lookahead(..) => 4,
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Prim(v) => write!(f, "{}", v),
            Expr::App(name) => write!(f, "{}", name),
            Expr::Alt(l, r) => {
                l.fmt_operand(f, 0)?;
                write!(f, " | ")?;
                r.fmt_operand(f, 1)
            }
            Expr::Seq(items) => {
                if items.is_empty() {
                    return write!(f, "()");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    item.fmt_operand(f, 2)?;
                }
                Ok(())
            }
            Expr::Bind(e, name) => {
                e.fmt_operand(f, 3)?;
                write!(f, ":{}", name)
            }
            Expr::Many(e, min) => {
                e.fmt_operand(f, 4)?;
                write!(f, "{}", if *min == 0 { "*" } else { "+" })
            }
            Expr::Opt(e) => {
                e.fmt_operand(f, 4)?;
                write!(f, "?")
            }
            Expr::Not(e) => {
                write!(f, "~")?;
                e.fmt_operand(f, 4)
            }
            Expr::Lookahead(e) => {
                write!(f, "&")?;
                e.fmt_operand(f, 4)
            }
            Expr::Str(e) => write!(f, "<{}>", e),
            Expr::Lst(e) => write!(f, "[{}]", e),
            Expr::Obj {
                properties,
                lenient,
            } => {
                let props = properties
                    .iter()
                    .format_with(", ", |p, g| {
                        if is_plain_key(&p.name) {
                            g(&format_args!("{}: {}", p.name, p.pattern))
                        } else {
                            g(&format_args!("{:?}: {}", p.name, p.pattern))
                        }
                    });
                match (properties.is_empty(), lenient) {
                    (true, true) => write!(f, "{{...}}"),
                    (false, true) => write!(f, "{{{}, ...}}", props),
                    (_, false) => write!(f, "{{{}}}", props),
                }
            }
            Expr::Inline(_, e) => write!(f, "#({})", e),
            Expr::Any => write!(f, "_"),
            Expr::Class(class) => write!(f, "{}", class),
            Expr::Regex(re) => write!(f, "/{:?}/", re.source()),
        }
    }
}

/// Whether an object key can be written without quotes.
fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            key != "_" && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// An inclusive character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharClass {
    pub from: char,
    pub to: char,
}

impl CharClass {
    pub fn new(from: char, to: char) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, c: char) -> bool {
        (self.from..=self.to).contains(&c)
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}..={:?}", self.from, self.to)
    }
}

/// A regular-expression literal, compiled once for both matching modes.
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    source: String,
    whole: Regex,
    prefix: Regex,
}

impl RegexLiteral {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            whole: Regex::new(&format!("^(?:{})$", source))?,
            prefix: Regex::new(&format!("^(?:{})", source))?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if the regex matches all of `text`.
    pub fn is_full_match(&self, text: &str) -> bool {
        self.whole.is_match(text)
    }

    /// Length in bytes of the match anchored at the start of `text`, if any.
    pub fn prefix_len(&self, text: &str) -> Option<usize> {
        self.prefix.find(text).map(|m| m.end())
    }
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A named rule. Its lexical/syntactic classification is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    name: String,
    body: Expr,
    syntactic: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>, body: Expr) -> Self {
        let name = name.into();
        let syntactic = analysis::is_syntactic(&name);
        Self {
            name,
            body,
            syntactic,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Syntactic rules skip whitespace before every term of their body.
    pub fn is_syntactic(&self) -> bool {
        self.syntactic
    }

    /// True for rules synthesized from inline expressions.
    pub fn is_inline(&self) -> bool {
        self.name.contains('-')
    }
}

/// A reference to a grammar as written in a super-grammar declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrammarRef {
    pub namespace: Option<String>,
    pub name: String,
}

impl GrammarRef {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for GrammarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An immutable, named collection of rules with an optional super-grammar.
#[derive(Debug)]
pub struct Grammar {
    name: String,
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    super_grammar: Option<Arc<Grammar>>,
}

impl Grammar {
    pub(crate) fn new(name: String, rules: Vec<Rule>, super_grammar: Option<Arc<Grammar>>) -> Self {
        let index = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.name.clone(), i))
            .collect();
        Self {
            name,
            rules,
            index,
            super_grammar,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_grammar(&self) -> Option<&Arc<Grammar>> {
        self.super_grammar.as_ref()
    }

    /// Rules declared by this grammar itself, in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn local_rule(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    /// Resolves a rule by name: locally first, then up the super-grammar chain.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.lineage().find_map(|g| g.local_rule(name))
    }

    /// Whether this is the root grammar every source grammar inherits from.
    pub fn is_base(&self) -> bool {
        self.name == crate::BASE_GRAMMAR && self.super_grammar.is_none()
    }

    /// This grammar followed by each of its ancestors.
    pub fn lineage(&self) -> impl Iterator<Item = &Grammar> {
        std::iter::successors(Some(self), |g| g.super_grammar.as_deref())
    }
}

/// Prints the grammar as source. Every local rule prints with `=` and its
/// final body, which shadows the inherited rule the same way `:=` and `+=`
/// did. The parent prints unqualified and is left out when it is the base
/// grammar, so a grammar whose parent lives in another namespace only
/// re-parses where that name resolves.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grammar {}", self.name)?;
        if let Some(parent) = self.super_grammar.as_deref().filter(|p| !p.is_base()) {
            write!(f, " : {}", parent.name)?;
        }
        writeln!(f, " {{")?;
        for rule in self.rules.iter().filter(|r| !r.is_inline()) {
            writeln!(f, "    {} = {},", rule.name, rule.body)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let e = Expr::Seq(vec![
            Expr::alt(Expr::prim("a"), Expr::prim("b")).many(),
            Expr::app("digit").bind("d"),
        ]);
        assert_eq!(e.to_string(), r#"("a" | "b")* digit:d"#);

        let nested = Expr::alt(Expr::alt(Expr::app("x"), Expr::app("y")), Expr::app("z"));
        assert_eq!(nested.to_string(), "x | y | z");
    }

    #[test]
    fn test_object_pattern_display() {
        let strict = Expr::obj([("a", Expr::prim(1))], false);
        let lenient = Expr::obj([("a", Expr::prim(1))], true);
        assert_eq!(strict.to_string(), "{a: 1}");
        assert_eq!(lenient.to_string(), "{a: 1, ...}");

        let quoted = Expr::obj(
            [("b c", Expr::Any), ("1st", Expr::Any), ("_x", Expr::Any)],
            false,
        );
        assert_eq!(quoted.to_string(), r#"{"b c": _, "1st": _, _x: _}"#);
    }

    #[test]
    fn test_grammar_display_leaves_out_the_base_parent() {
        let base = Arc::new(Grammar::new(crate::BASE_GRAMMAR.into(), Vec::new(), None));
        let parent = Arc::new(Grammar::new(
            "P".into(),
            vec![Rule::new("r", Expr::prim('a'))],
            Some(base),
        ));
        assert_eq!(parent.to_string(), "grammar P {\n    r = 'a',\n}");

        let child = Grammar::new("C".into(), Vec::new(), Some(parent));
        assert_eq!(child.to_string(), "grammar C : P {\n}");
    }

    #[test]
    fn test_regex_literal_modes() {
        let re = RegexLiteral::new("[a-z]+").unwrap();
        assert!(re.is_full_match("abc"));
        assert!(!re.is_full_match("abc1"));
        assert_eq!(re.prefix_len("abc1"), Some(3));
        assert_eq!(re.prefix_len("1abc"), None);
    }

    #[test]
    fn test_rule_classification_is_cached() {
        assert!(Rule::new("Expr", Expr::Any).is_syntactic());
        assert!(!Rule::new("digit", Expr::Any).is_syntactic());
        assert!(Rule::new("Expr-1", Expr::Any).is_inline());
    }
}
