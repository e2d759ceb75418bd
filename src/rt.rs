//! Reference matcher: walks a built [`Grammar`] against a stream of [`Value`]s.
//!
//! No-match is `Ok(None)`. The only error is applying a rule that resolves
//! nowhere in the grammar's lineage.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use syn_peg_model::{Error, Expr, Grammar, RegexLiteral, Result, Rule, Value, SKIP_RULE};

/// Named sub-match values of one rule application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(String, Value)>,
}

impl Bindings {
    /// The value bound last under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &str, value: Value) {
        self.entries.push((name.to_string(), value));
    }

    fn mark(&self) -> usize {
        self.entries.len()
    }

    fn reset(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }
}

/// A semantic action: receives the rule's bindings and its default value.
pub type Action = dyn Fn(&Bindings, Value) -> Value + Send + Sync;

/// Semantic actions keyed by rule name.
#[derive(Default)]
pub struct Actions {
    table: HashMap<String, Box<Action>>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, rule: &str, action: F) -> Self
    where
        F: Fn(&Bindings, Value) -> Value + Send + Sync + 'static,
    {
        self.table.insert(rule.to_string(), Box::new(action));
        self
    }

    fn get(&self, rule: &str) -> Option<&Action> {
        self.table.get(rule).map(|a| a.as_ref())
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<_> = self.table.keys().collect();
        rules.sort();
        f.debug_struct("Actions").field("rules", &rules).finish()
    }
}

enum Memo {
    Pending { recursive: bool },
    Done(Option<(Value, usize)>),
}

struct Stream<'i> {
    items: Cow<'i, [Value]>,
    pos: usize,
    memo: HashMap<(String, usize), Memo>,
}

impl<'i> Stream<'i> {
    fn new(items: Cow<'i, [Value]>) -> Self {
        Self {
            items,
            pos: 0,
            memo: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<&Value> {
        self.items.get(self.pos)
    }

    fn advance(&mut self) -> Option<Value> {
        let value = self.items.get(self.pos).cloned();
        if value.is_some() {
            self.pos += 1;
        }
        value
    }

    fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher<'g> {
    grammar: &'g Grammar,
    actions: Option<&'g Actions>,
}

impl<'g> Matcher<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            actions: None,
        }
    }

    pub fn with_actions(mut self, actions: &'g Actions) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Matches `rule` against the whole of `input`.
    pub fn match_all(&self, input: &[Value], rule: &str) -> Result<Option<Value>> {
        self.match_stream(&mut Stream::new(Cow::Borrowed(input)), rule)
    }

    /// Matches `rule` against a stream holding the single value `input`.
    pub fn match_value(&self, input: &Value, rule: &str) -> Result<Option<Value>> {
        self.match_all(std::slice::from_ref(input), rule)
    }

    /// Matches `rule` against the characters of `text`.
    pub fn match_str(&self, text: &str, rule: &str) -> Result<Option<Value>> {
        self.match_stream(&mut Stream::new(Cow::Owned(Value::chars(text))), rule)
    }

    fn match_stream(&self, stream: &mut Stream<'_>, rule: &str) -> Result<Option<Value>> {
        let syntactic = self.resolve(rule)?.is_syntactic();
        self.skip(stream, syntactic)?;
        let Some(value) = self.apply(rule, stream)? else {
            return Ok(None);
        };
        self.skip(stream, syntactic)?;
        Ok(stream.at_end().then_some(value))
    }

    fn resolve(&self, name: &str) -> Result<&'g Rule> {
        self.grammar.rule(name).ok_or_else(|| Error::UndefinedRule {
            grammar: self.grammar.name().to_string(),
            rule: name.to_string(),
        })
    }

    /// Applies a rule with packrat memoization. Direct left recursion is
    /// handled by growing the seed until the match stops getting longer.
    fn apply(&self, name: &str, stream: &mut Stream<'_>) -> Result<Option<Value>> {
        let rule = self.resolve(name)?;
        let start = stream.pos;
        let key = (name.to_string(), start);

        match stream.memo.get_mut(&key) {
            Some(Memo::Done(Some((value, end)))) => {
                let value = value.clone();
                stream.pos = *end;
                return Ok(Some(value));
            }
            Some(Memo::Done(None)) => return Ok(None),
            Some(Memo::Pending { recursive }) => {
                *recursive = true;
                return Ok(None);
            }
            None => {}
        }

        stream.memo.insert(key.clone(), Memo::Pending { recursive: false });
        let mut outcome = self.invoke(rule, stream)?.map(|v| (v, stream.pos));

        if let Some(Memo::Pending { recursive: true }) = stream.memo.get(&key) {
            loop {
                let Some(end) = outcome.as_ref().map(|(_, end)| *end) else {
                    break;
                };
                stream.memo.insert(key.clone(), Memo::Done(outcome.clone()));
                stream.pos = start;
                match self.invoke(rule, stream)? {
                    Some(value) if stream.pos > end => outcome = Some((value, stream.pos)),
                    _ => break,
                }
            }
        }

        stream.memo.insert(key, Memo::Done(outcome.clone()));
        match outcome {
            Some((value, end)) => {
                stream.pos = end;
                Ok(Some(value))
            }
            None => {
                stream.pos = start;
                Ok(None)
            }
        }
    }

    /// Evaluates a rule body in a fresh binding scope and runs its action.
    fn invoke(&self, rule: &Rule, stream: &mut Stream<'_>) -> Result<Option<Value>> {
        let mut scope = Bindings::default();
        let value = self.eval(rule.body(), stream, &mut scope, rule.is_syntactic())?;
        Ok(value.map(|v| match self.actions.and_then(|a| a.get(rule.name())) {
            Some(action) => action(&scope, v),
            None => v,
        }))
    }

    fn skip(&self, stream: &mut Stream<'_>, syntactic: bool) -> Result<()> {
        if syntactic && self.grammar.rule(SKIP_RULE).is_some() {
            self.apply(SKIP_RULE, stream)?;
        }
        Ok(())
    }

    /// Evaluates `expr`; on failure the position and bindings are restored.
    fn eval(
        &self,
        expr: &Expr,
        stream: &mut Stream<'_>,
        scope: &mut Bindings,
        syntactic: bool,
    ) -> Result<Option<Value>> {
        let (pos, mark) = (stream.pos, scope.mark());
        let value = self.eval_inner(expr, stream, scope, syntactic)?;
        if value.is_none() {
            stream.pos = pos;
            scope.reset(mark);
        }
        Ok(value)
    }

    fn eval_inner(
        &self,
        expr: &Expr,
        stream: &mut Stream<'_>,
        scope: &mut Bindings,
        syntactic: bool,
    ) -> Result<Option<Value>> {
        match expr {
            Expr::Any => {
                self.skip(stream, syntactic)?;
                Ok(stream.advance())
            }
            Expr::Prim(expected) => {
                self.skip(stream, syntactic)?;
                Ok(match_prim(stream, expected))
            }
            Expr::Class(class) => {
                self.skip(stream, syntactic)?;
                let hit = matches!(stream.peek(), Some(Value::Char(c)) if class.contains(*c));
                Ok(if hit { stream.advance() } else { None })
            }
            Expr::Regex(re) => {
                self.skip(stream, syntactic)?;
                Ok(match_regex(stream, re))
            }
            Expr::App(name) => {
                self.skip(stream, syntactic)?;
                self.apply(name, stream)
            }
            Expr::Inline(name, _) => self.apply(name, stream),
            Expr::Alt(left, right) => match self.eval(left, stream, scope, syntactic)? {
                Some(value) => Ok(Some(value)),
                None => self.eval(right, stream, scope, syntactic),
            },
            Expr::Seq(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    match self.eval(item, stream, scope, syntactic)? {
                        Some(value) => last = value,
                        None => return Ok(None),
                    }
                }
                Ok(Some(last))
            }
            Expr::Bind(inner, name) => {
                let value = self.eval(inner, stream, scope, syntactic)?;
                if let Some(v) = &value {
                    scope.push(name, v.clone());
                }
                Ok(value)
            }
            Expr::Many(inner, min) => {
                let mut values = Vec::new();
                loop {
                    let before = stream.pos;
                    match self.eval(inner, stream, scope, syntactic)? {
                        Some(value) => values.push(value),
                        None => break,
                    }
                    // An inner match that consumed nothing would repeat forever.
                    if stream.pos == before {
                        break;
                    }
                }
                Ok((values.len() >= *min).then_some(Value::List(values)))
            }
            Expr::Opt(inner) => Ok(Some(
                self.eval(inner, stream, scope, syntactic)?
                    .unwrap_or(Value::Undefined),
            )),
            Expr::Not(inner) => {
                let (pos, mark) = (stream.pos, scope.mark());
                let matched = self.eval(inner, stream, scope, syntactic)?.is_some();
                stream.pos = pos;
                scope.reset(mark);
                Ok((!matched).then_some(Value::Undefined))
            }
            Expr::Lookahead(inner) => {
                let pos = stream.pos;
                let value = self.eval(inner, stream, scope, syntactic)?;
                stream.pos = pos;
                Ok(value)
            }
            Expr::Str(inner) => {
                self.skip(stream, syntactic)?;
                let Some(Value::Str(text)) = stream.peek() else {
                    return Ok(None);
                };
                let mut sub = Stream::new(Cow::Owned(Value::chars(text)));
                self.eval_nested(inner, stream, &mut sub, scope, syntactic)
            }
            Expr::Lst(inner) => {
                self.skip(stream, syntactic)?;
                let Some(Value::List(items)) = stream.peek() else {
                    return Ok(None);
                };
                let mut sub = Stream::new(Cow::Owned(items.clone()));
                self.eval_nested(inner, stream, &mut sub, scope, syntactic)
            }
            Expr::Obj {
                properties,
                lenient,
            } => {
                self.skip(stream, syntactic)?;
                let Some(Value::Object(fields)) = stream.peek() else {
                    return Ok(None);
                };
                if !lenient
                    && fields
                        .iter()
                        .any(|(key, _)| !properties.iter().any(|p| p.name == *key))
                {
                    return Ok(None);
                }
                for prop in properties {
                    let Some((_, value)) = fields.iter().find(|(key, _)| *key == prop.name) else {
                        return Ok(None);
                    };
                    let mut sub = Stream::new(Cow::Borrowed(std::slice::from_ref(value)));
                    if self.eval_all(&prop.pattern, &mut sub, scope, syntactic)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(stream.advance())
            }
        }
    }

    /// Matches `expr` against all of `sub`, then consumes the element of
    /// `outer` that `sub` was built from.
    fn eval_nested(
        &self,
        expr: &Expr,
        outer: &mut Stream<'_>,
        sub: &mut Stream<'_>,
        scope: &mut Bindings,
        syntactic: bool,
    ) -> Result<Option<Value>> {
        let value = self.eval_all(expr, sub, scope, syntactic)?;
        if value.is_some() {
            outer.pos += 1;
        }
        Ok(value)
    }

    fn eval_all(
        &self,
        expr: &Expr,
        stream: &mut Stream<'_>,
        scope: &mut Bindings,
        syntactic: bool,
    ) -> Result<Option<Value>> {
        let mark = scope.mark();
        let value = self.eval(expr, stream, scope, syntactic)?;
        if value.is_some() {
            self.skip(stream, syntactic)?;
        }
        if value.is_none() || !stream.at_end() {
            scope.reset(mark);
            return Ok(None);
        }
        Ok(value)
    }
}

/// Equality with the current element; a string literal also matches the same
/// run of characters in a character stream. The empty string matches there
/// without consuming anything, including at the end of input.
fn match_prim(stream: &mut Stream<'_>, expected: &Value) -> Option<Value> {
    let current = stream.peek();
    if current == Some(expected) {
        return stream.advance();
    }
    let Value::Str(text) = expected else {
        return None;
    };
    match current {
        None | Some(Value::Char(_)) if text.is_empty() => return Some(expected.clone()),
        Some(Value::Char(_)) => {}
        _ => return None,
    }
    let len = text.chars().count();
    let rest = &stream.items[stream.pos..];
    if rest.len() < len || !text.chars().zip(rest).all(|(c, v)| *v == Value::Char(c)) {
        return None;
    }
    stream.pos += len;
    Some(expected.clone())
}

/// Full match against a string element, or the longest prefix match against
/// a run of characters.
fn match_regex(stream: &mut Stream<'_>, re: &RegexLiteral) -> Option<Value> {
    let full = match stream.peek()? {
        Value::Str(text) => re.is_full_match(text),
        Value::Char(_) => {
            let rest: String = stream.items[stream.pos..]
                .iter()
                .map_while(|v| match v {
                    Value::Char(c) => Some(*c),
                    _ => None,
                })
                .collect();
            let len = re.prefix_len(&rest)?;
            let matched = &rest[..len];
            stream.pos += matched.chars().count();
            return Some(Value::Str(matched.to_string()));
        }
        _ => false,
    };
    if full {
        stream.advance()
    } else {
        None
    }
}
