//! The base grammar every grammar compiled from source inherits from.
//!
//! Its rules are ordinary rules, so descendants can override or extend them;
//! extending `spaces` is how comments are taught to syntactic rules.

use once_cell::sync::Lazy;
use std::sync::Arc;
use syn_peg_model::{Builder, CharClass, Expr, Grammar, Result, SKIP_RULE};

pub use syn_peg_model::BASE_GRAMMAR;

static BASE: Lazy<Arc<Grammar>> =
    Lazy::new(|| Arc::new(build_base().expect("base grammar rules are distinct")));

/// Shared handle to the base grammar.
pub fn base() -> Arc<Grammar> {
    BASE.clone()
}

fn class(from: char, to: char) -> Expr {
    Expr::Class(CharClass::new(from, to))
}

fn build_base() -> Result<Grammar> {
    let mut b = Builder::new();
    b.set_name(BASE_GRAMMAR);

    b.define("anything", Expr::Any)?;
    b.define("end", Expr::Any.not())?;
    b.define("empty", Expr::Seq(Vec::new()))?;
    b.define("char", class('\0', char::MAX))?;
    b.define("digit", class('0', '9'))?;
    b.define("lower", class('a', 'z'))?;
    b.define("upper", class('A', 'Z'))?;
    b.define("letter", Expr::alt(Expr::app("lower"), Expr::app("upper")))?;
    b.define("alnum", Expr::alt(Expr::app("letter"), Expr::app("digit")))?;
    // '\t'..='\r' covers tab, line feed, vertical tab, form feed and carriage return.
    b.define("space", Expr::alt(Expr::prim(' '), class('\t', '\r')))?;
    b.define(SKIP_RULE, Expr::app("space").many())?;

    b.build()
}
