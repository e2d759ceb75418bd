extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::parse_macro_input;
use syn_peg_model::{parser, validator};

/// Checks grammar source at compile time and expands to it as a `&'static str`.
///
/// Syntax errors, rules defined twice with `=` and invalid regex literals are
/// reported at the offending token. Everything else (super-grammar lookup,
/// override/extend targets) is checked when the source is loaded.
///
/// # Example
///
/// ```rust,ignore
/// use syn_peg::{grammar, make_grammar};
///
/// let source: &str = grammar! {
///     grammar Greeting {
///         hello = "hi" | "hello"
///     }
/// };
/// let g = make_grammar(source, None).unwrap();
/// assert_eq!(g.name(), "Greeting");
/// ```
#[proc_macro_error]
#[proc_macro]
pub fn grammar(input: TokenStream) -> TokenStream {
    // 1. Source text: captured before parsing consumes the tokens
    let source = input.to_string();

    // 2. Parsing: from TokenStream to syntactic AST (parser.rs)
    let ast = parse_macro_input!(input as parser::GrammarSource);

    // 3. Validation: duplicate definitions and regex literals, with spans
    for grammar in &ast.grammars {
        if let Err(e) = validator::check_declaration(grammar) {
            abort!(e.span(), "{}", e);
        }
    }

    // 4. Expansion: the checked source as a string literal
    quote! { #source }.into()
}
