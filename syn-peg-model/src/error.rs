use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Compilation and lookup failures. A failed compilation never yields a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("rule `{rule}` is already defined in grammar `{grammar}`")]
    DuplicateRule { grammar: String, rule: String },

    #[error("rule `{rule}` is not defined in grammar `{grammar}` or any of its super-grammars")]
    UndefinedRule { grammar: String, rule: String },

    #[error("unknown grammar `{name}` in namespace `{namespace}`")]
    UnknownGrammar { namespace: String, name: String },

    #[error("malformed grammar source at {line}:{column}: {message}")]
    MalformedSource {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("grammar `{name}` is already registered in namespace `{namespace}`")]
    GrammarAlreadyRegistered { namespace: String, name: String },

    #[error("super-grammar of `{grammar}` is already set")]
    SuperGrammarAlreadySet { grammar: String },
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        let start = err.span().start();
        Error::MalformedSource {
            line: start.line,
            column: start.column,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = Error::UndefinedRule {
            grammar: "Child".into(),
            rule: "Bar".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule `Bar` is not defined in grammar `Child` or any of its super-grammars"
        );
    }

    #[test]
    fn test_syn_errors_become_malformed_source() {
        let err: Error = syn::parse_str::<syn::Ident>("1").unwrap_err().into();
        assert!(matches!(err, Error::MalformedSource { line: 1, .. }));
    }
}
