//! Token resolution: the hook that decides what each lexed token becomes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::parser::QueryStringParser;
use super::token::{TokenAction, TokenTree};
use crate::error::{QuarryError, Result};

/// Outcome of resolving one token
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub action: TokenAction,
    /// Replacement text for an attribute token's parameter
    pub param: Option<String>,
    /// Drop the attribute values and lex them as ordinary tokens
    pub no_params: bool,
    /// Subtree grafted in place of the token
    pub substitute: Option<TokenTree>,
}

impl Resolution {
    pub fn normal() -> Self {
        Self::default()
    }

    pub fn with_action(action: TokenAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }
}

/// Strategy deciding how each token of a query is placed.
///
/// `param` is the token text; for `name:value` syntax it is `name:` with the
/// colon, and `attrs` holds the bracketed list followed by the value.
pub trait TokenResolver {
    fn resolve(&self, param: &str, attrs: &[String]) -> Resolution;
}

/// Places every token as written
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl TokenResolver for NoResolver {
    fn resolve(&self, _param: &str, _attrs: &[String]) -> Resolution {
        Resolution::normal()
    }
}

impl<F> TokenResolver for F
where
    F: Fn(&str, &[String]) -> Resolution,
{
    fn resolve(&self, param: &str, attrs: &[String]) -> Resolution {
        self(param, attrs)
    }
}

/// Named macro expansions loaded from configuration lines.
///
/// Each line reads `name: action[,no_params] expression`, where action is
/// one of `global`, `next`, `skip`, `normal` or `number`. A token whose text
/// matches a name is replaced by a copy of the parsed expression.
#[derive(Debug, Clone, Default)]
pub struct TokenDictionary {
    entries: BTreeMap<String, TokenTree>,
}

impl TokenDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every non-blank line of `text`
    pub fn parse(text: &str) -> Result<Self> {
        let mut dict = Self::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            dict.add(line)?;
        }
        Ok(dict)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Add or replace one entry
    pub fn add(&mut self, line: &str) -> Result<()> {
        let malformed = || QuarryError::Dictionary(format!("malformed entry: {:?}", line));

        let rest = line.trim_start();
        let (name, rest) = rest.split_once(|c: char| c.is_ascii_whitespace()).ok_or_else(malformed)?;
        let rest = rest.trim_start();
        let (kind, expression) = rest.split_once(|c: char| c.is_ascii_whitespace()).ok_or_else(malformed)?;

        let (action, no_params) = match kind.split_once(',') {
            Some((action, flag)) => (action, flag == "no_params"),
            None => (kind, false),
        };
        let action = TokenAction::parse(action)
            .ok_or_else(|| QuarryError::Dictionary(format!("unknown action {:?} in {:?}", action, line)))?;

        let parsed = QueryStringParser::new().parse(expression);
        let mut tree = parsed.into_tree();
        let root = tree
            .root()
            .ok_or_else(|| QuarryError::Dictionary(format!("empty expression for {:?}", name)))?;
        let token = tree.get_mut(root);
        token.action = action;
        token.no_params = no_params;

        self.entries.insert(name.to_string(), tree);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TokenTree> {
        self.entries.get(name)
    }

    /// Attribute values of an entry's expression
    pub fn values(&self, name: &str) -> &[String] {
        self.entries
            .get(name)
            .and_then(|tree| tree.root().map(|root| tree.get(root).attrs.as_slice()))
            .unwrap_or(&[])
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TokenResolver for TokenDictionary {
    fn resolve(&self, param: &str, _attrs: &[String]) -> Resolution {
        match self.entries.get(param) {
            Some(tree) => {
                let (action, no_params) = tree
                    .root()
                    .map(|root| (tree.get(root).action, tree.get(root).no_params))
                    .unwrap_or_default();
                Resolution {
                    action,
                    param: None,
                    no_params,
                    substitute: Some(tree.clone()),
                }
            }
            None if param.starts_with('@') => Resolution::with_action(TokenAction::Number),
            None => Resolution {
                action: TokenAction::Normal,
                param: param.strip_suffix(':').map(str::to_string),
                no_params: true,
                substitute: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_entries() {
        let dict = TokenDictionary::parse(
            "lang: global lang:[en]\n\n  pets: normal,no_params (cat or dog)\nsite: next site:example.com\n",
        )
        .unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.value("lang:"), Some("en"));
        assert_eq!(dict.values("site:"), &["example.com".to_string()]);

        let pets = dict.get("pets:").unwrap();
        let root = pets.get(pets.root().unwrap());
        assert!(root.no_params);
        assert_eq!(root.action, TokenAction::Normal);
    }

    #[test]
    fn test_malformed_entries() {
        let mut dict = TokenDictionary::new();
        assert!(dict.add("lonely").is_err());
        assert!(dict.add("name: normal").is_err());
        assert!(dict.add("name: sometimes value").is_err());
        assert!(dict.is_empty());
    }

    #[test]
    fn test_unknown_params() {
        let dict = TokenDictionary::new();
        let res = dict.resolve("title:", &[]);
        assert_eq!(res.action, TokenAction::Normal);
        assert!(res.no_params);
        assert_eq!(res.param.as_deref(), Some("title"));

        assert_eq!(dict.resolve("@limit:", &[]).action, TokenAction::Number);
        assert!(dict.resolve("plain", &[]).param.is_none());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |param: &str, _: &[String]| {
            if param == "the" {
                Resolution::with_action(TokenAction::Skip)
            } else {
                Resolution::normal()
            }
        };
        assert_eq!(resolver.resolve("the", &[]).action, TokenAction::Skip);
        assert_eq!(resolver.resolve("cat", &[]).action, TokenAction::Normal);
    }
}
