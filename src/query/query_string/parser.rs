//! Query expression parser: lexing plus the precedence passes

use std::fmt;

use super::dictionary::{NoResolver, TokenResolver};
use super::lexer::Lexer;
use super::rewrite::{fix_nots, fix_ors, group_and};
use super::token::{NodeId, Token, TokenTree};

static NO_RESOLVER: NoResolver = NoResolver;

/// A parsed query expression
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    tree: TokenTree,
    globals: Vec<NodeId>,
}

impl ParsedQuery {
    pub fn tree(&self) -> &TokenTree {
        &self.tree
    }

    pub fn into_tree(self) -> TokenTree {
        self.tree
    }

    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    /// Tokens a resolver moved out of the expression into the query-wide list
    pub fn globals(&self) -> impl Iterator<Item = &Token> + '_ {
        self.globals.iter().map(|&id| self.tree.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.tree.root().is_none()
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt(f)
    }
}

/// Parser for query expressions.
///
/// Plain words are implicitly AND-ed, `or`/`|` splits alternatives, `not`
/// excludes the token that follows it, `"..."` marks a phrase and `word*` a
/// prefix. A [`TokenResolver`] may drop, rewrite or relocate any token.
pub struct QueryStringParser<'r> {
    resolver: &'r dyn TokenResolver,
}

impl QueryStringParser<'static> {
    pub fn new() -> Self {
        Self {
            resolver: &NO_RESOLVER,
        }
    }
}

impl Default for QueryStringParser<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> QueryStringParser<'r> {
    /// Parser consulting `resolver` for every token
    pub fn with_resolver(resolver: &'r dyn TokenResolver) -> Self {
        Self { resolver }
    }

    /// Parse the expression into a token tree. Never fails; input with no
    /// usable tokens yields an empty query.
    pub fn parse(&self, input: &str) -> ParsedQuery {
        let lexed = Lexer::new(input, self.resolver).run();
        let mut tree = lexed.tree;
        let root = lexed.head.map(|head| {
            let head = fix_ors(&mut tree, head);
            let head = fix_nots(&mut tree, head);
            group_and(&mut tree, head)
        });
        tree.set_root(root);
        ParsedQuery {
            tree,
            globals: lexed.globals,
        }
    }
}
