//! Token tree to cursor tree compilation

use super::query_string::{ParsedQuery, Token, TokenKind, TokenTree, NodeId};
use super::CursorSource;
use crate::config::ParserConfig;
use crate::cursor::{AndCursor, BoxCursor, CursorKind, EmptyCursor, NotCursor, OrCursor, PhraseCursor};

/// Leaf override: returns a cursor to take the leaf over, `None` to fall back
/// to the default term lookup
pub type LeafHook<'s> = dyn Fn(&Token) -> Option<BoxCursor<'s>> + 's;

/// Compiles parsed queries into cursors over one source.
///
/// Group nodes become AND cursors, quoted groups PHRASE cursors, OR and NOT
/// nodes their cursor counterparts. Leaves become term cursors, `word*`
/// leaves a wildcard over every term with the prefix. A group with a child
/// that matches nothing matches nothing itself.
pub struct QueryCompiler<'s, S: CursorSource + ?Sized> {
    source: &'s S,
    config: ParserConfig,
    custom: Option<Box<LeafHook<'s>>>,
}

impl<'s, S: CursorSource + ?Sized> QueryCompiler<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            config: ParserConfig::default(),
            custom: None,
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Give `hook` first refusal on every leaf token
    pub fn with_custom<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Token) -> Option<BoxCursor<'s>> + 's,
    {
        self.custom = Some(Box::new(hook));
        self
    }

    pub fn compile(&self, query: &ParsedQuery) -> BoxCursor<'s> {
        self.compile_tree(query.tree())
    }

    /// Compile from the tree's root. Anything that cannot match yields an
    /// empty cursor.
    pub fn compile_tree(&self, tree: &TokenTree) -> BoxCursor<'s> {
        tree.root()
            .and_then(|root| self.compile_node(tree, root, 0))
            .unwrap_or_else(|| Box::new(EmptyCursor))
    }

    fn compile_node(&self, tree: &TokenTree, id: NodeId, depth: usize) -> Option<BoxCursor<'s>> {
        if depth > self.config.max_depth {
            return None;
        }
        let token = tree.get(id);
        if token.is_leaf() {
            return self.compile_leaf(token);
        }

        match token.kind {
            TokenKind::OpenParen | TokenKind::DQuote => {
                let mut subs = Vec::new();
                for child in tree.children(id) {
                    let sub = self.compile_node(tree, child, depth + 1)?;
                    if sub.kind() == CursorKind::Empty {
                        return None;
                    }
                    subs.push(sub);
                }
                if token.kind == TokenKind::DQuote {
                    Some(Box::new(PhraseCursor::from_cursors(subs)))
                } else if subs.len() == 1 {
                    subs.pop()
                } else {
                    Some(Box::new(AndCursor::from_cursors(subs)))
                }
            }
            TokenKind::Or => {
                let mut subs: Vec<BoxCursor<'s>> = tree
                    .children(id)
                    .filter_map(|child| self.compile_node(tree, child, depth + 1))
                    .collect();
                match subs.len() {
                    0 => Some(Box::new(EmptyCursor)),
                    1 => subs.pop(),
                    _ if subs.iter().all(|c| c.kind().has_positions()) => {
                        Some(Box::new(OrCursor::with_positions(subs)))
                    }
                    _ => Some(Box::new(OrCursor::from_cursors(subs))),
                }
            }
            TokenKind::Not => {
                let negative = token.child?;
                let positive = tree.get(negative).next?;
                let Some(positive) = self.compile_node(tree, positive, depth + 1) else {
                    return Some(Box::new(EmptyCursor));
                };
                match self.compile_node(tree, negative, depth + 1) {
                    Some(negative) => Some(Box::new(NotCursor::new(positive, negative))),
                    None => Some(positive),
                }
            }
            _ => None,
        }
    }

    fn compile_leaf(&self, token: &Token) -> Option<BoxCursor<'s>> {
        if let Some(cursor) = self.custom.as_ref().and_then(|hook| hook(token)) {
            return Some(cursor);
        }
        if token.kind == TokenKind::Null {
            return None;
        }

        if !token.attrs.is_empty() {
            let mut subs: Vec<BoxCursor<'s>> = token
                .attrs
                .iter()
                .map(|attr| self.source.term_cursor(&format!("{}{}", token.text, attr)))
                .collect();
            return match subs.len() {
                1 => subs.pop(),
                _ => Some(Box::new(OrCursor::from_cursors(subs))),
            };
        }

        match token.text.strip_suffix('*') {
            Some(prefix) if !prefix.is_empty() => Some(self.source.prefix_cursor(prefix)),
            _ => Some(self.source.term_cursor(&token.text)),
        }
    }
}
