//! Token tree produced by the query lexer.
//!
//! Tokens live in an arena and link to each other by [`NodeId`]: `child`
//! points at the first nested token, `next`/`prev` walk siblings, `parent`
//! leads back out. A `modifier` chain holds tokens a resolver attached to the
//! token that follows them.

use std::fmt;

/// Index of a token inside its [`TokenTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Token,
    Number,
    Operator,
    Comparison,
    Modifier,
    And,
    Or,
    Not,
    Dash,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Quote,
    DQuote,
    Null,
    Colon,
    Question,
    Comma,
    Space,
    Other,
}

impl TokenKind {
    /// Kinds that open a nested group
    pub fn is_group(self) -> bool {
        matches!(
            self,
            TokenKind::OpenParen | TokenKind::OpenBrace | TokenKind::OpenBracket | TokenKind::DQuote
        )
    }
}

/// How a resolved token takes part in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenAction {
    /// Dropped from the tree
    Skip,
    /// Placed in the tree where it occurs
    #[default]
    Normal,
    /// Attached as a modifier of the token that follows
    Next,
    /// Moved to the query-wide global list
    Global,
    /// Placed in the tree and treated as numeric
    Number,
}

impl TokenAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(TokenAction::Skip),
            "normal" => Some(TokenAction::Normal),
            "next" => Some(TokenAction::Next),
            "global" => Some(TokenAction::Global),
            "number" => Some(TokenAction::Number),
            _ => None,
        }
    }
}

/// One node of the token tree
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub action: TokenAction,
    /// The attribute values were re-read as ordinary tokens
    pub no_params: bool,
    /// Attribute values from `name:[a,b]value` syntax
    pub attrs: Vec<String>,
    /// First token of the attached modifier chain
    pub modifier: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) child: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            action: TokenAction::Normal,
            no_params: false,
            attrs: Vec::new(),
            modifier: None,
            parent: None,
            child: None,
            next: None,
            prev: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn is_leaf(&self) -> bool {
        self.child.is_none()
    }
}

/// Arena of tokens with an optional root
#[derive(Debug, Clone, Default)]
pub struct TokenTree {
    nodes: Vec<Token>,
    root: Option<NodeId>,
}

impl TokenTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn get(&self, id: NodeId) -> &Token {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Token {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, kind: TokenKind, text: impl Into<String>) -> NodeId {
        self.nodes.push(Token::new(kind, text));
        NodeId(self.nodes.len() - 1)
    }

    /// Iterate a token and the siblings that follow it
    pub fn siblings(&self, first: Option<NodeId>) -> Siblings<'_> {
        Siblings {
            tree: self,
            next: first,
        }
    }

    /// Iterate the children of a token
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        self.siblings(self.get(id).child)
    }

    pub(crate) fn last_sibling(&self, id: NodeId) -> NodeId {
        let mut at = id;
        while let Some(next) = self.get(at).next {
            at = next;
        }
        at
    }

    /// Make `nodes` the child list of `parent`, in order
    pub(crate) fn adopt(&mut self, parent: NodeId, nodes: &[NodeId]) {
        let mut prev: Option<NodeId> = None;
        for &node in nodes {
            let token = self.get_mut(node);
            token.parent = Some(parent);
            token.prev = prev;
            token.next = None;
            if let Some(p) = prev {
                self.get_mut(p).next = Some(node);
            }
            prev = Some(node);
        }
        self.get_mut(parent).child = nodes.first().copied();
    }

    /// New group token wrapping `nodes` as its children
    pub(crate) fn wrap(&mut self, kind: TokenKind, text: &str, nodes: &[NodeId]) -> NodeId {
        let group = self.push(kind, text);
        self.adopt(group, nodes);
        group
    }

    /// Deep-copy the subtree rooted at `id` of `other` into this arena.
    /// Siblings of the root are not copied.
    pub(crate) fn graft(&mut self, other: &TokenTree, id: NodeId) -> NodeId {
        let source = other.get(id);
        let copy = self.push(source.kind, source.text.clone());
        {
            let token = self.get_mut(copy);
            token.action = source.action;
            token.no_params = source.no_params;
            token.attrs = source.attrs.clone();
        }
        if let Some(modifier) = source.modifier {
            let chain: Vec<NodeId> = other
                .siblings(Some(modifier))
                .map(|m| self.graft(other, m))
                .collect();
            link_chain(self, &chain);
            self.get_mut(copy).modifier = chain.first().copied();
        }
        let children: Vec<NodeId> = other
            .children(id)
            .map(|child| self.graft(other, child))
            .collect();
        if !children.is_empty() {
            self.adopt(copy, &children);
        }
        copy
    }

    fn dump(&self, f: &mut fmt::Formatter<'_>, first: Option<NodeId>, depth: usize) -> fmt::Result {
        for id in self.siblings(first) {
            let token = self.get(id);
            writeln!(f, "{}{}", "\t".repeat(depth), token.text)?;
            for attr in &token.attrs {
                writeln!(f, "{} * {}", "\t".repeat(depth), attr)?;
            }
            if token.modifier.is_some() {
                self.dump(f, token.modifier, depth + 2)?;
            }
            if token.child.is_some() {
                self.dump(f, token.child, depth + 1)?;
            }
        }
        Ok(())
    }
}

fn link_chain(tree: &mut TokenTree, chain: &[NodeId]) {
    for pair in chain.windows(2) {
        tree.get_mut(pair[0]).next = Some(pair[1]);
        tree.get_mut(pair[1]).prev = Some(pair[0]);
    }
}

/// Indented dump of the tree, one token per line
impl fmt::Display for TokenTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(f, self.root, 0)
    }
}

/// Iterator over a sibling chain
pub struct Siblings<'a> {
    tree: &'a TokenTree,
    next: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.get(id).next;
        Some(id)
    }
}
