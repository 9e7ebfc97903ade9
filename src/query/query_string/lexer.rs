//! Lexer for query expressions
//!
//! Reads the input byte by byte and places each token straight into a
//! [`TokenTree`]: group openers take the following tokens as children,
//! closers pop back out, everything else becomes the next sibling. Operator
//! precedence is applied afterwards by the rewrite passes.

use super::dictionary::{Resolution, TokenResolver};
use super::token::{NodeId, TokenAction, TokenKind, TokenTree};

/// Output of one lexer run
pub(crate) struct Lexed {
    pub tree: TokenTree,
    pub head: Option<NodeId>,
    pub globals: Vec<NodeId>,
}

/// Lexer for tokenizing query expressions
pub(crate) struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    position: usize,
    token_start: Option<usize>,
    resolver: &'a dyn TokenResolver,
    tree: TokenTree,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    pending: Vec<NodeId>,
    globals: Vec<NodeId>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, resolver: &'a dyn TokenResolver) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            position: 0,
            token_start: None,
            resolver,
            tree: TokenTree::new(),
            head: None,
            tail: None,
            pending: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn run(mut self) -> Lexed {
        let input = self.input;
        while let Some(&ch) = self.bytes.get(self.position) {
            let at = self.position;
            match ch {
                b'*' => self.star(at),
                b':' => match self.token_start.take() {
                    Some(start) => self.attribute(start, at + 1),
                    None => self.single(at, TokenKind::Colon),
                },
                b'?' => {
                    self.flush(at, TokenKind::Modifier);
                    self.single(at, TokenKind::Question);
                }
                b'&' | b'|' => {
                    self.flush(at, TokenKind::Token);
                    let kind = if ch == b'&' { TokenKind::And } else { TokenKind::Or };
                    let width = if self.bytes.get(at + 1) == Some(&ch) { 2 } else { 1 };
                    self.emit(&input[at..at + 1], kind);
                    self.position = at + width;
                }
                b'"' => {
                    self.flush(at, TokenKind::Token);
                    self.single(at, TokenKind::DQuote);
                }
                b'.' => {
                    self.flush(at, TokenKind::Token);
                    if self.bytes.get(at + 1) == Some(&b'.') && at + 2 < self.bytes.len() {
                        self.emit("..", TokenKind::Dash);
                        self.position = at + 2;
                    } else {
                        self.single(at, TokenKind::Other);
                    }
                }
                b',' | b'(' | b')' | b'{' | b'}' | b'[' | b']' | b'!' | b'=' | b'<' | b'>'
                | b'-' | b'+' | b'/' | b'%' | b'^' => {
                    self.flush(at, TokenKind::Token);
                    let kind = if self.is_quoted() {
                        TokenKind::Other
                    } else {
                        punctuation_kind(ch)
                    };
                    self.single(at, kind);
                }
                b'#' | b'~' | b'`' | b';' => {
                    self.flush(at, TokenKind::Token);
                    self.single(at, TokenKind::Other);
                }
                b'\\' => {
                    // the escaped character is dropped
                    self.flush(at, TokenKind::Token);
                    let escaped = input[at + 1..].chars().next().map_or(0, char::len_utf8);
                    self.position = at + 1 + escaped;
                }
                b'\'' | 0..=32 => {
                    self.flush(at, TokenKind::Token);
                    let mut end = at + 1;
                    while end < self.bytes.len() && self.bytes[end] <= b' ' {
                        end += 1;
                    }
                    self.position = end;
                    self.emit(" ", TokenKind::Space);
                }
                _ => {
                    if self.token_start.is_none() {
                        self.token_start = Some(at);
                    }
                    self.position = at + 1;
                }
            }
        }
        self.flush(self.bytes.len(), TokenKind::Token);

        Lexed {
            tree: self.tree,
            head: self.head,
            globals: self.globals,
        }
    }

    fn star(&mut self, at: usize) {
        match self.token_start {
            Some(_) if self.has_parent(TokenKind::OpenBrace) => {
                self.flush(at, TokenKind::Modifier);
                self.single(at, TokenKind::Operator);
            }
            Some(start) => {
                let input = self.input;
                self.token_start = None;
                self.position = at + 1;
                self.emit(&input[start..at + 1], TokenKind::Modifier);
            }
            None => self.single(at, TokenKind::Operator),
        }
    }

    /// Emit the one-byte token at `at` and step past it
    fn single(&mut self, at: usize, kind: TokenKind) {
        let input = self.input;
        self.position = at + 1;
        self.emit(&input[at..at + 1], kind);
    }

    /// Emit the token in progress, if any, ending at `end`
    fn flush(&mut self, end: usize, kind: TokenKind) {
        let input = self.input;
        if let Some(start) = self.token_start.take() {
            self.emit(&input[start..end], kind);
        }
    }

    fn emit(&mut self, text: &str, kind: TokenKind) {
        let Resolution {
            action,
            substitute,
            ..
        } = self.resolver.resolve(text, &[]);
        if action == TokenAction::Skip {
            return;
        }
        self.place(text, kind, TokenAction::Normal, substitute);
    }

    /// `name:[a,"b c"]value` syntax. `start` is the name, `after` the byte
    /// following the colon.
    fn attribute(&mut self, start: usize, after: usize) {
        let input = self.input;
        let param = &input[start..after];
        let mut attrs = Vec::new();
        let mut at = after;

        if self.bytes.get(at) == Some(&b'[') {
            at += 1;
            while at < self.bytes.len() && self.bytes[at] != b']' {
                let (value, next) = self.attribute_value(at, b"],");
                if !value.is_empty() {
                    attrs.push(value.to_string());
                }
                at = next;
                if at < self.bytes.len() && self.bytes[at] != b']' {
                    at += 1;
                }
            }
            if self.bytes.get(at) == Some(&b']') {
                at += 1;
            }
        }
        let (value, next) = self.attribute_value(at, b"");
        if !value.is_empty() {
            attrs.push(value.to_string());
        }
        at = next;

        let resolution = self.resolver.resolve(param, &attrs);
        if resolution.no_params {
            attrs.clear();
            at = after;
        }
        self.position = at;
        if resolution.action == TokenAction::Skip {
            return;
        }

        let text = resolution.param.as_deref().unwrap_or(param);
        let placed = self.place(text, TokenKind::Token, resolution.action, resolution.substitute);
        if let Some(id) = placed {
            if !attrs.is_empty() {
                self.tree.get_mut(id).attrs = attrs;
            }
        }
    }

    /// One attribute value: quoted up to the matching quote, otherwise up to
    /// whitespace or one of `stop`
    fn attribute_value(&self, at: usize, stop: &[u8]) -> (&'a str, usize) {
        let input = self.input;
        match self.bytes.get(at) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let mut end = at + 1;
                while end < self.bytes.len() && self.bytes[end] != quote {
                    end += if self.bytes[end] == b'\\' && end + 1 < self.bytes.len() { 2 } else { 1 };
                }
                let value = input.get(at + 1..end).unwrap_or_default();
                (value, (end + 1).min(self.bytes.len()))
            }
            _ => {
                let mut end = at;
                while end < self.bytes.len() && self.bytes[end] > b' ' && !stop.contains(&self.bytes[end]) {
                    end += 1;
                }
                (input.get(at..end).unwrap_or_default(), end)
            }
        }
    }

    /// Place a token relative to the current tail. Returns the token placed,
    /// `None` when it was merged into the tail or consumed structurally.
    fn place(
        &mut self,
        text: &str,
        kind: TokenKind,
        action: TokenAction,
        substitute: Option<TokenTree>,
    ) -> Option<NodeId> {
        if let Some(tail) = self.tail {
            let tail_token = self.tree.get_mut(tail);
            // runs of signs collapse into the tail: "--" is "+", "+-" is "-"
            let sign = match (text, tail_token.text.as_str()) {
                ("-", "-") => Some(Some("+")),
                ("-", "+") => Some(Some("-")),
                ("+", "+") | ("+", "-") => Some(None),
                _ => None,
            };
            if let Some(replacement) = sign {
                if let Some(replacement) = replacement {
                    tail_token.text = replacement.to_string();
                }
                return None;
            }
            if kind == TokenKind::Comparison && tail_token.kind == TokenKind::Comparison {
                tail_token.text.push_str(text);
                return None;
            }
        }

        match kind {
            TokenKind::CloseParen => return self.close_group(TokenKind::OpenParen),
            TokenKind::CloseBrace => return self.close_group(TokenKind::OpenBrace),
            TokenKind::CloseBracket => return self.close_group(TokenKind::OpenBracket),
            TokenKind::DQuote => {
                if self.tail_parent_kind() == Some(TokenKind::DQuote) {
                    self.tail = self.tail.and_then(|t| self.tree.get(t).parent);
                    return None;
                }
                if let Some(tail) = self.tail {
                    let token = self.tree.get(tail);
                    if token.kind == TokenKind::DQuote && token.child.is_none() {
                        return None;
                    }
                }
            }
            TokenKind::Space => {
                if let Some(parent) = self.tail.and_then(|t| self.tree.get(t).parent) {
                    let token = self.tree.get(parent);
                    if token.kind == TokenKind::Comparison && token.text == "=" {
                        self.tail = Some(parent);
                    }
                }
                return None;
            }
            TokenKind::Comma => {
                let in_list = |k: Option<TokenKind>| {
                    matches!(k, Some(TokenKind::OpenParen) | Some(TokenKind::OpenBracket))
                };
                let tail_kind = self.tail.map(|t| self.tree.get(t).kind);
                if !in_list(self.tail_parent_kind()) && !in_list(tail_kind) {
                    return None;
                }
            }
            _ => {}
        }

        let id = match substitute.as_ref().and_then(|tree| tree.root().map(|root| (tree, root))) {
            Some((tree, root)) => self.tree.graft(tree, root),
            None => {
                let id = self.tree.push(kind, text);
                self.tree.get_mut(id).action = action;
                id
            }
        };

        match action {
            TokenAction::Next => {
                self.pending.push(id);
                return Some(id);
            }
            TokenAction::Global => {
                self.globals.push(id);
                return Some(id);
            }
            _ => {}
        }
        if !self.pending.is_empty() {
            let chain = std::mem::take(&mut self.pending);
            for pair in chain.windows(2) {
                self.tree.get_mut(pair[0]).next = Some(pair[1]);
                self.tree.get_mut(pair[1]).prev = Some(pair[0]);
            }
            self.tree.get_mut(id).modifier = chain.first().copied();
        }

        let Some(tail) = self.tail else {
            self.head = Some(id);
            self.tail = Some(id);
            return Some(id);
        };

        let tail_token = self.tree.get(tail);
        let nests = tail_token.child.is_none()
            && (tail_token.kind.is_group()
                || (tail_token.kind == TokenKind::Comparison && tail_token.text == "="));
        if nests {
            self.tree.get_mut(id).parent = Some(tail);
            self.tree.get_mut(tail).child = Some(id);
        } else {
            let after_colon = tail_token.kind == TokenKind::Colon;
            let parent = tail_token.parent;
            let token = self.tree.get_mut(id);
            token.parent = parent;
            token.prev = Some(tail);
            self.tree.get_mut(tail).next = Some(id);
            if after_colon && self.group_ternary(id) {
                return Some(id);
            }
        }
        self.tail = Some(id);
        Some(id)
    }

    fn close_group(&mut self, open: TokenKind) -> Option<NodeId> {
        let tail = self.tail?;
        let token = self.tree.get(tail);
        let parent = token.parent.filter(|&p| self.tree.get(p).kind == open);
        let empty_open = token.kind == open && token.child.is_none();
        if let Some(parent) = parent {
            self.tail = Some(parent);
        } else if empty_open {
            let null = self.tree.push(TokenKind::Null, "");
            self.tree.get_mut(null).parent = Some(tail);
            self.tree.get_mut(tail).child = Some(null);
        }
        None
    }

    /// Wrap `z cmp y ? x : t` ending at `last` into one paren group
    fn group_ternary(&mut self, last: NodeId) -> bool {
        let mut run = vec![last];
        let mut at = last;
        for _ in 0..6 {
            match self.tree.get(at).prev {
                Some(prev) => {
                    run.push(prev);
                    at = prev;
                }
                None => return false,
            }
        }
        run.reverse();
        // run: z, cmp, y, ?, x, :, t
        if self.tree.get(run[3]).kind != TokenKind::Question
            || self.tree.get(run[1]).kind != TokenKind::Comparison
        {
            return false;
        }

        let first = run[0];
        let before = self.tree.get(first).prev;
        let parent = self.tree.get(first).parent;
        let paren = self.tree.wrap(TokenKind::OpenParen, "(", &run);
        let token = self.tree.get_mut(paren);
        token.parent = parent;
        token.prev = before;
        match (before, parent) {
            (Some(before), _) => self.tree.get_mut(before).next = Some(paren),
            (None, Some(parent)) => self.tree.get_mut(parent).child = Some(paren),
            (None, None) => {}
        }
        if self.head == Some(first) {
            self.head = Some(paren);
        }
        self.tail = Some(paren);
        true
    }

    fn tail_parent_kind(&self) -> Option<TokenKind> {
        let parent = self.tree.get(self.tail?).parent?;
        Some(self.tree.get(parent).kind)
    }

    /// The tail or one of its ancestors has `kind`
    fn has_parent(&self, kind: TokenKind) -> bool {
        let mut at = self.tail;
        while let Some(id) = at {
            let token = self.tree.get(id);
            if token.kind == kind {
                return true;
            }
            at = token.parent;
        }
        false
    }

    fn is_quoted(&self) -> bool {
        self.has_parent(TokenKind::DQuote)
    }
}

fn punctuation_kind(ch: u8) -> TokenKind {
    match ch {
        b',' => TokenKind::Comma,
        b'(' => TokenKind::OpenParen,
        b')' => TokenKind::CloseParen,
        b'{' => TokenKind::OpenBrace,
        b'}' => TokenKind::CloseBrace,
        b'[' => TokenKind::OpenBracket,
        b']' => TokenKind::CloseBracket,
        b'!' | b'=' | b'<' | b'>' => TokenKind::Comparison,
        _ => TokenKind::Operator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query_string::dictionary::NoResolver;

    fn lex(input: &str) -> (TokenTree, Vec<(TokenKind, String)>) {
        let lexed = Lexer::new(input, &NoResolver).run();
        let top = lexed
            .tree
            .siblings(lexed.head)
            .map(|id| (lexed.tree.get(id).kind, lexed.tree.get(id).text.clone()))
            .collect();
        (lexed.tree, top)
    }

    fn texts(top: &[(TokenKind, String)]) -> Vec<&str> {
        top.iter().map(|(_, t)| t.as_str()).collect()
    }

    #[test]
    fn test_words_and_spaces() {
        let (_, top) = lex("  cat   dog ");
        assert_eq!(texts(&top), vec!["cat", "dog"]);
        assert_eq!(top[0].0, TokenKind::Token);
    }

    #[test]
    fn test_operators() {
        let (_, top) = lex("a && b | c & d");
        assert_eq!(texts(&top), vec!["a", "&", "b", "|", "c", "&", "d"]);
        assert_eq!(top[1].0, TokenKind::And);
        assert_eq!(top[3].0, TokenKind::Or);
    }

    #[test]
    fn test_groups_nest() {
        let lexed = Lexer::new("a (b c) d", &NoResolver).run();
        let tree = &lexed.tree;
        let top: Vec<NodeId> = tree.siblings(lexed.head).collect();
        assert_eq!(top.len(), 3);
        assert_eq!(tree.get(top[1]).kind, TokenKind::OpenParen);
        let inner: Vec<&str> = tree.children(top[1]).map(|id| tree.get(id).text.as_str()).collect();
        assert_eq!(inner, vec!["b", "c"]);
        assert_eq!(tree.get(top[2]).text, "d");
    }

    #[test]
    fn test_empty_group_gets_null_child() {
        let lexed = Lexer::new("()", &NoResolver).run();
        let tree = &lexed.tree;
        let paren = lexed.head.unwrap();
        let child = tree.get(paren).first_child().unwrap();
        assert_eq!(tree.get(child).kind, TokenKind::Null);
    }

    #[test]
    fn test_quotes() {
        let lexed = Lexer::new("\"big cat\" dog", &NoResolver).run();
        let tree = &lexed.tree;
        let top: Vec<NodeId> = tree.siblings(lexed.head).collect();
        assert_eq!(top.len(), 2);
        assert_eq!(tree.get(top[0]).kind, TokenKind::DQuote);
        assert_eq!(tree.children(top[0]).count(), 2);

        // punctuation inside quotes loses its meaning
        let lexed = Lexer::new("\"a (b\"", &NoResolver).run();
        let quote = lexed.head.unwrap();
        let kinds: Vec<TokenKind> = lexed.tree.children(quote).map(|id| lexed.tree.get(id).kind).collect();
        assert_eq!(kinds, vec![TokenKind::Token, TokenKind::Other, TokenKind::Token]);
    }

    #[test]
    fn test_wildcard_and_signs() {
        let (_, top) = lex("cat* -- dog +- bird");
        assert_eq!(texts(&top), vec!["cat*", "+", "dog", "-", "bird"]);
        assert_eq!(top[0].0, TokenKind::Modifier);
        assert_eq!(top[1].0, TokenKind::Operator);
    }

    #[test]
    fn test_comparisons_merge() {
        let (_, top) = lex("a >= 5");
        assert_eq!(texts(&top), vec!["a", ">=", "5"]);
        assert_eq!(top[1].0, TokenKind::Comparison);
    }

    #[test]
    fn test_attributes() {
        let lexed = Lexer::new("title:[en,\"fr ca\"]rust x", &NoResolver).run();
        let tree = &lexed.tree;
        let top: Vec<NodeId> = tree.siblings(lexed.head).collect();
        assert_eq!(top.len(), 2);
        assert_eq!(tree.get(top[0]).text, "title:");
        assert_eq!(tree.get(top[0]).attrs, vec!["en", "fr ca", "rust"]);
        assert_eq!(tree.get(top[1]).text, "x");
    }

    #[test]
    fn test_no_params_relexes_value() {
        let resolver = |param: &str, _: &[String]| Resolution {
            no_params: param.ends_with(':'),
            param: param.strip_suffix(':').map(str::to_string),
            ..Resolution::normal()
        };
        let lexed = Lexer::new("title:rust", &resolver).run();
        let tree = &lexed.tree;
        let top: Vec<&str> = tree.siblings(lexed.head).map(|id| tree.get(id).text.as_str()).collect();
        assert_eq!(top, vec!["title", "rust"]);
        assert!(tree.get(lexed.head.unwrap()).attrs.is_empty());
    }

    #[test]
    fn test_escape_drops_character() {
        let (_, top) = lex("a\\(b");
        assert_eq!(texts(&top), vec!["a", "b"]);
        let (_, top) = lex("x\\é y");
        assert_eq!(texts(&top), vec!["x", "y"]);
    }

    #[test]
    fn test_resolver_actions() {
        let resolver = |param: &str, _: &[String]| match param {
            "the" => Resolution::with_action(TokenAction::Skip),
            _ => Resolution::normal(),
        };
        let lexed = Lexer::new("the cat", &resolver).run();
        let top: Vec<&str> = lexed
            .tree
            .siblings(lexed.head)
            .map(|id| lexed.tree.get(id).text.as_str())
            .collect();
        assert_eq!(top, vec!["cat"]);
    }

    #[test]
    fn test_next_and_global_attrs() {
        let resolver = |param: &str, _: &[String]| match param {
            "site:" => Resolution::with_action(TokenAction::Next),
            "lang:" => Resolution::with_action(TokenAction::Global),
            _ => Resolution::normal(),
        };
        let lexed = Lexer::new("lang:en site:x cat", &resolver).run();
        let tree = &lexed.tree;
        let top: Vec<NodeId> = tree.siblings(lexed.head).collect();
        assert_eq!(top.len(), 1);
        let cat = tree.get(top[0]);
        assert_eq!(cat.text, "cat");
        let modifier = tree.get(cat.modifier.unwrap());
        assert_eq!(modifier.text, "site:");
        assert_eq!(modifier.attrs, vec!["x"]);
        assert_eq!(lexed.globals.len(), 1);
        assert_eq!(tree.get(lexed.globals[0]).attrs, vec!["en"]);
    }

    #[test]
    fn test_ternary_grouping() {
        let lexed = Lexer::new("a > b ? c : d e", &NoResolver).run();
        let tree = &lexed.tree;
        let top: Vec<NodeId> = tree.siblings(lexed.head).collect();
        assert_eq!(top.len(), 2);
        assert_eq!(tree.get(top[0]).kind, TokenKind::OpenParen);
        let inner: Vec<&str> = tree.children(top[0]).map(|id| tree.get(id).text.as_str()).collect();
        assert_eq!(inner, vec!["a", ">", "b", "?", "c", ":", "d"]);
        assert_eq!(tree.get(top[1]).text, "e");
    }

    #[test]
    fn test_comma_outside_list_dropped() {
        let (_, top) = lex("a, b");
        assert_eq!(texts(&top), vec!["a", "b"]);

        let lexed = Lexer::new("(a,b)", &NoResolver).run();
        let paren = lexed.head.unwrap();
        let inner: Vec<&str> = lexed.tree.children(paren).map(|id| lexed.tree.get(id).text.as_str()).collect();
        assert_eq!(inner, vec!["a", ",", "b"]);
    }
}
