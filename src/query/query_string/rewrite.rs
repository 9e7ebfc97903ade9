//! Precedence passes over a freshly lexed token tree.
//!
//! `or` binds loosest, then `not`, then the implicit `and` between adjacent
//! tokens. Each pass takes the first token of a sibling run and returns the
//! token that now starts it.

use super::token::{NodeId, TokenKind, TokenTree};

fn is_word(tree: &TokenTree, id: NodeId, kind: TokenKind, word: &str) -> bool {
    let token = tree.get(id);
    token.kind == kind || (token.kind == TokenKind::Token && token.text.eq_ignore_ascii_case(word))
}

fn is_or(tree: &TokenTree, id: NodeId) -> bool {
    is_word(tree, id, TokenKind::Or, "or")
}

fn is_not(tree: &TokenTree, id: NodeId) -> bool {
    is_word(tree, id, TokenKind::Not, "not")
}

/// Recurse into the children of `id` unless it is a quoted phrase
fn rewrite_children(tree: &mut TokenTree, id: NodeId, pass: fn(&mut TokenTree, NodeId) -> NodeId) {
    if tree.get(id).kind == TokenKind::DQuote {
        return;
    }
    if let Some(child) = tree.get(id).child {
        let first = pass(tree, child);
        tree.get_mut(id).child = Some(first);
        tree.get_mut(first).parent = Some(id);
    }
}

/// Split a sibling run at `or` tokens into one OR node over the pieces.
/// Multi-token pieces are wrapped in a paren group.
pub(crate) fn fix_ors(tree: &mut TokenTree, first: NodeId) -> NodeId {
    let parent = tree.get(first).parent;
    let mut starts = Vec::new();
    let mut start = Some(first);
    let mut at = Some(first);

    while let Some(id) = at {
        let next = tree.get(id).next;
        rewrite_children(tree, id, fix_ors);
        if is_or(tree, id) {
            if let Some(s) = start {
                if next.is_some() && s != id {
                    starts.push(s);
                }
            }
            if let Some(prev) = tree.get(id).prev {
                tree.get_mut(prev).next = None;
            }
            if let Some(next) = next {
                tree.get_mut(next).prev = None;
            }
            start = next;
        }
        at = next;
    }

    if starts.is_empty() {
        return first;
    }
    starts.extend(start);

    let members: Vec<NodeId> = starts
        .into_iter()
        .map(|s| {
            if tree.get(s).next.is_some() {
                let run: Vec<NodeId> = tree.siblings(Some(s)).collect();
                tree.wrap(TokenKind::OpenParen, "(", &run)
            } else {
                s
            }
        })
        .collect();
    let or = tree.wrap(TokenKind::Or, "or", &members);
    tree.get_mut(or).parent = parent;
    or
}

/// Turn `a not b c` into NOT(b, (a c)): every operand of a `not` is
/// excluded from the rest of the run. Runs made only of negations, or
/// without any, are left alone.
pub(crate) fn fix_nots(tree: &mut TokenTree, first: NodeId) -> NodeId {
    let parent = tree.get(first).parent;
    let mut negated = Vec::new();
    let mut kept = Vec::new();

    let mut at = Some(first);
    while let Some(id) = at {
        rewrite_children(tree, id, fix_nots);
        let next = tree.get(id).next;
        if is_not(tree, id) {
            // a trailing `not` has no operand and belongs to neither side
            at = next.and_then(|operand| {
                rewrite_children(tree, operand, fix_nots);
                negated.push(operand);
                tree.get(operand).next
            });
            continue;
        }
        kept.push(id);
        at = next;
    }

    if negated.is_empty() || kept.is_empty() {
        return first;
    }

    let negative = match negated.as_slice() {
        [single] => *single,
        _ => tree.wrap(TokenKind::Or, "or", &negated),
    };
    let positive = match kept.as_slice() {
        [single] => *single,
        _ => tree.wrap(TokenKind::OpenParen, "(", &kept),
    };
    let not = tree.wrap(TokenKind::Not, "not", &[negative, positive]);
    tree.get_mut(not).parent = parent;
    not
}

/// Wrap a top-level run of several tokens into one implicit AND group
pub(crate) fn group_and(tree: &mut TokenTree, first: NodeId) -> NodeId {
    if tree.get(first).next.is_none() {
        return first;
    }
    let run: Vec<NodeId> = tree.siblings(Some(first)).collect();
    tree.wrap(TokenKind::OpenParen, "(", &run)
}
