//! Lazy pattern search over a purpose tree.

use globset::{GlobBuilder, GlobMatcher};
use indexmap::map::Iter as ChildIter;

use super::tree::{PurposeNode, BUCKET_KEY};

/// One search hit: the resolved purpose path and a registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurposeMatch<'a> {
    pub path: String,
    pub name: &'a str,
}

/// Matcher for one pattern token.
#[derive(Debug)]
enum TokenMatcher {
    /// Empty token: matches everything and turns on pass-through below.
    Any,
    Literal(String),
    Glob(GlobMatcher),
}

impl TokenMatcher {
    fn compile(token: &str) -> Self {
        if token.is_empty() {
            return TokenMatcher::Any;
        }
        if token.contains(['*', '?', '[']) {
            let glob = GlobBuilder::new(&quote_braces(token))
                .backslash_escape(true)
                .build();
            if let Ok(glob) = glob {
                return TokenMatcher::Glob(glob.compile_matcher());
            }
        }
        TokenMatcher::Literal(token.to_string())
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            TokenMatcher::Any => true,
            TokenMatcher::Literal(lit) => lit == name,
            TokenMatcher::Glob(glob) => glob.is_match(name),
        }
    }
}

/// Shell wildcards have no `{a,b}` alternation, so braces outside a
/// character class are matched literally.
fn quote_braces(token: &str) -> String {
    let mut quoted = String::with_capacity(token.len());
    let mut in_class = false;
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                quoted.push(c);
                if let Some(escaped) = chars.next() {
                    quoted.push(escaped);
                }
            }
            '[' if !in_class => {
                in_class = true;
                quoted.push(c);
                if let Some(negation) = chars.next_if(|&n| n == '!' || n == '^') {
                    quoted.push(negation);
                }
                // A leading `]` is part of the class.
                if let Some(bracket) = chars.next_if_eq(&']') {
                    quoted.push(bracket);
                }
            }
            ']' if in_class => {
                in_class = false;
                quoted.push(c);
            }
            '{' | '}' if !in_class => {
                quoted.push('[');
                quoted.push(c);
                quoted.push(']');
            }
            _ => quoted.push(c),
        }
    }
    quoted
}

struct Frame<'a> {
    children: ChildIter<'a, String, PurposeNode>,
    /// Index of the pattern token this level is matched against.
    depth: usize,
    pass: bool,
    prefix: String,
}

/// Iterator returned by [`PurposeTree::search`](super::PurposeTree::search).
///
/// Walks the tree depth first; a node's bucket is produced before its
/// descendants. Nothing is computed until the iterator is advanced.
pub struct PurposeMatches<'a> {
    tokens: Vec<String>,
    matchers: Vec<TokenMatcher>,
    include_ancestors: bool,
    stack: Vec<Frame<'a>>,
    pending: Option<(String, std::slice::Iter<'a, String>)>,
}

impl<'a> PurposeMatches<'a> {
    pub(crate) fn new(root: &'a PurposeNode, tokens: Vec<String>, include_ancestors: bool) -> Self {
        let matchers = tokens.iter().map(|t| TokenMatcher::compile(t)).collect();
        let stack = vec![Frame {
            children: root.children.iter(),
            depth: 0,
            pass: false,
            prefix: String::new(),
        }];
        Self {
            tokens,
            matchers,
            include_ancestors,
            stack,
            pending: None,
        }
    }

    /// Whether a node matched at `depth` is a terminal match.
    fn is_terminal(&self, depth: usize) -> bool {
        match self.tokens.get(depth + 1..) {
            None | Some([]) => true,
            Some([last]) => last.is_empty(),
            Some(_) => false,
        }
    }
}

impl<'a> Iterator for PurposeMatches<'a> {
    type Item = PurposeMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((path, names)) = &mut self.pending {
                if let Some(name) = names.next() {
                    return Some(PurposeMatch {
                        path: path.clone(),
                        name,
                    });
                }
                self.pending = None;
            }

            let frame = self.stack.last_mut()?;
            let Some((name, child)) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            if name == BUCKET_KEY {
                continue;
            }

            let depth = frame.depth;
            let pass = frame.pass;
            let matcher = self.matchers.get(depth);
            let matched = pass || matcher.map_or(true, |m| m.is_match(name));
            if !matched {
                continue;
            }

            let path = if frame.prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", frame.prefix, name)
            };

            if self.include_ancestors || self.is_terminal(depth) {
                self.pending = Some((path.clone(), child.bucket.iter()));
            }

            // Pass-through continues below an empty token and below the end
            // of a recursive pattern.
            let next_pass = matcher.map_or(true, |m| matches!(m, TokenMatcher::Any));
            if next_pass || depth + 1 < self.tokens.len() {
                self.stack.push(Frame {
                    children: child.children.iter(),
                    depth: depth + 1,
                    pass: next_pass,
                    prefix: path,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::purpose::PurposeTree;
    use super::quote_braces;

    fn sample() -> PurposeTree {
        let mut tree = PurposeTree::new();
        tree.register("PURPOSE1", "p1");
        tree.register("PURPOSE1.CHILD_A", "a");
        tree.register("PURPOSE1.CHILD_B", "b");
        tree.register("PURPOSE1.CHILD_A.TEST", "a-test");
        tree.register("PURPOSE1.CHILD_B.TEST", "b-test");
        tree.register("PURPOSE1.CHILD_B.DEEP.LEAF", "leaf");
        tree.register("OTHER", "other");
        tree
    }

    fn names(tree: &PurposeTree, pattern: &str, include_ancestors: bool) -> Vec<String> {
        tree.search(pattern, include_ancestors)
            .map(|m| m.name.to_string())
            .collect()
    }

    #[test]
    fn test_exact_pattern_yields_terminal_bucket() {
        let tree = sample();
        assert_eq!(names(&tree, "PURPOSE1", false), vec!["p1"]);
        assert_eq!(names(&tree, "purpose1.child_a", false), vec!["a"]);
    }

    #[test]
    fn test_glob_selects_direct_children_only() {
        let tree = sample();
        assert_eq!(names(&tree, "PURPOSE1.*", false), vec!["a", "b"]);
        assert_eq!(names(&tree, "PURPOSE1.*.TEST", false), vec!["a-test", "b-test"]);
        assert_eq!(names(&tree, "PURPOSE1.CHILD_?", false), vec!["a", "b"]);
    }

    #[test]
    fn test_braces_are_literal() {
        let mut tree = PurposeTree::new();
        tree.register("ABC", "plain");
        tree.register("{ABC,Z}X", "braced");
        tree.register("Z", "other");
        assert_eq!(names(&tree, "{ABC,Z}*", false), vec!["braced"]);
        assert_eq!(names(&tree, "[{]ABC*", false), vec!["braced"]);
        assert_eq!(names(&tree, "[!{]*", false), vec!["plain", "other"]);
        assert_eq!(quote_braces("{A,B}[{}]*"), "[{]A,B[}][{}]*");
    }

    #[test]
    fn test_trailing_dot_is_recursive() {
        let tree = sample();
        assert_eq!(
            names(&tree, "PURPOSE1.", false),
            vec!["p1", "a", "a-test", "b", "b-test", "leaf"]
        );
    }

    #[test]
    fn test_include_ancestors_adds_path_buckets() {
        let tree = sample();
        assert_eq!(names(&tree, "PURPOSE1.CHILD_A.TEST", false), vec!["a-test"]);
        assert_eq!(
            names(&tree, "PURPOSE1.CHILD_A.TEST", true),
            vec!["p1", "a", "a-test"]
        );
    }

    #[test]
    fn test_include_ancestors_is_superset() {
        let tree = sample();
        for pattern in ["PURPOSE1", "PURPOSE1.*", "PURPOSE1.", "*.CHILD_B.DEEP", "OTHER"] {
            let plain = names(&tree, pattern, false);
            let with_parents = names(&tree, pattern, true);
            for name in &plain {
                assert!(with_parents.contains(name), "{} missing for {}", name, pattern);
            }
        }
    }

    #[test]
    fn test_resolved_paths() {
        let tree = sample();
        let hits: Vec<(String, String)> = tree
            .search("PURPOSE1.*.TEST", false)
            .map(|m| (m.path, m.name.to_string()))
            .collect();
        assert_eq!(
            hits,
            vec![
                ("PURPOSE1.CHILD_A.TEST".to_string(), "a-test".to_string()),
                ("PURPOSE1.CHILD_B.TEST".to_string(), "b-test".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_match() {
        let tree = sample();
        assert!(names(&tree, "MISSING", false).is_empty());
        assert!(names(&tree, "PURPOSE1.CHILD_A.TEST.MORE", false).is_empty());
    }

    #[test]
    fn test_registration_order_is_kept() {
        let mut tree = PurposeTree::new();
        tree.register("ACTIONCONTROLLER", "App\\ContactActionController");
        tree.register("ACTIONCONTROLLER", "App\\IndexController");
        assert_eq!(
            names(&tree, "ACTIONCONTROLLER", false),
            vec!["App\\ContactActionController", "App\\IndexController"]
        );
    }

    #[test]
    fn test_search_is_restartable() {
        let tree = sample();
        let mut first = tree.search("PURPOSE1.", false);
        first.next();
        assert_eq!(names(&tree, "PURPOSE1.", false).len(), 6);
    }
}
