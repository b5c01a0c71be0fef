/// Builder of trees whose nodes are created from `(node, children)` pairs.
///
/// Used to spell out expected [`crate::rules::OptExpression`]s in rule tests:
///
/// ```
/// use basalt::utils::{RootBuilder, TreeBuilder};
///
/// #[derive(Debug, PartialEq)]
/// struct Tree(&'static str, Vec<Tree>);
///
/// impl From<(&'static str, Vec<Tree>)> for Tree {
///     fn from((node, children): (&'static str, Vec<Tree>)) -> Self {
///         Tree(node, children)
///     }
/// }
///
/// let tree: Tree = RootBuilder::new("project")
///     .begin_node("filter")
///     .leaf("scan")
///     .end_node()
///     .end_node();
/// assert_eq!(Tree("project", vec![Tree("filter", vec![Tree("scan", vec![])])]), tree);
/// ```
pub trait TreeBuilder: Sized {
    type Node;
    type Tree: From<(Self::Node, Vec<Self::Tree>)>;
    type Output;

    /// Opens a child with its own children, closed by [`TreeBuilder::end_node`].
    fn begin_node<K: Into<Self::Node>>(self, node: K) -> NonRootBuilder<Self::Tree, Self::Node, Self> {
        NonRootBuilder {
            parent: self,
            node: node.into(),
            children: Vec::new(),
        }
    }

    fn leaf<K: Into<Self::Node>>(self, node: K) -> Self {
        self.add_child(Self::Tree::from((node.into(), Vec::new())))
    }

    fn end_node(self) -> Self::Output;

    fn add_child(self, tree: Self::Tree) -> Self;
}

pub struct RootBuilder<T, N> {
    node: N,
    children: Vec<T>,
}

impl<T, N> RootBuilder<T, N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }
}

pub struct NonRootBuilder<T, N, P> {
    parent: P,
    node: N,
    children: Vec<T>,
}

impl<T: From<(N, Vec<T>)>, N> TreeBuilder for RootBuilder<T, N> {
    type Node = N;
    type Tree = T;
    type Output = T;

    fn end_node(self) -> T {
        T::from((self.node, self.children))
    }

    fn add_child(mut self, tree: T) -> Self {
        self.children.push(tree);
        self
    }
}

impl<T, N, P> TreeBuilder for NonRootBuilder<T, N, P>
where
    T: From<(N, Vec<T>)>,
    P: TreeBuilder<Node = N, Tree = T>,
{
    type Node = N;
    type Tree = T;
    type Output = P;

    /// Closes this node and returns to its parent.
    fn end_node(self) -> P {
        let tree = T::from((self.node, self.children));
        self.parent.add_child(tree)
    }

    fn add_child(mut self, tree: T) -> Self {
        self.children.push(tree);
        self
    }
}
