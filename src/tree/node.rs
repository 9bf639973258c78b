//! Generic ownership tree used for all three snapshots

/// A node owning one item and an ordered list of child subtrees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTree<T> {
    pub item: T,
    pub children: Vec<ObjectTree<T>>,
}

impl<T> ObjectTree<T> {
    /// Create a childless node
    pub fn leaf(item: T) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    pub fn with_children(item: T, children: Vec<ObjectTree<T>>) -> Self {
        Self { item, children }
    }

    /// Number of nodes in this subtree, including the root
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ObjectTree::len).sum::<usize>()
    }

    /// A tree always holds at least its root item
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Visit the items in pre-order
    pub fn iter(&self) -> PreOrder<'_, T> {
        PreOrder { stack: vec![self] }
    }

    /// Flatten into a list of references, parents before their children
    pub fn to_list(&self) -> Vec<&T> {
        self.iter().collect()
    }

    /// Flatten by value, parents before their children
    pub fn into_list(self) -> Vec<T> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.item);
            stack.extend(node.children.into_iter().rev());
        }
        out
    }

    /// Map every item, preserving the shape of the tree
    pub fn map<U>(self, f: &mut impl FnMut(T) -> U) -> ObjectTree<U> {
        let item = f(self.item);
        let children = self.children.into_iter().map(|c| c.map(f)).collect();
        ObjectTree { item, children }
    }
}

/// Pre-order iterator over an [`ObjectTree`]
pub struct PreOrder<'a, T> {
    stack: Vec<&'a ObjectTree<T>>,
}

impl<'a, T> Iterator for PreOrder<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(&node.item)
    }
}
