/*
    PlatterDB
    https://github.com/dbalsom/platterdb

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    The in-memory primary-key index: a height-balanced (AVL) binary search
    tree mapping key values to the physical address of a record's first
    fragment. Keys are unique; re-inserting an existing key overwrites the
    stored address in place. Freeing a record clears the node's address
    (a tombstone) rather than restructuring the tree; a later insert of the
    same key revives the node.
*/

use std::cmp::Ordering;
use std::fmt::Display;

use crate::record::Value;
use crate::sector_manager::RecordAddress;
use crate::StoreError;

/// A primary-key value. All keys in one table share a variant, determined by
/// the primary-key field's declared type. Decimal keys order by
/// `f64::total_cmp`.
#[derive(Clone, Debug)]
pub enum IndexKey {
    Int(i64),
    Dec(f64),
    Str(String),
}

impl Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKey::Int(v) => write!(f, "{}", v),
            IndexKey::Dec(v) => write!(f, "{}", v),
            IndexKey::Str(v) => write!(f, "{}", v),
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Dec(a), IndexKey::Dec(b)) => a.total_cmp(b),
            (IndexKey::Str(a), IndexKey::Str(b)) => a.cmp(b),
            // Mixed variants never occur within one table; order by tag so
            // Ord stays total anyway.
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl IndexKey {
    fn rank(&self) -> u8 {
        match self {
            IndexKey::Int(_) => 0,
            IndexKey::Dec(_) => 1,
            IndexKey::Str(_) => 2,
        }
    }
}

impl TryFrom<&Value> for IndexKey {
    type Error = StoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::TinyInt(v) => Ok(IndexKey::Int(*v as i64)),
            Value::SmallInt(v) => Ok(IndexKey::Int(*v as i64)),
            Value::Int(v) => Ok(IndexKey::Int(*v as i64)),
            Value::BigInt(v) => Ok(IndexKey::Int(*v)),
            Value::Float(v) => Ok(IndexKey::Dec(*v as f64)),
            Value::Double(v) => Ok(IndexKey::Dec(*v)),
            Value::Text(v) => Ok(IndexKey::Str(v.clone())),
            Value::Null | Value::Bool(_) => Err(StoreError::ParameterError(format!(
                "value '{}' cannot be used as an index key",
                value
            ))),
        }
    }
}

struct Node {
    key: IndexKey,
    addr: Option<RecordAddress>,
    height: i32,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn new(key: IndexKey, addr: RecordAddress) -> Node {
        Node {
            key,
            addr: Some(addr),
            height: 1,
            left: None,
            right: None,
        }
    }
}

/// A height-balanced primary-key index.
#[derive(Default)]
pub struct RecordIndex {
    root: Option<Box<Node>>,
    live: usize,
}

impl RecordIndex {
    pub fn new() -> RecordIndex {
        RecordIndex { root: None, live: 0 }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a key, or overwrite the address of an existing node in place.
    pub fn insert(&mut self, key: IndexKey, addr: RecordAddress) {
        self.root = Some(Self::insert_node(self.root.take(), key, addr, &mut self.live));
    }

    /// Find the address stored for a key. Tombstoned and absent keys both
    /// return None.
    pub fn search(&self, key: &IndexKey) -> Option<RecordAddress> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Equal => return node.addr,
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
            }
        }
        None
    }

    /// Tombstone a key, returning the address it held.
    pub fn remove(&mut self, key: &IndexKey) -> Option<RecordAddress> {
        let mut current = self.root.as_deref_mut();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Equal => {
                    let addr = node.addr.take();
                    if addr.is_some() {
                        self.live -= 1;
                    }
                    return addr;
                }
                Ordering::Less => current = node.left.as_deref_mut(),
                Ordering::Greater => current = node.right.as_deref_mut(),
            }
        }
        None
    }

    /// Collect the live entries in ascending key order.
    pub fn in_order(&self) -> Vec<(&IndexKey, RecordAddress)> {
        let mut entries = Vec::with_capacity(self.live);
        Self::collect_in_order(self.root.as_deref(), &mut entries);
        entries
    }

    fn collect_in_order<'a>(node: Option<&'a Node>, entries: &mut Vec<(&'a IndexKey, RecordAddress)>) {
        if let Some(node) = node {
            Self::collect_in_order(node.left.as_deref(), entries);
            if let Some(addr) = node.addr {
                entries.push((&node.key, addr));
            }
            Self::collect_in_order(node.right.as_deref(), entries);
        }
    }

    fn height(node: &Option<Box<Node>>) -> i32 {
        node.as_ref().map(|n| n.height).unwrap_or(0)
    }

    fn update_height(node: &mut Node) {
        node.height = 1 + std::cmp::max(Self::height(&node.left), Self::height(&node.right));
    }

    fn balance_factor(node: &Node) -> i32 {
        Self::height(&node.left) - Self::height(&node.right)
    }

    fn insert_node(node: Option<Box<Node>>, key: IndexKey, addr: RecordAddress, live: &mut usize) -> Box<Node> {
        let mut node = match node {
            None => {
                *live += 1;
                return Box::new(Node::new(key, addr));
            }
            Some(node) => node,
        };

        match key.cmp(&node.key) {
            Ordering::Less => {
                node.left = Some(Self::insert_node(node.left.take(), key, addr, live));
            }
            Ordering::Greater => {
                node.right = Some(Self::insert_node(node.right.take(), key, addr, live));
            }
            Ordering::Equal => {
                // Duplicate key: overwrite the stored address, no new node.
                if node.addr.is_none() {
                    *live += 1;
                }
                node.addr = Some(addr);
                return node;
            }
        }

        Self::rebalance(node)
    }

    fn rebalance(mut node: Box<Node>) -> Box<Node> {
        Self::update_height(&mut node);
        let bf = Self::balance_factor(&node);

        if bf > 1 {
            // Left-Right: rotate the left child left first.
            if node.left.as_deref().map(Self::balance_factor).unwrap_or(0) < 0 {
                node.left = node.left.take().map(Self::rotate_left);
            }
            return Self::rotate_right(node);
        }
        if bf < -1 {
            // Right-Left: rotate the right child right first.
            if node.right.as_deref().map(Self::balance_factor).unwrap_or(0) > 0 {
                node.right = node.right.take().map(Self::rotate_right);
            }
            return Self::rotate_left(node);
        }

        node
    }

    fn rotate_right(mut y: Box<Node>) -> Box<Node> {
        match y.left.take() {
            Some(mut x) => {
                y.left = x.right.take();
                Self::update_height(&mut y);
                x.right = Some(y);
                Self::update_height(&mut x);
                x
            }
            None => y,
        }
    }

    fn rotate_left(mut x: Box<Node>) -> Box<Node> {
        match x.right.take() {
            Some(mut y) => {
                x.right = y.left.take();
                Self::update_height(&mut x);
                y.left = Some(x);
                Self::update_height(&mut y);
                y
            }
            None => x,
        }
    }

    #[cfg(test)]
    fn root_key(&self) -> Option<&IndexKey> {
        self.root.as_deref().map(|n| &n.key)
    }

    #[cfg(test)]
    fn assert_balanced(&self) {
        fn check(node: Option<&Node>) -> i32 {
            match node {
                None => 0,
                Some(node) => {
                    let lh = check(node.left.as_deref());
                    let rh = check(node.right.as_deref());
                    assert!((lh - rh).abs() <= 1, "unbalanced at key {}", node.key);
                    if let Some(left) = node.left.as_deref() {
                        assert!(left.key < node.key);
                    }
                    if let Some(right) = node.right.as_deref() {
                        assert!(right.key > node.key);
                    }
                    1 + lh.max(rh)
                }
            }
        }
        check(self.root.as_deref());
    }
}
