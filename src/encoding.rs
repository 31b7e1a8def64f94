use std::collections::BTreeMap;

use crate::frequency::FrequencyTable;
use crate::tree::Node;

/// Code assigned to the symbol of a tree that is a single leaf.
pub const LONE_LEAF_CODE: &str = "0";

/// Symbol -> code word, as a string of `'0'` and `'1'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingMap {
    codes: BTreeMap<u8, String>,
}

impl EncodingMap {
    /// Walks every root-to-leaf path, appending `0` on each `zero` edge and `1` on each `one` edge.
    pub fn from_tree(root: &Node) -> Self {
        let mut codes = BTreeMap::new();
        if let Node::Leaf(symbol) = root {
            codes.insert(*symbol, LONE_LEAF_CODE.to_string());
            return Self { codes };
        }

        let mut stack = vec![(root, String::new())];
        while let Some((node, path)) = stack.pop() {
            match node {
                Node::Leaf(symbol) => {
                    codes.insert(*symbol, path);
                }
                Node::Internal { zero, one } => {
                    let mut one_path = path.clone();
                    one_path.push('1');
                    stack.push((one, one_path));
                    let mut zero_path = path;
                    zero_path.push('0');
                    stack.push((zero, zero_path));
                }
            }
        }
        Self { codes }
    }

    pub fn get(&self, symbol: u8) -> Option<&str> {
        self.codes.get(&symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> + '_ {
        self.codes.iter().map(|(&s, p)| (s, p.as_str()))
    }

    /// Symbol whose code is exactly `bits`, by scanning every entry.
    pub fn symbol_for(&self, bits: &str) -> Option<u8> {
        self.iter().find(|&(_, code)| code == bits).map(|(s, _)| s)
    }

    /// Bits needed to encode `table`'s content with this map.
    pub fn encoded_bits(&self, table: &FrequencyTable) -> Option<u64> {
        table.iter().try_fold(0u64, |acc, (symbol, count)| {
            self.get(symbol).map(|code| acc + code.len() as u64 * count)
        })
    }
}
