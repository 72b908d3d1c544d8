//! 哈希类策略：一致性哈希与源地址哈希
//!
//! 两者都使用 CRC32（IEEE）作为 32 位哈希。

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Algorithm, LoadBalancerStrategy, SelectionContext};
use crate::discovery::ServiceInstance;

/// 每个实例的虚拟节点数
pub const VIRTUAL_NODES: usize = 100;

const VIRTUAL_KEY_SEPARATOR: char = '#';

fn hash_key(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

/// 哈希环：有序的哈希值数组，以及哈希值到实例 ID 的映射
#[derive(Debug, Default)]
struct HashRing {
    hashes: Vec<u32>,
    nodes: HashMap<u32, String>,
}

impl HashRing {
    fn rebuild(&mut self, candidates: &[ServiceInstance], virtual_nodes: usize) {
        self.hashes.clear();
        self.nodes.clear();
        for candidate in candidates {
            for index in 0..virtual_nodes {
                let virtual_key =
                    format!("{}{}{}", candidate.instance_id, VIRTUAL_KEY_SEPARATOR, index);
                let hash = hash_key(&virtual_key);
                self.nodes.insert(hash, candidate.instance_id.clone());
                self.hashes.push(hash);
            }
        }
        self.hashes.sort_unstable();
        self.hashes.dedup();
    }

    /// 顺时针找到第一个 >= 键哈希的节点，越过末尾时回绕到起点
    fn lookup(&self, key: &str) -> Option<&str> {
        if self.hashes.is_empty() {
            return None;
        }
        let hash = hash_key(key);
        let mut index = self.hashes.partition_point(|node| *node < hash);
        if index == self.hashes.len() {
            index = 0;
        }
        self.nodes.get(&self.hashes[index]).map(String::as_str)
    }
}

/// 一致性哈希
///
/// 每次选择都用当前候选全集重建哈希环；重建与查找在同一把写锁内完成。
/// 适用于数百实例以内的规模。
#[derive(Debug)]
pub struct ConsistentHash {
    virtual_nodes: usize,
    ring: RwLock<HashRing>,
}

impl ConsistentHash {
    pub fn new() -> Self {
        Self::with_virtual_nodes(VIRTUAL_NODES)
    }

    pub fn with_virtual_nodes(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            ring: RwLock::new(HashRing::default()),
        }
    }

    /// 最近一次构建的环上节点数
    pub fn ring_len(&self) -> usize {
        self.ring.read().hashes.len()
    }
}

impl Default for ConsistentHash {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancerStrategy for ConsistentHash {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ConsistentHash
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let mut ring = self.ring.write();
        ring.rebuild(candidates, self.virtual_nodes);
        let instance_id = ring.lookup(ctx.routing_key)?;
        candidates
            .iter()
            .find(|candidate| candidate.instance_id == instance_id)
    }
}

/// 源地址哈希：路由键哈希对候选数取模
///
/// 无状态，映射廉价，但成员变化时不保证最小迁移。
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceHash;

impl LoadBalancerStrategy for SourceHash {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SourceHash
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let index = hash_key(ctx.routing_key) as usize % candidates.len();
        candidates.get(index)
    }
}
