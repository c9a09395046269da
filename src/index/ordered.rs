use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::core::{PostId, RankKey};

#[derive(Debug, Default)]
struct OrderedInner {
    keys: HashMap<PostId, RankKey>,
    /// (key, id) 升序；倒序遍历即"高分/最新在前"，同分按 id 倒序
    order: BTreeSet<(RankKey, PostId)>,
}

/// 全局有序索引（时间 / 分数）：post id → 排序键
///
/// ## 契约
/// - 所有方法都是原子的（单次持锁完成），不向调用方暴露"先读后写"的接口。
/// - `adjust` 在索引内部基于当前存储值累加，不接受调用方传入的旧值。
#[derive(Debug, Default)]
pub struct OrderedIndex {
    inner: RwLock<OrderedInner>,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖
    pub fn insert(&self, id: PostId, key: f64) {
        let mut g = self.inner.write();
        let key = RankKey(key);
        if let Some(old) = g.keys.insert(id, key) {
            g.order.remove(&(old, id));
        }
        g.order.insert((key, id));
    }

    pub fn get_key(&self, id: PostId) -> Option<f64> {
        self.inner.read().keys.get(&id).map(|k| k.0)
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.inner.read().keys.contains_key(&id)
    }

    /// 原子累加：返回新值；id 不存在时返回 None 且不产生任何修改
    pub fn adjust(&self, id: PostId, delta: f64) -> Option<f64> {
        let mut g = self.inner.write();
        let old = *g.keys.get(&id)?;
        let new = RankKey(old.0 + delta);
        g.order.remove(&(old, id));
        g.order.insert((new, id));
        g.keys.insert(id, new);
        Some(new.0)
    }

    /// 按排名倒序取 [offset, offset+count)
    pub fn range_desc(&self, offset: usize, count: usize) -> Vec<PostId> {
        let g = self.inner.read();
        g.order
            .iter()
            .rev()
            .skip(offset)
            .take(count)
            .map(|(_, id)| *id)
            .collect()
    }

    /// 批量取键（社区视图重建用）：单次读锁内完成，缺失的 id 被跳过
    pub fn keys_of(&self, ids: impl IntoIterator<Item = PostId>) -> Vec<(PostId, f64)> {
        let g = self.inner.read();
        ids.into_iter()
            .filter_map(|id| g.keys.get(&id).map(|k| (id, k.0)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<(PostId, f64)> {
        self.inner
            .read()
            .keys
            .iter()
            .map(|(id, k)| (*id, k.0))
            .collect()
    }

    /// 整体替换（checkpoint 恢复）
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (PostId, f64)>) {
        let mut keys = HashMap::new();
        let mut order = BTreeSet::new();
        for (id, key) in entries {
            let key = RankKey(key);
            if let Some(old) = keys.insert(id, key) {
                order.remove(&(old, id));
            }
            order.insert((key, id));
        }
        *self.inner.write() = OrderedInner { keys, order };
    }
}
