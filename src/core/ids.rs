use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::clock::Clock;
use crate::core::PostId;

// 2024-01-01T00:00:00Z
const EPOCH_MILLIS: i64 = 1_704_067_200_000;
const SEQ_BITS: u32 = 12;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;
const NODE_BITS: u32 = 10;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;

/// snowflake 风格的帖子 id：毫秒时间戳 | 节点号 | 毫秒内序号
///
/// 同一生成器内严格递增；跨节点大致随时间递增。
pub struct IdGenerator {
    node: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<(i64, u64)>,
}

impl IdGenerator {
    pub fn new(node: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            node: node & NODE_MASK,
            clock,
            state: Mutex::new((0, 0)),
        }
    }

    pub fn next_id(&self) -> PostId {
        let mut st = self.state.lock();
        let mut now = (self.clock.now_millis() - EPOCH_MILLIS).max(0);

        // 时钟回拨或同毫秒：沿用上次时间戳，序号递增；序号溢出则借用下一毫秒
        if now <= st.0 {
            now = st.0;
            st.1 += 1;
            if st.1 > SEQ_MASK {
                now += 1;
                st.1 = 0;
            }
        } else {
            st.1 = 0;
        }
        st.0 = now;

        ((now as u64) << (SEQ_BITS + NODE_BITS)) | (self.node << SEQ_BITS) | st.1
    }
}
