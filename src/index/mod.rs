pub mod community;
pub mod ledger;
pub mod ordered;
pub mod store;

pub use community::{CachedView, CommunityIndex};
pub use ledger::{PostVotes, VoteLedger};
pub use ordered::OrderedIndex;
pub use store::{RankingSnapshot, RankingStore, VoteApplied, VoteContext};
