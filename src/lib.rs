//! Storage substrate for an educational relational database: a
//! latch-coordinated buffer pool over an asynchronous disk scheduler,
//! LRU-K eviction, scoped page guards, and a persistent trie for
//! experimental upper layers.

pub mod buffer;
pub mod container;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod tests;
