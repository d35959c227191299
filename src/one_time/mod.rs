//! Store-backed one-time exchange tokens.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`KeyValueStore`] | Backend abstraction (`set`/`get`/`delete`/`take`) |
//! | [`InMemoryKeyValueStore`] | Process-local store, atomic `take` |
//! | [`FileKeyValueStore`] | Directory of JSON records, atomic `take` via rename |
//! | [`OneTimeTokenStore`] | Issues ids and consumes them once |

mod file_store;
mod memory_store;
#[cfg(any(test, feature = "mocks"))]
mod mock;
mod store;
mod token;

pub use file_store::FileKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
#[cfg(any(test, feature = "mocks"))]
pub use mock::MockKeyValueStore;
pub use store::KeyValueStore;
pub use token::{ConsumeResult, MAX_ID_LENGTH, OneTimeToken, OneTimeTokenStore};
