//! Stream registry and fan-out
//!
//! The registry tracks every live upstream source and the viewers attached
//! to it. Each stream owns one upstream session task; each viewer owns a
//! bounded queue that the session task fills through [`StreamRegistry::broadcast`].
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry<C>>
//!                 ┌──────────────────────────────┐
//!                 │ RwLock<HashMap<Key,          │
//!                 │   StreamEntry {              │
//!                 │     codecs, ready_tx,        │
//!                 │     viewers: {id -> mpsc::Tx}│
//!                 │     control: oneshot::Tx,    │
//!                 │   }                          │
//!                 │ >>                           │
//!                 └──────────────┬───────────────┘
//!                                │
//!      ┌─────────────────────────┼─────────────────────────┐
//!      │                         │                         │
//!      ▼                         ▼                         ▼
//! [SessionManager]         [ViewerPipeline]         [ViewerPipeline]
//!  read_unit()               rx.recv()                 rx.recv()
//!      │                         │                         │
//!      └──► registry.broadcast() ──► try_send() ──► SampleSink
//! ```
//!
//! # Lossy Fan-Out
//!
//! Delivery uses `try_send`: a viewer whose queue is full misses units
//! rather than stalling the upstream read loop. Pipelines resynchronise on
//! the next keyframe. Payloads are `bytes::Bytes`, so every viewer shares
//! one allocation per unit.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod id;
pub mod store;

pub use config::RegistryConfig;
pub use entry::StreamStats;
pub use error::RegistryError;
pub use frame::{MediaUnit, StreamKey, VIDEO_STREAM_INDEX};
pub use id::ViewerId;
pub use store::StreamRegistry;
