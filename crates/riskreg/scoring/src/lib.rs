//! Net risk score aggregation.
//!
//! Everything here is a pure function of register state: a row, the
//! links that point at it and the hub controls those links reference.
//! Drafts and pending changes are never read.
//!
//! ```text
//!   rows ─┐
//!   links ┼─► LinkIndex (rowId → links, O(R+L)) ─► aggregate(row) ─► RowScore
//!   hub  ─┘                                        │
//!                                 ScoreCache ◄─────┘ (rowId, inputs-hash)
//! ```

#![deny(unsafe_code)]

mod aggregate;
mod cache;
mod effective;
mod index;

pub use aggregate::{aggregate, score_rows, AppetiteStatus, RowScore};
pub use cache::{inputs_hash, InputsHash, ScoreCache};
pub use effective::{effective_controls, ControlSource, EffectiveControl};
pub use index::LinkIndex;
