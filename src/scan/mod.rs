//! The scan-and-redeem pipeline
//!
//! ```text
//! ScanSource ──DecoderEvent──▶ ScanController ──▶ PayloadCodec ──▶ RedemptionGuard ──▶ RecordStore
//!                                    │
//!                                    └──▶ SessionState (watch) / MetricsRegistry
//! ```

mod codec;
mod controller;
mod guard;
mod source;

pub use codec::*;
pub use controller::*;
pub use guard::*;
pub use source::*;
