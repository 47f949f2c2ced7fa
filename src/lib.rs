#![forbid(unsafe_code)]

//! Emission, sink and offset-pathway calculator for mining operations.
//!
//! The engines ([`engine`], [`pathway`]) are pure constant-factor formulas. A
//! [`session::Session`] owns the mutable state: the current results, the two
//! snapshot histories, and handles to the identity and remote-store seams.

pub mod config;
pub mod engine;
pub mod error;
pub mod guards;
pub mod history;
pub mod pathway;
pub mod report;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod sync;
pub mod view;

pub use config::Config;
pub use engine::{compute_emissions, compute_sink, net_emission, parse_quantity, EmissionBreakdown};
pub use error::{ConfigError, HistoryError, ProfileError, RemoteError, SessionError, StoreError};
pub use history::{FileStorage, History, MemoryStorage, Storage};
pub use pathway::{PathwayInputs, PathwayResult, PathwayResults, Strategy, CREDIT_PRICE};
pub use schema::{Activity, LandCover};
pub use session::{SaveOutcome, Session};
pub use snapshot::{EmissionSnapshot, PathwaySnapshot, Snapshot};
pub use sync::{Identity, InMemoryRemoteStore, LocalIdentity, RemoteStore, Subscription, User};
