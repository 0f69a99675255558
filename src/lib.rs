//! Cross-device synchronization engine
//!
//! Provides:
//! - Per-device sync sessions with scoped credentials
//! - Push/pull/merge operations with integrity verification
//! - Field-level conflict detection and resolution
//! - Per-user monotonic version counters
//! - Opportunistic field-level confidentiality wrapping
//!
//! # Sync Flow
//!
//! 1. A device opens a session (`initialize_session`) and receives a
//!    scoped credential
//! 2. The device starts an operation (`start_sync`) for one data type
//! 3. The device submits a data packet (`process_sync`); the engine
//!    verifies its checksum, detects conflicts against the supplied
//!    snapshot, and auto-resolves what it can
//! 4. On success the user's version counter advances by exactly 1;
//!    otherwise the unresolved conflicts come back for manual
//!    resolution (`resolve_conflict`) and the packet is resubmitted
//!
//! # Conflict Resolution
//!
//! - Later timestamp wins for timestamp-like fields
//! - Non-null wins over null
//! - Everything else requires manual resolution
//!
//! All state is in-memory and owned by a `SyncEngine` instance; the
//! token service behind session credentials and field wrapping is
//! injected via the `TokenService` trait.

pub mod confidential;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod integrity;
pub mod session;
pub mod token;
pub mod types;
pub mod version;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use token::{IssuedToken, TokenClaims, TokenError, TokenService};
pub use types::{
    ConflictResolution, EncryptedPayload, OperationKind, OperationStatus, SessionGrant,
    SessionStatus, SyncConflict, SyncDataPacket, SyncOperation, SyncReport, SyncSession,
    SyncStatusReport,
};
