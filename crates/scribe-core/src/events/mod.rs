//! Event plumbing shared by the store and the controller.
//!
//! Two kinds of events travel over one broadcast channel:
//!
//! - [`ChangeEvent`]: an object was written or removed; the controller
//!   consumes these as its change-notification source
//! - [`DiagnosticEvent`]: a human-facing event attached to an object, such as
//!   an `AnnotationValidationFailure` warning
//!
//! # Module Structure
//!
//! - [`types`]: event type definitions
//! - [`broadcaster`]: the broadcast channel wrapper
//! - [`recorder`]: the `EventRecorder` collaborator trait

pub mod broadcaster;
pub mod recorder;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use recorder::EventRecorder;
pub use types::{ChangeEvent, ChangeType, DiagnosticEvent, EventType, SystemEvent};
