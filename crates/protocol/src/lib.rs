//! Wire shapes for the resumable upload service.
//!
//! Every service reply is wrapped in a `{"response": {...}}` envelope (see
//! [`envelope`]). The engine talks to four endpoints: `check`, `instant`,
//! `resumable` (one unit per request) and `poll_upload`; their request and
//! response types live in [`messages`].
//!
//! The service is loose about JSON types: counters and result codes arrive
//! as decimal strings or integers, flags as `"yes"`/`"no"`. The helpers in
//! [`types`] absorb those differences.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::{ApiError, parse_response};
pub use messages::{
    Bitmap, CheckRequest, CheckResponse, DoUpload, InstantRequest, InstantResponse, PollRequest,
    PollResponse, ResumableUpload, UnitUploadRequest, UnitUploadResponse,
};
pub use types::{DuplicateAction, NumberOrString, UnknownAction};
