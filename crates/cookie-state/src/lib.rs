//! Client-side request state carried entirely in cookies
//!
//! Nothing in this crate keeps server-side state. Every value round-trips
//! through the browser:
//!
//! - `codec` signs (HMAC-SHA256) and optionally encrypts (AES-256-GCM) a
//!   serializable value into an opaque cookie value. Tampering is detected on
//!   decode.
//! - `session` is the typed authorization state stored through the codec.
//! - `flash` is a one-shot message queue. Reading it clears the cookie on the
//!   same response.

pub mod codec;
mod cookies;
pub mod error;
pub mod flash;
pub mod session;

pub use codec::CookieCodec;
pub use cookies::CookieOptions;
pub use error::{CodecError, FlashError};
pub use flash::{Flash, Level};
pub use session::{SessionCredentials, SessionState};
