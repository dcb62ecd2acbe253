//! Wallet authentication: address handling, signature recovery, the
//! challenge-response protocol and session management.

pub mod address;
pub mod middleware;
pub mod protocol;
pub mod session;
pub mod verify;

pub use address::Address;
pub use middleware::{AppState, AuthSession};
pub use protocol::{AuthError, AuthErrorKind, AuthProtocol, AuthResult};
pub use verify::{PersonalSignVerifier, SignatureVerifier};
