//! Title metadata, tickets and title key derivation.
//!
//! Only the handful of fields needed to locate and decrypt content are
//! modeled; see <https://wiiubrew.org/wiki/Title_metadata> and
//! <https://wiiubrew.org/wiki/Ticket> for the full layouts.

pub mod key;
pub mod ticket;
pub mod tmd;

pub use key::{decrypt_title_key, encrypt_title_key};
pub use ticket::Ticket;
pub use tmd::{ContentRecord, TitleMetadata, CONTENT_TYPE_HASHED};
