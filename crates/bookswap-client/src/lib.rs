//! Client side of bookswap: the session a user carries between runs, a typed
//! REST client, the polling loops that keep notifications and chat fresh, and
//! the view models a UI renders.

pub mod api;
pub mod error;
pub mod forms;
pub mod poll;
pub mod session;
pub mod views;

pub use api::ApiClient;
pub use error::ClientError;
pub use session::{Session, SessionStore};
