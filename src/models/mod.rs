pub mod session;
pub mod user;

pub use session::{Session, TokenPair, TokenPurpose};
pub use user::{NewUser, User};
