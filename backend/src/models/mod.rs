//! Domain models shared by the stores, services and HTTP layer.

pub mod category;
pub mod question;
pub mod refresh_token;
pub mod role;
pub mod session;
pub mod user;

pub use category::Category;
pub use question::{Grade, Question};
pub use refresh_token::RefreshToken;
pub use role::{Permission, Role};
pub use session::{Session, SessionQuestion, SessionStatus};
pub use user::User;
