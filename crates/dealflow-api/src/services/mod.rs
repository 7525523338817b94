// Services layer for business logic
// Services own the session registry and the collaborators shared by all sessions

pub mod session;

pub use session::{Collaborators, SessionService};
