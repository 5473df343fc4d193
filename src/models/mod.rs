pub mod profile;
pub mod task;
pub mod user;

pub use profile::UserProfile;
pub use task::{Task, TaskCategory, TaskFields, TaskPayload, TaskStatus};
pub use user::{NewUser, PublicUser, User};
