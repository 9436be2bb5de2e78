//! Read access to the message archive written by the bot.
//!
//! - **`timestamps`**: the [`TimestampSource`] seam used by the calendar
//!   index, plus its PostgreSQL implementation
//! - **`messages`**: chat and message listings for the archive routes
//! - **`users`**: user listing and lookup by `@username` or by name
//!
//! All queries bind their inputs as parameters.

pub mod error;
pub mod messages;
mod rows;
pub mod timestamps;
pub mod users;

pub use error::StoreError;
pub use messages::MessageStore;
pub use timestamps::{PgTimestampSource, TimestampSource};
pub use users::UserQuery;
