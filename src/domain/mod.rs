pub mod error;
pub mod join_view;
pub mod personnel;
pub mod receipt;
pub mod record;
pub mod room_layout;
pub mod schema;
pub mod wizard;
