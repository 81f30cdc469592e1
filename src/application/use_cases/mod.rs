pub mod aggregate;
pub mod join_query;
pub mod join_view;
pub mod personnel;
pub mod receipt;
pub mod room_layout;
pub mod table_editor;
pub mod wizard;
