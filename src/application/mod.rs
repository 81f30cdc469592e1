pub mod use_cases;

pub use use_cases::aggregate::AggregateUseCase;
pub use use_cases::join_view::JoinViewUseCase;
pub use use_cases::personnel::PersonnelUseCase;
pub use use_cases::receipt::ReceiptUseCase;
pub use use_cases::room_layout::RoomLayoutUseCase;
pub use use_cases::table_editor::TableEditorUseCase;
pub use use_cases::wizard::WizardUseCase;
