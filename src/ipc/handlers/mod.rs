pub mod archives;
pub mod core;
pub mod import;
pub mod participants;
pub mod settings;
