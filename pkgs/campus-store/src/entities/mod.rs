//! Sea-ORM entities for campus-store

pub mod documents;

pub use documents::Entity as Documents;
