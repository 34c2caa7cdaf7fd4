//! Sea-ORM entities for campus-auth

pub mod accounts;
pub mod password_resets;

pub use accounts::Entity as Accounts;
pub use password_resets::Entity as PasswordResets;
