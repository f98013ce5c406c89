pub mod editors;
pub mod health;
pub mod rbac;
