pub mod add;
pub mod check;
pub mod context;
pub mod delete;
pub mod init;
pub mod list;
pub mod search;
pub mod show;
pub mod update;
