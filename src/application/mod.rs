pub mod authorization;
pub mod bootstrap;
pub mod commands;
pub mod coordinator;
pub mod entry_locator;
pub mod settings_admin;
pub mod settings_resolver;

#[cfg(test)]
pub(crate) mod fakes;
