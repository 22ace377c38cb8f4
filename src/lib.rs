pub mod config;
pub mod dotconfig;
pub mod expr;
pub mod lexer;
pub mod tristate;

pub type KconfitResult<T> = anyhow::Result<T>;
