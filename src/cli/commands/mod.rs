//! One module per subcommand.

pub mod aes;
pub mod delete;
pub mod export;
pub mod file;
pub mod import_cmd;
pub mod rsa;
