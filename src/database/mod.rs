pub mod init;
pub mod migrations;
