/*
[INPUT]:  Parsed subcommands and the wired client stack
[OUTPUT]: Command output on stdout
[POS]:    CLI command layer
[UPDATE]: When adding subcommands
*/

pub mod auth;
pub mod init;
pub mod read;
