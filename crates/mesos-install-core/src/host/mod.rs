//! Host collaborators: external commands and downloads.

pub mod command;
pub mod download;

pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use download::{Downloader, HttpDownloader};
