use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// Routes `log` output to `path` so it never draws over the terminal UI.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_file_logger(path: &Path) -> io::Result<()> {
    let file = open_log_file(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(io::Error::other)
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
