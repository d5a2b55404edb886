pub const FULL: &str = concat!(env!("CARGO_PKG_VERSION"), "+git.", env!("NOTESWEEP_GIT_SHA"));
