mod paths;

pub use paths::{AppPaths, AppPathsError, downloads_dir};
