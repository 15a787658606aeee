mod google;

pub use google::{ClientSecrets, DRIVE_READONLY_SCOPE, GoogleProvider};
