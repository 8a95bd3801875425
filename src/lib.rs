pub mod fingerprint;
pub mod panic_handler;
pub mod pdf;
pub mod session;
pub mod settings;

pub mod test_utils;

pub use fingerprint::DocumentFingerprint;
pub use session::ReaderSession;
pub use settings::{Settings, SettingsError, SettingsStore};
