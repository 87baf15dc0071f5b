mod settings;

pub use settings::{ClientSettings, RetrySettings, ServerSettings, Settings, TransportSettings};
