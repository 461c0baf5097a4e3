use crate::error::Error;
use crate::transport::TransportOptions;

pub const DEFAULT_PATH: &str = "/etc/mandrill/transport.toml";
const ENV_PREFIX: &str = "MANDRILL";

/// Loads transport options from a TOML file and merges them with any
/// environment variables prefixed with MANDRILL_ (e.g.
/// `MANDRILL_API_KEY`). Environment variables win.
///
/// Recognized keys: `api_key`, `sender_mail`, `sender_name`.
///
/// This is a convenience for binaries; library consumers can build
/// `TransportOptions` directly instead.
pub fn load_options(path: Option<&str>) -> Result<TransportOptions, Error> {
    let mut settings = config::Config::default();

    if let Some(path) = path {
        settings.merge(config::File::with_name(path))?;
    }

    settings.merge(config::Environment::with_prefix(ENV_PREFIX))?;

    let options = settings.try_into::<TransportOptions>()?;
    Ok(options)
}
