use crate::auth::config::AuthConfig;

pub mod server;

/// Action parsed from the command line, executed by the binary.
#[derive(Clone, Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: Option<String>,
        config: AuthConfig,
    },
}
