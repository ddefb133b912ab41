use crate::auth::config::{AuthConfig, BootstrapConfig};
use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let config = AuthConfig::new()
        .with_session_ttl_seconds(
            matches
                .get_one::<i64>("session-ttl")
                .copied()
                .unwrap_or(43200),
        )
        .with_reset_ttl_seconds(matches.get_one::<i64>("reset-ttl").copied().unwrap_or(1800))
        .with_revoke_sessions_on_reset(!matches.get_flag("keep-sessions-on-reset"))
        .with_reaper_interval_seconds(
            matches
                .get_one::<u64>("reaper-interval")
                .copied()
                .unwrap_or(60),
        );

    let config = match matches.get_one::<String>("default-org") {
        Some(org) => {
            let admin = matches
                .get_one::<String>("default-admin-user")
                .map_or("admin", String::as_str);
            let email = matches
                .get_one::<String>("default-admin-email")
                .map_or_else(|| format!("{admin}@{org}"), String::to_string);

            let mut bootstrap = BootstrapConfig::new(org.to_string(), admin.to_string(), email);
            if let Some(hash) = matches.get_one::<String>("default-admin-password-hash") {
                bootstrap = bootstrap.with_admin_password_hash(SecretString::from(hash.clone()));
            }
            config.with_bootstrap(bootstrap)
        }
        None => config,
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").map(String::to_string),
        config,
    })
}
