use std::str::FromStr;

/// Errors raised while reading configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Whether a decided application may be moved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Only the review edges are allowed; `accepted` and `rejected` are final.
    #[default]
    Strict,
    /// Any status may be set at any time.
    Permissive,
}

impl FromStr for TransitionPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(TransitionPolicy::Strict),
            "permissive" => Ok(TransitionPolicy::Permissive),
            _ => Err(()),
        }
    }
}

/// What happens to applications when their internship is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Applications are deleted with the internship.
    #[default]
    Cascade,
    /// Deletion is refused while applications exist.
    Block,
}

impl FromStr for DeletionPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(DeletionPolicy::Cascade),
            "block" => Ok(DeletionPolicy::Block),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    /// Session lifetime in seconds, for both the JWT and its cookie.
    pub jwt_maxage: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecyclePolicy {
    pub transitions: TransitionPolicy,
    pub internship_deletion: DeletionPolicy,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub upload_dir: String,
    pub auth: AuthSettings,
    pub lifecycle: LifecyclePolicy,
    pub smtp: Option<SmtpSettings>,
}

const DEFAULT_JWT_MAXAGE: i64 = 7 * 24 * 60 * 60;

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_maxage: i64 = match lookup("JWT_MAXAGE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "JWT_MAXAGE",
                value,
            })?,
            None => DEFAULT_JWT_MAXAGE,
        };
        if jwt_maxage <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_MAXAGE",
                value: jwt_maxage.to_string(),
            });
        }
        let port: u16 = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => 5000,
        };
        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "COOKIE_SECURE",
                value,
            })?,
            None => false,
        };

        let transitions = match lookup("APPLICATION_TRANSITIONS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "APPLICATION_TRANSITIONS",
                value,
            })?,
            None => TransitionPolicy::default(),
        };
        let internship_deletion = match lookup("INTERNSHIP_DELETE_POLICY") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "INTERNSHIP_DELETE_POLICY",
                value,
            })?,
            None => DeletionPolicy::default(),
        };

        let smtp = match lookup("SMTP_SERVER") {
            Some(server) => {
                let port = match lookup("SMTP_PORT") {
                    Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                        key: "SMTP_PORT",
                        value,
                    })?,
                    None => 587,
                };
                Some(SmtpSettings {
                    server,
                    port,
                    username: required("SMTP_USERNAME")?,
                    password: required("SMTP_PASSWORD")?,
                })
            }
            None => None,
        };

        Ok(Config {
            database_url,
            port,
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            auth: AuthSettings {
                jwt_secret,
                jwt_maxage,
                cookie_secure,
            },
            lifecycle: LifecyclePolicy {
                transitions,
                internship_deletion,
            },
            smtp,
        })
    }
}
