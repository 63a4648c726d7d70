//! Navigation decisions after an authentication failure.
//!
//! The client never navigates by itself. It asks the host-supplied
//! [`AuthFailureHandler`] what should happen and attaches the answer to the
//! returned error.

use serde::Serialize;

/// Location prefix of the admin section
const ADMIN_SECTION: &str = "/admin";
const SITE_ROOT: &str = "/";

/// Which credential authenticated the failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialUsed {
    AuthToken,
    AdminToken,
    None,
}

#[derive(Debug, Clone)]
pub struct AuthFailureContext {
    pub status: u16,
    pub credential: CredentialUsed,
    /// Whether a regular auth token is still stored after local cleanup
    pub has_auth_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum NavigationIntent {
    #[default]
    Stay,
    Redirect(String),
}

pub trait AuthFailureHandler: Send + Sync {
    fn on_auth_failure(&self, context: &AuthFailureContext) -> NavigationIntent;
}

type LocationSource = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Redirect policy for admin-token rejections.
///
/// Only acts when the current location is inside the admin section: with an
/// auth token still present the user lacks permissions and goes back to the
/// admin root, otherwise they must log in and go to the site root.
pub struct AdminRedirectPolicy {
    location: LocationSource,
}

impl AdminRedirectPolicy {
    pub fn new(location: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            location: Box::new(location),
        }
    }

    fn in_admin_section(path: &str) -> bool {
        path == ADMIN_SECTION || path.starts_with("/admin/")
    }
}

impl AuthFailureHandler for AdminRedirectPolicy {
    fn on_auth_failure(&self, context: &AuthFailureContext) -> NavigationIntent {
        if context.credential != CredentialUsed::AdminToken {
            return NavigationIntent::Stay;
        }
        match (self.location)() {
            Some(path) if Self::in_admin_section(&path) => {
                if context.has_auth_token {
                    NavigationIntent::Redirect(ADMIN_SECTION.to_string())
                } else {
                    NavigationIntent::Redirect(SITE_ROOT.to_string())
                }
            }
            _ => NavigationIntent::Stay,
        }
    }
}
