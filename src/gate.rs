//! Navigation gate.
//!
//! Decides, per navigation, whether a path may be shown for the current
//! session. Nothing is cached between calls.

use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";

/// Where authenticated users land by default.
pub const LANDING_PATH: &str = "/books";

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    Redirect(&'static str),
    NotFound,
}

/// Strip query, fragment and trailing slashes.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Access level of a known route, `None` for unknown paths.
pub fn access(path: &str) -> Option<Access> {
    let segments: Vec<&str> = normalize(path)
        .trim_start_matches('/')
        .split('/')
        .collect();

    match segments.as_slice() {
        ["login"] => Some(Access::Public),
        ["books"] | ["cart"] | ["borrows"] | ["borrows", "history"] | ["reservations"] => {
            Some(Access::Authenticated)
        }
        ["books", id] if !id.is_empty() => Some(Access::Authenticated),
        ["admin", "dashboard"] | ["admin", "borrow-manage"] | ["admin", "copy-manage"] => {
            Some(Access::Admin)
        }
        _ => None,
    }
}

/// Decide what happens when `session` navigates to `path`.
pub fn route_decision(path: &str, session: Option<&Session>) -> RouteDecision {
    let session = session.filter(|s| s.is_valid());

    if normalize(path) == "/" {
        return match session {
            Some(_) => RouteDecision::Redirect(LANDING_PATH),
            None => RouteDecision::RedirectToLogin,
        };
    }

    match (access(path), session) {
        (None, _) => RouteDecision::NotFound,
        (Some(Access::Public), _) => RouteDecision::Allow,
        (Some(_), None) => RouteDecision::RedirectToLogin,
        (Some(Access::Admin), Some(s)) if !s.is_admin() => RouteDecision::Redirect(LANDING_PATH),
        (Some(_), Some(_)) => RouteDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn user() -> Session {
        Session::new("t", "user1", Role::User)
    }

    fn admin() -> Session {
        Session::new("t", "admin", Role::Admin)
    }

    #[test]
    fn test_admin_may_visit_user_pages() {
        assert_eq!(route_decision("/cart", Some(&admin())), RouteDecision::Allow);
        assert_eq!(
            route_decision("/admin/dashboard", Some(&admin())),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_non_admin_goes_to_landing_not_login() {
        assert_eq!(
            route_decision("/admin/copy-manage", Some(&user())),
            RouteDecision::Redirect(LANDING_PATH)
        );
    }

    #[test]
    fn test_protected_without_session() {
        assert_eq!(route_decision("/borrows", None), RouteDecision::RedirectToLogin);
        assert_eq!(
            route_decision("/admin/dashboard", None),
            RouteDecision::RedirectToLogin
        );
        let empty = Session::new("", "user1", Role::User);
        assert_eq!(
            route_decision("/cart", Some(&empty)),
            RouteDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_root_and_login() {
        assert_eq!(route_decision("/", None), RouteDecision::RedirectToLogin);
        assert_eq!(
            route_decision("/", Some(&user())),
            RouteDecision::Redirect(LANDING_PATH)
        );
        assert_eq!(route_decision("/login", None), RouteDecision::Allow);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(
            route_decision("/borrows/history/?page=2", Some(&user())),
            RouteDecision::Allow
        );
        assert_eq!(route_decision("/books/B001", Some(&user())), RouteDecision::Allow);
        assert_eq!(route_decision("/nowhere", Some(&user())), RouteDecision::NotFound);
        assert_eq!(route_decision("/books/B001/edit", None), RouteDecision::NotFound);
    }
}
