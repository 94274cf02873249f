use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::application::auth::Principal;

use super::HttpState;

/// Authenticated caller. Anonymous requests are redirected to the login URL.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

/// Caller identity for routes that serve everyone.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Principal>);

/// `303 See Other` to `{login_url}?next={path}`.
pub fn login_redirect(login_url: &str, next: &str) -> Redirect {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{login_url}{separator}next={next}"))
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) => Ok(Self(principal.clone())),
            None => Err(login_redirect(&state.login_url, parts.uri.path()).into_response()),
        }
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header::LOCATION};

    use super::*;

    #[test]
    fn login_redirect_carries_next_path() {
        let response = login_redirect("/auth/login/", "/follow").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/auth/login/?next=/follow")
        );
    }

    #[test]
    fn login_redirect_appends_to_existing_query() {
        let response = login_redirect("/login?lang=en", "/create").into_response();
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/login?lang=en&next=/create")
        );
    }
}
