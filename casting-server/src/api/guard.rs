use crate::errors::ApiError;
use crate::state::AppState;
use auth_gate::Claims;
use axum::extract::FromRequestParts;
use http::request::Parts;
use std::marker::PhantomData;

/// A permission string an operation requires.
pub(crate) trait Permission: Send + Sync + 'static {
    const NAME: &'static str;
}

macro_rules! permissions {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            pub(crate) struct $ty;

            impl Permission for $ty {
                const NAME: &'static str = $name;
            }
        )*
    };
}

permissions! {
    GetActors => "get:actors",
    PostActors => "post:actors",
    PatchActors => "patch:actors",
    DeleteActors => "delete:actors",
    GetMovies => "get:movies",
    PostMovies => "post:movies",
    PatchMovies => "patch:movies",
    DeleteMovies => "delete:movies",
}

/// Extractor that only succeeds for requests carrying permission `P`.
///
/// It runs before any other extractor of the handler, so a denied request
/// never reaches the handler body.
pub(crate) struct Authorized<P: Permission>(pub(crate) Claims, pub(crate) PhantomData<P>);

impl<P: Permission> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = state
            .gate
            .check(&parts.headers, P::NAME)
            .await
            .into_result()?;
        Ok(Self(claims, PhantomData))
    }
}

/// Subject of the verified token for log lines
pub(crate) fn subject(claims: &Claims) -> &str {
    claims.subject.as_deref().unwrap_or("<unknown>")
}
