use http::Extensions;
use reqwest::header::{self, HeaderValue, InvalidHeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};

/// Attaches a fixed `Authorization: Bearer` header to every request.
///
/// The token is bound once. Once it expires the owning client has to be rebuilt with the
/// refreshed token.
#[derive(Clone)]
pub struct BearerTokenMiddleware {
    header: HeaderValue,
}

impl std::fmt::Debug for BearerTokenMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenMiddleware").finish_non_exhaustive()
    }
}

impl BearerTokenMiddleware {
    pub fn new(token: &str) -> Result<Self, InvalidHeaderValue> {
        let mut header = HeaderValue::from_str(&format!("Bearer {}", token))?;
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

#[async_trait::async_trait]
impl Middleware for BearerTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.headers_mut()
            .insert(header::AUTHORIZATION, self.header.clone());

        next.run(req, extensions).await
    }
}
