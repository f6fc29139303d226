//! JWT authentication middleware and identity extractor
//!
//! The platform's identity provider issues the tokens; this service only
//! validates them. A request is authenticated when its bearer token carries
//! both a user (`sub`) and an organization (`org`) claim; either one
//! missing is an unauthorized request, rejected before any connection
//! state is touched.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::AppError;
use crate::models::{OrgId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier, opaque, provider-issued
    pub sub: String,
    /// Organization (syndicate) context
    pub org: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Authenticated caller identity, inserted into request extensions by
/// [`JwtAuth`] and read back through the `FromRequest` impl.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub org_id: OrgId,
}

impl FromRequest for Identity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Identity>() {
            Some(identity) => ready(Ok(identity.clone())),
            None => ready(Err(AppError::Unauthorized.into())),
        }
    }
}

/// Mint a token for service-to-service calls and tests.
pub fn issue_token(
    secret: &str,
    user_id: &UserId,
    org_id: &OrgId,
    ttl: chrono::Duration,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.as_str().to_string(),
        org: org_id.as_str().to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

#[derive(Clone)]
pub struct JwtAuth {
    key: DecodingKey,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

fn authenticate(req: &ServiceRequest, key: &DecodingKey) -> Result<Identity, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let token_data =
        decode::<Claims>(token, key, &Validation::new(Algorithm::HS256)).map_err(|e| {
            tracing::warn!(error = %e, "token validation failed");
            AppError::Unauthorized
        })?;

    let claims = token_data.claims;
    if claims.sub.is_empty() || claims.org.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(Identity {
        user_id: UserId::new(claims.sub),
        org_id: OrgId::new(claims.org),
    })
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthService {
            service: Rc::new(service),
            key: self.key.clone(),
        }))
    }
}

pub struct JwtAuthService<S> {
    service: Rc<S>,
    key: DecodingKey,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let key = self.key.clone();

        Box::pin(async move {
            let identity = match authenticate(&req, &key) {
                Ok(identity) => identity,
                Err(e) => {
                    let response = e.error_response().map_into_right_body();
                    return Ok(req.into_response(response));
                }
            };

            req.extensions_mut().insert(identity);
            service
                .call(req)
                .await
                .map(|res| res.map_into_left_body())
        })
    }
}
