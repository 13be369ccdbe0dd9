//! Extractors whose rejections render as `AppError::InvalidInput`, so malformed
//! bodies, query strings and path ids get the same 400 JSON error shape as every
//! other failure.

use std::ops::Deref;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// JSON body extractor.
#[derive(Debug)]
pub struct AppJson<T>(pub T);

impl<T> Deref for AppJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor.
#[derive(Debug)]
pub struct AppQuery<T>(pub T);

impl<T> Deref for AppQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Path parameter extractor.
#[derive(Debug)]
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(Self(value))
    }
}
