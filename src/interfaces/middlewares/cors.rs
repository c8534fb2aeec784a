use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderValue},
    Error,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::{
    rc::Rc,
    task::{Context, Poll},
};

pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Adds CORS headers to every response.
///
/// `Access-Control-Allow-Origin` echoes the request origin only on an exact
/// match with the configured list; a missing or unknown origin gets no
/// allow-origin header at all.
pub struct CorsHeaders {
    origins: Rc<Vec<String>>,
}

impl CorsHeaders {
    pub fn new(origins: Vec<String>) -> Self {
        Self {
            origins: Rc::new(origins),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorsHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsHeadersService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsHeadersService {
            service: Rc::new(service),
            origins: Rc::clone(&self.origins),
        })
    }
}

pub struct CorsHeadersService<S> {
    service: Rc<S>,
    origins: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for CorsHeadersService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed = allowed_origin(&req, &self.origins);

        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();

            if let Some(origin) = allowed {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );

            Ok(res)
        })
    }
}

fn allowed_origin(req: &ServiceRequest, origins: &[String]) -> Option<HeaderValue> {
    let origin = req.headers().get(header::ORIGIN)?;
    let value = origin.to_str().ok()?;

    if origins.iter().any(|allowed| allowed == value) {
        Some(origin.clone())
    } else {
        tracing::debug!(origin = value, "Origin not in allow list");
        None
    }
}
