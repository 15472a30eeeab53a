use actix_web::HttpResponse;

/// Liveness check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}
