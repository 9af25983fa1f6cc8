use std::net::IpAddr;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, trace};

use crate::api::ApiSettings;
use crate::database::DatabaseSwapper;
use crate::services::GeoRecord;
use crate::utils::ip::{extract_client_ip, is_local_ip};

#[derive(Debug, Serialize)]
struct PlaceBody<'a> {
    country: &'a str,
    region: &'a str,
    city: &'a str,
    continent: &'a str,
}

#[derive(Debug, Serialize)]
struct LocationBody<'a> {
    latitude: f64,
    longitude: f64,
    timezone: &'a str,
    accuracy: u16,
    #[serde(rename = "metroCode")]
    metro_code: u16,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    ip: &'a str,
    city: PlaceBody<'a>,
    location: LocationBody<'a>,
}

impl<'a> QueryBody<'a> {
    fn new(ip: &'a str, record: &'a GeoRecord) -> Self {
        Self {
            ip,
            city: PlaceBody {
                country: &record.country,
                region: &record.region,
                city: &record.city,
                continent: &record.continent,
            },
            location: LocationBody {
                latitude: record.latitude.unwrap_or_default(),
                longitude: record.longitude.unwrap_or_default(),
                timezone: record.timezone.as_deref().unwrap_or_default(),
                accuracy: record.accuracy.unwrap_or_default(),
                metro_code: record.metro_code.unwrap_or_default(),
            },
        }
    }
}

pub struct QueryService;

impl QueryService {
    /// `GET /{ip}`; an empty path looks up the caller
    pub async fn query_ip(
        req: HttpRequest,
        path: web::Path<String>,
        swapper: web::Data<Arc<DatabaseSwapper>>,
        settings: web::Data<ApiSettings>,
    ) -> impl Responder {
        let ip = path.into_inner();
        let ip = if ip.is_empty() {
            Self::client_ip(&req, &settings)
        } else {
            ip
        };
        Self::respond(&ip, &swapper, &settings.locale)
    }

    fn client_ip(req: &HttpRequest, settings: &ApiSettings) -> String {
        extract_client_ip(req, &settings.trusted_proxies).unwrap_or_default()
    }

    fn ip_only(status: StatusCode, ip: &str) -> HttpResponse {
        HttpResponse::build(status).json(json!({ "ip": ip }))
    }

    fn respond(ip: &str, swapper: &DatabaseSwapper, locale: &str) -> HttpResponse {
        if ip.is_empty() || is_local_ip(ip) {
            trace!("Local or empty address '{}', not looked up", ip);
            return Self::ip_only(StatusCode::NOT_FOUND, ip);
        }

        let Ok(addr) = ip.parse::<IpAddr>() else {
            debug!("Rejected unparseable address '{}'", ip);
            return Self::ip_only(StatusCode::BAD_REQUEST, ip);
        };

        let Some(database) = swapper.current() else {
            return HttpResponse::ServiceUnavailable()
                .json(json!({ "ip": ip, "error": "data unavailable" }));
        };

        match database.lookup(addr, locale) {
            Ok(Some(record)) => match serde_json::to_string_pretty(&QueryBody::new(ip, &record)) {
                Ok(body) => HttpResponse::Ok()
                    .content_type("application/json; charset=utf-8")
                    .body(body),
                Err(e) => {
                    error!("Failed to encode lookup result for {}: {}", ip, e);
                    Self::ip_only(StatusCode::INTERNAL_SERVER_ERROR, ip)
                }
            },
            Ok(None) => {
                debug!("No record for {}", ip);
                Self::ip_only(StatusCode::NOT_FOUND, ip)
            }
            Err(e) => {
                error!("Lookup for {} failed: {}", ip, e);
                Self::ip_only(StatusCode::INTERNAL_SERVER_ERROR, ip)
            }
        }
    }
}

/// Query 路由配置，需最后注册
pub fn query_routes() -> actix_web::Scope {
    web::scope("").route("/{ip}*", web::get().to(QueryService::query_ip))
}
