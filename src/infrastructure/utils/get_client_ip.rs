use actix_web::HttpRequest;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client address used as the rate limit identity.
///
/// The first `X-Forwarded-For` entry is only honoured behind a trusted proxy;
/// otherwise any client could pick its own key.
pub fn get_client_ip(req: &HttpRequest, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn request() -> HttpRequest {
        TestRequest::default()
            .peer_addr("192.0.2.10:51000".parse().unwrap())
            .insert_header((FORWARDED_FOR, "203.0.113.7, 10.0.0.1"))
            .to_http_request()
    }

    #[test]
    fn peer_address_by_default() {
        assert_eq!(get_client_ip(&request(), false), "192.0.2.10");
    }

    #[test]
    fn first_forwarded_entry_when_trusted() {
        assert_eq!(get_client_ip(&request(), true), "203.0.113.7");
    }

    #[test]
    fn blank_forwarded_header_falls_back_to_peer() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.11:51000".parse().unwrap())
            .insert_header((FORWARDED_FOR, " "))
            .to_http_request();
        assert_eq!(get_client_ip(&req, true), "192.0.2.11");
    }
}
