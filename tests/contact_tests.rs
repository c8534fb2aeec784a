
use reqwest::{header, Method, StatusCode};
use serde_json::Value;
use test_utils::*;

use contact_backend::settings::RateStoreKind;

#[actix_rt::test]
async fn health_reports_store_and_transport() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["rate_limit_store"], "memory");
    assert_eq!(body["mail_transport"], "sendmail");
    assert!(body["started_at"].is_string());
}

#[actix_rt::test]
async fn preflight_echoes_allowed_origin() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .request(Method::OPTIONS, app.contact_url())
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let headers = res.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    assert_eq!(headers[header::VARY], "Origin");
}

#[actix_rt::test]
async fn preflight_from_unknown_origin_has_no_allow_origin() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .request(Method::OPTIONS, app.contact_url())
        .header(header::ORIGIN, "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[actix_rt::test]
async fn other_methods_are_rejected() {
    let app = TestApp::spawn().await;

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let res = app
            .client
            .request(method.clone(), app.contact_url())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Método não permitido.");
    }
}

#[actix_rt::test]
async fn invalid_fields_are_reported_together() {
    let app = TestApp::spawn().await;

    let form = with_field(with_field(valid_form(), "name", "Jo"), "subject", "spam");
    let res = app.post_form(&form).await;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["name"], "O nome deve ter pelo menos 3 caracteres.");
    assert_eq!(body["errors"]["subject"], "Assunto inválido.");
    assert!(body["errors"].get("email").is_none());
    assert!(app.logged_emails().is_empty());
}

#[actix_rt::test]
async fn valid_submission_falls_back_to_email_log() {
    let app = TestApp::spawn().await;

    let res = app.post_form(&valid_form()).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Mensagem enviada com sucesso!");

    let logged = app.logged_emails();
    assert_eq!(logged.len(), 1);
    let content = std::fs::read_to_string(&logged[0]).unwrap();
    assert!(content.starts_with("TO: contato@mesahermetica.com.br\n"));
    assert!(content.contains("REPLY-TO: Maria Silva <maria@example.com>\n"));
    assert!(content.contains("SUBJECT: [Mesa Hermética] Feedback / Depoimento — Maria Silva\n"));
}

#[actix_rt::test]
async fn honeypot_looks_successful_but_sends_nothing() {
    let app = TestApp::spawn_with(|config| config.rate_limit = 1).await;

    let bot = with_field(valid_form(), "website", "http://spam.example");
    for _ in 0..3 {
        let res = app.post_form(&bot).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Mensagem enviada com sucesso!");
    }
    assert!(app.logged_emails().is_empty());

    // The bot traffic consumed none of the client's quota.
    assert_eq!(app.post_form(&valid_form()).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn requests_beyond_the_limit_are_throttled() {
    let app = TestApp::spawn_with(|config| config.rate_limit = 2).await;

    for _ in 0..2 {
        assert_eq!(app.post_form(&valid_form()).await.status(), StatusCode::OK);
    }

    let invalid = with_field(valid_form(), "email", "");
    let res = app.post_form(&invalid).await;

    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 3500 && retry_after <= 3600);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Muitas tentativas. Tente novamente em uma hora.");
}

#[actix_rt::test]
async fn forwarded_clients_are_counted_separately_when_trusted() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit = 1;
        config.trust_forwarded_for = true;
    })
    .await;

    for client in ["203.0.113.1", "203.0.113.2"] {
        let res = app
            .client
            .post(app.contact_url())
            .header("X-Forwarded-For", client)
            .form(&valid_form())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{client}");
    }

    let res = app
        .client
        .post(app.contact_url())
        .header("X-Forwarded-For", "203.0.113.1")
        .form(&valid_form())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[actix_rt::test]
async fn multipart_bodies_are_accepted() {
    let app = TestApp::spawn().await;

    let form = valid_form()
        .into_iter()
        .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
            form.text(name, value)
        });
    let res = app
        .client
        .post(app.contact_url())
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(app.logged_emails().len(), 1);
}

#[actix_rt::test]
async fn unreadable_body_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.contact_url())
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"name":"Maria"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Requisição inválida.");
}

#[actix_rt::test]
async fn file_store_persists_attempts() {
    let app = TestApp::spawn_with(|config| config.rate_limit_store = RateStoreKind::File).await;

    assert_eq!(app.post_form(&valid_form()).await.status(), StatusCode::OK);

    let rate_dir = app.config.rate_limit_dir();
    let records: Vec<_> = std::fs::read_dir(&rate_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("contact_rate_"))
        .collect();
    assert_eq!(records.len(), 1);

    let json: Value = serde_json::from_str(&std::fs::read_to_string(records[0].path()).unwrap()).unwrap();
    assert_eq!(json["attempts"].as_array().unwrap().len(), 1);
}
