use std::sync::Arc;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use crate::helpers::{test_app, CannedRegistry, BASE, UNITS};

fn coordinate_body() -> Value {
    json!({"lat": -34.6, "lng": -58.45})
}

#[actix_web::test]
async fn verification_reports_existing_matriz() {
    let registry = Arc::new(CannedRegistry::new().serving(BASE, r#"{"pdamatriz": "123-456"}"#));
    let app = test::init_service(test_app(registry.clone(), Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(coordinate_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"status": "success", "message": "La partida existe", "matriz": "123-456"})
    );
    assert_eq!(registry.released(), 1);
}

#[actix_web::test]
async fn verification_lists_functional_units() {
    let registry = Arc::new(
        CannedRegistry::new()
            .serving(BASE, r#"{"propiedad_horizontal": "Si"}"#)
            .serving(
                UNITS,
                r#"{"phs":[{"pdahorizontal":"9-1","piso":"3","dpto":"A"}]}"#,
            ),
    );
    let app = test::init_service(test_app(registry, Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(coordinate_body())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "success");
    assert_eq!(
        body["units"],
        json!([{"partidaHorizontal": "9-1", "piso": "3", "dpto": "A"}])
    );
}

#[actix_web::test]
async fn missing_parcel_is_still_a_successful_response() {
    let registry = Arc::new(CannedRegistry::new().serving(BASE, "{}"));
    let app = test::init_service(test_app(registry, Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(coordinate_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"status": "error", "message": "La partida no existe"})
    );
}

#[actix_web::test]
async fn horizontal_parcel_without_units_has_its_own_message() {
    let registry = Arc::new(
        CannedRegistry::new()
            .serving(BASE, r#"{"propiedad_horizontal": "Si"}"#)
            .serving(UNITS, r#"{"phs": []}"#),
    );
    let app = test::init_service(test_app(registry, Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(coordinate_body())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "La partida existe pero no tiene unidades funcionales"
    );
}

#[actix_web::test]
async fn registry_failure_is_an_operational_error() {
    let registry = Arc::new(CannedRegistry::new().serving(BASE, "<html>Mantenimiento</html>"));
    let app = test::init_service(test_app(registry.clone(), Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(coordinate_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "Error verificando la existencia de la partida"
    );
    assert_eq!(registry.released(), 1);
}

#[actix_web::test]
async fn malformed_request_body_is_rejected() {
    let app = test::init_service(test_app(Arc::default(), Arc::default())).await;

    let req = test::TestRequest::post()
        .uri("/verification")
        .set_json(json!({"lat": "sur"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
