use actix_web::{post, web, HttpResponse};

use crate::{
    domain::parcel::{Coordinate, VerificationOutcome},
    services::ParcelResolver,
};

const VERIFICATION_FAILED: &str = "Error verificando la existencia de la partida";

#[post("/verification")]
pub async fn verify_partida(
    resolver: web::Data<ParcelResolver>,
    body: web::Json<Coordinate>,
) -> HttpResponse {
    log::info!("Received verification request: {:?}", body);

    match resolver.verify(body.into_inner()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            log::error!("Error verifying partida: {}", e);
            HttpResponse::InternalServerError().json(VerificationOutcome::error(VERIFICATION_FAILED))
        }
    }
}
