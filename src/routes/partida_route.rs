use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    domain::parcel::{Coordinate, Partidas},
    services::{ParcelResolver, PartidaNotifier},
};

const EMAIL_SENT: &str = "Email enviado con éxito";
const UNRESOLVED: &str =
    "No se pudo obtener el número de partida matriz o datos de propiedad horizontal.";
const LOOKUP_FAILED: &str = "Error procesando la solicitud";
const SEND_FAILED: &str = "Error enviando el correo con los números de partida";

#[derive(Debug, Deserialize)]
pub struct PartidaRequest {
    lat: f64,
    lng: f64,
    email: String,
}

#[derive(Serialize)]
struct PartidaSent {
    message: &'static str,
    partidas: Partidas,
}

#[derive(Serialize)]
struct PartidaError {
    error: &'static str,
}

#[post("/fetch-vfh-caba-data")]
pub async fn fetch_vfh_caba_data(
    resolver: web::Data<ParcelResolver>,
    notifier: web::Data<dyn PartidaNotifier>,
    body: web::Json<PartidaRequest>,
) -> HttpResponse {
    send_partidas(&resolver, notifier.as_ref(), body.into_inner()).await
}

#[post("/fetch-abl-data")]
pub async fn fetch_abl_data(
    resolver: web::Data<ParcelResolver>,
    notifier: web::Data<dyn PartidaNotifier>,
    body: web::Json<PartidaRequest>,
) -> HttpResponse {
    send_partidas(&resolver, notifier.as_ref(), body.into_inner()).await
}

async fn send_partidas(
    resolver: &ParcelResolver,
    notifier: &dyn PartidaNotifier,
    request: PartidaRequest,
) -> HttpResponse {
    log::info!("Received partida request: {:?}", request);
    let coordinate = Coordinate {
        lat: request.lat,
        lng: request.lng,
    };

    let resolution = match resolver.extract(coordinate).await {
        Ok(resolution) => resolution,
        Err(e) => {
            log::error!("Error resolving partida: {}", e);
            return HttpResponse::InternalServerError().json(PartidaError {
                error: LOOKUP_FAILED,
            });
        }
    };

    let Some(partidas) = Partidas::from_resolution(&resolution) else {
        log::error!("{}", UNRESOLVED);
        return HttpResponse::BadGateway().json(PartidaError { error: UNRESOLVED });
    };

    match notifier.notify(&request.email, &resolution).await {
        Ok(()) => HttpResponse::Ok().json(PartidaSent {
            message: EMAIL_SENT,
            partidas,
        }),
        Err(e) => {
            log::error!("Error sending partidas to {}: {}", request.email, e);
            HttpResponse::InternalServerError().json(PartidaError { error: SEND_FAILED })
        }
    }
}
