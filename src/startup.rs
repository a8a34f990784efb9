use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};

use crate::{
    routes::{default_route, partida_route, verification_route},
    services::{ParcelResolver, PartidaNotifier},
};

pub fn run(
    listener: TcpListener,
    resolver: ParcelResolver,
    notifier: Arc<dyn PartidaNotifier>,
    client_timeout: Duration,
) -> Result<Server, std::io::Error> {
    let resolver = web::Data::new(resolver);
    let notifier: Data<dyn PartidaNotifier> = Data::from(notifier);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| routes(cfg, resolver.clone(), notifier.clone()))
    })
    .keep_alive(KeepAlive::Timeout(client_timeout))
    .client_request_timeout(client_timeout)
    .listen(listener)?
    .run();

    Ok(server)
}

/// Registers every endpoint together with the state it needs.
pub fn routes(
    cfg: &mut web::ServiceConfig,
    resolver: Data<ParcelResolver>,
    notifier: Data<dyn PartidaNotifier>,
) {
    cfg.service(default_route::default)
        .service(verification_route::verify_partida)
        .service(partida_route::fetch_vfh_caba_data)
        .service(partida_route::fetch_abl_data)
        .app_data(resolver)
        .app_data(notifier);
}
