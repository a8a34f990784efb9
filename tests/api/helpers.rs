use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web::Data,
    App, Error,
};
use async_trait::async_trait;
use partidas::{
    domain::parcel::ParcelResolution,
    services::{
        FetchError, PageFetcher, ParcelResolver, PartidaNotifier, RegistryBrowser, RegistryPage,
        SendError,
    },
    startup::routes,
};

pub const REGISTRY: &str = "https://registry.test/catastro/parcela/";
pub const BASE: &str = "https://registry.test/catastro/parcela/?lng=-58.45&lat=-34.6";
pub const UNITS: &str = "https://registry.test/catastro/parcela/?lng=-58.45&lat=-34.6&ph";

/// Serves canned body text per URL; unknown URLs fail to navigate.
#[derive(Default)]
pub struct CannedRegistry {
    bodies: HashMap<String, String>,
    released: Arc<AtomicUsize>,
}

impl CannedRegistry {
    pub fn new() -> Self {
        CannedRegistry::default()
    }

    pub fn serving(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryBrowser for CannedRegistry {
    async fn acquire_page(&self) -> Result<Box<dyn RegistryPage>, FetchError> {
        Ok(Box::new(CannedPage {
            bodies: self.bodies.clone(),
            released: self.released.clone(),
            body: String::new(),
        }))
    }

    fn open_pages(&self) -> usize {
        0
    }
}

struct CannedPage {
    bodies: HashMap<String, String>,
    released: Arc<AtomicUsize>,
    body: String,
}

#[async_trait]
impl RegistryPage for CannedPage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), FetchError> {
        match self.bodies.get(url) {
            Some(body) => {
                self.body = body.clone();
                Ok(())
            }
            None => Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            }),
        }
    }

    async fn body_text(&self) -> Result<String, FetchError> {
        Ok(self.body.clone())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every notification instead of sending email.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, ParcelResolution)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        RecordingNotifier {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, ParcelResolution)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartidaNotifier for RecordingNotifier {
    async fn notify(&self, email: &str, resolution: &ParcelResolution) -> Result<(), SendError> {
        if self.fail {
            return Err(SendError::Connect(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "smtp relay unreachable",
            )));
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), resolution.clone()));
        Ok(())
    }
}

pub fn test_app(
    registry: Arc<CannedRegistry>,
    notifier: Arc<RecordingNotifier>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let fetcher = PageFetcher::new(registry, Duration::from_secs(15));
    let resolver = ParcelResolver::new(fetcher, REGISTRY).unwrap();
    let notifier: Data<dyn PartidaNotifier> = Data::from(notifier as Arc<dyn PartidaNotifier>);

    App::new().configure(|cfg| routes(cfg, Data::new(resolver), notifier))
}
