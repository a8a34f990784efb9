use url::Url;

use crate::domain::parcel::{
    Coordinate, NotFoundReason, ParcelListing, ParcelResolution, VerificationOutcome,
};

use super::{FetchError, PageFetcher};

/// Resolves a coordinate to the partida(s) the cadastral registry reports there.
///
/// Every call scrapes the registry again; nothing is cached between lookups.
pub struct ParcelResolver {
    fetcher: PageFetcher,
    parcel_url: Url,
}

impl ParcelResolver {
    pub fn new(fetcher: PageFetcher, parcel_url: &str) -> Result<Self, url::ParseError> {
        Ok(ParcelResolver {
            fetcher,
            parcel_url: Url::parse(parcel_url)?,
        })
    }

    pub fn parcel_query_url(&self, coordinate: Coordinate) -> String {
        let mut url = self.parcel_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("lng", &coordinate.lng.to_string())
            .append_pair("lat", &coordinate.lat.to_string());
        url.to_string()
    }

    pub async fn resolve(&self, coordinate: Coordinate) -> Result<ParcelResolution, FetchError> {
        log::info!(
            "Resolving parcel at lat: {}, lng: {}",
            coordinate.lat,
            coordinate.lng
        );

        let base_url = self.parcel_query_url(coordinate);
        let payload = self.fetcher.fetch_json(&base_url).await?;

        let resolution = match ParcelListing::from_payload(&payload) {
            ParcelListing::HorizontalProperty => {
                log::info!("Horizontal property detected, fetching functional units");
                let units_payload = self.fetcher.fetch_json(&format!("{}&ph", base_url)).await?;
                ParcelResolution::from_unit_payload(&units_payload)
            }
            ParcelListing::Matriz(matriz) => {
                log::info!("Partida matriz obtained: {}", matriz);
                ParcelResolution::Simple { matriz }
            }
            ParcelListing::Unlisted => ParcelResolution::NotFound(NotFoundReason::Unlisted),
        };

        if !resolution.is_found() {
            log::warn!(
                "No partida found at lat: {}, lng: {} ({:?})",
                coordinate.lat,
                coordinate.lng,
                resolution
            );
        }

        Ok(resolution)
    }

    /// Existence check, projected for display.
    pub async fn verify(&self, coordinate: Coordinate) -> Result<VerificationOutcome, FetchError> {
        let outcome = self.resolve(coordinate).await?.to_verification();
        log::info!("{}", outcome.message);
        Ok(outcome)
    }

    pub async fn extract(&self, coordinate: Coordinate) -> Result<ParcelResolution, FetchError> {
        self.resolve(coordinate).await
    }
}
