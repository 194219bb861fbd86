//! MaxMind GeoIP Resolver
//!
//! Implements GeoResolver using a MaxMind GeoLite2-Country database file.

use crate::domain::ports::GeoResolver;
use crate::domain::value_objects::CountryCode;
use maxminddb::Reader;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// MaxMind GeoIP resolver.
///
/// The database is read fully into memory when opened, so lookups do no
/// I/O. The handle is opened once at process start and dropped at
/// shutdown; refreshing the file is left to an external process.
#[derive(Clone)]
pub struct MaxMindGeoResolver {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindGeoResolver {
    /// Load a GeoIP database from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Database type string from the file metadata (e.g. `GeoLite2-Country`).
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }
}

impl GeoResolver for MaxMindGeoResolver {
    fn country(&self, ip: IpAddr) -> Option<CountryCode> {
        #[derive(Debug, Deserialize)]
        struct Country {
            iso_code: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct CountryResp {
            country: Option<Country>,
            registered_country: Option<Country>,
        }

        let resp: CountryResp = match self.reader.lookup(ip) {
            Ok(resp) => resp,
            Err(maxminddb::MaxMindDBError::AddressNotFoundError(_)) => return None,
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "GeoIP lookup failed");
                return None;
            }
        };

        // Anycast and some corporate ranges only carry the registered country.
        let iso = resp
            .country
            .and_then(|c| c.iso_code)
            .or_else(|| resp.registered_country.and_then(|c| c.iso_code))?;

        let code = CountryCode::new(&iso);
        (!code.is_unknown()).then_some(code)
    }
}
