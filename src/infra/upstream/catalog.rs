use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::upstream::CatalogSource,
    domain::{creatures::Creature, error::LookupError},
    util::text::collapse_whitespace,
};

use super::{body_snippet, endpoint, read_error_body};

const PREFERRED_LANGUAGE: &str = "en";

#[derive(Debug, Deserialize)]
struct ApiSpecies {
    is_legendary: bool,
    name: String,
    habitat: Option<ApiNamed>,
    #[serde(default)]
    flavor_text_entries: Vec<ApiFlavorText>,
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiFlavorText {
    flavor_text: String,
    language: ApiNamed,
}

impl ApiSpecies {
    fn description(&self) -> &str {
        self.flavor_text_entries
            .iter()
            .find(|entry| entry.language.name == PREFERRED_LANGUAGE)
            .or_else(|| self.flavor_text_entries.first())
            .map(|entry| entry.flavor_text.as_str())
            .unwrap_or_default()
    }

    fn into_creature(self) -> Creature {
        let desc = collapse_whitespace(self.description());
        Creature {
            is_legendary: self.is_legendary,
            name: self.name,
            habitat: self.habitat.map(|habitat| habitat.name).unwrap_or_default(),
            desc,
        }
    }
}

/// Species catalog reached over HTTP (`GET <base>/<name>`).
#[derive(Clone, Debug)]
pub struct CatalogClient {
    client: Client,
    base: Url,
}

impl CatalogClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn fetch_creature(&self, name: &str) -> Result<Creature, LookupError> {
        let url = endpoint(&self.base, name)?;
        debug!(target = "pokedex::upstream::catalog", %url, "fetching species");

        let response = self.client.get(url.clone()).send().await.map_err(|err| {
            LookupError::upstream(format!("request to {url} for `{name}` failed: {err}"))
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::not_found(name));
        }

        if status != StatusCode::OK {
            let body = read_error_body(response).await;
            return Err(LookupError::upstream(format!(
                "unexpected status {} while looking up `{name}`: {}",
                status.as_u16(),
                body_snippet(&body)
            )));
        }

        let body = response.bytes().await.map_err(|err| {
            LookupError::upstream(format!("failed to read species body for `{name}`: {err}"))
        })?;

        let species: ApiSpecies = serde_json::from_slice(&body).map_err(|err| {
            LookupError::upstream(format!("failed to parse species `{name}`: {err}"))
        })?;
        Ok(species.into_creature())
    }
}
