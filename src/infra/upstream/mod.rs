//! HTTP clients for the species catalog and the translation service.

mod catalog;
mod translator;

pub use catalog::CatalogClient;
pub use translator::TranslatorClient;

use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::{domain::error::LookupError, infra::error::InfraError};

const BODY_SNIPPET_LIMIT: usize = 1024;

pub fn user_agent() -> &'static str {
    concat!("pokedex/", env!("CARGO_PKG_VERSION"))
}

/// Shared reqwest client used by both upstream adapters.
pub fn build_client() -> Result<Client, InfraError> {
    Ok(Client::builder().user_agent(user_agent()).build()?)
}

/// Append one path segment to `base`, percent-encoding it.
fn endpoint(base: &Url, segment: &str) -> Result<Url, LookupError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| LookupError::upstream(format!("base url `{base}` cannot take a path")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

/// At most the first KiB of an upstream body, for error messages.
fn body_snippet(body: &[u8]) -> String {
    let end = body.len().min(BODY_SNIPPET_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

/// Pull the head of a failed response off the wire, stopping once the
/// snippet limit is reached. The rest of the body is never read.
async fn read_error_body(mut response: Response) -> Vec<u8> {
    let mut body = Vec::new();
    while body.len() < BODY_SNIPPET_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(err) => {
                debug!(target = "pokedex::upstream", error = %err, "error body cut short");
                break;
            }
        }
    }
    body.truncate(BODY_SNIPPET_LIMIT);
    body
}
