use crate::error::ProviderError;
use crate::http::HttpProviderClient;
use crate::models::{Collection, EventType, RawEventType};

/// Pages through event types one request at a time.
///
/// Nothing is fetched until [`next_page`](Self::next_page) is awaited, and
/// [`restart`](Self::restart) rewinds to the first page.
pub struct EventTypePages<'a> {
    client: &'a HttpProviderClient,
    first_page: String,
    cursor: Option<String>,
}

impl<'a> EventTypePages<'a> {
    pub(crate) fn new(client: &'a HttpProviderClient, first_page: String) -> Self {
        Self {
            client,
            cursor: Some(first_page.clone()),
            first_page,
        }
    }

    /// The next page, or `None` once the provider reports no further page.
    ///
    /// A failed request leaves the cursor in place, so calling again retries
    /// the same page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<EventType>>, ProviderError> {
        let Some(url) = self.cursor.as_deref() else {
            return Ok(None);
        };
        let page: Collection<RawEventType> = self.client.get_json(url, &[]).await?;
        self.cursor = page.pagination.and_then(|p| p.next_page);
        Ok(Some(page.collection.into_iter().map(EventType::from).collect()))
    }

    pub fn restart(&mut self) {
        self.cursor = Some(self.first_page.clone());
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}
