use reqwest::Client;
use tracing::{debug, warn};

use super::{list_forms_page, Credential, Form, FormListResponse, OpnformError};

/// Upper bound on pages fetched for one listing, in case the server keeps
/// reporting a `last_page` it never reaches.
pub const MAX_FORM_PAGES: u32 = 500;

/// Whether another page should be requested after `listing`.
///
/// A listing without `data`, or without `meta`, is the last one. Otherwise the
/// sequence continues while `current_page < last_page`.
pub fn has_more_pages(listing: &FormListResponse) -> bool {
    match (&listing.data, &listing.meta) {
        (Some(_), Some(meta)) => meta.current_page < meta.last_page,
        _ => false,
    }
}

/// Lazy sequence over the form pages of one workspace.
///
/// Pages are fetched strictly one after another; each call to
/// [`FormPages::next_page`] issues at most one request.
pub struct FormPages<'a> {
    client: &'a Client,
    credential: &'a Credential,
    workspace_id: &'a str,
    next: Option<u32>,
    page_limit: u32,
    truncated: bool,
}

impl<'a> FormPages<'a> {
    pub fn new(client: &'a Client, credential: &'a Credential, workspace_id: &'a str) -> Self {
        Self {
            client,
            credential,
            workspace_id,
            next: Some(1),
            page_limit: MAX_FORM_PAGES,
            truncated: false,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Rewinds the sequence to page 1.
    pub fn restart(&mut self) {
        self.next = Some(1);
        self.truncated = false;
    }

    /// Whether the listing stopped at the page limit while the server still
    /// reported more pages.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Fetches the next page. Returns `None` once the sequence has ended,
    /// including when the server answers with a page that carries no `data`.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Form>, OpnformError>> {
        let page = self.next?;
        let listing =
            match list_forms_page(self.client, self.credential, self.workspace_id, page).await {
                Ok(listing) => listing,
                Err(err) => {
                    self.next = None;
                    return Some(Err(err));
                }
            };

        self.next = if has_more_pages(&listing) {
            if page >= self.page_limit {
                warn!(
                    workspace_id = self.workspace_id,
                    page, "form listing exceeded page limit; stopping"
                );
                self.truncated = true;
                None
            } else {
                Some(page + 1)
            }
        } else {
            None
        };

        match listing.data {
            Some(forms) => {
                debug!(
                    workspace_id = self.workspace_id,
                    page,
                    count = forms.len(),
                    "fetched form page"
                );
                Some(Ok(forms))
            }
            None => {
                debug!(
                    workspace_id = self.workspace_id,
                    page, "form page without data; ending listing"
                );
                None
            }
        }
    }

    /// Drains the remaining pages, preserving page order and in-page order.
    /// Check [`FormPages::is_truncated`] afterwards to learn whether the page
    /// limit cut the listing short.
    pub async fn collect_all(&mut self) -> Result<Vec<Form>, OpnformError> {
        let mut forms = Vec::new();
        while let Some(page) = self.next_page().await {
            forms.extend(page?);
        }
        Ok(forms)
    }
}
