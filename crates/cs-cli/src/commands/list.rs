//! `list*` command implementation.

use std::io::Write;

use cs_api::{Client, RequestParameters, Transport};

use crate::error::CliError;
use crate::output::write_json;

/// Handler for `list*` commands.
pub struct ListCommand<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> ListCommand<'a, T> {
    /// Creates a new list command handler.
    #[must_use]
    pub const fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Dispatches `command` and prints the normalized result as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or output cannot be written.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        command: &str,
        params: &RequestParameters,
    ) -> Result<(), CliError> {
        let result = self.client.dispatch(command, params).await?;
        write_json(out, &result)
    }
}
