//! Collection commands.
//!
//! Every command hydrates the collection first so intents apply to the
//! shopper's real state, then prints the collection as the server left it.

use pineapple_basket_core::{CollectionKind, ErrorKind, ProductSnapshot, WireEntry};
use pineapple_basket_engine::{
    Basket, CollectionHandle, Credential, EngineConfig, Hydration, HttpTransport, MutationTask,
    Outcome, TransportError,
};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    #[error("Not signed in: set BASKET_API_TOKEN or pass --token")]
    NotSignedIn,

    #[error("{}", .0.user_message())]
    Collection(#[from] ErrorKind),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A signed-in basket plus output settings.
pub struct Session {
    basket: Basket<HttpTransport>,
    json: bool,
}

impl Session {
    /// Build a basket against the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or nobody is
    /// signed in.
    pub fn open(
        config: &EngineConfig,
        token: Option<String>,
        json: bool,
    ) -> Result<Self, CommandError> {
        let basket = Basket::new(HttpTransport::new(config)?, config);
        if let Some(token) = token {
            basket.login(Credential::new(token));
        }
        if !basket.is_authenticated() {
            return Err(CommandError::NotSignedIn);
        }
        Ok(Self { basket, json })
    }

    pub async fn show(&self, kind: CollectionKind) -> Result<(), CommandError> {
        let handle = self.hydrated(kind).await?;
        self.print(&handle)
    }

    pub async fn add(
        &self,
        kind: CollectionKind,
        id: String,
        quantity: u32,
        price: Option<Decimal>,
    ) -> Result<(), CommandError> {
        let handle = self.hydrated(kind).await?;
        let task = handle.add(id, quantity, price.map(ProductSnapshot::priced))?;
        self.finish(&handle, task).await
    }

    pub async fn remove(&self, kind: CollectionKind, id: String) -> Result<(), CommandError> {
        let handle = self.hydrated(kind).await?;
        let task = handle.remove(id)?;
        self.finish(&handle, task).await
    }

    pub async fn set_quantity(
        &self,
        kind: CollectionKind,
        id: String,
        quantity: i64,
    ) -> Result<(), CommandError> {
        let handle = self.hydrated(kind).await?;
        let task = handle.set_quantity(id, quantity)?;
        self.finish(&handle, task).await
    }

    async fn hydrated(
        &self,
        kind: CollectionKind,
    ) -> Result<CollectionHandle<HttpTransport>, CommandError> {
        let handle = self.basket.collection(kind);
        match handle.hydrate().await {
            Hydration::Failed(error) => Err(error.into()),
            Hydration::Hydrated | Hydration::Skipped | Hydration::Discarded => Ok(handle),
        }
    }

    async fn finish(
        &self,
        handle: &CollectionHandle<HttpTransport>,
        task: MutationTask,
    ) -> Result<(), CommandError> {
        match task.await {
            Outcome::Reconciled | Outcome::Stale | Outcome::Discarded => {
                tracing::info!(kind = %handle.kind(), "change confirmed by server");
            }
            Outcome::RolledBack { error, .. } => {
                self.print(handle)?;
                return Err(error.into());
            }
            Outcome::Aborted => {
                let error = ErrorKind::NetworkFailure("request did not complete".to_string());
                return Err(error.into());
            }
        }
        self.print(handle)
    }

    #[allow(clippy::print_stdout)]
    fn print(&self, handle: &CollectionHandle<HttpTransport>) -> Result<(), CommandError> {
        let state = handle.snapshot();
        let totals = state.totals();

        if self.json {
            let entries: Vec<WireEntry> = state.entries().iter().map(WireEntry::from).collect();
            let body = serde_json::json!({
                "kind": handle.kind(),
                "entries": entries,
                "totals": totals,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        if state.entries().is_empty() {
            println!("{} is empty", handle.kind());
            return Ok(());
        }

        println!("{:<40} {:>5} {:>12}", "PRODUCT", "QTY", "LINE TOTAL");
        for entry in state.entries() {
            let line = entry
                .line_total()
                .map_or_else(|| "-".to_string(), |total| total.to_string());
            let marker = if entry.is_provisional() { " *" } else { "" };
            println!("{:<40} {:>5} {:>12}{marker}", entry.id, entry.quantity, line);
        }
        println!("{} item(s), subtotal {}", totals.item_count, totals.subtotal);
        if totals.provisional_lines > 0 {
            println!("* awaiting server confirmation");
        }
        Ok(())
    }
}
