use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to decode {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The card was removed by reconciliation while the user edited it. The
    /// right reaction is to drop it locally, not retry.
    #[error("card {card_id} was removed by reconciliation")]
    StaleCard { card_id: String },

    #[error("server rejected request ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}
