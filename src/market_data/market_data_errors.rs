use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("No price available for any requested symbol")]
    PriceUnavailable,

    #[error("Price missing for symbol: {0}")]
    MissingSymbol(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    ParsingError(String),
}
