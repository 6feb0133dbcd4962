/// Basket asset symbols
pub const BTC_SYMBOL: &str = "BTC";
pub const ETH_SYMBOL: &str = "ETH";

/// Assets treated as 1:1 with USD when resolving event values
pub const USD_ASSETS: [&str; 3] = ["USD", "USDT", "USDC"];

/// Singleton row id for the batch run lock
pub const MONITOR_LOCK_ID: &str = "monitor";

/// Event direction labels
pub const DIRECTION_IN: &str = "IN";
pub const DIRECTION_OUT: &str = "OUT";

/// Event kind labels
pub const EVENT_KIND_REGULAR: &str = "REGULAR";
pub const EVENT_KIND_SUB_TRANSFER: &str = "SUB_TRANSFER";
pub const EVENT_KIND_PAY: &str = "PAY";
pub const EVENT_KIND_DIVIDEND: &str = "DIVIDEND";

/// Rebalance record status labels
pub const REBALANCE_STATUS_SUCCESS: &str = "SUCCESS";
pub const REBALANCE_STATUS_FAILED: &str = "FAILED";
