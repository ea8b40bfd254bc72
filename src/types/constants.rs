//! Wire-level constants shared by the transport and realtime layers

/// Header names sent by the transport client
pub mod headers {
    /// Session token, sent verbatim (no scheme prefix)
    pub const AUTHORIZATION: &str = "Authorization";
    /// Per-session signing key on the general API
    pub const SIGMA_KEY: &str = "api-sigma-key";
    /// Encrypted agency authorization on the payment API
    pub const PAYMENT_SIGMA: &str = "sigma";
    /// Agency signature on the payment API
    pub const PAYMENT_ZELDA: &str = "zelda";
    /// Content type forced onto encrypted bodies
    pub const TEXT_PLAIN: &str = "text/plain";
}

/// Keys under which session state is persisted
pub mod storage_keys {
    pub const TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER: &str = "user";
    pub const SIGMA: &str = "sigma";

    /// Every key owned by the session
    pub const ALL: [&str; 4] = [TOKEN, REFRESH_TOKEN, USER, SIGMA];
}

/// Fixed values injected into every authenticated request
pub mod client_identity {
    /// Device type reported by this client
    pub const DEVICE_TYPE: &str = "web";
    /// Originating app identifier on the general API
    pub const APP_IDENTIFIER: &str = "SMARTDEALS";
    /// Region assumed when the user profile has none
    pub const DEFAULT_REGION: &str = "NG";
    /// Account type assumed by the payment API when the profile has none
    pub const DEFAULT_PAYMENT_ACCOUNT_TYPE: &str = "member";
}

/// API endpoints used by this crate
pub mod endpoints {
    pub const LOGIN: &str = "/login_web";
    pub const SIGMA_KEY: &str = "/customer/fpk";
    pub const PAY_WITH_WALLET: &str = "payWithSmartDeals";
    pub const VERIFY_WALLET_PAYMENT: &str = "verifyPayWithSmartDeals";
}

/// Realtime channel event names
pub mod events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const WALLET_BALANCE: &str = "wallet_balance";
    pub const PAYMENT_STATUS: &str = "payment_status";
    /// Emitted once per newly observed initiation reference
    pub const PAYMENT_CONFIRMED: &str = "payment_confirmed";

    /// Socket events whose payload carries a `method` discriminator
    pub fn is_routed(name: &str) -> bool {
        matches!(name, WALLET_BALANCE | PAYMENT_STATUS)
    }
}

/// Realtime transport location
pub mod realtime {
    /// Socket.IO path on the realtime host
    pub const SOCKET_PATH: &str = "/ws/pay/socket.io/";
    /// Engine.IO protocol revision
    pub const ENGINE_IO_VERSION: &str = "4";
}
