pub mod amount {
    /// Decimal places of the native token and of every staking-contract amount.
    pub const TOKEN_DECIMALS: u32 = 18;
    pub const TOKEN_SYMBOL: &str = "FTM";
}

pub mod watch {
    pub const DEFAULT_RESUBSCRIBE_INTERVAL_SECONDS: u64 = 1;
    /// Blocks to lag behind a new head before sweeping it for transfers.
    pub const DEFAULT_SHIFT_BLOCKS: u64 = 5;
    pub const DEFAULT_POLL_BLOCK_RANGE: u64 = 50_000;
}

pub mod storage {
    pub const SOCIAL_CHANNELS_KEY: &str = "social_bots";
}

pub mod glyph {
    pub const NEW: &str = "\u{1F195}";
    pub const CHECK_MARK: &str = "\u{2705}";
    pub const CROSS_MARK: &str = "\u{274C}";
    pub const LOCK: &str = "\u{1F512}";
    pub const UNLOCK: &str = "\u{1F513}";
    pub const STAR: &str = "\u{2B50}";
    pub const WHALE: &str = "\u{1F433}";
}
