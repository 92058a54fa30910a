//! Configuration constants for the trivia bot
//!
//! This module contains the defaults and limits used when configuring
//! rounds, fetching question batches and rendering the leaderboard.

/// Round timing constants
pub mod round {
    /// Default time in seconds participants have to answer a question
    pub const DEFAULT_ANSWER_TIME: u64 = 20;
    /// Minimum time in seconds participants have to answer a question
    pub const MIN_ANSWER_TIME: u64 = 5;
    /// Maximum time in seconds participants have to answer a question
    pub const MAX_ANSWER_TIME: u64 = 240;
    /// Default pause in seconds between a resolved round and the next question
    pub const DEFAULT_NEXT_ROUND_DELAY: u64 = 3;
    /// Maximum pause in seconds between a resolved round and the next question
    pub const MAX_NEXT_ROUND_DELAY: u64 = 60;
}

/// Question source constants
pub mod questions {
    /// Default number of questions requested per batch
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    /// Minimum number of questions requested per batch
    pub const MIN_BATCH_SIZE: usize = 1;
    /// Maximum number of questions requested per batch
    pub const MAX_BATCH_SIZE: usize = 50;
    /// Open Trivia DB question endpoint
    pub const OPEN_TRIVIA_URL: &str = "https://opentdb.com/api.php";
    /// Timeout in seconds for a question service request
    pub const REQUEST_TIMEOUT: u64 = 30;
}

/// Leaderboard constants
pub mod leaderboard {
    /// Maximum number of entries rendered into the status leaderboard
    pub const RENDER_LIMIT: usize = 50;
}

/// Chat command tokens
pub mod commands {
    /// Admin command starting a trivia session
    pub const START: &str = "!start";
    /// Admin command stopping a trivia session
    pub const STOP: &str = "!stop";
}
