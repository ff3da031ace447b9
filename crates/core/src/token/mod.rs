//! Purchase token strategies.
//!
//! Guarded projects require an interaction token on both the prepare and the
//! create stage of a purchase; everything else sends empty tokens.

mod guarded;

pub use guarded::{pack_record, GuardedGenerator, InteractionStats, WindowProfile, RECORD_LEN};

use tokio::time::Instant;

/// Token strategy for one routine.
#[derive(Debug)]
pub enum TokenGenerator {
    Guarded(GuardedGenerator),
    Plain,
}

impl TokenGenerator {
    /// Select the strategy from the project's guarded flag.
    pub fn for_project(is_guarded: bool) -> Self {
        if is_guarded {
            TokenGenerator::Guarded(GuardedGenerator::new())
        } else {
            TokenGenerator::Plain
        }
    }

    pub fn is_guarded(&self) -> bool {
        matches!(self, TokenGenerator::Guarded(_))
    }

    /// Token for one purchase-token acquisition round.
    pub fn prepare_stage_token(&mut self) -> String {
        match self {
            TokenGenerator::Guarded(g) => g.prepare_stage_token(),
            TokenGenerator::Plain => String::new(),
        }
    }

    /// Token for one order submission. `anchor` is when the current token
    /// round began.
    pub fn create_stage_token(&mut self, anchor: Instant) -> String {
        match self {
            TokenGenerator::Guarded(g) => g.create_stage_token(anchor),
            TokenGenerator::Plain => String::new(),
        }
    }
}
