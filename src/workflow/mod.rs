pub mod session_machine;

pub use session_machine::{
    Advance, FetchOutcome, Phase, RoundOutcome, RoundToken, SessionMachine, SessionTicket,
};
