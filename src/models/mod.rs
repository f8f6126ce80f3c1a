pub mod user;
pub mod game;
pub mod ranking;
pub mod event;

pub use user::{TelegramAuthRequest, User};
pub use game::GameRecord;
pub use ranking::{PlayerRanking, TeamRanking};
pub use event::{Club, Event, EventParticipant, PaymentStatus};
