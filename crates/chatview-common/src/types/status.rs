use serde::{Deserialize, Serialize};

/// Contact presence as the chat client numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    Offline,
    Online,
    Away,
    NotAvailable,
    DoNotDisturb,
    Invisible,
    FreeForChat,
}

impl PresenceStatus {
    /// Map a numeric status code. Unknown codes read as `Online`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Offline,
            2 => Self::Away,
            3 => Self::NotAvailable,
            4 => Self::DoNotDisturb,
            5 => Self::Invisible,
            6 => Self::FreeForChat,
            _ => Self::Online,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Offline => 0,
            Self::Online => 1,
            Self::Away => 2,
            Self::NotAvailable => 3,
            Self::DoNotDisturb => 4,
            Self::Invisible => 5,
            Self::FreeForChat => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Offline => "Offline",
            Self::Online => "Online",
            Self::Away => "Away",
            Self::NotAvailable => "Not Available",
            Self::DoNotDisturb => "Do not Disturb",
            Self::Invisible => "Invisible",
            Self::FreeForChat => "Free for Chat",
        }
    }
}
