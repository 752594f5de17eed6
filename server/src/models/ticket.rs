use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ticket_kind", rename_all = "lowercase")]
pub enum TicketKind {
    Full,
    Half,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::Full => "full",
            TicketKind::Half => "half",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTicketKind(pub String);

impl FromStr for TicketKind {
    type Err = UnknownTicketKind;

    /// Only the exact lowercase spellings are accepted.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "full" => Ok(TicketKind::Full),
            "half" => Ok(TicketKind::Half),
            other => Err(UnknownTicketKind(other.to_string())),
        }
    }
}

/// Durable record of one reserved spot. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub spot_id: Uuid,
    pub event_id: Uuid,
    pub kind: TicketKind,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(event_id: Uuid, spot_id: Uuid, kind: TicketKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            spot_id,
            event_id,
            kind,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_kind_parses_exact_values() {
        assert_eq!("full".parse::<TicketKind>(), Ok(TicketKind::Full));
        assert_eq!("half".parse::<TicketKind>(), Ok(TicketKind::Half));
    }

    #[test]
    fn test_ticket_kind_rejects_anything_else() {
        for raw in ["vip", "FULL", " half", ""] {
            assert!(raw.parse::<TicketKind>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_ticket_kind_wire_format() {
        let json = serde_json::to_string(&TicketKind::Half).unwrap();
        assert_eq!(json, "\"half\"");
    }
}
