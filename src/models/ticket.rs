use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Lifecycle event N-central reports for one of its tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// A new ticket must be opened in the helpdesk
    Create,
    /// Additional details must be appended to an existing ticket
    Update,
    /// The monitored condition cleared; the ticket may be closed
    Resolve,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Resolve => "RESOLVE",
        })
    }
}

/// Payload N-central posts to `/ticketRequests`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    /// What happened to the ticket
    pub action: Action,
    /// Ticket subject (e.g., "Disk space low on SRV01")
    pub title: String,
    /// Free text body, mostly "Key: Value" lines
    pub details: String,
    /// N-central's own identifier for the ticket
    #[serde(rename = "ncentralTicketId", alias = "externalTicketId")]
    pub external_ticket_id: String,
    /// Helpdesk ticket id, returned by us on CREATE and echoed back afterwards.
    /// Only CREATE may omit it.
    #[serde(default)]
    pub psa_ticket_number: Option<i64>,
    /// Custom tags configured on the N-central side
    pub custom_tags: HashMap<String, String>,
}

/// Response body for a handled ticket request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResult {
    pub external_ticket_id: i64,
    pub ticket_url: String,
    /// Set when a RESOLVE found the ticket already solved and changed nothing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_ncentral_payload() {
        let request: TicketRequest = serde_json::from_value(json!({
            "action": "UPDATE",
            "title": "Disk space low",
            "details": "Device: SRV01",
            "ncentralTicketId": "12345",
            "psaTicketNumber": 77,
            "customTags": { "site": "HQ" }
        }))
        .unwrap();

        assert_eq!(request.action, Action::Update);
        assert_eq!(request.external_ticket_id, "12345");
        assert_eq!(request.psa_ticket_number, Some(77));
        assert_eq!(request.custom_tags["site"], "HQ");
    }

    #[test]
    fn ticket_number_is_optional_for_create() {
        let request: TicketRequest = serde_json::from_value(json!({
            "action": "CREATE",
            "title": "t",
            "details": "",
            "ncentralTicketId": "1",
            "customTags": {}
        }))
        .unwrap();

        assert_eq!(request.action, Action::Create);
        assert_eq!(request.psa_ticket_number, None);
    }

    #[test]
    fn rejects_unknown_action() {
        let result = serde_json::from_value::<TicketRequest>(json!({
            "action": "DELETE",
            "title": "t",
            "details": "",
            "ncentralTicketId": "1",
            "customTags": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn already_resolved_only_serialized_when_set() {
        let mut result = TicketResult {
            external_ticket_id: 5,
            ticket_url: "u".into(),
            already_resolved: false,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "externalTicketId": 5, "ticketUrl": "u" })
        );

        result.already_resolved = true;
        assert_eq!(
            serde_json::to_value(&result).unwrap()["alreadyResolved"],
            json!(true)
        );
    }
}
