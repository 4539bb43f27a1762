use anyhow::anyhow;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use super::odoo::HelpdeskRpc;
use crate::config::WorkflowConfig;

pub const TICKET_MODEL: &str = "helpdesk.ticket";
pub const MESSAGE_MODEL: &str = "mail.message";

/// The handful of helpdesk operations the bridge needs, expressed on top of
/// the generic object API.
pub struct Helpdesk {
    rpc: Arc<dyn HelpdeskRpc>,
    base_url: String,
    workflow: WorkflowConfig,
}

/// The part of a `helpdesk.ticket` record we read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRecord {
    pub id: i64,
    /// `None` when the ticket has no stage set
    pub stage_id: Option<i64>,
}

impl Helpdesk {
    pub fn new(rpc: Arc<dyn HelpdeskRpc>, base_url: impl Into<String>, workflow: WorkflowConfig) -> Self {
        Self {
            rpc,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            workflow,
        }
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        &self.workflow
    }

    /// Browser link to the ticket's form view.
    pub fn ticket_url(&self, ticket_id: i64) -> String {
        format!(
            "{}/web#id={}&view_type=form&model={}",
            self.base_url, ticket_id, TICKET_MODEL
        )
    }

    /// Creates a ticket classified with the configured area, team and type.
    /// Odoo is told not to send its own notification mail.
    pub async fn create_ticket(
        &self,
        title: &str,
        description: &str,
        partner_id: i64,
    ) -> anyhow::Result<i64> {
        let fields = json!({
            "name": title,
            "partner_id": partner_id,
            "description": description,
            "area_id": self.workflow.area_id,
            "team_id": self.workflow.team_id,
            "ticket_type_id": self.workflow.ticket_type_id,
            "put_off_email": true,
        });
        debug!("Ticket fields: {}", fields);

        let result = self.rpc.execute_kw(TICKET_MODEL, "create", vec![fields]).await?;
        let ticket_id = result
            .as_i64()
            .ok_or_else(|| anyhow!("unexpected result from {}.create: {}", TICKET_MODEL, result))?;

        info!("Created ticket: {}", ticket_id);
        Ok(ticket_id)
    }

    /// Posts `body` as a comment in the ticket's chatter. Returns whether
    /// Odoo reported success.
    pub async fn post_comment(&self, ticket_id: i64, body: &str) -> anyhow::Result<bool> {
        let message = json!({
            "model": TICKET_MODEL,
            "res_id": ticket_id,
            "body": body,
            "message_type": "comment",
        });

        let result = self.rpc.execute_kw(MESSAGE_MODEL, "create", vec![message]).await?;
        Ok(is_truthy(&result))
    }

    /// Reads the ticket's stage. `None` when no such ticket exists.
    pub async fn read_ticket(&self, ticket_id: i64) -> anyhow::Result<Option<TicketRecord>> {
        let result = self
            .rpc
            .execute_kw(TICKET_MODEL, "read", vec![json!([ticket_id]), json!(["stage_id"])])
            .await?;

        let Some(record) = result.as_array().and_then(|records| records.first()) else {
            return Ok(None);
        };

        Ok(Some(TicketRecord {
            id: record.get("id").and_then(Value::as_i64).unwrap_or(ticket_id),
            stage_id: stage_of(record),
        }))
    }

    /// Moves the ticket to `stage_id`. Returns whether Odoo accepted the write.
    pub async fn set_stage(&self, ticket_id: i64, stage_id: i64) -> anyhow::Result<bool> {
        let result = self
            .rpc
            .execute_kw(TICKET_MODEL, "write", vec![json!([ticket_id]), json!({ "stage_id": stage_id })])
            .await?;
        Ok(is_truthy(&result))
    }
}

// Many2one fields come back as `[id, "display name"]`, or `false` when unset.
fn stage_of(record: &Value) -> Option<i64> {
    record.get("stage_id")?.get(0)?.as_i64()
}

/// Odoo answers in Python values: `false`, `0`, `""`, `[]` and `{}` mean no.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every call with the same value and remembers what was asked.
    struct Echo {
        result: Value,
        calls: Mutex<Vec<(String, String, Vec<Value>)>>,
    }

    #[async_trait]
    impl HelpdeskRpc for Echo {
        async fn execute_kw(&self, model: &str, method: &str, args: Vec<Value>) -> anyhow::Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), method.to_string(), args));
            Ok(self.result.clone())
        }
    }

    fn fake_helpdesk(result: Value) -> (Helpdesk, Arc<Echo>) {
        let rpc = Arc::new(Echo {
            result,
            calls: Mutex::new(Vec::new()),
        });
        let helpdesk = Helpdesk::new(rpc.clone(), "https://odoo.example.com/", WorkflowConfig::default());
        (helpdesk, rpc)
    }

    #[test]
    fn builds_form_view_url() {
        let (helpdesk, _) = fake_helpdesk(Value::Null);
        assert_eq!(
            helpdesk.ticket_url(42),
            "https://odoo.example.com/web#id=42&view_type=form&model=helpdesk.ticket"
        );
    }

    #[tokio::test]
    async fn create_sends_classification_fields() {
        let (helpdesk, rpc) = fake_helpdesk(json!(42));

        let id = helpdesk.create_ticket("Disk low", "Device: SRV01", 7).await.unwrap();
        assert_eq!(id, 42);

        let calls = rpc.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (model, method, args) = &calls[0];
        assert_eq!((model.as_str(), method.as_str()), ("helpdesk.ticket", "create"));
        assert_eq!(
            args[0],
            json!({
                "name": "Disk low",
                "partner_id": 7,
                "description": "Device: SRV01",
                "area_id": 1,
                "team_id": 5,
                "ticket_type_id": 6,
                "put_off_email": true,
            })
        );
    }

    #[tokio::test]
    async fn create_rejects_non_numeric_result() {
        let (helpdesk, _) = fake_helpdesk(json!(false));
        assert!(helpdesk.create_ticket("t", "d", 0).await.is_err());
    }

    #[tokio::test]
    async fn reads_stage_from_many2one_pair() {
        let (helpdesk, rpc) = fake_helpdesk(json!([{ "id": 9, "stage_id": [68, "Solved"] }]));

        let record = helpdesk.read_ticket(9).await.unwrap().unwrap();
        assert_eq!(record, TicketRecord { id: 9, stage_id: Some(68) });

        let calls = rpc.calls.lock().unwrap();
        assert_eq!(calls[0].2, vec![json!([9]), json!(["stage_id"])]);
    }

    #[tokio::test]
    async fn unset_stage_and_missing_ticket() {
        let (helpdesk, _) = fake_helpdesk(json!([{ "id": 9, "stage_id": false }]));
        assert_eq!(helpdesk.read_ticket(9).await.unwrap().unwrap().stage_id, None);

        let (helpdesk, _) = fake_helpdesk(json!([]));
        assert_eq!(helpdesk.read_ticket(9).await.unwrap(), None);
    }

    #[test]
    fn truthiness_follows_python() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!([1])));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
    }
}
