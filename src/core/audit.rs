use log::{info, warn};

use crate::core::shared::models::RecordType;
use crate::security::Operation;
use uuid::Uuid;

pub fn log_api_access(user: &str, endpoint: &str, params: &str) {
    info!(target: "audit", "API access user={user} endpoint={endpoint} params={params}");
}

pub fn log_record_change(user: &str, record_type: RecordType, id: Uuid, operation: Operation) {
    info!(target: "audit", "Record {operation} user={user} type={record_type} id={id}");
}

pub fn log_workflow_action(user: &str, review: Uuid, action: &str, from: &str, to: &str) {
    info!(
        target: "audit",
        "Workflow action user={user} review={review} action={action} from={from} to={to}"
    );
}

pub fn log_security_event(event: &str, user: &str, details: &str) {
    warn!(target: "audit", "Security event {event} user={user} details={details}");
}
