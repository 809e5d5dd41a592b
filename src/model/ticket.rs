use super::material::Material;
use super::module::Module;
use super::traits::Model;
use super::user::User;
use crate::constants;
use campus_learn::{FromPgRow, PgEnum};
use serde::{Deserialize, Serialize};

/// Forward-only: Sent -> Received -> Responded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, PgEnum)]
#[serde(try_from = "i32", into = "i32")]
pub enum TicketStatus {
    #[default]
    Sent = 1,
    Received = 2,
    Responded = 3,
}

impl TicketStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TicketStatus::Sent => "Sent",
            TicketStatus::Received => "Received",
            TicketStatus::Responded => "Responded",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct QueryTicket {
    pub ticket_id: i64,
    pub user_id: i64,
    pub module_id: i64,
    pub title: String,
    pub content: String,
    pub status: TicketStatus,
    pub material_id: Option<i64>,
    pub time_created: i64,
}

impl Model for QueryTicket {
    fn table_name() -> &'static str {
        constants::TICKET_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "ticket_id"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct TicketResponse {
    pub response_id: i64,
    pub query_id: i64,
    pub user_id: i64,
    pub content: String,
    pub material_id: Option<i64>,
    pub time_created: i64,
}

impl TicketResponse {
    pub fn is_claim(&self) -> bool {
        self.content == constants::CLAIM_SENTINEL
    }
}

impl Model for TicketResponse {
    fn table_name() -> &'static str {
        constants::RESPONSE_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "response_id"
    }
}

/// A ticket together with every response row, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketRecord {
    pub ticket: QueryTicket,
    pub responses: Vec<TicketResponse>,
}

impl TicketRecord {
    pub fn new(ticket: QueryTicket, mut responses: Vec<TicketResponse>) -> Self {
        responses.sort_by_key(|r| (r.time_created, r.response_id));
        Self { ticket, responses }
    }

    /// Latest real answer, ignoring claim markers.
    pub fn latest_answer(&self) -> Option<&TicketResponse> {
        self.responses.iter().rev().find(|r| !r.is_claim())
    }

    /// The response that names the tutor: the latest answer, else the claim marker.
    pub fn current_response(&self) -> Option<&TicketResponse> {
        self.latest_answer().or_else(|| self.responses.last())
    }

    pub fn has_response_from(&self, user_id: i64) -> bool {
        self.responses.iter().any(|r| r.user_id == user_id)
    }

    pub fn claimed_by(&self) -> Option<i64> {
        self.responses.iter().find(|r| r.is_claim()).map(|r| r.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub content: String,
    pub module_id: i64,
}

/// Read model handed to clients.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TicketView {
    pub ticket_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub module_id: i64,
    pub module_name: String,
    pub title: String,
    pub content: String,
    pub status: TicketStatus,
    pub status_name: String,
    pub time_created: i64,
    pub material_id: Option<i64>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub response_id: Option<i64>,
    pub response_content: Option<String>,
    pub tutor_id: Option<i64>,
    pub tutor_name: Option<String>,
    pub tutor_email: Option<String>,
    pub time_responded: Option<i64>,
}

impl TicketView {
    pub fn project(
        record: &TicketRecord,
        owner: Option<&User>,
        module: Option<&Module>,
        material: Option<&Material>,
        tutor: Option<&User>,
    ) -> Self {
        let ticket = &record.ticket;
        let answer = record.latest_answer();
        let current = record.current_response();
        Self {
            ticket_id: ticket.ticket_id,
            user_id: ticket.user_id,
            user_name: owner.map(|u| u.display_name()).unwrap_or_default(),
            user_email: owner.map(|u| u.email.clone()).unwrap_or_default(),
            module_id: ticket.module_id,
            module_name: module.map(|m| m.name.clone()).unwrap_or_default(),
            title: ticket.title.clone(),
            content: ticket.content.clone(),
            status: ticket.status,
            status_name: ticket.status.name().to_string(),
            time_created: ticket.time_created,
            material_id: ticket.material_id,
            file_name: material.map(|m| m.file_name.clone()),
            file_type: material.map(|m| m.file_type.clone()),
            file_size: material.map(|m| m.file_size),
            response_id: answer.map(|r| r.response_id),
            response_content: answer.map(|r| r.content.clone()),
            tutor_id: current.map(|r| r.user_id),
            tutor_name: tutor.map(|u| u.display_name()),
            tutor_email: tutor.map(|u| u.email.clone()),
            time_responded: answer.map(|r| r.time_created),
        }
    }
}
