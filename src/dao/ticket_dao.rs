use super::notification_dao::Notifier;
use super::store::{ClaimOutcome, RespondOutcome, Store, TicketFilter};
use super::subscription_dao::SubscriptionRegistry;
use super::user_dao::UserDirectory;
use crate::constants;
use crate::model::{
    material::{Material, Upload},
    module::Module,
    notification::{NewNotification, NotificationType},
    subscription::SubscriptionTarget,
    ticket::{NewTicket, QueryTicket, TicketRecord, TicketStatus, TicketView},
    user::{AccessLevel, Caller},
};
use crate::types::error::{Error, Result, TicketConflict};
use crate::utils::{file, now_millis};
use std::sync::Arc;

fn validate(new: &NewTicket) -> Result<()> {
    let title = new.title.trim();
    if title.is_empty() || title.chars().count() > constants::MAX_TICKET_TITLE_LEN {
        return Err(Error::bad_request(
            format!(
                "title is required and must be at most {} characters",
                constants::MAX_TICKET_TITLE_LEN
            )
            .as_str(),
        ));
    }
    if new.content.trim().is_empty() {
        return Err(Error::bad_request("content is required"));
    }
    Ok(())
}

fn require_tutor(caller: &Caller, action: &str) -> Result<()> {
    if !caller.is_tutor() {
        return Err(Error::forbidden(
            format!("only tutors may {} tickets", action).as_str(),
        ));
    }
    Ok(())
}

/// Query tickets: `Sent -> Received -> Responded`. The tutor who owns a ticket is whoever
/// wrote its claim marker; there is no separate assignee column.
#[derive(Clone)]
pub struct TicketEngine {
    store: Arc<dyn Store>,
    users: UserDirectory,
    subscriptions: SubscriptionRegistry,
    notifier: Notifier,
}

impl TicketEngine {
    pub fn new(
        store: Arc<dyn Store>,
        users: UserDirectory,
        subscriptions: SubscriptionRegistry,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            users,
            subscriptions,
            notifier,
        }
    }

    /// Everything is checked before anything is written; the attachment and the ticket are
    /// stored together or not at all.
    pub async fn create(
        &self,
        owner_id: i64,
        new: NewTicket,
        upload: Option<Upload>,
    ) -> Result<TicketView> {
        validate(&new)?;
        let module = self.require_module(new.module_id).await?;
        let upload = upload.filter(|u| !u.bytes.is_empty());
        if let Some(u) = &upload {
            file::validate_attachment(u)?;
        }

        let ticket = QueryTicket {
            ticket_id: 0,
            user_id: owner_id,
            module_id: module.module_id,
            title: new.title.trim().to_string(),
            content: new.content,
            status: TicketStatus::Sent,
            material_id: None,
            time_created: now_millis(),
        };
        let (ticket, _) = self.store.insert_ticket(ticket, upload.as_ref()).await?;
        tracing::info!(
            "user {} opened ticket {} in module {}",
            owner_id,
            ticket.ticket_id,
            module.module_id
        );

        self.announce(&ticket, &module).await;
        let record = TicketRecord::new(ticket, Vec::new());
        self.project(&record).await
    }

    /// Tells the module's tutor-level followers about a new ticket.
    async fn announce(&self, ticket: &QueryTicket, module: &Module) {
        let res = async {
            let followers = self
                .subscriptions
                .subscribers(SubscriptionTarget::Module(module.module_id))
                .await?;
            let tutors = self.users.get_many(followers).await?;
            let title = format!("New query ticket in {}", module.name);
            let message = format!("\"{}\"", ticket.title);
            let items: Vec<NewNotification> = tutors
                .values()
                .filter(|u| u.access_level >= AccessLevel::Tutor && u.user_id != ticket.user_id)
                .map(|u| {
                    NewNotification::new(
                        u.user_id,
                        title.as_str(),
                        message.as_str(),
                        NotificationType::NewTicket,
                        Some(ticket.ticket_id),
                    )
                })
                .collect();
            self.notifier.notify_bulk(items).await
        };
        if let Err(e) = res.await {
            tracing::warn!("new-ticket notice for ticket {} failed: {}", ticket.ticket_id, e);
        }
    }

    pub async fn claim(&self, ticket_id: i64, caller: Caller) -> Result<TicketView> {
        require_tutor(&caller, "claim")?;
        match self
            .store
            .claim_ticket(ticket_id, caller.user_id, now_millis())
            .await?
        {
            ClaimOutcome::Claimed(record) => {
                tracing::info!("tutor {} claimed ticket {}", caller.user_id, ticket_id);
                self.project(&record).await
            }
            ClaimOutcome::NotFound => Err(Self::not_found(ticket_id)),
            ClaimOutcome::Rejected(TicketStatus::Received) => {
                Err(Error::conflict(TicketConflict::AlreadyClaimed))
            }
            ClaimOutcome::Rejected(TicketStatus::Responded) => {
                Err(Error::conflict(TicketConflict::AlreadyAnswered))
            }
            ClaimOutcome::Rejected(TicketStatus::Sent) => {
                Err(Error::system_error("claim rejected on an open ticket"))
            }
        }
    }

    /// Only a tutor with an earlier response row on the ticket (normally the claim marker)
    /// may answer. Follow-up answers are allowed once `Responded`.
    pub async fn respond(
        &self,
        ticket_id: i64,
        caller: Caller,
        content: &str,
        material_id: Option<i64>,
    ) -> Result<TicketView> {
        require_tutor(&caller, "answer")?;
        if content.trim().is_empty() {
            return Err(Error::bad_request("content is required"));
        }
        if content == constants::CLAIM_SENTINEL {
            return Err(Error::bad_request("that text is reserved"));
        }
        if let Some(id) = material_id {
            self.require_material(id).await?;
        }
        let record = match self
            .store
            .respond_ticket(ticket_id, caller.user_id, content, material_id, now_millis())
            .await?
        {
            RespondOutcome::Responded(record) => record,
            RespondOutcome::NotFound => return Err(Self::not_found(ticket_id)),
            RespondOutcome::NotClaimedByCaller(TicketStatus::Sent) => {
                return Err(Error::conflict(TicketConflict::NotClaimed))
            }
            RespondOutcome::NotClaimedByCaller(_) => {
                return Err(Error::conflict(TicketConflict::ClaimedByAnother))
            }
        };
        tracing::info!("tutor {} answered ticket {}", caller.user_id, ticket_id);

        let ticket = &record.ticket;
        let item = NewNotification::new(
            ticket.user_id,
            "Your query ticket has a response",
            format!("A tutor responded to \"{}\"", ticket.title).as_str(),
            NotificationType::TicketResponse,
            Some(ticket.ticket_id),
        );
        if let Err(e) = self.notifier.notify(item).await {
            tracing::warn!("response notice for ticket {} failed: {}", ticket_id, e);
        }
        self.project(&record).await
    }

    /// Students see their own tickets only.
    pub async fn get(&self, ticket_id: i64, caller: Caller) -> Result<TicketView> {
        let record = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| Self::not_found(ticket_id))?;
        if !caller.is_tutor() && record.ticket.user_id != caller.user_id {
            return Err(Error::forbidden("you may only view your own tickets"));
        }
        self.project(&record).await
    }

    /// Every ticket for tutors, the caller's own for students.
    pub async fn list(&self, caller: Caller) -> Result<Vec<TicketView>> {
        let filter = if caller.is_tutor() {
            TicketFilter::All
        } else {
            TicketFilter::OwnedBy(caller.user_id)
        };
        self.find(filter).await
    }

    /// Unclaimed tickets, optionally limited to some modules. Tutors only.
    pub async fn list_open(&self, caller: Caller, modules: Option<Vec<i64>>) -> Result<Vec<TicketView>> {
        require_tutor(&caller, "browse open")?;
        self.find(TicketFilter::Open(modules)).await
    }

    pub async fn list_for_student(&self, caller: Caller, student_id: i64) -> Result<Vec<TicketView>> {
        if !caller.is_tutor() && caller.user_id != student_id {
            return Err(Error::forbidden("you may only view your own tickets"));
        }
        self.find(TicketFilter::OwnedBy(student_id)).await
    }

    /// Tickets the tutor has claimed or answered. A tutor may only ask about themself.
    pub async fn list_for_tutor(&self, caller: Caller, tutor_id: i64) -> Result<Vec<TicketView>> {
        require_tutor(&caller, "list assigned")?;
        if caller.user_id != tutor_id {
            return Err(Error::forbidden("you may only view your own assignments"));
        }
        self.find(TicketFilter::RespondedBy(tutor_id)).await
    }

    async fn find(&self, filter: TicketFilter) -> Result<Vec<TicketView>> {
        let records = self.store.find_tickets(filter).await?;
        let mut out = Vec::with_capacity(records.len());
        for record in &records {
            out.push(self.project(record).await?);
        }
        Ok(out)
    }

    async fn project(&self, record: &TicketRecord) -> Result<TicketView> {
        let ticket = &record.ticket;
        let owner = self.users.get(ticket.user_id).await?;
        let module = self.store.get_module(ticket.module_id).await?;
        let material: Option<Material> = match ticket.material_id {
            Some(id) => self.store.get_material(id).await?,
            None => None,
        };
        let tutor = match record.current_response() {
            Some(r) => self.users.get(r.user_id).await?,
            None => None,
        };
        Ok(TicketView::project(
            record,
            owner.as_ref(),
            module.as_ref(),
            material.as_ref(),
            tutor.as_ref(),
        ))
    }

    async fn require_module(&self, module_id: i64) -> Result<Module> {
        self.store
            .get_module(module_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("module {} not found", module_id).as_str()))
    }

    async fn require_material(&self, material_id: i64) -> Result<Material> {
        self.store
            .get_material(material_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("material {} not found", material_id).as_str()))
    }

    fn not_found(ticket_id: i64) -> Error {
        Error::not_found(format!("ticket {} not found", ticket_id).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::types::error::ErrorType;

    fn caller(user: &crate::model::user::User) -> Caller {
        Caller::new(user.user_id, user.access_level)
    }

    fn ticket(title: &str, module_id: i64) -> NewTicket {
        NewTicket {
            title: title.to_string(),
            content: "I am stuck on the base case".to_string(),
            module_id,
        }
    }

    fn conflict_of(err: Error) -> Option<TicketConflict> {
        match err.error_type {
            ErrorType::Conflict(c) => Some(c),
            _ => None,
        }
    }

    #[tokio::test]
    async fn claim_then_respond() {
        let fx = Fixture::new();
        let student = fx.user("Stu", AccessLevel::Student);
        let tutor_a = fx.user("Ann", AccessLevel::Tutor);
        let tutor_b = fx.user("Ben", AccessLevel::Tutor);
        let module = fx.module("Programming").await;
        let tickets = &fx.state.tickets;

        let view = tickets
            .create(student.user_id, ticket("Help with recursion", module.module_id), None)
            .await
            .unwrap();
        assert_eq!(view.status, TicketStatus::Sent);
        assert_eq!(view.material_id, None);
        assert_eq!(view.module_name, "Programming");

        let claimed = tickets.claim(view.ticket_id, caller(&tutor_a)).await.unwrap();
        assert_eq!(claimed.status, TicketStatus::Received);
        assert_eq!(claimed.tutor_id, Some(tutor_a.user_id));
        assert_eq!(claimed.response_content, None);
        let record = fx.store.get_ticket(view.ticket_id).await.unwrap().unwrap();
        assert_eq!(record.responses.len(), 1);
        assert_eq!(record.responses[0].content, constants::CLAIM_SENTINEL);
        assert_eq!(record.responses[0].user_id, tutor_a.user_id);

        let err = tickets.claim(view.ticket_id, caller(&tutor_b)).await.unwrap_err();
        assert_eq!(conflict_of(err), Some(TicketConflict::AlreadyClaimed));

        let answered = tickets
            .respond(view.ticket_id, caller(&tutor_a), "See attached notes", None)
            .await
            .unwrap();
        assert_eq!(answered.status, TicketStatus::Responded);
        assert_eq!(answered.response_content.as_deref(), Some("See attached notes"));
        assert_eq!(answered.tutor_id, Some(tutor_a.user_id));
        assert_eq!(answered.tutor_name, Some(tutor_a.display_name()));

        let err = tickets.claim(view.ticket_id, caller(&tutor_b)).await.unwrap_err();
        assert_eq!(conflict_of(err), Some(TicketConflict::AlreadyAnswered));

        let notes = fx.state.notifier.list(student.user_id, false).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationType::TicketResponse);
        assert_eq!(notes[0].related_id, Some(view.ticket_id));
    }

    #[tokio::test]
    async fn respond_requires_own_claim() {
        let fx = Fixture::new();
        let student = fx.user("Stu", AccessLevel::Student);
        let tutor_a = fx.user("Ann", AccessLevel::Tutor);
        let tutor_b = fx.user("Ben", AccessLevel::Admin);
        let module = fx.module("Networks").await;
        let tickets = &fx.state.tickets;
        let t = tickets
            .create(student.user_id, ticket("Subnetting", module.module_id), None)
            .await
            .unwrap();

        let err = tickets
            .respond(t.ticket_id, caller(&tutor_b), "It is /24", None)
            .await
            .unwrap_err();
        assert_eq!(conflict_of(err), Some(TicketConflict::NotClaimed));

        tickets.claim(t.ticket_id, caller(&tutor_a)).await.unwrap();
        let err = tickets
            .respond(t.ticket_id, caller(&tutor_b), "It is /24", None)
            .await
            .unwrap_err();
        assert_eq!(conflict_of(err), Some(TicketConflict::ClaimedByAnother));

        let err = tickets
            .respond(t.ticket_id, caller(&student), "me too", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::Forbidden);

        tickets
            .respond(t.ticket_id, caller(&tutor_a), "It is /24", None)
            .await
            .unwrap();
        let follow_up = tickets
            .respond(t.ticket_id, caller(&tutor_a), "Or /16 for the lab", None)
            .await
            .unwrap();
        assert_eq!(follow_up.response_content.as_deref(), Some("Or /16 for the lab"));
        assert!(tickets.claim(404, caller(&tutor_a)).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let fx = Fixture::new();
        let student = fx.user("Stu", AccessLevel::Student);
        let module = fx.module("Compilers").await;
        let t = fx
            .state
            .tickets
            .create(student.user_id, ticket("Parsing", module.module_id), None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let tutor = fx.user(format!("Tutor{}", i).as_str(), AccessLevel::Tutor);
            let engine = fx.state.tickets.clone();
            let id = t.ticket_id;
            handles.push(tokio::spawn(async move { engine.claim(id, caller(&tutor)).await }));
        }
        let mut wins = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert_eq!(conflict_of(e), Some(TicketConflict::AlreadyClaimed)),
            }
        }
        assert_eq!(wins, 1);
        let record = fx.store.get_ticket(t.ticket_id).await.unwrap().unwrap();
        assert_eq!(record.ticket.status, TicketStatus::Received);
        assert_eq!(record.responses.iter().filter(|r| r.is_claim()).count(), 1);
    }

    #[tokio::test]
    async fn students_only_see_their_own() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let bob = fx.user("Bob", AccessLevel::Student);
        let tutor = fx.user("Ann", AccessLevel::Tutor);
        let m1 = fx.module("One").await;
        let m2 = fx.module("Two").await;
        let tickets = &fx.state.tickets;
        let t1 = tickets.create(ada.user_id, ticket("First", m1.module_id), None).await.unwrap();
        tickets.create(bob.user_id, ticket("Second", m2.module_id), None).await.unwrap();

        assert_eq!(
            tickets.get(t1.ticket_id, caller(&bob)).await.unwrap_err().error_type,
            ErrorType::Forbidden
        );
        assert!(tickets.get(t1.ticket_id, caller(&ada)).await.is_ok());
        assert!(tickets.get(t1.ticket_id, caller(&tutor)).await.is_ok());

        assert_eq!(tickets.list(caller(&ada)).await.unwrap().len(), 1);
        assert_eq!(tickets.list(caller(&tutor)).await.unwrap().len(), 2);
        assert!(tickets.list_for_student(caller(&bob), ada.user_id).await.is_err());
        assert_eq!(
            tickets.list_for_student(caller(&tutor), ada.user_id).await.unwrap().len(),
            1
        );
        assert!(tickets.list_open(caller(&ada), None).await.is_err());
        let open = tickets
            .list_open(caller(&tutor), Some(vec![m2.module_id]))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Second");

        tickets.claim(t1.ticket_id, caller(&tutor)).await.unwrap();
        let mine = tickets.list_for_tutor(caller(&tutor), tutor.user_id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(tickets.list_for_tutor(caller(&tutor), ada.user_id).await.is_err());
        assert_eq!(tickets.list_open(caller(&tutor), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_attachment_leaves_nothing_behind() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let module = fx.module("Security").await;
        let tickets = &fx.state.tickets;

        let exe = Upload::new("payload.exe", "application/octet-stream", vec![1, 2, 3]);
        let err = tickets
            .create(ada.user_id, ticket("Malware lab", module.module_id), Some(exe))
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::BadRequest);
        let big = Upload::new("dump.pdf", "application/pdf", vec![0; constants::MAX_ATTACHMENT_SIZE + 1]);
        assert!(tickets
            .create(ada.user_id, ticket("Big file", module.module_id), Some(big))
            .await
            .is_err());
        assert!(tickets.list(caller(&ada)).await.unwrap().is_empty());

        let pdf = Upload::new("notes.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        let view = tickets
            .create(ada.user_id, ticket("Lab notes", module.module_id), Some(pdf))
            .await
            .unwrap();
        assert_eq!(view.file_name.as_deref(), Some("notes.pdf"));
        assert_eq!(view.file_size, Some(8));
    }

    #[tokio::test]
    async fn create_checks_fields_and_tells_tutors() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let peer = fx.user("Pip", AccessLevel::Student);
        let tutor = fx.user("Ann", AccessLevel::Tutor);
        let module = fx.module("Maths").await;
        for u in [&peer, &tutor] {
            fx.state
                .subscriptions
                .subscribe(u.user_id, SubscriptionTarget::Module(module.module_id))
                .await
                .unwrap();
        }
        let tickets = &fx.state.tickets;

        let long = "x".repeat(constants::MAX_TICKET_TITLE_LEN + 1);
        assert!(tickets.create(ada.user_id, ticket(&long, module.module_id), None).await.is_err());
        assert!(tickets.create(ada.user_id, ticket("  ", module.module_id), None).await.is_err());
        assert!(tickets
            .create(ada.user_id, ticket("Limits", 999), None)
            .await
            .unwrap_err()
            .is_not_found());

        tickets
            .create(ada.user_id, ticket("Limits", module.module_id), None)
            .await
            .unwrap();
        let notes = fx.state.notifier.list(tutor.user_id, false).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationType::NewTicket);
        assert!(fx.state.notifier.list(peer.user_id, false).await.unwrap().is_empty());
    }
}
