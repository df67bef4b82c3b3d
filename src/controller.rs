//! The student screen's state machine.
//!
//! [`RecordController`] owns the listed records and the single add/edit form. Every user intent
//! is a method that either moves the screen to its next phase or is refused with an
//! [`IntentError`]. Intents that need the store hand back a [`StoreRequest`]; whoever performs
//! it feeds the outcome back through [`RecordController::resolve`].
//!
//! The list is never patched locally. Every successful insert, update or delete is followed by
//! a fresh list of the owner's records, and a failed one leaves everything where it was.

use crate::{
    data::record::{Field, FormDraft, NewRecord, Record, RecordFields},
    error::{
        ForeignRecordSnafu, IntentError, InvalidSnafu, NotAllowedSnafu, StoreError,
        UnknownRecordSnafu,
    },
    session::Identity,
};
use snafu::{OptionExt, ResultExt};
use std::mem;
use uuid::Uuid;

pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    List { owner_id: Uuid },
    Insert(NewRecord),
    Update { id: Uuid, fields: RecordFields },
    Delete { id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub ticket: Ticket,
    pub op: StoreOp,
}

#[derive(Debug)]
pub enum StoreReply {
    Listed(Result<Vec<Record>, StoreError>),
    Done(Result<(), StoreError>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

/// The shared form: which record it edits (if any) and what's been typed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenForm {
    pub target: Option<Record>,
    pub draft: FormDraft,
}

impl OpenForm {
    fn create() -> Self {
        Self {
            target: None,
            draft: FormDraft::empty(),
        }
    }

    fn edit(record: Record) -> Self {
        Self {
            draft: FormDraft::seeded_from(&record),
            target: Some(record),
        }
    }

    pub const fn mode(&self) -> FormMode {
        match self.target {
            Some(_) => FormMode::Edit,
            None => FormMode::Create,
        }
    }

    pub const fn submit_label(&self, submitting: bool) -> &'static str {
        match (submitting, self.mode()) {
            (true, _) => "Submitting…",
            (false, FormMode::Create) => "Create",
            (false, FormMode::Edit) => "Update",
        }
    }

    const fn mutation(&self) -> Mutation {
        match self.mode() {
            FormMode::Create => Mutation::Create,
            FormMode::Edit => Mutation::Update,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Idle,
    FormOpen(OpenForm),
    Submitting { form: OpenForm, ticket: Ticket },
    ConfirmingDelete { id: Uuid },
    Deleting { id: Uuid, ticket: Ticket },
    Exited,
}

impl Phase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Idle => "idle",
            Self::FormOpen(_) => "editing",
            Self::Submitting { .. } => "submitting",
            Self::ConfirmingDelete { .. } => "confirming a delete",
            Self::Deleting { .. } => "deleting",
            Self::Exited => "exited",
        }
    }

    /// The form as the user currently sees it, and whether it's mid-submit.
    pub const fn form(&self) -> Option<(&OpenForm, bool)> {
        match self {
            Self::FormOpen(form) => Some((form, false)),
            Self::Submitting { form, .. } => Some((form, true)),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A toast for the user. Never blocks anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mutation {
    Create,
    Update,
    Delete,
}

impl Mutation {
    const fn succeeded(self) -> &'static str {
        match self {
            Self::Create => "Student created!",
            Self::Update => "Student updated!",
            Self::Delete => "Student deleted!",
        }
    }

    const fn failed(self) -> &'static str {
        match self {
            Self::Create | Self::Update => "Error saving student",
            Self::Delete => "Error deleting student",
        }
    }
}

/// What the screen looks like right now, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub identity: Identity,
    pub phase: Phase,
    pub records: Vec<Record>,
}

#[derive(Debug)]
pub struct RecordController {
    identity: Identity,
    records: Vec<Record>,
    phase: Phase,
    next_ticket: Ticket,
    list_ticket: Option<Ticket>,
    //mutations whose form was cancelled while they were in flight
    detached: Vec<(Ticket, Mutation)>,
    refresh_owed: bool,
    notices: Vec<Notice>,
}

impl RecordController {
    /// Starts in [`Phase::Loading`], returning the first list request for `identity`.
    pub fn new(identity: Identity) -> (Self, StoreRequest) {
        let mut controller = Self {
            identity,
            records: Vec::new(),
            phase: Phase::Idle,
            next_ticket: 0,
            list_ticket: None,
            detached: Vec::new(),
            refresh_owed: false,
            notices: Vec::new(),
        };
        let request = controller.start_refresh();
        (controller, request)
    }

    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn edit_target(&self) -> Option<&Record> {
        self.phase.form().and_then(|(form, _)| form.target.as_ref())
    }

    pub fn draft(&self) -> Option<&FormDraft> {
        self.phase.form().map(|(form, _)| &form.draft)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            identity: self.identity.clone(),
            phase: self.phase.clone(),
            records: self.records.clone(),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        mem::take(&mut self.notices)
    }

    pub fn open_create(&mut self) -> Result<(), IntentError> {
        self.expect_idle("open the create form")?;
        self.set_phase(Phase::FormOpen(OpenForm::create()));
        Ok(())
    }

    pub fn open_edit(&mut self, id: Uuid) -> Result<(), IntentError> {
        self.expect_idle("open the edit form")?;
        let record = self.listed(id)?.clone();
        self.set_phase(Phase::FormOpen(OpenForm::edit(record)));
        Ok(())
    }

    pub fn edit_field(&mut self, field: Field, value: impl Into<String>) -> Result<(), IntentError> {
        self.ensure_live()?;
        let Phase::FormOpen(form) = &mut self.phase else {
            return self.refuse("edit the form");
        };
        form.draft.set(field, value);
        Ok(())
    }

    /// Closes the form without touching the store. If a submit is still in flight it carries
    /// on; should it succeed, the list is refreshed once the screen is idle.
    pub fn cancel(&mut self) -> Result<Option<StoreRequest>, IntentError> {
        self.ensure_live()?;
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::FormOpen(_) => {}
            Phase::Submitting { form, ticket } => {
                debug!(ticket, "form cancelled mid-submit");
                self.detached.push((ticket, form.mutation()));
            }
            other => {
                self.phase = other;
                return self.refuse("cancel");
            }
        }

        debug!("form closed");
        Ok(self.settle())
    }

    pub fn submit(&mut self) -> Result<StoreRequest, IntentError> {
        self.ensure_live()?;
        let form = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::FormOpen(form) => form,
            other => {
                self.phase = other;
                return self.refuse("submit");
            }
        };

        let fields = match form.draft.validate() {
            Ok(fields) => fields,
            Err(e) => {
                self.phase = Phase::FormOpen(form);
                return Err(e).context(InvalidSnafu);
            }
        };
        let op = match &form.target {
            None => StoreOp::Insert(NewRecord {
                fields,
                owner_id: self.identity.id,
            }),
            Some(target) => StoreOp::Update {
                id: target.id,
                fields,
            },
        };

        let ticket = self.ticket();
        self.set_phase(Phase::Submitting { form, ticket });
        Ok(StoreRequest { ticket, op })
    }

    pub fn request_delete(&mut self, id: Uuid) -> Result<(), IntentError> {
        self.expect_idle("request a delete")?;
        self.listed(id)?;
        self.set_phase(Phase::ConfirmingDelete { id });
        Ok(())
    }

    pub fn cancel_delete(&mut self) -> Result<Option<StoreRequest>, IntentError> {
        self.ensure_live()?;
        let Phase::ConfirmingDelete { .. } = self.phase else {
            return self.refuse("cancel a delete");
        };
        self.set_phase(Phase::Idle);
        Ok(self.settle())
    }

    pub fn confirm_delete(&mut self) -> Result<StoreRequest, IntentError> {
        self.ensure_live()?;
        let Phase::ConfirmingDelete { id } = self.phase else {
            return self.refuse("confirm a delete");
        };

        let ticket = self.ticket();
        self.set_phase(Phase::Deleting { id, ticket });
        Ok(StoreRequest {
            ticket,
            op: StoreOp::Delete { id },
        })
    }

    pub fn refresh(&mut self) -> Result<StoreRequest, IntentError> {
        self.expect_idle("refresh")?;
        Ok(self.start_refresh())
    }

    /// A session change from the gate. The same account just gets its label updated; anything
    /// else means the records on screen are no longer ours.
    pub fn session_changed(&mut self, session: Option<Identity>) {
        match session {
            Some(identity) if identity.id == self.identity.id => self.identity = identity,
            _ => self.identity_lost(),
        }
    }

    pub fn identity_lost(&mut self) {
        if self.phase == Phase::Exited {
            return;
        }

        info!(id = %self.identity.id, "identity lost, leaving the student screen");
        self.records.clear();
        self.detached.clear();
        self.list_ticket = None;
        self.refresh_owed = false;
        self.set_phase(Phase::Exited);
    }

    pub fn is_exited(&self) -> bool {
        self.phase == Phase::Exited
    }

    /// Feeds back the outcome of a request. Returns the follow-up request, if any.
    pub fn resolve(&mut self, ticket: Ticket, reply: StoreReply) -> Option<StoreRequest> {
        if self.phase == Phase::Exited {
            debug!(ticket, "ignoring reply after exit");
            return None;
        }

        match reply {
            StoreReply::Listed(result) if self.list_ticket == Some(ticket) => {
                self.list_ticket = None;
                self.finish_list(result);
                self.settle()
            }
            StoreReply::Done(result) => self.finish_mutation(ticket, result),
            StoreReply::Listed(_) => {
                warn!(ticket, "ignoring unexpected list reply");
                None
            }
        }
    }

    fn finish_list(&mut self, result: Result<Vec<Record>, StoreError>) {
        let result = result.and_then(|records| {
            match records.iter().find(|r| r.owner_id != self.identity.id) {
                Some(foreign) => ForeignRecordSnafu {
                    id: foreign.id,
                    owner_id: foreign.owner_id,
                }
                .fail(),
                None => Ok(records),
            }
        });

        match result {
            Ok(records) => {
                debug!(count = records.len(), "records listed");
                self.records = records;
            }
            Err(e) => {
                warn!(?e, "unable to list records");
                self.notices
                    .push(Notice::error(format!("Error loading students: {e}")));
            }
        }

        if self.phase == Phase::Loading {
            self.set_phase(Phase::Idle);
        }
    }

    fn finish_mutation(
        &mut self,
        ticket: Ticket,
        result: Result<(), StoreError>,
    ) -> Option<StoreRequest> {
        let phase = mem::replace(&mut self.phase, Phase::Idle);
        let (mutation, on_failure) = match phase {
            Phase::Submitting { form, ticket: t } if t == ticket => {
                (form.mutation(), Phase::FormOpen(form))
            }
            Phase::Deleting { ticket: t, .. } if t == ticket => (Mutation::Delete, Phase::Idle),
            other => {
                self.phase = other;
                let Some(index) = self.detached.iter().position(|(t, _)| *t == ticket) else {
                    warn!(ticket, "ignoring reply for unknown request");
                    return None;
                };
                let (_, mutation) = self.detached.remove(index);
                return self.finish_detached(mutation, result);
            }
        };

        match result {
            Ok(()) => {
                self.notices.push(Notice::success(mutation.succeeded()));
                self.refresh_owed = false;
                self.set_phase(Phase::Idle);
                Some(self.start_refresh())
            }
            Err(e) => {
                warn!(?e, ?mutation, "store rejected mutation");
                self.notices
                    .push(Notice::error(format!("{}: {e}", mutation.failed())));
                self.set_phase(on_failure);
                self.settle()
            }
        }
    }

    fn finish_detached(
        &mut self,
        mutation: Mutation,
        result: Result<(), StoreError>,
    ) -> Option<StoreRequest> {
        match result {
            Ok(()) => {
                self.notices.push(Notice::success(mutation.succeeded()));
                self.refresh_owed = true;
                self.settle()
            }
            Err(e) => {
                warn!(?e, ?mutation, "store rejected cancelled mutation");
                self.notices
                    .push(Notice::error(format!("{}: {e}", mutation.failed())));
                None
            }
        }
    }

    //pays off a refresh owed by a detached mutation as soon as nothing else is going on
    fn settle(&mut self) -> Option<StoreRequest> {
        if self.refresh_owed && self.phase == Phase::Idle && self.list_ticket.is_none() {
            self.refresh_owed = false;
            Some(self.start_refresh())
        } else {
            None
        }
    }

    fn start_refresh(&mut self) -> StoreRequest {
        let ticket = self.ticket();
        self.list_ticket = Some(ticket);
        self.set_phase(Phase::Loading);
        StoreRequest {
            ticket,
            op: StoreOp::List {
                owner_id: self.identity.id,
            },
        }
    }

    fn ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(from = self.phase.name(), to = phase.name(), "phase change");
        self.phase = phase;
    }

    fn listed(&self, id: Uuid) -> Result<&Record, IntentError> {
        self.records
            .iter()
            .find(|record| record.id == id)
            .context(UnknownRecordSnafu { id })
    }

    fn ensure_live(&self) -> Result<(), IntentError> {
        match self.phase {
            Phase::Exited => Err(IntentError::ScreenExited),
            _ => Ok(()),
        }
    }

    fn expect_idle(&self, intent: &'static str) -> Result<(), IntentError> {
        self.ensure_live()?;
        match self.phase {
            Phase::Idle => Ok(()),
            _ => self.refuse(intent),
        }
    }

    fn refuse<T>(&self, intent: &'static str) -> Result<T, IntentError> {
        NotAllowedSnafu {
            intent,
            phase: self.phase.name(),
        }
        .fail()
    }
}
