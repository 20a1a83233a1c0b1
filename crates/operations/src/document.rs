use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmaster_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Event, ValueObject};
use stockmaster_products::{LedgerOp, ProductId};

use crate::reference::DocumentNumber;
use crate::status::{self, DocumentStatus, DocumentType, SameStatus, TransitionPlan};

/// Stock document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Document line item.
///
/// `reserved` is only ever non-zero on a delivery in `ready`, where it equals
/// `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: u64,
    pub reserved: u64,
}

impl ValueObject for DocumentLine {}

/// Line as supplied by a caller (no line number yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Aggregate root: StockDocument (receipt or delivery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDocument {
    id: DocumentId,
    number: Option<DocumentNumber>,
    counterparty: String,
    contact: Option<String>,
    date: Option<NaiveDate>,
    schedule_date: Option<NaiveDate>,
    status: DocumentStatus,
    lines: Vec<DocumentLine>,
    next_line_no: u32,
    version: u64,
    created: bool,
    deleted: bool,
}

impl StockDocument {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            number: None,
            counterparty: String::new(),
            contact: None,
            date: None,
            schedule_date: None,
            status: DocumentStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> DocumentId {
        self.id
    }

    pub fn number(&self) -> Option<DocumentNumber> {
        self.number
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.number.map(|n| n.document_type)
    }

    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }

    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn schedule_date(&self) -> Option<NaiveDate> {
        self.schedule_date
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Whether any line references the product.
    pub fn references(&self, product_id: ProductId) -> bool {
        self.lines.iter().any(|l| l.product_id == product_id)
    }

    /// Products on the document, sorted and deduplicated.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl AggregateRoot for StockDocument {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocument {
    pub document_id: DocumentId,
    pub number: DocumentNumber,
    pub counterparty: String,
    pub contact: Option<String>,
    pub date: NaiveDate,
    /// Defaults to `date`.
    pub schedule_date: Option<NaiveDate>,
    pub lines: Vec<LineInput>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub document_id: DocumentId,
    pub line: LineInput,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub document_id: DocumentId,
    pub target: DocumentStatus,
    pub same_status: SameStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteDocument (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDocument {
    pub document_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCommand {
    CreateDocument(CreateDocument),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    ChangeStatus(ChangeStatus),
    DeleteDocument(DeleteDocument),
}

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: DocumentId,
    pub number: DocumentNumber,
    pub counterparty: String,
    pub contact: Option<String>,
    pub date: NaiveDate,
    pub schedule_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
///
/// Carries the ledger plan; the caller must apply every effect to the affected
/// products in the same unit of work that persists this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub document_id: DocumentId,
    pub plan: TransitionPlan,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeleted {
    pub document_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    LineAdded(LineAdded),
    LineRemoved(LineRemoved),
    StatusChanged(StatusChanged),
    DocumentDeleted(DocumentDeleted),
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "operations.document.created",
            DocumentEvent::LineAdded(_) => "operations.document.line_added",
            DocumentEvent::LineRemoved(_) => "operations.document.line_removed",
            DocumentEvent::StatusChanged(_) => "operations.document.status_changed",
            DocumentEvent::DocumentDeleted(_) => "operations.document.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::LineAdded(e) => e.occurred_at,
            DocumentEvent::LineRemoved(e) => e.occurred_at,
            DocumentEvent::StatusChanged(e) => e.occurred_at,
            DocumentEvent::DocumentDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockDocument {
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(e) => {
                self.id = e.document_id;
                self.number = Some(e.number);
                self.counterparty = e.counterparty.clone();
                self.contact = e.contact.clone();
                self.date = Some(e.date);
                self.schedule_date = Some(e.schedule_date);
                self.status = DocumentStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created = true;
            }
            DocumentEvent::LineAdded(e) => {
                self.lines.push(DocumentLine {
                    line_no: e.line_no,
                    product_id: e.product_id,
                    quantity: e.quantity,
                    reserved: 0,
                });
                self.next_line_no = e.line_no + 1;
            }
            DocumentEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            DocumentEvent::StatusChanged(e) => {
                for effect in &e.plan.effects {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.line_no == effect.line_no)
                    {
                        match effect.op {
                            LedgerOp::Reserve => line.reserved = effect.quantity,
                            LedgerOp::Release | LedgerOp::Consume => line.reserved = 0,
                            LedgerOp::Receive | LedgerOp::RemoveUnreserved => {}
                        }
                    }
                }
                self.status = e.plan.to;
            }
            DocumentEvent::DocumentDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DocumentCommand::CreateDocument(cmd) => self.handle_create(cmd),
            DocumentCommand::AddLine(cmd) => self.handle_add_line(cmd),
            DocumentCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            DocumentCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            DocumentCommand::DeleteDocument(cmd) => self.handle_delete(cmd),
        }
    }
}

impl StockDocument {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_document_id(&self, document_id: DocumentId) -> Result<(), DomainError> {
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != DocumentStatus::Draft {
            return Err(DomainError::document_locked(self.status));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("document already exists"));
        }
        self.ensure_document_id(cmd.document_id)?;

        let counterparty = cmd.counterparty.trim();
        if counterparty.is_empty() {
            return Err(DomainError::validation(match cmd.number.document_type {
                DocumentType::Receipt => "supplier cannot be empty",
                DocumentType::Delivery => "customer cannot be empty",
            }));
        }

        let schedule_date = cmd.schedule_date.unwrap_or(cmd.date);
        if schedule_date < cmd.date {
            return Err(DomainError::validation(
                "schedule date cannot be before the document date",
            ));
        }

        let mut events = vec![DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: cmd.document_id,
            number: cmd.number,
            counterparty: counterparty.to_string(),
            contact: cmd
                .contact
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            date: cmd.date,
            schedule_date,
            occurred_at: cmd.occurred_at,
        })];

        for (idx, line) in cmd.lines.iter().enumerate() {
            ensure_positive_quantity(line.quantity)?;
            events.push(DocumentEvent::LineAdded(LineAdded {
                document_id: cmd.document_id,
                line_no: idx as u32 + 1,
                product_id: line.product_id,
                quantity: line.quantity,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_draft()?;
        ensure_positive_quantity(cmd.line.quantity)?;

        Ok(vec![DocumentEvent::LineAdded(LineAdded {
            document_id: cmd.document_id,
            line_no: self.next_line_no,
            product_id: cmd.line.product_id,
            quantity: cmd.line.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_draft()?;

        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![DocumentEvent::LineRemoved(LineRemoved {
            document_id: cmd.document_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_document_id(cmd.document_id)?;

        let document_type = self
            .document_type()
            .ok_or_else(|| DomainError::invariant("document type must be set"))?;

        let plan = status::plan(
            document_type,
            self.status,
            cmd.target,
            &self.lines,
            cmd.same_status,
        )?;

        if plan.is_noop() {
            return Ok(vec![]);
        }

        Ok(vec![DocumentEvent::StatusChanged(StatusChanged {
            document_id: cmd.document_id,
            plan,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_draft()?;

        Ok(vec![DocumentEvent::DocumentDeleted(DocumentDeleted {
            document_id: cmd.document_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn ensure_positive_quantity(quantity: u64) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}
