use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spicecart_core::{Aggregate, AggregateRoot, DomainError};
use spicecart_events::Event;

use crate::contact::{normalize_email, normalize_phone, DeliveryAddress};

spicecart_core::typed_id!(
    /// Customer identifier.
    CustomerId
);

const MAX_NAME_LEN: usize = 100;

fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Aggregate root: Customer.
///
/// The phone number is the natural key (customers are looked up by it when
/// they check out again) and never changes after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    name: String,
    phone: String,
    email: Option<String>,
    address: Option<DeliveryAddress>,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Customer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CustomerId) -> Self {
        Self {
            id,
            name: String::new(),
            phone: String::new(),
            email: None,
            address: None,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn address(&self) -> Option<&DeliveryAddress> {
        self.address.as_ref()
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: DeliveryAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact. Replaces name, email and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub customer_id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub address: DeliveryAddress,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    RegisterCustomer(RegisterCustomer),
    UpdateContact(UpdateContact),
}

/// Event: CustomerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: DeliveryAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContactUpdated {
    pub customer_id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub address: DeliveryAddress,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegistered),
    CustomerContactUpdated(CustomerContactUpdated),
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "customers.customer.registered",
            CustomerEvent::CustomerContactUpdated(_) => "customers.customer.contact_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.occurred_at,
            CustomerEvent::CustomerContactUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(e) => {
                self.id = e.customer_id;
                self.name = e.name.clone();
                self.phone = e.phone.clone();
                self.email = e.email.clone();
                self.address = Some(e.address.clone());
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            CustomerEvent::CustomerContactUpdated(e) => {
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.address = Some(e.address.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer(cmd) => self.handle_register(cmd),
            CustomerCommand::UpdateContact(cmd) => self.handle_update_contact(cmd),
        }
    }
}

impl Customer {
    fn handle_register(&self, cmd: &RegisterCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("customer already exists"));
        }

        Ok(vec![CustomerEvent::CustomerRegistered(CustomerRegistered {
            customer_id: cmd.customer_id,
            name: validate_name(&cmd.name)?,
            phone: normalize_phone(&cmd.phone)?,
            email: normalize_email(cmd.email.as_deref())?,
            address: cmd.address.normalized()?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_contact(
        &self,
        cmd: &UpdateContact,
    ) -> Result<Vec<CustomerEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("customer"));
        }
        if self.id != cmd.customer_id {
            return Err(DomainError::invariant("customer_id mismatch"));
        }

        let name = validate_name(&cmd.name)?;
        let email = normalize_email(cmd.email.as_deref())?;
        let address = cmd.address.normalized()?;

        if name == self.name && email == self.email && Some(&address) == self.address.as_ref() {
            return Ok(vec![]);
        }

        Ok(vec![CustomerEvent::CustomerContactUpdated(CustomerContactUpdated {
            customer_id: cmd.customer_id,
            name,
            email,
            address,
            occurred_at: cmd.occurred_at,
        })])
    }
}
