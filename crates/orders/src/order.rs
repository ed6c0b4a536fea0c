use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spicecart_core::{Aggregate, AggregateRoot, DomainError, Money};
use spicecart_customers::{normalize_email, normalize_phone, CustomerId, DeliveryAddress};
use spicecart_events::Event;
use spicecart_products::ProductId;

use crate::{MAX_LINES, MAX_LINE_QUANTITY};

spicecart_core::typed_id!(
    /// Order identifier.
    OrderId
);

const MAX_NOTES_LEN: usize = 500;

/// Fulfilment status.
///
/// ```text
/// pending ──> confirmed ──> shipped ──> delivered
///    │            │
///    └────────────┴──> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Statuses that require an online payment to have been captured.
    fn requires_payment(self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Payment state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Payment {
    fn pending(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            gateway_order_id: None,
            payment_id: None,
            paid_at: None,
            failure_reason: None,
        }
    }
}

/// Who the order is for, as entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// A priced line, frozen at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pack_size: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    customer_id: Option<CustomerId>,
    contact: Option<ContactSnapshot>,
    address: Option<DeliveryAddress>,
    lines: Vec<OrderLine>,
    subtotal: Money,
    delivery_fee: Money,
    total: Money,
    notes: Option<String>,
    payment: Payment,
    status: OrderStatus,
    history: Vec<StatusChange>,
    idempotency_key: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            customer_id: None,
            contact: None,
            address: None,
            lines: Vec::new(),
            subtotal: Money::ZERO,
            delivery_fee: Money::ZERO,
            total: Money::ZERO,
            notes: None,
            payment: Payment::pending(PaymentMethod::Cod),
            status: OrderStatus::Pending,
            history: Vec::new(),
            idempotency_key: None,
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn contact(&self) -> Option<&ContactSnapshot> {
        self.contact.as_ref()
    }

    pub fn address(&self) -> Option<&DeliveryAddress> {
        self.address.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn is_paid(&self) -> bool {
        self.payment.status == PaymentStatus::Paid
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Lines must already be priced from the catalog (see `price_cart`); the
/// aggregate re-checks the arithmetic but has no access to current prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    pub contact: ContactSnapshot,
    pub address: DeliveryAddress,
    pub lines: Vec<OrderLine>,
    pub delivery_fee: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachGatewayOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachGatewayOrder {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CapturePayment (online payments, after signature verification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePayment {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub payment_id: String,
    /// Amount reported by the gateway, when known.
    pub amount: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FailPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub order_id: OrderId,
    pub payment_id: Option<String>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    AttachGatewayOrder(AttachGatewayOrder),
    CapturePayment(CapturePayment),
    FailPayment(FailPayment),
    ChangeStatus(ChangeStatus),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    pub contact: ContactSnapshot,
    pub address: DeliveryAddress,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatewayOrderAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderAttached {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentCaptured. `payment_id` is `None` for cash collected on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub payment_id: Option<String>,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub order_id: OrderId,
    pub payment_id: Option<String>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    GatewayOrderAttached(GatewayOrderAttached),
    PaymentCaptured(PaymentCaptured),
    PaymentFailed(PaymentFailed),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::GatewayOrderAttached(_) => "orders.order.gateway_order_attached",
            OrderEvent::PaymentCaptured(_) => "orders.order.payment_captured",
            OrderEvent::PaymentFailed(_) => "orders.order.payment_failed",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::GatewayOrderAttached(e) => e.occurred_at,
            OrderEvent::PaymentCaptured(e) => e.occurred_at,
            OrderEvent::PaymentFailed(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.customer_id = Some(e.customer_id);
                self.contact = Some(e.contact.clone());
                self.address = Some(e.address.clone());
                self.lines = e.lines.clone();
                self.subtotal = e.subtotal;
                self.delivery_fee = e.delivery_fee;
                self.total = e.total;
                self.notes = e.notes.clone();
                self.payment = Payment::pending(e.payment_method);
                self.status = OrderStatus::Pending;
                self.idempotency_key = e.idempotency_key.clone();
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::GatewayOrderAttached(e) => {
                self.payment.gateway_order_id = Some(e.gateway_order_id.clone());
            }
            OrderEvent::PaymentCaptured(e) => {
                self.payment.status = PaymentStatus::Paid;
                self.payment.payment_id = e.payment_id.clone();
                self.payment.paid_at = Some(e.occurred_at);
                self.payment.failure_reason = None;
            }
            OrderEvent::PaymentFailed(e) => {
                self.payment.status = PaymentStatus::Failed;
                self.payment.failure_reason = Some(e.reason.clone());
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
                self.history.push(StatusChange {
                    from: e.from,
                    to: e.to,
                    reason: e.reason.clone(),
                    at: e.occurred_at,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::AttachGatewayOrder(cmd) => self.handle_attach_gateway_order(cmd),
            OrderCommand::CapturePayment(cmd) => self.handle_capture(cmd),
            OrderCommand::FailPayment(cmd) => self.handle_fail(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("order"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_online(&self) -> Result<(), DomainError> {
        if self.payment.method != PaymentMethod::Online {
            return Err(DomainError::invariant(
                "cash-on-delivery orders are settled on delivery",
            ));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order_number cannot be empty"));
        }

        let name = cmd.contact.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let contact = ContactSnapshot {
            name: name.to_string(),
            phone: normalize_phone(&cmd.contact.phone)?,
            email: normalize_email(cmd.contact.email.as_deref())?,
        };
        let address = cmd.address.normalized()?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        if cmd.lines.len() > MAX_LINES {
            return Err(DomainError::validation(format!(
                "order cannot have more than {MAX_LINES} lines"
            )));
        }
        for (expected_no, line) in (1u32..).zip(cmd.lines.iter()) {
            if line.line_no != expected_no {
                return Err(DomainError::validation("line numbers must be sequential from 1"));
            }
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(DomainError::validation(format!(
                    "line {}: quantity must be between 1 and {MAX_LINE_QUANTITY}",
                    line.line_no
                )));
            }
            if line.unit_price.is_zero() {
                return Err(DomainError::validation(format!(
                    "line {}: unit_price must be positive",
                    line.line_no
                )));
            }
            if line.unit_price.checked_mul(line.quantity)? != line.line_total {
                return Err(DomainError::validation(format!(
                    "line {}: line_total does not equal unit_price x quantity",
                    line.line_no
                )));
            }
        }

        let subtotal = Money::sum(cmd.lines.iter().map(|l| l.line_total))?;
        let total = subtotal.checked_add(cmd.delivery_fee)?;

        let notes = cmd
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(DomainError::validation(format!(
                "notes must be at most {MAX_NOTES_LEN} characters"
            )));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            order_number: cmd.order_number.trim().to_string(),
            customer_id: cmd.customer_id,
            contact,
            address,
            lines: cmd.lines.clone(),
            subtotal,
            delivery_fee: cmd.delivery_fee,
            total,
            payment_method: cmd.payment_method,
            notes,
            idempotency_key: cmd.idempotency_key.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach_gateway_order(
        &self,
        cmd: &AttachGatewayOrder,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_online()?;

        let gateway_order_id = cmd.gateway_order_id.trim();
        if gateway_order_id.is_empty() {
            return Err(DomainError::validation("gateway_order_id cannot be empty"));
        }

        match self.payment.gateway_order_id.as_deref() {
            Some(existing) if existing == gateway_order_id => return Ok(vec![]),
            Some(_) => {
                return Err(DomainError::conflict(
                    "a different gateway order is already attached",
                ));
            }
            None => {}
        }

        if self.is_paid() {
            return Err(DomainError::invariant("order is already paid"));
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant("order is cancelled"));
        }

        Ok(vec![OrderEvent::GatewayOrderAttached(GatewayOrderAttached {
            order_id: cmd.order_id,
            gateway_order_id: gateway_order_id.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_capture(&self, cmd: &CapturePayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_online()?;

        let payment_id = cmd.payment_id.trim();
        if payment_id.is_empty() {
            return Err(DomainError::validation("payment_id cannot be empty"));
        }

        match self.payment.gateway_order_id.as_deref() {
            Some(attached) if attached == cmd.gateway_order_id.trim() => {}
            Some(_) => {
                return Err(DomainError::conflict(
                    "payment belongs to a different gateway order",
                ));
            }
            None => return Err(DomainError::invariant("no gateway order attached")),
        }

        if self.is_paid() {
            return match self.payment.payment_id.as_deref() {
                Some(existing) if existing == payment_id => Ok(vec![]),
                _ => Err(DomainError::conflict(
                    "order was already paid by a different payment",
                )),
            };
        }

        if let Some(amount) = cmd.amount {
            if amount != self.total {
                return Err(DomainError::conflict(format!(
                    "captured amount {amount} does not match order total {}",
                    self.total
                )));
            }
        }

        let mut events = vec![OrderEvent::PaymentCaptured(PaymentCaptured {
            order_id: cmd.order_id,
            method: PaymentMethod::Online,
            payment_id: Some(payment_id.to_string()),
            amount: self.total,
            occurred_at: cmd.occurred_at,
        })];

        if self.status == OrderStatus::Pending {
            events.push(OrderEvent::OrderStatusChanged(OrderStatusChanged {
                order_id: cmd.order_id,
                from: OrderStatus::Pending,
                to: OrderStatus::Confirmed,
                reason: Some("payment captured".to_string()),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_fail(&self, cmd: &FailPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_online()?;

        if self.is_paid() {
            return Ok(vec![]);
        }

        let reason = match cmd.reason.trim() {
            "" => "payment failed".to_string(),
            r => r.to_string(),
        };
        if self.payment.status == PaymentStatus::Failed
            && self.payment.failure_reason.as_deref() == Some(reason.as_str())
        {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::PaymentFailed(PaymentFailed {
            order_id: cmd.order_id,
            payment_id: cmd.payment_id.clone(),
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        let target = cmd.status;
        if target == self.status {
            return Ok(vec![]);
        }

        if !self.status.can_transition_to(target) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {} to {}",
                self.status, target
            )));
        }

        if self.payment.method == PaymentMethod::Online
            && target.requires_payment()
            && !self.is_paid()
        {
            return Err(DomainError::invariant(format!(
                "online payment must be captured before the order is {target}"
            )));
        }

        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let mut events = vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: target,
            reason,
            occurred_at: cmd.occurred_at,
        })];

        if target == OrderStatus::Delivered
            && self.payment.method == PaymentMethod::Cod
            && !self.is_paid()
        {
            events.push(OrderEvent::PaymentCaptured(PaymentCaptured {
                order_id: cmd.order_id,
                method: PaymentMethod::Cod,
                payment_id: None,
                amount: self.total,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicecart_core::AggregateId;
    use spicecart_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            line1: "22 Bazaar Road".to_string(),
            line2: None,
            landmark: None,
            city: "Kochi".to_string(),
            pincode: "682002".to_string(),
        }
    }

    fn line(line_no: u32, unit_price: u64, quantity: u32) -> OrderLine {
        OrderLine {
            line_no,
            product_id: ProductId::new(AggregateId::new()),
            sku: format!("SKU-{line_no}"),
            name: format!("Spice {line_no}"),
            pack_size: "100 g".to_string(),
            unit_price: Money::from_paise(unit_price),
            quantity,
            line_total: Money::from_paise(unit_price * u64::from(quantity)),
        }
    }

    fn place_cmd(order_id: OrderId, method: PaymentMethod) -> PlaceOrder {
        PlaceOrder {
            order_id,
            order_number: "SC-260101-ABC123".to_string(),
            customer_id: CustomerId::new(AggregateId::new()),
            contact: ContactSnapshot {
                name: "Ravi".to_string(),
                phone: "98470 11111".to_string(),
                email: None,
            },
            address: address(),
            lines: vec![line(1, 12000, 2), line(2, 8500, 1)],
            delivery_fee: Money::from_paise(4000),
            payment_method: method,
            notes: Some("  ring the bell ".to_string()),
            idempotency_key: None,
            occurred_at: test_time(),
        }
    }

    fn placed(method: PaymentMethod) -> Order {
        let id = OrderId::new(AggregateId::new());
        let mut order = Order::empty(id);
        execute(&mut order, &OrderCommand::PlaceOrder(place_cmd(id, method))).unwrap();
        order
    }

    fn change(order: &mut Order, status: OrderStatus) -> Result<Vec<OrderEvent>, DomainError> {
        let id = order.id_typed();
        execute(
            order,
            &OrderCommand::ChangeStatus(ChangeStatus {
                order_id: id,
                status,
                reason: None,
                occurred_at: test_time(),
            }),
        )
    }

    fn attach(order: &mut Order, gateway_order_id: &str) -> Result<Vec<OrderEvent>, DomainError> {
        let id = order.id_typed();
        execute(
            order,
            &OrderCommand::AttachGatewayOrder(AttachGatewayOrder {
                order_id: id,
                gateway_order_id: gateway_order_id.to_string(),
                occurred_at: test_time(),
            }),
        )
    }

    fn capture(
        order: &mut Order,
        gateway_order_id: &str,
        payment_id: &str,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        let id = order.id_typed();
        execute(
            order,
            &OrderCommand::CapturePayment(CapturePayment {
                order_id: id,
                gateway_order_id: gateway_order_id.to_string(),
                payment_id: payment_id.to_string(),
                amount: None,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn place_order_computes_totals() {
        let order = placed(PaymentMethod::Cod);
        assert_eq!(order.subtotal(), Money::from_paise(32500));
        assert_eq!(order.total(), Money::from_paise(36500));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment().status, PaymentStatus::Pending);
        assert_eq!(order.notes(), Some("ring the bell"));
        assert_eq!(order.contact().map(|c| c.phone.as_str()), Some("9847011111"));
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn place_order_rejects_tampered_line_total() {
        let id = OrderId::new(AggregateId::new());
        let mut cmd = place_cmd(id, PaymentMethod::Cod);
        cmd.lines[0].line_total = Money::from_paise(1);
        let err = Order::empty(id).handle(&OrderCommand::PlaceOrder(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn place_order_rejects_bad_quantities_and_empty_lines() {
        let id = OrderId::new(AggregateId::new());

        let mut cmd = place_cmd(id, PaymentMethod::Cod);
        cmd.lines = vec![line(1, 100, MAX_LINE_QUANTITY + 1)];
        assert!(matches!(
            Order::empty(id).handle(&OrderCommand::PlaceOrder(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = place_cmd(id, PaymentMethod::Cod);
        cmd.lines.clear();
        assert!(matches!(
            Order::empty(id).handle(&OrderCommand::PlaceOrder(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn cod_order_full_lifecycle_records_cash_on_delivery() {
        let mut order = placed(PaymentMethod::Cod);
        change(&mut order, OrderStatus::Confirmed).unwrap();
        change(&mut order, OrderStatus::Shipped).unwrap();
        let events = change(&mut order, OrderStatus::Delivered).unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            OrderEvent::PaymentCaptured(PaymentCaptured { method: PaymentMethod::Cod, payment_id: None, .. })
        ));
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.is_paid());
        assert_eq!(order.history().len(), 3);
    }

    #[test]
    fn repeated_status_change_is_a_noop() {
        let mut order = placed(PaymentMethod::Cod);
        change(&mut order, OrderStatus::Confirmed).unwrap();
        let version = order.version();

        let events = change(&mut order, OrderStatus::Confirmed).unwrap();
        assert!(events.is_empty());
        assert_eq!(order.version(), version);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut order = placed(PaymentMethod::Cod);
        assert!(matches!(
            change(&mut order, OrderStatus::Delivered),
            Err(DomainError::InvariantViolation(_))
        ));

        change(&mut order, OrderStatus::Cancelled).unwrap();
        assert!(matches!(
            change(&mut order, OrderStatus::Confirmed),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(order.status().is_terminal());
    }

    #[test]
    fn online_order_must_be_paid_before_confirmation() {
        let mut order = placed(PaymentMethod::Online);
        assert!(matches!(
            change(&mut order, OrderStatus::Confirmed),
            Err(DomainError::InvariantViolation(_))
        ));
        // Cancelling an unpaid online order is fine.
        assert!(change(&mut order, OrderStatus::Cancelled).is_ok());
    }

    #[test]
    fn capture_confirms_pending_online_order() {
        let mut order = placed(PaymentMethod::Online);
        attach(&mut order, "order_G1").unwrap();
        let events = capture(&mut order, "order_G1", "pay_P1").unwrap();

        assert_eq!(events.len(), 2);
        assert!(order.is_paid());
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.payment().payment_id.as_deref(), Some("pay_P1"));
    }

    #[test]
    fn capture_is_idempotent_for_the_same_payment() {
        let mut order = placed(PaymentMethod::Online);
        attach(&mut order, "order_G1").unwrap();
        capture(&mut order, "order_G1", "pay_P1").unwrap();

        assert!(capture(&mut order, "order_G1", "pay_P1").unwrap().is_empty());
        assert!(matches!(
            capture(&mut order, "order_G1", "pay_OTHER"),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn capture_requires_matching_gateway_order() {
        let mut order = placed(PaymentMethod::Online);
        assert!(matches!(
            capture(&mut order, "order_G1", "pay_P1"),
            Err(DomainError::InvariantViolation(_))
        ));

        attach(&mut order, "order_G1").unwrap();
        assert!(matches!(
            capture(&mut order, "order_G2", "pay_P1"),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn capture_rejects_amount_mismatch() {
        let mut order = placed(PaymentMethod::Online);
        attach(&mut order, "order_G1").unwrap();
        let id = order.id_typed();
        let err = order
            .handle(&OrderCommand::CapturePayment(CapturePayment {
                order_id: id,
                gateway_order_id: "order_G1".to_string(),
                payment_id: "pay_P1".to_string(),
                amount: Some(Money::from_paise(100)),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn attach_gateway_order_is_idempotent() {
        let mut order = placed(PaymentMethod::Online);
        assert_eq!(attach(&mut order, "order_G1").unwrap().len(), 1);
        assert!(attach(&mut order, "order_G1").unwrap().is_empty());
        assert!(matches!(attach(&mut order, "order_G2"), Err(DomainError::Conflict(_))));

        let mut cod = placed(PaymentMethod::Cod);
        assert!(matches!(
            attach(&mut cod, "order_G1"),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn late_capture_on_cancelled_order_keeps_status() {
        let mut order = placed(PaymentMethod::Online);
        attach(&mut order, "order_G1").unwrap();
        change(&mut order, OrderStatus::Cancelled).unwrap();

        let events = capture(&mut order, "order_G1", "pay_P1").unwrap();
        assert_eq!(events.len(), 1);
        assert!(order.is_paid());
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn failure_after_payment_is_ignored() {
        let mut order = placed(PaymentMethod::Online);
        attach(&mut order, "order_G1").unwrap();
        let id = order.id_typed();
        let fail = OrderCommand::FailPayment(FailPayment {
            order_id: id,
            payment_id: Some("pay_X".to_string()),
            reason: "card declined".to_string(),
            occurred_at: test_time(),
        });

        assert_eq!(execute(&mut order, &fail).unwrap().len(), 1);
        assert_eq!(order.payment().status, PaymentStatus::Failed);
        assert!(execute(&mut order, &fail).unwrap().is_empty());

        // A retry can still succeed after a failure.
        capture(&mut order, "order_G1", "pay_P2").unwrap();
        assert!(execute(&mut order, &fail).unwrap().is_empty());
        assert!(order.is_paid());
    }

    #[test]
    fn status_parses_from_str() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = placed(PaymentMethod::Cod);
        let before = order.clone();
        let _ = order.handle(&OrderCommand::ChangeStatus(ChangeStatus {
            order_id: order.id_typed(),
            status: OrderStatus::Confirmed,
            reason: None,
            occurred_at: test_time(),
        }));
        assert_eq!(before, order);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn status_strategy() -> impl Strategy<Value = OrderStatus> {
            prop_oneof![
                Just(OrderStatus::Pending),
                Just(OrderStatus::Confirmed),
                Just(OrderStatus::Shipped),
                Just(OrderStatus::Delivered),
                Just(OrderStatus::Cancelled),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 300,
                ..ProptestConfig::default()
            })]

            /// Any sequence of status requests leaves the order in a reachable
            /// state, and versions only grow when events are emitted.
            #[test]
            fn arbitrary_status_requests_respect_the_state_machine(
                requests in prop::collection::vec(status_strategy(), 0..20)
            ) {
                let mut order = placed(PaymentMethod::Cod);
                for target in requests {
                    let from = order.status();
                    let version = order.version();
                    match change(&mut order, target) {
                        Ok(events) if events.is_empty() => {
                            prop_assert_eq!(from, target);
                            prop_assert_eq!(order.version(), version);
                        }
                        Ok(events) => {
                            prop_assert!(from.can_transition_to(target));
                            prop_assert_eq!(order.status(), target);
                            prop_assert_eq!(order.version(), version + events.len() as u64);
                        }
                        Err(_) => {
                            prop_assert!(!from.can_transition_to(target));
                            prop_assert_eq!(order.status(), from);
                        }
                    }
                }
                if order.status() == OrderStatus::Delivered {
                    prop_assert!(order.is_paid());
                }
            }
        }
    }
}
