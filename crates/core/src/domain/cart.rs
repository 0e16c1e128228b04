use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::session::{NegotiationSession, SessionStatus};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ItemId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Immutable view of cart contents at negotiation start. Negotiation validity
/// is bound to one snapshot: a differing fingerprint invalidates any open
/// session and any committed discount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    items: Vec<CartItem>,
    fingerprint: String,
}

impl CartSnapshot {
    pub fn of(items: &[CartItem]) -> Self {
        Self { items: items.to_vec(), fingerprint: fingerprint_of(items) }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn item_names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }
}

/// Canonical encoding of the ordered line-item set. Two carts with the same
/// items, prices and quantities in the same order produce the same value.
fn fingerprint_of(items: &[CartItem]) -> String {
    let mut encoded = String::new();
    for item in items {
        let _ = write!(encoded, "{}:{}:{};", item.id.0, item.unit_price, item.quantity);
    }
    encoded
}

/// A negotiated discount bound to the snapshot it was agreed over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub amount: Decimal,
    pub snapshot_fingerprint: String,
}

/// The mutable cart owning line items and at most one negotiated discount on
/// its pricing summary. Every line-item mutation clears the discount: the
/// prior agreement was over a different snapshot and is no longer valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    applied_discount: Option<AppliedDiscount>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CartItem>) -> Self {
        Self { items, applied_discount: None }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::of(&self.items)
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// The committed discount, or zero when none is set or the cart contents
    /// have changed since it was agreed.
    pub fn effective_discount(&self) -> Decimal {
        match &self.applied_discount {
            Some(discount) if discount.snapshot_fingerprint == fingerprint_of(&self.items) => {
                discount.amount
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn payable(&self) -> Decimal {
        (self.total() - self.effective_discount()).max(Decimal::ZERO)
    }

    /// Adds an item, merging quantity onto an existing line with the same id.
    pub fn add_item(&mut self, item: CartItem) {
        self.clear_discount();
        if let Some(existing) = self.items.iter_mut().find(|line| line.id == item.id) {
            existing.quantity += item.quantity;
            return;
        }
        self.items.push(item);
    }

    pub fn remove_item(&mut self, id: &ItemId) {
        self.clear_discount();
        self.items.retain(|line| &line.id != id);
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, id: &ItemId, quantity: u32) {
        self.clear_discount();
        if quantity == 0 {
            self.items.retain(|line| &line.id != id);
            return;
        }
        if let Some(line) = self.items.iter_mut().find(|line| &line.id == id) {
            line.quantity = quantity;
        }
    }

    /// Commits a sealed session's discount to this cart's pricing summary.
    ///
    /// Idempotent for an unchanged snapshot: committing the same sealed
    /// session twice yields the same payable total, never a double deduction.
    /// A session sealed over a different snapshot is rejected.
    pub fn commit(&mut self, session: &NegotiationSession) -> Result<(), DomainError> {
        if session.status() != SessionStatus::Sealed {
            return Err(DomainError::NotSealed { status: session.status() });
        }
        if session.snapshot_fingerprint() != fingerprint_of(&self.items) {
            return Err(DomainError::StaleSnapshot);
        }
        let amount = session.applied_discount().ok_or_else(|| {
            DomainError::InvariantViolation("sealed session has no discount".to_owned())
        })?;

        self.applied_discount = Some(AppliedDiscount {
            amount,
            snapshot_fingerprint: session.snapshot_fingerprint().to_owned(),
        });
        Ok(())
    }

    fn clear_discount(&mut self) {
        self.applied_discount = None;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::errors::DomainError;
    use crate::pricing::FloorRule;
    use crate::session::{AgentTurnResult, FinalizeRequest, NegotiationSession, SessionStatus};

    use super::{Cart, CartItem, ItemId};

    fn item(id: &str, price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: ItemId(id.to_owned()),
            name: id.to_owned(),
            unit_price: Decimal::from(price),
            quantity,
        }
    }

    fn sealed_session(cart: &Cart, final_price: i64) -> NegotiationSession {
        let mut session = NegotiationSession::open(&cart.snapshot(), FloorRule::default(), "₹");
        let ticket = session.submit_offer(&final_price.to_string()).expect("offer accepted");
        session.resolve_turn(
            ticket.generation,
            AgentTurnResult {
                reply: None,
                finalize: Some(FinalizeRequest { final_price: Decimal::from(final_price) }),
            },
        );
        assert_eq!(session.status(), SessionStatus::Sealed);
        session
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let cart = Cart::from_items(vec![item("phone", 400, 2), item("case", 100, 2)]);
        assert_eq!(cart.total(), Decimal::from(1000));
        assert_eq!(cart.payable(), Decimal::from(1000));
    }

    #[test]
    fn commit_applies_discount_to_payable() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 900);

        cart.commit(&session).expect("snapshot unchanged");
        assert_eq!(cart.effective_discount(), Decimal::from(100));
        assert_eq!(cart.payable(), Decimal::from(900));
    }

    #[test]
    fn commit_is_idempotent_for_unchanged_snapshot() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 900);

        cart.commit(&session).expect("first commit");
        let first_payable = cart.payable();
        cart.commit(&session).expect("second commit");
        assert_eq!(cart.payable(), first_payable);
        assert_eq!(cart.payable(), Decimal::from(900));
    }

    #[test]
    fn commit_of_unsealed_session_is_rejected() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = NegotiationSession::open(&cart.snapshot(), FloorRule::default(), "₹");

        let error = cart.commit(&session).expect_err("session not sealed");
        assert_eq!(error, DomainError::NotSealed { status: SessionStatus::Open });
        assert_eq!(cart.payable(), Decimal::from(1000));
    }

    #[test]
    fn commit_against_changed_cart_is_rejected_as_stale() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 900);

        cart.set_quantity(&ItemId("phone".to_owned()), 2);
        let error = cart.commit(&session).expect_err("cart changed underneath");
        assert_eq!(error, DomainError::StaleSnapshot);
        assert_eq!(cart.effective_discount(), Decimal::ZERO);
    }

    #[test]
    fn quantity_change_resets_effective_discount_to_zero() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 900);
        cart.commit(&session).expect("commit");
        assert_eq!(cart.payable(), Decimal::from(900));

        cart.set_quantity(&ItemId("phone".to_owned()), 2);
        assert_eq!(cart.effective_discount(), Decimal::ZERO);
        assert_eq!(cart.payable(), Decimal::from(2000));
    }

    #[test]
    fn add_and_remove_also_invalidate_the_discount() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 900);
        cart.commit(&session).expect("commit");

        cart.add_item(item("case", 100, 1));
        assert_eq!(cart.effective_discount(), Decimal::ZERO);

        let mut cart = Cart::from_items(vec![item("phone", 1000, 1), item("case", 100, 1)]);
        let session = sealed_session(&cart, 1000);
        cart.commit(&session).expect("commit");
        cart.remove_item(&ItemId("case".to_owned()));
        assert_eq!(cart.effective_discount(), Decimal::ZERO);
    }

    #[test]
    fn add_item_merges_quantity_on_same_id() {
        let mut cart = Cart::new();
        cart.add_item(item("case", 100, 1));
        cart.add_item(item("case", 100, 2));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn snapshot_fingerprint_tracks_contents() {
        let cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let before = cart.snapshot();

        let mut changed = cart.clone();
        changed.set_quantity(&ItemId("phone".to_owned()), 3);
        assert_ne!(before.fingerprint(), changed.snapshot().fingerprint());
        assert_eq!(before.fingerprint(), cart.snapshot().fingerprint());
    }

    #[test]
    fn discount_larger_than_total_floors_payable_at_zero() {
        let mut cart = Cart::from_items(vec![item("phone", 1000, 1)]);
        let session = sealed_session(&cart, 850);
        cart.commit(&session).expect("commit");

        // Force the degenerate case directly: payable never goes negative.
        let mut discounted = cart.clone();
        if let Some(discount) = discounted.applied_discount.as_mut() {
            discount.amount = Decimal::from(5000);
        }
        assert_eq!(discounted.payable(), Decimal::ZERO);
    }
}
