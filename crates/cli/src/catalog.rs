use haggle_core::{Cart, CartItem, ItemId};
use rust_decimal::Decimal;

fn item(id: &str, name: &str, unit_price: i64, quantity: u32) -> CartItem {
    CartItem {
        id: ItemId(id.to_owned()),
        name: name.to_owned(),
        unit_price: Decimal::from(unit_price),
        quantity,
    }
}

/// A pre-filled cart for the interactive demo, priced in whole rupees.
pub fn demo_cart() -> Cart {
    Cart::from_items(vec![
        item("sony-wh1000xm5", "Sony WH-1000XM5 Headphones", 26_990, 1),
        item("nike-aj1-mid", "Nike Air Jordan 1 Mid", 11_495, 1),
        item("puma-rsx", "Puma RS-X Sneakers", 4_500, 2),
    ])
}
